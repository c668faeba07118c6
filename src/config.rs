//! Agent configuration
//!
//! Loaded once at startup from a file (JSON by default, any format the
//! `config` crate recognises by extension) overlaid with `SESSIONBOT__*`
//! environment variables, then validated. The resulting [`AgentConfig`] is
//! immutable and handed to every component by reference.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AgentError;
use crate::indicators::IndicatorEngine;
use crate::models::{SessionWindow, Timeframe};
use crate::strategy::DecisionMode;
use crate::Result;

pub const ENV_PREFIX: &str = "SESSIONBOT";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub venue: VenueConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Bridge,
    Paper,
}

#[derive(Clone, Deserialize)]
pub struct VenueConfig {
    pub login: u64,
    pub password: String,
    pub server: String,
    /// Base URL of the terminal bridge
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub gateway: GatewayKind,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_paper_seed")]
    pub paper_seed: u64,
    #[serde(default = "default_paper_price")]
    pub paper_start_price: f64,
}

fn default_address() -> String {
    "http://127.0.0.1:8228".to_string()
}

fn default_paper_seed() -> u64 {
    42
}

fn default_paper_price() -> f64 {
    100.0
}

impl VenueConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            login: self.login,
            password: self.password.clone(),
            server: self.server.clone(),
        }
    }
}

impl fmt::Debug for VenueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenueConfig")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .field("address", &self.address)
            .field("gateway", &self.gateway)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Account login sent to the venue on connect
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: u64,
    pub password: String,
    pub server: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    pub symbol: String,
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Absolute price distance of the stop-loss from the fill price
    pub sl_distance: f64,
    /// Absolute price distance of the take-profit from the fill price
    pub tp_distance: f64,
    /// Maximum slippage in points
    pub deviation: u32,
    pub magic: u64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    #[serde(default)]
    pub decision_mode: DecisionMode,
}

fn default_volume() -> f64 {
    0.01
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub timeframe: Timeframe,
    /// Trailing bars fetched each cycle
    pub bar_count: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M1,
            bar_count: 100,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(deserialize_with = "clock_time")]
    pub start_time: NaiveTime,
    #[serde(deserialize_with = "clock_time")]
    pub end_time: NaiveTime,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl SessionConfig {
    pub fn window(&self) -> SessionWindow {
        SessionWindow::new(self.start_time, self.end_time)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-only event and audit log
    pub file: PathBuf,
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("history.log"),
            filter: "sessionbot=info,audit=info".to_string(),
        }
    }
}

/// Parse a wall-clock `HH:MM:SS` time of day
fn clock_time<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M:%S").map_err(|e| {
        serde::de::Error::custom(format!("invalid time {:?} (expected HH:MM:SS): {}", raw, e))
    })
}

impl AgentConfig {
    /// Load from `path` with environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AgentError::InvalidConfiguration(format!(
                "config file {} not found",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AgentConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AgentError::InvalidConfiguration(msg));

        let trading = &self.trading;
        if trading.symbol.trim().is_empty() {
            return invalid("trading.symbol must not be empty".to_string());
        }
        for (name, value) in [
            ("trading.volume", trading.volume),
            ("trading.sl_distance", trading.sl_distance),
            ("trading.tp_distance", trading.tp_distance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{} must be positive, got {}", name, value));
            }
        }

        let strategy = &self.strategy;
        if strategy.macd_fast == 0 || strategy.macd_signal == 0 || strategy.rsi_period == 0 {
            return invalid("indicator periods must be positive".to_string());
        }
        if strategy.macd_fast >= strategy.macd_slow {
            return invalid(format!(
                "strategy.macd_fast ({}) must be below strategy.macd_slow ({})",
                strategy.macd_fast, strategy.macd_slow
            ));
        }
        if strategy.rsi_oversold >= strategy.rsi_overbought {
            return invalid(format!(
                "strategy.rsi_oversold ({}) must be below strategy.rsi_overbought ({})",
                strategy.rsi_oversold, strategy.rsi_overbought
            ));
        }
        let min_bars = IndicatorEngine::new(strategy).min_bars();
        if strategy.bar_count < min_bars {
            return invalid(format!(
                "strategy.bar_count ({}) is below the indicator lookback ({})",
                strategy.bar_count, min_bars
            ));
        }

        if self.session.start_time == self.session.end_time {
            return invalid("session.start_time and session.end_time must differ".to_string());
        }
        if self.session.poll_interval_secs == 0 {
            return invalid("session.poll_interval_secs must be positive".to_string());
        }

        if self.venue.gateway == GatewayKind::Bridge && self.venue.address.trim().is_empty() {
            return invalid("venue.address is required for the bridge gateway".to_string());
        }

        Ok(())
    }
}
