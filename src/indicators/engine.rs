use super::macd::{calculate_macd, macd_lookback};
use super::rsi::calculate_rsi;
use crate::config::StrategyConfig;
use crate::error::AgentError;
use crate::models::{Bar, IndicatorSnapshot};
use crate::Result;

/// Computes the MACD/RSI snapshot for the latest bar of a series
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    macd_fast: usize,
    macd_slow: usize,
    macd_signal: usize,
    rsi_period: usize,
}

impl IndicatorEngine {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            macd_fast: config.macd_fast,
            macd_slow: config.macd_slow,
            macd_signal: config.macd_signal,
            rsi_period: config.rsi_period,
        }
    }

    /// Minimum number of bars `compute` accepts
    pub fn min_bars(&self) -> usize {
        macd_lookback(self.macd_slow, self.macd_signal).max(self.rsi_period + 1)
    }

    pub fn compute(&self, bars: &[Bar]) -> Result<IndicatorSnapshot> {
        let need = self.min_bars();
        let latest = match bars.last() {
            Some(bar) if bars.len() >= need => bar,
            _ => {
                return Err(AgentError::InsufficientData {
                    have: bars.len(),
                    need,
                })
            }
        };

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let macd = calculate_macd(&closes, self.macd_fast, self.macd_slow, self.macd_signal)
            .ok_or(AgentError::InsufficientData {
                have: bars.len(),
                need,
            })?;
        let rsi = calculate_rsi(&closes, self.rsi_period).ok_or(AgentError::InsufficientData {
            have: bars.len(),
            need,
        })?;

        Ok(IndicatorSnapshot {
            timestamp: latest.timestamp,
            macd: macd.line,
            macd_signal: macd.signal,
            macd_hist: macd.histogram,
            rsi,
        })
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}
