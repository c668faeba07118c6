//! Session controller
//!
//! Drives the per-tick cycle inside the configured trading window and
//! flattens exposure once when the window closes.

use chrono::NaiveTime;
use std::future::Future;
use tokio::time::MissedTickBehavior;

use super::order_manager::OrderManager;
use crate::config::AgentConfig;
use crate::indicators::IndicatorEngine;
use crate::models::{IndicatorSnapshot, OrderResult, Quote, SessionWindow};
use crate::strategy::SignalEvaluator;
use crate::venue::VenueGateway;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    OutsideWindow,
    Active,
    Flattening,
}

impl SessionState {
    /// Next state given whether the clock is inside the trading window
    ///
    /// Only an observed Active -> outside crossing enters `Flattening`, which
    /// always falls back to `OutsideWindow` on the following step.
    pub fn next(self, in_window: bool) -> SessionState {
        match (self, in_window) {
            (SessionState::OutsideWindow, true) => SessionState::Active,
            (SessionState::OutsideWindow, false) => SessionState::OutsideWindow,
            (SessionState::Active, true) => SessionState::Active,
            (SessionState::Active, false) => SessionState::Flattening,
            (SessionState::Flattening, _) => SessionState::OutsideWindow,
        }
    }
}

/// Source of the wall-clock time of day
pub trait Clock {
    fn now(&self) -> NaiveTime;
}

/// Local time of the host, as the trading window is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveTime {
        chrono::Local::now().time()
    }
}

impl<F: Fn() -> NaiveTime> Clock for F {
    fn now(&self) -> NaiveTime {
        self()
    }
}

pub struct SessionController<'a, G, C = LocalClock> {
    gateway: G,
    config: &'a AgentConfig,
    clock: C,
    window: SessionWindow,
    engine: IndicatorEngine,
    evaluator: SignalEvaluator,
    state: SessionState,
}

impl<'a, G: VenueGateway> SessionController<'a, G, LocalClock> {
    pub fn new(gateway: G, config: &'a AgentConfig) -> Self {
        Self::with_clock(gateway, config, LocalClock)
    }
}

impl<'a, G: VenueGateway, C: Clock> SessionController<'a, G, C> {
    pub fn with_clock(gateway: G, config: &'a AgentConfig, clock: C) -> Self {
        Self {
            gateway,
            config,
            clock,
            window: config.session.window(),
            engine: IndicatorEngine::new(&config.strategy),
            evaluator: SignalEvaluator::new(config),
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Poll until `shutdown` resolves, then disconnect
    ///
    /// `shutdown` is only observed between cycles, so a cycle that has
    /// started always completes. Shutting down never flattens.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.config.session.poll_interval();
        tracing::info!(
            symbol = %self.config.trading.symbol,
            start = %self.window.start,
            end = %self.window.end,
            poll_secs = period.as_secs(),
            "Session loop started"
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping session loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.gateway.disconnect().await;
        tracing::info!("Disconnected from venue");
    }

    /// One cycle: transition, log the quote, trade when active
    ///
    /// Recoverable failures are logged here and never escape; the next tick
    /// is the retry.
    pub async fn tick(&mut self) -> SessionState {
        let now = self.clock.now();
        let previous = self.state;
        self.state = previous.next(self.window.contains(now));

        if self.state != previous {
            tracing::info!(from = ?previous, to = ?self.state, time = %now, "Session state changed");
        }

        if self.state == SessionState::Flattening {
            tracing::info!(time = %now, "Trading window closed, closing all positions");
            self.flatten().await;
            self.state = self.state.next(self.window.contains(now));
        }

        let symbol = &self.config.trading.symbol;
        let quote = match self.gateway.get_quote(symbol).await {
            Ok(quote) => {
                tracing::info!(symbol = %symbol, bid = quote.bid, ask = quote.ask, "Current tick");
                quote
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, "Failed to get current tick: {}", e);
                return self.state;
            }
        };

        if self.state == SessionState::Active {
            if let Err(e) = self.trade(&quote).await {
                tracing::warn!(symbol = %symbol, "Skipping cycle: {}", e);
            }
        }

        self.state
    }

    async fn trade(&self, quote: &Quote) -> Result<()> {
        let strategy = &self.config.strategy;
        let bars = self
            .gateway
            .get_bars(&self.config.trading.symbol, strategy.timeframe, strategy.bar_count)
            .await?;
        let snapshot = self.engine.compute(&bars)?;

        tracing::debug!(
            macd = snapshot.macd,
            signal = snapshot.macd_signal,
            histogram = snapshot.macd_hist,
            rsi = snapshot.rsi,
            "Indicators updated"
        );

        self.execute_signals(&snapshot, quote).await;
        Ok(())
    }

    /// Evaluate and submit every order the decision mode allows
    pub async fn execute_signals(
        &self,
        snapshot: &IndicatorSnapshot,
        quote: &Quote,
    ) -> Vec<Result<OrderResult>> {
        let trading = &self.config.trading;
        let evaluation = self.evaluator.evaluate(snapshot, quote);
        let decisions = evaluation.orders(trading.decision_mode);

        if decisions.is_empty() {
            return Vec::new();
        }

        tracing::info!(
            indicator = ?evaluation.indicator,
            threshold = ?evaluation.threshold,
            mode = ?trading.decision_mode,
            "Signal triggered"
        );

        let manager = OrderManager::new(&self.gateway, trading);
        let mut results = Vec::with_capacity(decisions.len());
        for decision in decisions {
            let result = manager.submit(decision, trading.volume).await;
            if let Err(e) = &result {
                tracing::error!(
                    symbol = %trading.symbol,
                    action = ?decision,
                    bid = quote.bid,
                    ask = quote.ask,
                    "Order failed: {}",
                    e
                );
            }
            results.push(result);
        }
        results
    }

    async fn flatten(&self) {
        let symbol = &self.config.trading.symbol;
        let manager = OrderManager::new(&self.gateway, &self.config.trading);
        let results = manager.close_all(symbol).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(
                symbol = %symbol,
                attempted = results.len(),
                failed,
                "Some positions could not be closed"
            );
        }
    }
}
