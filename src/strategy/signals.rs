use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::models::{IndicatorSnapshot, Quote, TradeDecision};

/// How the indicator rule and the price-threshold rule combine into orders
///
/// `Independent` lets both rules fire in the same cycle, so one cycle can
/// submit two orders (possibly two Buys). This is the legacy behavior and a
/// known double-exposure risk. `Exclusive` submits at most one order per
/// cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    #[default]
    Independent,
    Exclusive,
}

/// Outcome of both decision rules for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// MACD crossover confirmed by RSI
    pub indicator: TradeDecision,
    /// Bid against the static buy/sell thresholds
    pub threshold: TradeDecision,
}

impl Evaluation {
    /// Combined decision: the first rule that is not Hold wins
    pub fn decision(&self) -> TradeDecision {
        if self.indicator != TradeDecision::Hold {
            self.indicator
        } else {
            self.threshold
        }
    }

    /// Decisions to submit as orders this cycle, in rule order
    pub fn orders(&self, mode: DecisionMode) -> Vec<TradeDecision> {
        match mode {
            DecisionMode::Independent => [self.indicator, self.threshold]
                .into_iter()
                .filter(|d| *d != TradeDecision::Hold)
                .collect(),
            DecisionMode::Exclusive => match self.decision() {
                TradeDecision::Hold => Vec::new(),
                decision => vec![decision],
            },
        }
    }
}

/// Thresholds the evaluator decides against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalEvaluator {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl SignalEvaluator {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            rsi_oversold: config.strategy.rsi_oversold,
            rsi_overbought: config.strategy.rsi_overbought,
            buy_threshold: config.trading.buy_threshold,
            sell_threshold: config.trading.sell_threshold,
        }
    }

    /// Evaluate both rules. Pure: equal inputs give equal outputs.
    pub fn evaluate(&self, snapshot: &IndicatorSnapshot, quote: &Quote) -> Evaluation {
        Evaluation {
            indicator: self.indicator_rule(snapshot),
            threshold: self.threshold_rule(quote),
        }
    }

    fn indicator_rule(&self, snapshot: &IndicatorSnapshot) -> TradeDecision {
        if snapshot.macd > snapshot.macd_signal && snapshot.rsi < self.rsi_oversold {
            TradeDecision::Buy
        } else if snapshot.macd < snapshot.macd_signal && snapshot.rsi > self.rsi_overbought {
            TradeDecision::Sell
        } else {
            TradeDecision::Hold
        }
    }

    fn threshold_rule(&self, quote: &Quote) -> TradeDecision {
        if quote.bid > self.buy_threshold {
            TradeDecision::Buy
        } else if quote.bid < self.sell_threshold {
            TradeDecision::Sell
        } else {
            TradeDecision::Hold
        }
    }
}
