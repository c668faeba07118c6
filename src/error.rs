use crate::models::TradeDecision;

/// Errors raised by the agent core and its venue gateways.
///
/// `Connection` and `InvalidConfiguration` are fatal at startup; every other
/// variant is recoverable and is absorbed at the cycle boundary.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("venue connection failed: {0}")]
    Connection(String),

    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("insufficient data: have {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("no current quote for {symbol}")]
    QuoteUnavailable { symbol: String },

    #[error("cannot place an order for decision {0:?}")]
    InvalidDecision(TradeDecision),

    #[error("venue rejected order: retcode {code} ({comment})")]
    VenueRejected { code: u32, comment: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl AgentError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Connection(_) | AgentError::InvalidConfiguration(_)
        )
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(err: config::ConfigError) -> Self {
        AgentError::InvalidConfiguration(err.to_string())
    }
}
