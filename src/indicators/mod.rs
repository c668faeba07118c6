// Technical indicators module
// Implements EMA, MACD and RSI for the signal evaluator

pub mod engine;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use engine::IndicatorEngine;
pub use macd::{calculate_macd, macd_lookback, Macd};
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::calculate_rsi;
