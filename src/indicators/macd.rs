use super::moving_average::ema_series;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// MACD values for the last bar of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Number of prices needed before the first valid MACD value
pub fn macd_lookback(slow: usize, signal: usize) -> usize {
    slow + signal - 1
}

/// Calculate MACD (line, signal, histogram) for the last price
///
/// Both EMAs start on bar `slow - 1`: the fast EMA is seeded over the
/// `fast` prices ending there rather than over the first `fast` prices.
/// The signal line is an EMA of the MACD line seeded with its first
/// `signal` values.
pub fn calculate_macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || signal == 0 || fast > slow {
        return None;
    }
    if prices.len() < macd_lookback(slow, signal) {
        return None;
    }

    let slow_ema = ema_series(prices, slow);
    let fast_ema = ema_series(&prices[slow - fast..], fast);
    debug_assert_eq!(slow_ema.len(), fast_ema.len());

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(fast, slow)| fast - slow)
        .collect();

    let signal_line = ema_series(&macd_line, signal);

    let line = *macd_line.last()?;
    let signal = *signal_line.last()?;

    Some(Macd {
        line,
        signal,
        histogram: line - signal,
    })
}
