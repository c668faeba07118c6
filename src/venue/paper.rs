use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard};

use super::VenueGateway;
use crate::config::Credentials;
use crate::error::AgentError;
use crate::models::{
    Bar, OrderAck, OrderRequest, Position, Quote, Timeframe, RETCODE_DONE, RETCODE_INVALID,
};
use crate::Result;

/// Relative noise per generated bar
const BAR_VOLATILITY: f64 = 0.001;
/// Relative noise per quote refresh
const TICK_VOLATILITY: f64 = 0.0005;

/// Simulated venue for dry runs
///
/// Prices follow a seeded random walk, orders fill instantly at the
/// requested price, and an order that references a position nets against
/// it instead of opening a new one.
pub struct PaperGateway {
    state: Mutex<PaperState>,
    spread: f64,
    connected: bool,
}

struct PaperState {
    rng: StdRng,
    price: f64,
    positions: Vec<Position>,
    next_ticket: u64,
}

impl PaperGateway {
    /// Create a paper venue with a seed for reproducibility
    pub fn new(seed: u64, start_price: f64) -> Self {
        Self {
            state: Mutex::new(PaperState {
                rng: StdRng::seed_from_u64(seed),
                price: start_price,
                positions: Vec::new(),
                next_ticket: 1,
            }),
            spread: start_price * 0.0002,
            connected: false,
        }
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(AgentError::DataUnavailable(
                "paper venue is not connected".to_string(),
            ))
        }
    }

    fn reject(comment: &str) -> OrderAck {
        OrderAck {
            order_id: 0,
            retcode: RETCODE_INVALID,
            comment: comment.to_string(),
        }
    }
}

impl PaperState {
    fn next_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    /// Random walk of `count` closes ending at the current price, oldest first
    fn generate_bars(&mut self, count: usize, timeframe: Timeframe, now: DateTime<Utc>) -> Vec<Bar> {
        let step = Duration::minutes(timeframe.minutes());
        let last_open_time = now.duration_trunc(step).unwrap_or(now);

        let mut closes = Vec::with_capacity(count);
        let mut close = self.price;
        for _ in 0..count {
            closes.push(close);
            close -= close * self.rng.gen_range(-BAR_VOLATILITY..BAR_VOLATILITY);
        }
        closes.reverse();

        let mut bars = Vec::with_capacity(count);
        let mut open = close;
        for (i, close) in closes.into_iter().enumerate() {
            let wick = close * self.rng.gen_range(0.0..BAR_VOLATILITY);
            bars.push(Bar {
                timestamp: last_open_time - step * (count - 1 - i) as i32,
                open,
                high: open.max(close) + wick,
                low: open.min(close) - wick,
                close,
                volume: self.rng.gen_range(50.0..500.0_f64).round(),
            });
            open = close;
        }

        bars
    }
}

impl VenueGateway for PaperGateway {
    async fn connect(&mut self, credentials: &Credentials) -> Result<()> {
        tracing::info!(
            login = credentials.login,
            server = %credentials.server,
            "Paper venue initialized"
        );
        self.connected = true;
        Ok(())
    }

    async fn get_bars(&self, _symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Bar>> {
        self.ensure_connected()?;
        Ok(self.state().generate_bars(count, timeframe, Utc::now()))
    }

    async fn get_quote(&self, _symbol: &str) -> Result<Quote> {
        self.ensure_connected()?;

        let mut state = self.state();
        let noise = state.rng.gen_range(-TICK_VOLATILITY..TICK_VOLATILITY);
        state.price += state.price * noise;

        Ok(Quote {
            bid: state.price - self.spread / 2.0,
            ask: state.price + self.spread / 2.0,
        })
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        self.ensure_connected()?;

        if !(request.volume > 0.0) {
            return Ok(Self::reject("Invalid volume"));
        }

        let mut state = self.state();

        if let Some(position_id) = request.position {
            let Some(index) = state
                .positions
                .iter()
                .position(|p| p.id == position_id && p.symbol == request.symbol)
            else {
                return Ok(Self::reject("Position not found"));
            };

            let position = &mut state.positions[index];
            if position.side == request.side {
                return Ok(Self::reject("Closing order must oppose the position"));
            }
            if request.volume > position.volume + 1e-9 {
                return Ok(Self::reject("Volume exceeds position"));
            }

            position.volume -= request.volume;
            if position.volume <= 1e-9 {
                state.positions.remove(index);
            }
        } else {
            let id = state.next_ticket();
            state.positions.push(Position {
                id,
                symbol: request.symbol.clone(),
                side: request.side,
                volume: request.volume,
                open_price: request.price,
            });
        }

        Ok(OrderAck {
            order_id: state.next_ticket(),
            retcode: RETCODE_DONE,
            comment: "Request executed".to_string(),
        })
    }

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<Position>> {
        self.ensure_connected()?;

        Ok(self
            .state()
            .positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        tracing::info!("Paper venue shut down");
    }
}
