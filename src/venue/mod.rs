//! Venue gateway abstraction
//!
//! The core only talks to the trading venue through [`VenueGateway`].
//! `BridgeGateway` reaches a real terminal through its HTTP bridge,
//! `PaperGateway` simulates one in-process.

pub mod bridge;
pub mod paper;

pub use bridge::BridgeGateway;
pub use paper::PaperGateway;

use crate::config::Credentials;
use crate::models::{Bar, OrderAck, OrderRequest, Position, Quote, Timeframe};
use crate::Result;

/// Operations the agent needs from a trading venue
///
/// Calls are awaited one at a time by a single control loop, so
/// implementations need no internal synchronisation beyond what `&self`
/// methods require. Failures are reported, never retried here.
#[allow(async_fn_in_trait)]
pub trait VenueGateway {
    /// Open the session; failure is fatal to the agent
    async fn connect(&mut self, credentials: &Credentials) -> Result<()>;

    /// The `count` most recent bars, oldest first
    async fn get_bars(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Bar>>;

    async fn get_quote(&self, symbol: &str) -> Result<Quote>;

    /// Submit an order and return the raw acknowledgment
    ///
    /// A non-success retcode is not an error at this level; the order
    /// manager decides what counts as a rejection.
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck>;

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<Position>>;

    async fn disconnect(&mut self);
}
