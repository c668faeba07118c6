#![allow(dead_code)]

use chrono::{Duration, NaiveTime, TimeZone, Utc};
use sessionbot::config::{AgentConfig, Credentials};
use sessionbot::venue::VenueGateway;
use sessionbot::{
    AgentError, Bar, OrderAck, OrderRequest, Position, Quote, Result, Side, Timeframe,
    RETCODE_DONE,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Venue double with scripted data that records every order it receives
///
/// Positions are never netted, so repeated flattening would be visible as
/// duplicate close orders.
#[derive(Default)]
pub struct ScriptedGateway {
    pub bars: Vec<Bar>,
    pub quote: Mutex<Option<Quote>>,
    pub positions: Vec<Position>,
    /// 1-based submission indexes answered with a rejection
    pub reject_orders: HashSet<usize>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub quote_requests: AtomicUsize,
    pub connected: bool,
    pub disconnected: bool,
}

impl ScriptedGateway {
    pub fn new(quote: Quote) -> Self {
        Self {
            quote: Mutex::new(Some(quote)),
            ..Default::default()
        }
    }

    pub fn with_bars(mut self, closes: &[f64]) -> Self {
        self.bars = bars(closes);
        self
    }

    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions = positions;
        self
    }

    pub fn rejecting(mut self, submissions: &[usize]) -> Self {
        self.reject_orders = submissions.iter().copied().collect();
        self
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    /// Orders that open exposure
    pub fn opening_orders(&self) -> Vec<OrderRequest> {
        self.orders()
            .into_iter()
            .filter(|o| o.position.is_none())
            .collect()
    }

    /// Orders that reference an existing position
    pub fn closing_orders(&self) -> Vec<OrderRequest> {
        self.orders()
            .into_iter()
            .filter(|o| o.position.is_some())
            .collect()
    }
}

impl VenueGateway for ScriptedGateway {
    async fn connect(&mut self, _credentials: &Credentials) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn get_bars(&self, _symbol: &str, _timeframe: Timeframe, count: usize) -> Result<Vec<Bar>> {
        let skip = self.bars.len().saturating_sub(count);
        Ok(self.bars[skip..].to_vec())
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.quote_requests.fetch_add(1, Ordering::SeqCst);
        self.quote
            .lock()
            .unwrap()
            .ok_or_else(|| AgentError::DataUnavailable(format!("no tick for {}", symbol)))
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(request.clone());
        let index = orders.len();

        let retcode = if self.reject_orders.contains(&index) {
            10006
        } else {
            RETCODE_DONE
        };
        Ok(OrderAck {
            order_id: 5000 + index as u64,
            retcode,
            comment: String::new(),
        })
    }

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<Position>> {
        Ok(self
            .positions
            .iter()
            .filter(|p| p.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn disconnect(&mut self) {
        self.disconnected = true;
    }
}

/// One-minute bars with the given closes, oldest first
pub fn bars(closes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
    let mut open = closes.first().copied().unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let bar = Bar {
                timestamp: start + Duration::minutes(i as i64),
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume: 100.0,
            };
            open = close;
            bar
        })
        .collect()
}

/// Steady decline followed by a small rebound: RSI deep in oversold
/// territory while the MACD line crosses above its signal
pub fn oversold_bounce() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
    closes.extend([141.6, 142.2, 142.8]);
    closes
}

/// Mirror image of [`oversold_bounce`]
pub fn overbought_dip() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
    closes.extend([158.4, 157.8, 157.2]);
    closes
}

pub fn position(id: u64, side: Side, volume: f64) -> Position {
    Position {
        id,
        symbol: "EURUSD".to_string(),
        side,
        volume,
        open_price: 100.0,
    }
}

pub fn config() -> AgentConfig {
    let config: AgentConfig = serde_json::from_str(
        r#"{
            "venue": { "login": 1, "password": "secret", "server": "Test" },
            "trading": {
                "symbol": "EURUSD",
                "volume": 0.01,
                "sl_distance": 0.5,
                "tp_distance": 1.0,
                "deviation": 20,
                "magic": 234000,
                "buy_threshold": 150.0,
                "sell_threshold": 50.0
            },
            "session": { "start_time": "09:30:00", "end_time": "16:00:00" }
        }"#,
    )
    .unwrap();
    config.validate().unwrap();
    config
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Clock whose time the test moves by hand
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<NaiveTime>>);

impl ManualClock {
    pub fn at(time: NaiveTime) -> Self {
        Self(Arc::new(Mutex::new(time)))
    }

    pub fn set(&self, time: NaiveTime) {
        *self.0.lock().unwrap() = time;
    }

    /// Time source for the controller, following every `set`
    pub fn reader(&self) -> impl Fn() -> NaiveTime {
        let time = self.0.clone();
        move || *time.lock().unwrap()
    }
}
