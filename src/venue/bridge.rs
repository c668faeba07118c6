use chrono::DateTime;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::VenueGateway;
use crate::config::Credentials;
use crate::error::AgentError;
use crate::models::{Bar, OrderAck, OrderRequest, Position, Quote, Side, Timeframe};
use crate::Result;

/// Client for the terminal bridge (JSON over HTTP)
///
/// The bridge runs next to the trading terminal and exposes its session:
/// `POST /connect`, `GET /bars`, `GET /quote`, `POST /orders`,
/// `GET /positions`, `POST /disconnect`.
#[derive(Clone)]
pub struct BridgeGateway {
    client: Client,
    base_url: String,
}

// ============== Wire Types ==============

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    login: u64,
    password: &'a str,
    server: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    time: i64, // unix seconds
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    tick_volume: f64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order: u64,
    retcode: u32,
    #[serde(default)]
    comment: String,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    ticket: u64,
    symbol: String,
    #[serde(rename = "type")]
    side: Side,
    volume: f64,
    price_open: f64,
}

impl TryFrom<RawBar> for Bar {
    type Error = AgentError;

    fn try_from(raw: RawBar) -> Result<Self> {
        let timestamp = DateTime::from_timestamp(raw.time, 0).ok_or_else(|| {
            AgentError::DataUnavailable(format!("bar timestamp {} out of range", raw.time))
        })?;

        Ok(Bar {
            timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.tick_volume,
        })
    }
}

impl From<RawPosition> for Position {
    fn from(raw: RawPosition) -> Self {
        Position {
            id: raw.ticket,
            symbol: raw.symbol,
            side: raw.side,
            volume: raw.volume,
            open_price: raw.price_open,
        }
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> AgentError {
    AgentError::DataUnavailable(format!("{}: {}", context, err))
}

// ============== Implementation ==============

impl BridgeGateway {
    /// Create a client for the bridge at `base_url`
    ///
    /// Without `timeout` a hung bridge call blocks the caller until the
    /// bridge answers.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| unavailable(path, e))?;

        if !response.status().is_success() {
            return Err(unavailable(path, format!("bridge returned {}", response.status())));
        }

        response.json().await.map_err(|e| unavailable(path, e))
    }
}

impl VenueGateway for BridgeGateway {
    async fn connect(&mut self, credentials: &Credentials) -> Result<()> {
        tracing::info!(
            login = credentials.login,
            server = %credentials.server,
            bridge = %self.base_url,
            "Connecting to venue"
        );

        let body = ConnectRequest {
            login: credentials.login,
            password: &credentials.password,
            server: &credentials.server,
        };

        let response = self
            .client
            .post(self.url("/connect"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::Connection(format!(
                "bridge returned {}",
                response.status()
            )));
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Connection(e.to_string()))?;

        if !status.ok {
            return Err(AgentError::Connection(
                status
                    .error
                    .unwrap_or_else(|| "initialization refused".to_string()),
            ));
        }

        tracing::info!("Venue initialized successfully");
        Ok(())
    }

    async fn get_bars(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Bar>> {
        let raw: Option<Vec<RawBar>> = self
            .get_json(
                "/bars",
                &[
                    ("symbol", symbol.to_string()),
                    ("timeframe", timeframe.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await?;

        let raw = raw.ok_or_else(|| {
            AgentError::DataUnavailable(format!("no bars returned for {}", symbol))
        })?;

        raw.into_iter().map(Bar::try_from).collect()
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let quote: Option<Quote> = self
            .get_json("/quote", &[("symbol", symbol.to_string())])
            .await?;

        quote.ok_or_else(|| AgentError::DataUnavailable(format!("no tick for {}", symbol)))
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        let response = self
            .client
            .post(self.url("/orders"))
            .json(request)
            .send()
            .await
            .map_err(|e| unavailable("/orders", e))?;

        if !response.status().is_success() {
            return Err(unavailable(
                "/orders",
                format!("bridge returned {}", response.status()),
            ));
        }

        let ack: OrderResponse = response
            .json()
            .await
            .map_err(|e| unavailable("/orders", e))?;

        Ok(OrderAck {
            order_id: ack.order,
            retcode: ack.retcode,
            comment: ack.comment,
        })
    }

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<Position>> {
        let raw: Option<Vec<RawPosition>> = self
            .get_json("/positions", &[("symbol", symbol.to_string())])
            .await?;

        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .map(Position::from)
            .collect())
    }

    async fn disconnect(&mut self) {
        match self.client.post(self.url("/disconnect")).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Venue connection closed");
            }
            Ok(response) => {
                tracing::warn!("Bridge disconnect returned {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Bridge disconnect failed: {}", e);
            }
        }
    }
}
