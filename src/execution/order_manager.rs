use crate::config::TradingConfig;
use crate::error::AgentError;
use crate::models::{
    FillPolicy, OrderRequest, OrderResult, Position, Quote, Side, TimePolicy, TradeDecision,
};
use crate::venue::VenueGateway;
use crate::Result;

const OPEN_COMMENT: &str = "algo trade";
const CLOSE_COMMENT: &str = "session close";

/// Build an opening market order priced off `quote`
///
/// Buys fill at the ask with the stop below and the target above; sells
/// fill at the bid with the stop above and the target below. Distances are
/// absolute price units.
pub fn build_request(config: &TradingConfig, side: Side, quote: &Quote, volume: f64) -> OrderRequest {
    let (price, stop_loss, take_profit) = match side {
        Side::Buy => (
            quote.ask,
            quote.ask - config.sl_distance,
            quote.ask + config.tp_distance,
        ),
        Side::Sell => (
            quote.bid,
            quote.bid + config.sl_distance,
            quote.bid - config.tp_distance,
        ),
    };

    OrderRequest {
        symbol: config.symbol.clone(),
        side,
        volume,
        price,
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
        deviation: config.deviation,
        magic: config.magic,
        comment: OPEN_COMMENT.to_string(),
        time_policy: TimePolicy::GoodTillCancel,
        fill_policy: FillPolicy::ImmediateOrCancel,
        position: None,
    }
}

/// Build the opposing order that nets out `position` in full
pub fn build_close_request(config: &TradingConfig, position: &Position, quote: &Quote) -> OrderRequest {
    let side = position.side.opposite();
    // A long is closed by selling at the bid, a short by buying at the ask
    let price = match side {
        Side::Sell => quote.bid,
        Side::Buy => quote.ask,
    };

    OrderRequest {
        symbol: position.symbol.clone(),
        side,
        volume: position.volume,
        price,
        stop_loss: None,
        take_profit: None,
        deviation: config.deviation,
        magic: config.magic,
        comment: CLOSE_COMMENT.to_string(),
        time_policy: TimePolicy::GoodTillCancel,
        fill_policy: FillPolicy::Return,
        position: Some(position.id),
    }
}

/// Turns decisions into venue orders and flattens exposure
pub struct OrderManager<'a, G> {
    gateway: &'a G,
    config: &'a TradingConfig,
}

impl<'a, G: VenueGateway> OrderManager<'a, G> {
    pub fn new(gateway: &'a G, config: &'a TradingConfig) -> Self {
        Self { gateway, config }
    }

    /// Submit a market order for `decision` on the configured symbol
    pub async fn submit(&self, decision: TradeDecision, volume: f64) -> Result<OrderResult> {
        let side = decision
            .side()
            .ok_or(AgentError::InvalidDecision(decision))?;

        let quote = self.current_quote(&self.config.symbol).await?;
        let request = build_request(self.config, side, &quote, volume);

        self.send(&request).await
    }

    /// Close every open position on `symbol`, one opposing order each
    ///
    /// A failed closure is logged and recorded; the remaining positions
    /// are still attempted. Results are in position order.
    pub async fn close_all(&self, symbol: &str) -> Vec<Result<OrderResult>> {
        let positions = match self.gateway.list_open_positions(symbol).await {
            Ok(positions) => positions,
            Err(e) => {
                tracing::error!(symbol, "Failed to list open positions: {}", e);
                return Vec::new();
            }
        };

        if positions.is_empty() {
            tracing::info!(symbol, "No open positions to close");
            return Vec::new();
        }

        tracing::info!(symbol, count = positions.len(), "Closing all positions");

        let mut results = Vec::with_capacity(positions.len());
        for position in &positions {
            let result = self.close_position(position).await;
            match &result {
                Ok(closed) => tracing::info!(
                    position = position.id,
                    order_id = closed.order_id,
                    "Position closed successfully"
                ),
                Err(e) => tracing::error!(
                    position = position.id,
                    side = %position.side,
                    volume = position.volume,
                    "Failed to close position: {}",
                    e
                ),
            }
            results.push(result);
        }

        results
    }

    async fn close_position(&self, position: &Position) -> Result<OrderResult> {
        let quote = self.current_quote(&position.symbol).await?;
        let request = build_close_request(self.config, position, &quote);
        self.send(&request).await
    }

    async fn current_quote(&self, symbol: &str) -> Result<Quote> {
        self.gateway.get_quote(symbol).await.map_err(|e| {
            tracing::error!(symbol, "Failed to get current tick: {}", e);
            AgentError::QuoteUnavailable {
                symbol: symbol.to_string(),
            }
        })
    }

    async fn send(&self, request: &OrderRequest) -> Result<OrderResult> {
        tracing::info!(
            symbol = %request.symbol,
            side = %request.side,
            volume = request.volume,
            price = request.price,
            stop_loss = ?request.stop_loss,
            take_profit = ?request.take_profit,
            deviation = request.deviation,
            magic = request.magic,
            time_policy = ?request.time_policy,
            fill_policy = ?request.fill_policy,
            position = ?request.position,
            "Trade request"
        );

        let ack = self.gateway.submit_order(request).await?;

        if !ack.is_done() {
            return Err(AgentError::VenueRejected {
                code: ack.retcode,
                comment: ack.comment,
            });
        }

        tracing::info!(
            target: "audit",
            action = %request.side,
            price = request.price,
            volume = request.volume,
            order_id = ack.order_id,
            "Trade executed"
        );

        Ok(OrderResult {
            order_id: ack.order_id,
            side: request.side,
            volume: request.volume,
            price: request.price,
            position: request.position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::models::{Bar, OrderAck, Timeframe, RETCODE_DONE};
    use crate::strategy::DecisionMode;
    use std::sync::Mutex;

    /// Gateway double with a fixed quote and scripted retcodes
    struct FakeGateway {
        quote: Option<Quote>,
        positions: Vec<Position>,
        retcodes: Mutex<Vec<u32>>,
        submitted: Mutex<Vec<OrderRequest>>,
    }

    impl FakeGateway {
        fn new(quote: Option<Quote>) -> Self {
            Self {
                quote,
                positions: Vec::new(),
                retcodes: Mutex::new(Vec::new()),
                submitted: Mutex::new(Vec::new()),
            }
        }

        /// Retcodes answered in order; DONE once exhausted
        fn with_retcodes(self, codes: &[u32]) -> Self {
            *self.retcodes.lock().unwrap() = codes.iter().rev().copied().collect();
            self
        }

        fn submitted(&self) -> Vec<OrderRequest> {
            self.submitted.lock().unwrap().clone()
        }
    }

    impl VenueGateway for FakeGateway {
        async fn connect(&mut self, _credentials: &Credentials) -> Result<()> {
            Ok(())
        }

        async fn get_bars(&self, _: &str, _: Timeframe, _: usize) -> Result<Vec<Bar>> {
            Ok(Vec::new())
        }

        async fn get_quote(&self, _symbol: &str) -> Result<Quote> {
            self.quote
                .ok_or_else(|| AgentError::DataUnavailable("no tick".to_string()))
        }

        async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(request.clone());
            let retcode = self.retcodes.lock().unwrap().pop().unwrap_or(RETCODE_DONE);
            Ok(OrderAck {
                order_id: 1000 + submitted.len() as u64,
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

        async fn disconnect(&mut self) {}
    }

    fn trading_config() -> TradingConfig {
        TradingConfig {
            symbol: "EURUSD".to_string(),
            volume: 0.01,
            sl_distance: 0.5,
            tp_distance: 1.0,
            deviation: 20,
            magic: 234000,
            buy_threshold: 150.0,
            sell_threshold: 50.0,
            decision_mode: DecisionMode::Independent,
        }
    }

    fn quote() -> Quote {
        Quote {
            bid: 100.0,
            ask: 100.2,
        }
    }

    fn position(id: u64, side: Side, volume: f64) -> Position {
        Position {
            id,
            symbol: "EURUSD".to_string(),
            side,
            volume,
            open_price: 99.0,
        }
    }

    #[test]
    fn test_buy_request_brackets_price() {
        let request = build_request(&trading_config(), Side::Buy, &quote(), 0.01);

        assert_eq!(request.price, 100.2);
        let sl = request.stop_loss.unwrap();
        let tp = request.take_profit.unwrap();
        assert!(sl < request.price && request.price < tp);
        assert!((sl - 99.7).abs() < 1e-9);
        assert!((tp - 101.2).abs() < 1e-9);
        assert_eq!(request.fill_policy, FillPolicy::ImmediateOrCancel);
        assert_eq!(request.position, None);
    }

    #[test]
    fn test_sell_request_brackets_price() {
        let request = build_request(&trading_config(), Side::Sell, &quote(), 0.01);

        assert_eq!(request.price, 100.0);
        let sl = request.stop_loss.unwrap();
        let tp = request.take_profit.unwrap();
        assert!(tp < request.price && request.price < sl);
        assert!((sl - 100.5).abs() < 1e-9);
        assert!((tp - 99.0).abs() < 1e-9);
    }

    #[test]
    fn test_close_request_opposes_position() {
        let config = trading_config();

        let long = build_close_request(&config, &position(7, Side::Buy, 0.03), &quote());
        assert_eq!(long.side, Side::Sell);
        assert_eq!(long.price, 100.0);
        assert_eq!(long.volume, 0.03);
        assert_eq!(long.position, Some(7));
        assert_eq!(long.stop_loss, None);
        assert_eq!(long.fill_policy, FillPolicy::Return);

        let short = build_close_request(&config, &position(8, Side::Sell, 0.05), &quote());
        assert_eq!(short.side, Side::Buy);
        assert_eq!(short.price, 100.2);
        assert_eq!(short.position, Some(8));
    }

    #[tokio::test]
    async fn test_submit_success() {
        let gateway = FakeGateway::new(Some(quote()));
        let config = trading_config();
        let manager = OrderManager::new(&gateway, &config);

        let result = manager.submit(TradeDecision::Buy, 0.02).await.unwrap();

        assert_eq!(result.order_id, 1001);
        assert_eq!(result.side, Side::Buy);
        assert_eq!(result.volume, 0.02);
        assert_eq!(result.price, 100.2);

        let submitted = gateway.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].symbol, "EURUSD");
        assert_eq!(submitted[0].magic, 234000);
        assert_eq!(submitted[0].deviation, 20);
    }

    #[tokio::test]
    async fn test_submit_hold_is_invalid() {
        let gateway = FakeGateway::new(Some(quote()));
        let config = trading_config();
        let manager = OrderManager::new(&gateway, &config);

        let err = manager.submit(TradeDecision::Hold, 0.01).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidDecision(TradeDecision::Hold)));
        assert!(gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_quote() {
        let gateway = FakeGateway::new(None);
        let config = trading_config();
        let manager = OrderManager::new(&gateway, &config);

        let err = manager.submit(TradeDecision::Sell, 0.01).await.unwrap_err();
        assert!(matches!(err, AgentError::QuoteUnavailable { ref symbol } if symbol == "EURUSD"));
        assert!(gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let gateway = FakeGateway::new(Some(quote())).with_retcodes(&[10019]);
        let config = trading_config();
        let manager = OrderManager::new(&gateway, &config);

        let err = manager.submit(TradeDecision::Buy, 0.01).await.unwrap_err();
        assert!(matches!(err, AgentError::VenueRejected { code: 10019, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_close_all_continues_past_failure() {
        let mut gateway = FakeGateway::new(Some(quote())).with_retcodes(&[RETCODE_DONE, 10006]);
        gateway.positions = vec![
            position(1, Side::Buy, 0.01),
            position(2, Side::Sell, 0.02),
            position(3, Side::Buy, 0.03),
        ];
        let config = trading_config();
        let manager = OrderManager::new(&gateway, &config);

        let results = manager.close_all("EURUSD").await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(AgentError::VenueRejected { code: 10006, .. })
        ));
        assert!(results[2].is_ok());

        let submitted = gateway.submitted();
        assert_eq!(submitted.len(), 3);
        for (request, source) in submitted.iter().zip(&gateway.positions) {
            assert_eq!(request.side, source.side.opposite());
            assert_eq!(request.volume, source.volume);
            assert_eq!(request.position, Some(source.id));
        }
    }

    #[tokio::test]
    async fn test_close_all_without_positions() {
        let gateway = FakeGateway::new(Some(quote()));
        let config = trading_config();
        let manager = OrderManager::new(&gateway, &config);

        assert!(manager.close_all("EURUSD").await.is_empty());
        assert!(gateway.submitted().is_empty());
    }
}
