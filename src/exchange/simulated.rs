use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::config::ExecutionMode;
use crate::error::BotError;
use crate::exchange::{MarketOrder, OrderConfirmation, OrderExecution};

/// Fills every order immediately at its reference price. Used for dry runs
/// and backtests.
#[derive(Debug, Default)]
pub struct SimulatedExecution {
    next_id: AtomicU64,
    quiet: bool,
}

impl SimulatedExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// No per-fill logging; backtests replay thousands of bars.
    pub fn quiet() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            quiet: true,
        }
    }

    pub fn filled(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderExecution for SimulatedExecution {
    async fn submit_market_order(&self, order: &MarketOrder) -> Result<OrderConfirmation, BotError> {
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return Err(BotError::order(
                &order.symbol,
                order.side,
                format!("invalid quantity {}", order.quantity),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.quiet {
            info!(
                "DRY RUN: {} {:.4} {} at ${:.6}",
                order.side.as_binance(),
                order.quantity,
                order.symbol,
                order.reference_price
            );
        }

        Ok(OrderConfirmation {
            order_id: format!("sim-{}", id),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            fill_price: order.reference_price,
        })
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    fn order(quantity: f64) -> MarketOrder {
        MarketOrder {
            symbol: "DOGE/USDT".to_string(),
            side: Side::Buy,
            quantity,
            reference_price: 0.25,
            quantity_decimals: 0,
        }
    }

    #[tokio::test]
    async fn fills_at_reference_price() {
        let sim = SimulatedExecution::new();
        let conf = sim.submit_market_order(&order(400.0)).await.unwrap();
        assert_eq!(conf.fill_price, 0.25);
        assert_eq!(conf.quantity, 400.0);
        assert_eq!(conf.order_id, "sim-1");
        let second = sim.submit_market_order(&order(1.0)).await.unwrap();
        assert_eq!(second.order_id, "sim-2");
        assert_eq!(sim.filled(), 2);
    }

    #[tokio::test]
    async fn fills_fractional_quantity_unrounded() {
        let sim = SimulatedExecution::quiet();
        let conf = sim.submit_market_order(&order(0.4)).await.unwrap();
        assert_eq!(conf.quantity, 0.4);
    }

    #[tokio::test]
    async fn rejects_zero_quantity() {
        let sim = SimulatedExecution::quiet();
        let err = sim.submit_market_order(&order(0.0)).await.unwrap_err();
        assert!(matches!(err, BotError::OrderSubmission { .. }));
        assert_eq!(sim.filled(), 0);
    }
}
