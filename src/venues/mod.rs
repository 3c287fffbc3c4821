//! The venue adapter capability trait plus its two concrete
//! implementations and the paper simulator: one trait, several
//! implementations, held behind `Arc<dyn VenueAdapter>` so the executor
//! and orchestrator never know which venue or mode they are talking to.

pub mod paper;
pub mod venue_a;
pub mod venue_b;

use crate::errors::ArbError;
use crate::model::{NormalizedMarket, Quote, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Result of placing a taker order: venue order id plus however much
/// filled immediately (IOC/FOK orders never rest).
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    pub order_id: String,
    pub filled_units: i64,
    pub avg_price_cents: Decimal,
}

/// The capability set every venue exposes: listing, quoting, taking,
/// canceling, checking fills/balance, and unwinding via a bid-side
/// sell.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError>;

    /// Takes the full market, not just its id: venue A quotes a single
    /// ticker for both sides, while venue B quotes `yes_token` and
    /// `no_token` as two independent books that must be merged.
    async fn get_quote(&self, market: &NormalizedMarket) -> Result<Quote, ArbError>;

    async fn place_taker(
        &self,
        market: &NormalizedMarket,
        side: Side,
        units: i64,
        limit_price_cents: Decimal,
    ) -> Result<OrderPlacement, ArbError>;

    async fn cancel(&self, order_id: &str) -> Result<(), ArbError>;

    async fn get_fill(&self, order_id: &str) -> Result<i64, ArbError>;

    async fn get_balance(&self) -> Result<Decimal, ArbError>;

    /// Unwind path: close an already-filled leg at the current best bid.
    async fn sell_at_bid(&self, market: &NormalizedMarket, side: Side, units: i64) -> Result<OrderPlacement, ArbError>;
}
