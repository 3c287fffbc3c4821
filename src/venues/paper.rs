//! Paper-mode simulator: wraps a real venue adapter for market data
//! (listing, quoting) but replaces every order-side call with a
//! virtual-wallet simulation — full immediate fill at the requested
//! limit price, no slippage, venue-A taker fee applied. Implemented as
//! its own `VenueAdapter` so the executor's control flow never branches
//! on mode.

use crate::errors::ArbError;
use crate::model::{NormalizedMarket, Quote, Side, Venue};
use crate::venues::{OrderPlacement, VenueAdapter};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Wraps a real adapter for `list_markets`/`get_quote`, simulates the
/// rest against a virtual wallet seeded at `starting_balance`
/// (`paper_starting_balance`, default `$10,000`).
pub struct PaperVenueAdapter {
    inner: Arc<dyn VenueAdapter>,
    venue: Venue,
    taker_fee_pct: Decimal,
    wallet_usd: Mutex<Decimal>,
}

impl PaperVenueAdapter {
    pub fn new(inner: Arc<dyn VenueAdapter>, venue: Venue, starting_balance: Decimal, taker_fee_pct: Decimal) -> Self {
        Self { inner, venue, taker_fee_pct, wallet_usd: Mutex::new(starting_balance) }
    }

    /// Fee debited on this simulated fill, per venue and face value.
    /// Only venue A charges a taker fee.
    fn taker_fee(&self, units: i64) -> Decimal {
        match self.venue {
            Venue::A => Decimal::from(units) * self.taker_fee_pct,
            Venue::B => Decimal::ZERO,
        }
    }
}

#[async_trait]
impl VenueAdapter for PaperVenueAdapter {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
        self.inner.list_markets().await
    }

    async fn get_quote(&self, market: &NormalizedMarket) -> Result<Quote, ArbError> {
        self.inner.get_quote(market).await
    }

    /// Assumes full immediate fill at `limit_price_cents` (no slippage),
    /// debits the virtual wallet for cost plus fee.
    async fn place_taker(&self, _market: &NormalizedMarket, _side: Side, units: i64, limit_price_cents: Decimal) -> Result<OrderPlacement, ArbError> {
        let cost = limit_price_cents / Decimal::from(100) * Decimal::from(units);
        let fee = self.taker_fee(units);

        let mut wallet = self.wallet_usd.lock().await;
        let need = cost + fee;
        if *wallet < need {
            return Err(ArbError::BalanceLow { venue: self.venue, have: *wallet, need });
        }
        *wallet -= need;

        info!(venue = %self.venue, units, price_cents = %limit_price_cents, fee_usd = %fee, "[paper] simulated fill");
        Ok(OrderPlacement { order_id: format!("paper-{}", Uuid::new_v4()), filled_units: units, avg_price_cents: limit_price_cents })
    }

    async fn cancel(&self, _order_id: &str) -> Result<(), ArbError> {
        Ok(())
    }

    async fn get_fill(&self, _order_id: &str) -> Result<i64, ArbError> {
        // Paper fills are always full and synchronous at `place_taker` time;
        // a requested-units value is never known here, so callers must not
        // rely on `get_fill` after a paper `place_taker` — its return
        // already carries the final fill count.
        Err(ArbError::VenueProtocol { venue: self.venue, message: "paper mode fills synchronously at placement".to_string() })
    }

    async fn get_balance(&self) -> Result<Decimal, ArbError> {
        Ok(*self.wallet_usd.lock().await)
    }

    /// Unwind sell: `Quote` only carries ask-side prices, so the best
    /// bid isn't directly observable here. Credits the wallet at the
    /// ask minus the taker fee haircut, a conservative stand-in for
    /// crossing the spread, assumed filled in full.
    async fn sell_at_bid(&self, market: &NormalizedMarket, side: Side, units: i64) -> Result<OrderPlacement, ArbError> {
        let quote = self.inner.get_quote(market).await?;
        let ask = match side {
            Side::Yes => quote.yes_ask_cents,
            Side::No => quote.no_ask_cents,
        }
        .unwrap_or(Decimal::ZERO);

        let gross = ask / Decimal::from(100) * Decimal::from(units);
        let fee = self.taker_fee(units);
        let proceeds = (gross - fee).max(Decimal::ZERO);
        *self.wallet_usd.lock().await += proceeds;

        info!(venue = %self.venue, units, price_cents = %ask, fee_usd = %fee, "[paper] simulated unwind sell");
        Ok(OrderPlacement { order_id: format!("paper-unwind-{}", Uuid::new_v4()), filled_units: units, avg_price_cents: ask })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetClass, SportSubtype};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct StubAdapter;

    #[async_trait]
    impl VenueAdapter for StubAdapter {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
            Ok(vec![])
        }
        async fn get_quote(&self, _market: &NormalizedMarket) -> Result<Quote, ArbError> {
            Ok(Quote { yes_ask_cents: Some(Decimal::from(40)), no_ask_cents: Some(Decimal::from(55)), yes_depth: 10, no_depth: 10, yes_ladder: vec![], no_ladder: vec![] })
        }
        async fn place_taker(&self, _m: &NormalizedMarket, _s: Side, _u: i64, _p: Decimal) -> Result<OrderPlacement, ArbError> {
            unreachable!()
        }
        async fn cancel(&self, _order_id: &str) -> Result<(), ArbError> {
            Ok(())
        }
        async fn get_fill(&self, _order_id: &str) -> Result<i64, ArbError> {
            Ok(0)
        }
        async fn get_balance(&self) -> Result<Decimal, ArbError> {
            Ok(Decimal::ZERO)
        }
        async fn sell_at_bid(&self, _m: &NormalizedMarket, _s: Side, _u: i64) -> Result<OrderPlacement, ArbError> {
            unreachable!()
        }
    }

    fn sample_market() -> NormalizedMarket {
        NormalizedMarket {
            venue: Venue::A,
            platform_id: "x".into(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".into()),
            team: Some("g2".into()),
            opponent: Some("navi".into()),
            sport_subtype: Some(SportSubtype::Series),
            map_number: None,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: Utc::now(),
            yes_token: "y".into(),
            no_token: "n".into(),
            raw_title: "x".into(),
        }
    }

    #[tokio::test]
    async fn starts_with_ten_thousand_and_debits_on_fill() {
        let paper = PaperVenueAdapter::new(Arc::new(StubAdapter), Venue::A, dec!(10000), dec!(0.0175));
        assert_eq!(paper.get_balance().await.unwrap(), dec!(10000));

        let market = sample_market();
        paper.place_taker(&market, Side::Yes, 100, Decimal::from(40)).await.unwrap();
        // cost = 100 * 0.40 = $40, fee = 100 * 0.0175 = $1.75
        assert_eq!(paper.get_balance().await.unwrap(), dec!(10000) - dec!(40) - dec!(1.75));
    }

    #[tokio::test]
    async fn venue_b_paper_has_no_taker_fee() {
        let paper = PaperVenueAdapter::new(Arc::new(StubAdapter), Venue::B, dec!(10000), dec!(0.0175));
        let market = sample_market();
        paper.place_taker(&market, Side::No, 50, Decimal::from(55)).await.unwrap();
        assert_eq!(paper.get_balance().await.unwrap(), dec!(10000) - dec!(27.5));
    }

    #[tokio::test]
    async fn rejects_when_balance_too_low() {
        let paper = PaperVenueAdapter::new(Arc::new(StubAdapter), Venue::A, dec!(10000), dec!(0.0175));
        let market = sample_market();
        let err = paper.place_taker(&market, Side::Yes, 1_000_000, Decimal::from(99)).await.unwrap_err();
        assert!(matches!(err, ArbError::BalanceLow { .. }));
    }
}
