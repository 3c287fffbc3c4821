//! Bounded-concurrency quote fan-out: for every matched pair, fetch both
//! venues' books in parallel, capped at `FETCH_WORKERS` concurrent
//! calls, each under its own per-call deadline.

use crate::model::{MatchedPair, PairQuotes, Quote};
use crate::venues::VenueAdapter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::warn;

/// Fetch both venues' quotes for every pair in `pairs`, at most
/// `fetch_workers` calls in flight at once, each call bounded by
/// `deadline`. A side that errors or misses its deadline is `None`
/// rather than failing the whole tick.
pub async fn fetch_all(
    pairs: &[MatchedPair],
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    fetch_workers: usize,
    deadline: Duration,
) -> Vec<PairQuotes> {
    let semaphore = Arc::new(Semaphore::new(fetch_workers));
    let mut tasks = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let pair = pair.clone();
        let venue_a = venue_a.clone();
        let venue_b = venue_b.clone();
        let semaphore = semaphore.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");

            let (a, b) = tokio::join!(
                quote_with_deadline(venue_a.as_ref(), &pair.a, deadline),
                quote_with_deadline(venue_b.as_ref(), &pair.b, deadline),
            );

            PairQuotes { pair, a, b }
        }));
    }

    let mut out = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(pair_quotes) => out.push(pair_quotes),
            Err(e) => warn!(error = %e, "quote fetch task panicked"),
        }
    }
    out
}

async fn quote_with_deadline(adapter: &dyn VenueAdapter, market: &crate::model::NormalizedMarket, deadline: Duration) -> Option<Quote> {
    match timeout(deadline, adapter.get_quote(market)).await {
        Ok(Ok(quote)) => Some(quote),
        Ok(Err(e)) => {
            warn!(venue = adapter.name(), platform_id = %market.platform_id, error = %e, "quote fetch failed");
            None
        }
        Err(_) => {
            warn!(venue = adapter.name(), platform_id = %market.platform_id, deadline_ms = deadline.as_millis() as u64, "quote fetch timed out");
            None
        }
    }
}

/// A tick skips a pair entirely unless both sides produced a quote.
pub fn complete_quotes(all: Vec<PairQuotes>) -> Vec<(MatchedPair, Quote, Quote)> {
    all.into_iter()
        .filter_map(|pq| match (pq.a, pq.b) {
            (Some(a), Some(b)) => Some((pq.pair, a, b)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ArbError;
    use crate::model::{AssetClass, NormalizedMarket, Side, SportSubtype, Venue};
    use crate::venues::OrderPlacement;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;

    struct AlwaysOk;
    struct AlwaysErr;
    struct AlwaysSlow;

    #[async_trait]
    impl VenueAdapter for AlwaysOk {
        fn name(&self) -> &'static str {
            "ok"
        }
        async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
            Ok(vec![])
        }
        async fn get_quote(&self, _m: &NormalizedMarket) -> Result<Quote, ArbError> {
            Ok(Quote { yes_ask_cents: Some(Decimal::from(40)), no_ask_cents: Some(Decimal::from(55)), yes_depth: 100, no_depth: 100, yes_ladder: vec![], no_ladder: vec![] })
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

    #[async_trait]
    impl VenueAdapter for AlwaysErr {
        fn name(&self) -> &'static str {
            "err"
        }
        async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
            Ok(vec![])
        }
        async fn get_quote(&self, _m: &NormalizedMarket) -> Result<Quote, ArbError> {
            Err(ArbError::VenueProtocol { venue: Venue::B, message: "boom".into() })
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

    #[async_trait]
    impl VenueAdapter for AlwaysSlow {
        fn name(&self) -> &'static str {
            "slow"
        }
        async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
            Ok(vec![])
        }
        async fn get_quote(&self, _m: &NormalizedMarket) -> Result<Quote, ArbError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            unreachable!()
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

    fn market(venue: Venue, id: &str) -> NormalizedMarket {
        NormalizedMarket {
            venue,
            platform_id: id.into(),
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
            raw_title: id.into(),
        }
    }

    #[tokio::test]
    async fn both_sides_ok_produces_complete_quote() {
        let pairs = vec![MatchedPair { a: market(Venue::A, "a1"), b: market(Venue::B, "b1") }];
        let results = fetch_all(&pairs, Arc::new(AlwaysOk), Arc::new(AlwaysOk), 5, Duration::from_millis(200)).await;
        let complete = complete_quotes(results);
        assert_eq!(complete.len(), 1);
    }

    #[tokio::test]
    async fn one_side_erroring_drops_the_pair() {
        let pairs = vec![MatchedPair { a: market(Venue::A, "a1"), b: market(Venue::B, "b1") }];
        let results = fetch_all(&pairs, Arc::new(AlwaysOk), Arc::new(AlwaysErr), 5, Duration::from_millis(200)).await;
        assert!(complete_quotes(results).is_empty());
    }

    #[tokio::test]
    async fn a_timeout_drops_the_pair() {
        let pairs = vec![MatchedPair { a: market(Venue::A, "a1"), b: market(Venue::B, "b1") }];
        let results = fetch_all(&pairs, Arc::new(AlwaysSlow), Arc::new(AlwaysOk), 5, Duration::from_millis(50)).await;
        assert!(complete_quotes(results).is_empty());
    }
}
