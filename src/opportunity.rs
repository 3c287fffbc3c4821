//! Opportunity finder: given both venues' quotes for a matched pair,
//! compute Strategy A and Strategy B spreads, gate on `MIN_SPREAD_CENTS`,
//! and tier the survivors.

use crate::model::{MatchedPair, Opportunity, Quote, StrategyKind, Tier};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn tier_for(spread_cents: Decimal) -> Tier {
    if spread_cents >= dec!(8.0) {
        Tier::UltraHigh
    } else if spread_cents >= dec!(5.0) {
        Tier::High
    } else if spread_cents >= dec!(4.0) {
        Tier::Mid
    } else {
        Tier::Low
    }
}

/// Strategy A: buy YES on venue A + NO on venue B.
/// Strategy B: buy NO on venue A + YES on venue B.
/// A strategy only becomes a candidate when both legs have a non-null
/// ask and the spread clears `min_spread_cents`:
/// `k_cost + p_cost + MIN_SPREAD_CENTS ≤ 100`.
pub fn find_opportunities(pair: &MatchedPair, a: &Quote, b: &Quote, min_spread_cents: Decimal) -> Vec<Opportunity> {
    let pair_key = pair.pair_key();
    let hours_to_close = (pair.b.resolution_dt - Utc::now()).num_seconds() as f64 / 3600.0;
    let mut out = Vec::with_capacity(2);

    if let (Some(k_cost), Some(p_cost)) = (a.yes_ask_cents, b.no_ask_cents) {
        if let Some(opp) = candidate(&pair_key, StrategyKind::A, k_cost, p_cost, a.yes_depth, b.no_depth, min_spread_cents, hours_to_close) {
            out.push(opp);
        }
    }
    if let (Some(k_cost), Some(p_cost)) = (a.no_ask_cents, b.yes_ask_cents) {
        if let Some(opp) = candidate(&pair_key, StrategyKind::B, k_cost, p_cost, a.no_depth, b.yes_depth, min_spread_cents, hours_to_close) {
            out.push(opp);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn candidate(
    pair_key: &str,
    strategy: StrategyKind,
    k_cost: Decimal,
    p_cost: Decimal,
    a_depth: i64,
    b_depth: i64,
    min_spread_cents: Decimal,
    hours_to_close: f64,
) -> Option<Opportunity> {
    let spread_cents = Decimal::from(100) - (k_cost + p_cost);
    if spread_cents < min_spread_cents {
        return None;
    }

    let tradeable_units = a_depth.min(b_depth);
    let max_locked_profit_usd = Decimal::from(tradeable_units) * spread_cents / Decimal::from(100);

    Some(Opportunity {
        pair_key: pair_key.to_string(),
        strategy,
        k_cost,
        p_cost,
        spread_cents,
        tier: tier_for(spread_cents),
        tradeable_units,
        max_locked_profit_usd,
        detected_at: Utc::now(),
        hours_to_close,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetClass, NormalizedMarket, SportSubtype, Venue};
    use chrono::Duration;

    fn market(venue: Venue, id: &str, close_in_hours: i64) -> NormalizedMarket {
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
            resolution_dt: Utc::now() + Duration::hours(close_in_hours),
            yes_token: "y".into(),
            no_token: "n".into(),
            raw_title: id.into(),
        }
    }

    #[test]
    fn exact_arb_example_from_spec() {
        let pair = MatchedPair { a: market(Venue::A, "a1", 4), b: market(Venue::B, "b1", 4) };
        let a = Quote { yes_ask_cents: Some(dec!(48)), no_ask_cents: Some(dec!(60)), yes_depth: 100, no_depth: 100, yes_ladder: vec![], no_ladder: vec![] };
        let b = Quote { yes_ask_cents: Some(dec!(60)), no_ask_cents: Some(dec!(49)), yes_depth: 100, no_depth: 100, yes_ladder: vec![], no_ladder: vec![] };

        let opps = find_opportunities(&pair, &a, &b, dec!(3.3));
        let strat_a = opps.iter().find(|o| o.strategy == StrategyKind::A).unwrap();
        assert_eq!(strat_a.spread_cents, dec!(3));
        assert_eq!(strat_a.tier, Tier::Low);
        assert_eq!(strat_a.tradeable_units, 100);
        assert_eq!(strat_a.max_locked_profit_usd, dec!(3));
    }

    #[test]
    fn below_min_spread_is_not_a_candidate() {
        let pair = MatchedPair { a: market(Venue::A, "a1", 4), b: market(Venue::B, "b1", 4) };
        let a = Quote { yes_ask_cents: Some(dec!(50)), no_ask_cents: Some(dec!(60)), yes_depth: 10, no_depth: 10, yes_ladder: vec![], no_ladder: vec![] };
        let b = Quote { yes_ask_cents: Some(dec!(60)), no_ask_cents: Some(dec!(49)), yes_depth: 10, no_depth: 10, yes_ladder: vec![], no_ladder: vec![] };
        let opps = find_opportunities(&pair, &a, &b, dec!(3.3));
        assert!(opps.iter().all(|o| o.strategy != StrategyKind::A));
    }

    #[test]
    fn null_ask_on_either_side_yields_no_candidate_for_that_strategy() {
        let pair = MatchedPair { a: market(Venue::A, "a1", 4), b: market(Venue::B, "b1", 4) };
        let a = Quote { yes_ask_cents: None, no_ask_cents: Some(dec!(40)), yes_depth: 0, no_depth: 10, yes_ladder: vec![], no_ladder: vec![] };
        let b = Quote { yes_ask_cents: Some(dec!(40)), no_ask_cents: Some(dec!(40)), yes_depth: 10, no_depth: 10, yes_ladder: vec![], no_ladder: vec![] };
        let opps = find_opportunities(&pair, &a, &b, dec!(3.3));
        assert!(opps.iter().all(|o| o.strategy != StrategyKind::A));
    }

    #[test]
    fn tiering_boundaries() {
        assert_eq!(tier_for(dec!(8.0)), Tier::UltraHigh);
        assert_eq!(tier_for(dec!(7.99)), Tier::High);
        assert_eq!(tier_for(dec!(5.0)), Tier::High);
        assert_eq!(tier_for(dec!(4.99)), Tier::Mid);
        assert_eq!(tier_for(dec!(4.0)), Tier::Mid);
        assert_eq!(tier_for(dec!(3.99)), Tier::Low);
    }

    #[test]
    fn both_strategies_can_fire_independently() {
        let pair = MatchedPair { a: market(Venue::A, "a1", 4), b: market(Venue::B, "b1", 4) };
        let a = Quote { yes_ask_cents: Some(dec!(40)), no_ask_cents: Some(dec!(40)), yes_depth: 50, no_depth: 60, yes_ladder: vec![], no_ladder: vec![] };
        let b = Quote { yes_ask_cents: Some(dec!(40)), no_ask_cents: Some(dec!(40)), yes_depth: 70, no_depth: 80, yes_ladder: vec![], no_ladder: vec![] };
        let opps = find_opportunities(&pair, &a, &b, dec!(3.3));
        assert_eq!(opps.len(), 2);
    }
}
