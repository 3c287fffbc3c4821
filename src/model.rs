//! The data model shared by every stage of the pipeline.
//!
//! These are plain value types: immutable once constructed, structural
//! equality where it matters, no behavior tied to I/O.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two independent exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    A,
    B,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::A => write!(f, "venue-a"),
            Venue::B => write!(f, "venue-b"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Sports,
    Crypto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SportSubtype {
    Map,
    Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Above,
    Below,
}

/// Either YES or NO side of a binary contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// One row per tradable binary contract on one venue.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMarket {
    pub venue: Venue,
    pub platform_id: String,
    pub asset_class: AssetClass,
    pub sport: Option<String>,
    pub team: Option<String>,
    pub opponent: Option<String>,
    pub sport_subtype: Option<SportSubtype>,
    pub map_number: Option<i32>,
    pub crypto_asset: Option<String>,
    pub direction: Option<Direction>,
    pub threshold: Option<Decimal>,
    pub resolution_dt: DateTime<Utc>,
    pub yes_token: String,
    pub no_token: String,
    pub raw_title: String,
}

impl NormalizedMarket {
    /// A stable key identifying this market regardless of venue.
    pub fn pair_key(&self) -> (Venue, &str) {
        (self.venue, self.platform_id.as_str())
    }
}

/// Exclusive pairing of one venue-A market to one venue-B market.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub a: NormalizedMarket,
    pub b: NormalizedMarket,
}

impl MatchedPair {
    /// Stable identifier used for cooldown bookkeeping and persistence
    /// (`opportunities.pair_key` / `trades` join key).
    pub fn pair_key(&self) -> String {
        format!("{}::{}", self.a.platform_id, self.b.platform_id)
    }
}

/// A single price level in an ask ladder, best-first once canonicalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LadderLevel {
    pub price_cents: Decimal,
    pub size: i64,
}

/// `{yes_ask_cents, no_ask_cents, yes_depth, no_depth, yes_ladder,
/// no_ladder}` for one venue on one pair. `None` prices mean the side
/// is empty and must be treated as infinite cost.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Quote {
    pub yes_ask_cents: Option<Decimal>,
    pub no_ask_cents: Option<Decimal>,
    pub yes_depth: i64,
    pub no_depth: i64,
    /// Best-first.
    pub yes_ladder: Vec<LadderLevel>,
    /// Best-first.
    pub no_ladder: Vec<LadderLevel>,
}

/// Both venues' quotes for one matched pair, as produced by the fan-out.
#[derive(Debug, Clone)]
pub struct PairQuotes {
    pub pair: MatchedPair,
    pub a: Option<Quote>,
    pub b: Option<Quote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Buy YES on A + NO on B.
    A,
    /// Buy NO on A + YES on B.
    B,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::A => write!(f, "A"),
            StrategyKind::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    UltraHigh,
    High,
    Mid,
    Low,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::UltraHigh => "ultra_high",
            Tier::High => "high",
            Tier::Mid => "mid",
            Tier::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Derived opportunity; not persisted through the matcher, only through
/// the executor's own tick-level write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub pair_key: String,
    pub strategy: StrategyKind,
    pub k_cost: Decimal,
    pub p_cost: Decimal,
    pub spread_cents: Decimal,
    pub tier: Tier,
    pub tradeable_units: i64,
    pub max_locked_profit_usd: Decimal,
    pub detected_at: DateTime<Utc>,
    pub hours_to_close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    SkippedLowBalance,
    SkippedError,
    SkippedNoFill,
    Filled,
    Unwound,
    PartialStuck,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeStatus::SkippedLowBalance => "skipped_low_balance",
            TradeStatus::SkippedError => "skipped_error",
            TradeStatus::SkippedNoFill => "skipped_no_fill",
            TradeStatus::Filled => "filled",
            TradeStatus::Unwound => "unwound",
            TradeStatus::PartialStuck => "partial_stuck",
        };
        write!(f, "{s}")
    }
}

/// Persisted record of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub opp_fk: Option<i64>,
    pub traded_at: DateTime<Utc>,
    pub requested_units: i64,
    pub k_filled: i64,
    pub p_filled: i64,
    pub k_price: Decimal,
    pub p_price: Decimal,
    pub k_cost_usd: Decimal,
    pub p_cost_usd: Decimal,
    pub total_cost_usd: Decimal,
    pub locked_profit_usd: Decimal,
    pub k_fee_usd: Decimal,
    pub net_profit_usd: Decimal,
    pub k_order_id: Option<String>,
    pub p_order_id: Option<String>,
    pub status: TradeStatus,
    pub reason: Option<String>,
    pub p_balance_before: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_stable_and_order_sensitive() {
        let now = Utc::now();
        let a = NormalizedMarket {
            venue: Venue::A,
            platform_id: "a1".into(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".into()),
            team: Some("g2".into()),
            opponent: Some("navi".into()),
            sport_subtype: Some(SportSubtype::Series),
            map_number: None,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: now,
            yes_token: "y".into(),
            no_token: "n".into(),
            raw_title: "G2 vs Navi".into(),
        };
        let mut b = a.clone();
        b.venue = Venue::B;
        b.platform_id = "b1".into();
        let pair = MatchedPair { a, b };
        assert_eq!(pair.pair_key(), "a1::b1");
    }
}
