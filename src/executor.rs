//! Two-leg execution: size the trade, walk the venue-B ladder if the
//! minimum order floor isn't met, place leg 1 (venue A, IOC) then leg 2
//! (venue B, FOK) in strict sequence, unwind on leg-2 failure, and track
//! a per-pair cooldown shared across both strategies.

use crate::config::Config;
use crate::model::{LadderLevel, MatchedPair, Opportunity, Side, StrategyKind, Trade, TradeStatus};
use crate::venues::VenueAdapter;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Indexed by `MatchedPair::pair_key()`, shared across Strategy A and B
/// (Open Question (b)): the cycle number at which the pair becomes
/// eligible again.
#[derive(Default)]
pub struct CooldownTable {
    until_cycle: Mutex<HashMap<String, i64>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_cooling_down(&self, pair_key: &str, current_cycle: i64) -> bool {
        self.until_cycle.lock().await.get(pair_key).is_some_and(|&until| current_cycle < until)
    }

    async fn arm(&self, pair_key: &str, current_cycle: i64, cycles: i64, doubled: bool) {
        let applied = if doubled { cycles * 2 } else { cycles };
        let until = current_cycle + applied;
        let mut table = self.until_cycle.lock().await;
        let entry = table.entry(pair_key.to_string()).or_insert(until);
        if until > *entry {
            *entry = until;
        }
    }
}

/// Result of a book-walk: the (possibly enlarged) unit count, the
/// size-weighted blended price across every level consumed, and the
/// cumulative spend in cents.
struct WalkedFill {
    units: i64,
    blended_price_cents: Decimal,
}

/// Walk `ladder` (best-first) collecting shares at successively worse
/// prices until cumulative spend reaches `min_cents` or the ladder is
/// exhausted. `initial_units` is assumed already filled at the best
/// level (it was sized against that level's depth).
fn book_walk(ladder: &[LadderLevel], initial_units: i64, min_cents: Decimal) -> Option<WalkedFill> {
    let best = ladder.first()?;
    let mut units = initial_units;
    let mut spend_cents = Decimal::from(initial_units) * best.price_cents;

    let mut idx = 1;
    while spend_cents < min_cents && idx < ladder.len() {
        let level = ladder[idx];
        let remaining = min_cents - spend_cents;
        let needed = (remaining / level.price_cents).ceil().to_string().parse::<i64>().unwrap_or(level.size);
        let take = needed.clamp(1, level.size);
        units += take;
        spend_cents += Decimal::from(take) * level.price_cents;
        idx += 1;
    }

    if spend_cents < min_cents {
        return None;
    }
    Some(WalkedFill { units, blended_price_cents: spend_cents / Decimal::from(units) })
}

/// Resolve which side of each venue a strategy trades: Strategy A buys
/// YES on venue A and NO on venue B; Strategy B is the mirror.
fn legs_for(strategy: StrategyKind) -> (Side, Side) {
    match strategy {
        StrategyKind::A => (Side::Yes, Side::No),
        StrategyKind::B => (Side::No, Side::Yes),
    }
}

pub struct Executor {
    config: Config,
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    cooldowns: Arc<CooldownTable>,
    /// Set on an `AuthError` from either venue and never cleared at
    /// runtime: pauses the executor for that venue until restart.
    venue_a_paused: AtomicBool,
    venue_b_paused: AtomicBool,
}

impl Executor {
    pub fn new(config: Config, venue_a: Arc<dyn VenueAdapter>, venue_b: Arc<dyn VenueAdapter>, cooldowns: Arc<CooldownTable>) -> Self {
        Self { config, venue_a, venue_b, cooldowns, venue_a_paused: AtomicBool::new(false), venue_b_paused: AtomicBool::new(false) }
    }

    pub fn cooldowns(&self) -> Arc<CooldownTable> {
        self.cooldowns.clone()
    }

    /// Run the full eight-step execution order for one opportunity and
    /// return the persisted-shape `Trade` record. Always arms the pair's
    /// cooldown before returning, per the terminal-status rule.
    pub async fn execute(&self, pair: &MatchedPair, opp: &Opportunity, b_ladder: &[LadderLevel], current_cycle: i64) -> Trade {
        let (side_a, side_b) = legs_for(opp.strategy);
        let mut k_price = opp.k_cost;
        let mut p_price = opp.p_cost;

        if self.venue_a_paused.load(Ordering::SeqCst) || self.venue_b_paused.load(Ordering::SeqCst) {
            return self
                .terminal(pair, opp, 0, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedError, Some("executor paused after an auth failure, needs restart".to_string()), Decimal::ZERO, current_cycle)
                .await;
        }

        let p_balance_before = match self.venue_b.get_balance().await {
            Ok(bal) => bal,
            Err(e) => {
                self.note_auth_failure(&e);
                return self.terminal(pair, opp, 0, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedError, Some(e.to_string()), Decimal::ZERO, current_cycle).await;
            }
        };

        if p_balance_before < self.config.exec_poly_min_order_usd {
            return self
                .terminal(pair, opp, 0, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedLowBalance, Some("venue-b balance below EXEC_POLY_MIN_ORDER_USD".to_string()), p_balance_before, current_cycle)
                .await;
        }

        let mut units = self.sized_units(opp);
        if units <= 0 {
            return self
                .terminal(pair, opp, units, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedError, Some("sizing produced zero units".to_string()), p_balance_before, current_cycle)
                .await;
        }

        let min_cents = self.config.exec_poly_min_order_usd * Decimal::from(100);
        if Decimal::from(units) * p_price < min_cents {
            match book_walk(b_ladder, units, min_cents) {
                Some(walked) => {
                    let spread_blended = Decimal::from(100) - (k_price + walked.blended_price_cents);
                    if spread_blended < self.config.min_spread_cents {
                        return self
                            .terminal(pair, opp, units, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedError, Some("blended spread fell below MIN_SPREAD_CENTS".to_string()), p_balance_before, current_cycle)
                            .await;
                    }
                    units = walked.units;
                    p_price = walked.blended_price_cents;
                }
                None => {
                    return self
                        .terminal(pair, opp, units, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedError, Some("venue-b ladder exhausted below EXEC_POLY_MIN_ORDER_USD".to_string()), p_balance_before, current_cycle)
                        .await;
                }
            }
        }

        let leg1 = match self.venue_a.place_taker(&pair.a, side_a, units, k_price).await {
            Ok(placement) => placement,
            Err(e) => {
                self.note_auth_failure(&e);
                return self.terminal(pair, opp, units, 0, 0, k_price, p_price, None, None, TradeStatus::SkippedError, Some(e.to_string()), p_balance_before, current_cycle).await;
            }
        };

        sleep(self.config.leg1_settle_delay).await;

        let filled = match self.venue_a.get_fill(&leg1.order_id).await {
            Ok(f) => f,
            Err(e) => {
                warn!(pair_key = %pair.pair_key(), error = %e, "leg-1 fill check failed, assuming placement's own fill count");
                leg1.filled_units
            }
        };

        if filled == 0 {
            return self
                .terminal(pair, opp, units, 0, 0, k_price, p_price, Some(leg1.order_id), None, TradeStatus::SkippedNoFill, None, p_balance_before, current_cycle)
                .await;
        }

        if filled < units {
            if let Err(e) = self.venue_a.cancel(&leg1.order_id).await {
                warn!(pair_key = %pair.pair_key(), error = %e, "failed to cancel resting venue-a remainder");
            }
            units = filled;
        }
        k_price = leg1.avg_price_cents;

        let leg2 = self.venue_b.place_taker(&pair.b, side_b, units, p_price).await;

        match leg2 {
            Ok(placement) if placement.filled_units == units => {
                self.terminal(pair, opp, units, filled, placement.filled_units, k_price, placement.avg_price_cents, Some(leg1.order_id), Some(placement.order_id), TradeStatus::Filled, None, p_balance_before, current_cycle)
                    .await
            }
            Ok(placement) => {
                warn!(pair_key = %pair.pair_key(), requested = units, filled = placement.filled_units, "leg-2 FOK partially filled, unwinding");
                self.unwind(pair, opp, units, filled, placement.filled_units, k_price, placement.avg_price_cents, leg1.order_id, Some(placement.order_id), p_balance_before, current_cycle).await
            }
            Err(e) => {
                error!(pair_key = %pair.pair_key(), error = %e, "leg-2 placement failed, unwinding");
                self.note_auth_failure(&e);
                self.unwind(pair, opp, units, filled, 0, k_price, p_price, leg1.order_id, None, p_balance_before, current_cycle).await
            }
        }
    }

    /// Latches the per-venue pause flag on a 401/403-class failure.
    fn note_auth_failure(&self, e: &crate::errors::ArbError) {
        if !e.is_fatal_for_venue() {
            return;
        }
        match e.venue() {
            Some(crate::model::Venue::A) => {
                self.venue_a_paused.store(true, Ordering::SeqCst);
                error!("venue-a auth failed, executor paused for venue-a until restart");
            }
            Some(crate::model::Venue::B) => {
                self.venue_b_paused.store(true, Ordering::SeqCst);
                error!("venue-b auth failed, executor paused for venue-b until restart");
            }
            None => {}
        }
    }

    fn sized_units(&self, opp: &Opportunity) -> i64 {
        let by_budget = (self.config.exec_max_trade_usd * Decimal::from(100) / (opp.k_cost + opp.p_cost))
            .floor()
            .to_string()
            .parse::<i64>()
            .unwrap_or(0);
        by_budget.min(opp.tradeable_units).min(self.config.exec_max_units_per_map)
    }

    #[allow(clippy::too_many_arguments)]
    async fn unwind(
        &self,
        pair: &MatchedPair,
        opp: &Opportunity,
        requested_units: i64,
        k_filled: i64,
        p_filled: i64,
        k_price: Decimal,
        p_price: Decimal,
        k_order_id: String,
        p_order_id: Option<String>,
        p_balance_before: Decimal,
        current_cycle: i64,
    ) -> Trade {
        let (side_a, _) = legs_for(opp.strategy);

        for attempt in 1..=self.config.exec_unwind_max_attempts {
            sleep(self.config.exec_unwind_delay).await;
            match self.venue_a.sell_at_bid(&pair.a, side_a, k_filled).await {
                Ok(_sell) => {
                    info!(pair_key = %pair.pair_key(), attempt, "unwind succeeded");
                    return self
                        .terminal(pair, opp, requested_units, k_filled, p_filled, k_price, p_price, Some(k_order_id), p_order_id, TradeStatus::Unwound, None, p_balance_before, current_cycle)
                        .await;
                }
                Err(e) => {
                    warn!(pair_key = %pair.pair_key(), attempt, error = %e, "unwind attempt failed");
                }
            }
        }

        error!(pair_key = %pair.pair_key(), k_filled, "unwind exhausted all attempts, position stuck on venue a");
        self.terminal(
            pair,
            opp,
            requested_units,
            k_filled,
            0,
            k_price,
            p_price,
            Some(k_order_id),
            p_order_id,
            TradeStatus::PartialStuck,
            Some("unwind exhausted EXEC_UNWIND_MAX_ATTEMPTS".to_string()),
            p_balance_before,
            current_cycle,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn terminal(
        &self,
        pair: &MatchedPair,
        opp: &Opportunity,
        requested_units: i64,
        k_filled: i64,
        p_filled: i64,
        k_price: Decimal,
        p_price: Decimal,
        k_order_id: Option<String>,
        p_order_id: Option<String>,
        status: TradeStatus,
        reason: Option<String>,
        p_balance_before: Decimal,
        current_cycle: i64,
    ) -> Trade {
        let doubled = matches!(status, TradeStatus::Unwound | TradeStatus::PartialStuck);
        self.cooldowns.arm(&pair.pair_key(), current_cycle, self.config.exec_cooldown_cycles, doubled).await;

        if matches!(status, TradeStatus::PartialStuck) {
            error!(pair_key = %pair.pair_key(), strategy = %opp.strategy, "trade left partial_stuck, needs manual intervention");
        }

        let k_cost_usd = Decimal::from(k_filled) * k_price / Decimal::from(100);
        let p_cost_usd = Decimal::from(p_filled) * p_price / Decimal::from(100);
        let k_fee_usd = Decimal::from(k_filled) * self.config.venue_a_taker_fee_pct;
        let filled_units = k_filled.min(p_filled);
        let locked_profit_usd = if p_filled > 0 {
            Decimal::from(filled_units) * (Decimal::from(100) - (k_price + p_price)) / Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        Trade {
            opp_fk: None,
            traded_at: Utc::now(),
            requested_units,
            k_filled,
            p_filled,
            k_price,
            p_price,
            k_cost_usd,
            p_cost_usd,
            total_cost_usd: k_cost_usd + p_cost_usd,
            locked_profit_usd,
            k_fee_usd,
            net_profit_usd: locked_profit_usd - k_fee_usd,
            k_order_id,
            p_order_id,
            status,
            reason,
            p_balance_before,
        }
    }
}
