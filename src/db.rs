//! SQLite persistence for the two append-only tables: `opportunities`
//! (every candidate the finder produced, whether or not it was executed)
//! and `trades` (every execution attempt's final outcome).

use crate::model::{MatchedPair, Opportunity, Trade};
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)?.create_if_missing(true).journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await.context("failed to connect to database")?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS opportunities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scanned_at TEXT NOT NULL,
                pair_key TEXT NOT NULL,
                strategy TEXT NOT NULL,
                k_cost TEXT NOT NULL,
                p_cost TEXT NOT NULL,
                spread TEXT NOT NULL,
                tier TEXT NOT NULL,
                k_depth INTEGER NOT NULL,
                p_depth INTEGER NOT NULL,
                tradeable_units INTEGER NOT NULL,
                max_locked_profit_usd TEXT NOT NULL,
                hours_to_close REAL NOT NULL,
                executed INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_opportunities_pair_key ON opportunities(pair_key)").execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                opp_fk INTEGER,
                traded_at TEXT NOT NULL,
                requested_units INTEGER NOT NULL,
                k_filled INTEGER NOT NULL,
                p_filled INTEGER NOT NULL,
                k_price TEXT NOT NULL,
                p_price TEXT NOT NULL,
                k_cost_usd TEXT NOT NULL,
                p_cost_usd TEXT NOT NULL,
                total_cost_usd TEXT NOT NULL,
                locked_profit_usd TEXT NOT NULL,
                k_fee_usd TEXT NOT NULL,
                net_profit_usd TEXT NOT NULL,
                k_order_id TEXT,
                p_order_id TEXT,
                status TEXT NOT NULL,
                reason TEXT,
                p_balance_before TEXT NOT NULL,
                FOREIGN KEY (opp_fk) REFERENCES opportunities(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Appends one opportunity row and returns its id, used as `trades.opp_fk`.
    pub async fn insert_opportunity(&self, pair: &MatchedPair, opp: &Opportunity, k_depth: i64, p_depth: i64, executed: bool) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO opportunities
                (scanned_at, pair_key, strategy, k_cost, p_cost, spread, tier, k_depth, p_depth, tradeable_units, max_locked_profit_usd, hours_to_close, executed)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(opp.detected_at.to_rfc3339())
        .bind(pair.pair_key())
        .bind(opp.strategy.to_string())
        .bind(opp.k_cost.to_string())
        .bind(opp.p_cost.to_string())
        .bind(opp.spread_cents.to_string())
        .bind(opp.tier.to_string())
        .bind(k_depth)
        .bind(p_depth)
        .bind(opp.tradeable_units)
        .bind(opp.max_locked_profit_usd.to_string())
        .bind(opp.hours_to_close)
        .bind(executed)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert opportunity")?;

        Ok(row.try_get::<i64, _>("id")?)
    }

    /// Appends one execution outcome, optionally linked back to the
    /// opportunity row that triggered it.
    pub async fn insert_trade(&self, opp_fk: Option<i64>, trade: &Trade) -> Result<()> {
        sqlx::query(
            "INSERT INTO trades
                (opp_fk, traded_at, requested_units, k_filled, p_filled, k_price, p_price, k_cost_usd, p_cost_usd,
                 total_cost_usd, locked_profit_usd, k_fee_usd, net_profit_usd, k_order_id, p_order_id, status, reason, p_balance_before)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(opp_fk)
        .bind(trade.traded_at.to_rfc3339())
        .bind(trade.requested_units)
        .bind(trade.k_filled)
        .bind(trade.p_filled)
        .bind(trade.k_price.to_string())
        .bind(trade.p_price.to_string())
        .bind(trade.k_cost_usd.to_string())
        .bind(trade.p_cost_usd.to_string())
        .bind(trade.total_cost_usd.to_string())
        .bind(trade.locked_profit_usd.to_string())
        .bind(trade.k_fee_usd.to_string())
        .bind(trade.net_profit_usd.to_string())
        .bind(&trade.k_order_id)
        .bind(&trade.p_order_id)
        .bind(trade.status.to_string())
        .bind(&trade.reason)
        .bind(trade.p_balance_before.to_string())
        .execute(&self.pool)
        .await
        .context("failed to insert trade")?;

        Ok(())
    }

    /// Aggregate counters behind the `stats` CLI command: total
    /// opportunities, total trades by status, and net profit booked so far.
    pub async fn summary(&self) -> Result<DbSummary> {
        let opp_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM opportunities").fetch_one(&self.pool).await?.try_get("c")?;
        let trade_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM trades").fetch_one(&self.pool).await?.try_get("c")?;
        let filled_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM trades WHERE status = 'filled'").fetch_one(&self.pool).await?.try_get("c")?;
        let stuck_count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM trades WHERE status = 'partial_stuck'").fetch_one(&self.pool).await?.try_get("c")?;
        let net_profit: Option<String> = sqlx::query("SELECT SUM(CAST(net_profit_usd AS REAL)) AS s FROM trades").fetch_one(&self.pool).await?.try_get("s").ok();

        Ok(DbSummary {
            opportunities: opp_count,
            trades: trade_count,
            filled: filled_count,
            partial_stuck: stuck_count,
            net_profit_usd: net_profit.and_then(|s| s.parse().ok()).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DbSummary {
    pub opportunities: i64,
    pub trades: i64,
    pub filled: i64,
    pub partial_stuck: i64,
    pub net_profit_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetClass, StrategyKind, Tier, TradeStatus, Venue};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn market(venue: Venue, id: &str) -> crate::model::NormalizedMarket {
        crate::model::NormalizedMarket {
            venue,
            platform_id: id.into(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".into()),
            team: Some("g2".into()),
            opponent: Some("navi".into()),
            sport_subtype: Some(crate::model::SportSubtype::Series),
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
    async fn insert_opportunity_then_trade_round_trips() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let pair = MatchedPair { a: market(Venue::A, "a1"), b: market(Venue::B, "b1") };
        let opp = Opportunity {
            pair_key: pair.pair_key(),
            strategy: StrategyKind::A,
            k_cost: dec!(48),
            p_cost: dec!(49),
            spread_cents: dec!(3),
            tier: Tier::Low,
            tradeable_units: 100,
            max_locked_profit_usd: dec!(3),
            detected_at: Utc::now(),
            hours_to_close: 4.0,
        };

        let opp_fk = db.insert_opportunity(&pair, &opp, 100, 100, true).await.unwrap();
        assert!(opp_fk > 0);

        let trade = Trade {
            opp_fk: Some(opp_fk),
            traded_at: Utc::now(),
            requested_units: 100,
            k_filled: 100,
            p_filled: 100,
            k_price: dec!(48),
            p_price: dec!(49),
            k_cost_usd: dec!(48),
            p_cost_usd: dec!(49),
            total_cost_usd: dec!(97),
            locked_profit_usd: dec!(3),
            k_fee_usd: dec!(1.75),
            net_profit_usd: dec!(1.25),
            k_order_id: Some("ord-a".into()),
            p_order_id: Some("ord-b".into()),
            status: TradeStatus::Filled,
            reason: None,
            p_balance_before: dec!(10000),
        };
        db.insert_trade(Some(opp_fk), &trade).await.unwrap();

        let summary = db.summary().await.unwrap();
        assert_eq!(summary.opportunities, 1);
        assert_eq!(summary.trades, 1);
        assert_eq!(summary.filled, 1);
    }
}
