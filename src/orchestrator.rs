//! Two-speed orchestrator loop: a slow refresh that re-matches markets
//! every `MARKET_REFRESH_SECONDS`, and a fast tick that fans out quotes,
//! finds opportunities, and dispatches the executor every
//! `PRICE_POLL_SECONDS`. The only state shared between them is the
//! current `MatchedPair` set, published by lock-guarded snapshot swap.

use crate::config::Config;
use crate::db::Database;
use crate::executor::{CooldownTable, Executor};
use crate::matcher::match_markets;
use crate::model::{MatchedPair, Opportunity, StrategyKind};
use crate::ndjson::NdjsonWriter;
use crate::opportunity::find_opportunities;
use crate::quotes::{complete_quotes, fetch_all};
use crate::venues::VenueAdapter;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Counters exposed for the `stats` CLI command and end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub refreshes_performed: u64,
    pub refresh_failures: u64,
    pub ticks_performed: u64,
    pub opportunities_detected: u64,
    pub trades_executed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

pub struct Orchestrator {
    config: Config,
    venue_a: Arc<dyn VenueAdapter>,
    venue_b: Arc<dyn VenueAdapter>,
    executor: Option<Arc<Executor>>,
    db: Arc<Database>,
    ndjson: Arc<NdjsonWriter>,
    pairs: Arc<RwLock<Arc<Vec<MatchedPair>>>>,
    cycle: Arc<AtomicI64>,
    should_stop: Arc<AtomicBool>,
    stats: Arc<RwLock<RunStats>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        venue_a: Arc<dyn VenueAdapter>,
        venue_b: Arc<dyn VenueAdapter>,
        executor: Option<Arc<Executor>>,
        db: Arc<Database>,
        ndjson: Arc<NdjsonWriter>,
    ) -> Self {
        Self {
            config,
            venue_a,
            venue_b,
            executor,
            db,
            ndjson,
            pairs: Arc::new(RwLock::new(Arc::new(Vec::new()))),
            cycle: Arc::new(AtomicI64::new(0)),
            should_stop: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(RunStats::default())),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.should_stop.clone()
    }

    pub fn stats(&self) -> Arc<RwLock<RunStats>> {
        self.stats.clone()
    }

    /// Runs an initial refresh synchronously (so the first tick has a
    /// pair set to work from) then drives the slow-refresh and
    /// fast-tick loops concurrently until `stop_handle()` is set.
    pub async fn run(self) {
        {
            let mut stats = self.stats.write().await;
            stats.started_at = Some(Utc::now());
        }

        self.refresh_once().await;

        let refresh_fut = self.refresh_loop();
        let tick_fut = self.tick_loop();
        tokio::join!(refresh_fut, tick_fut);

        info!("orchestrator stopped cleanly");
    }

    async fn refresh_loop(&self) {
        let mut ticker = interval(std::time::Duration::from_secs(self.config.market_refresh_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consume the immediate first tick; refresh_once already ran it

        loop {
            if self.should_stop.load(Ordering::SeqCst) {
                return;
            }
            ticker.tick().await;
            if self.should_stop.load(Ordering::SeqCst) {
                return;
            }
            self.refresh_once().await;
        }
    }

    async fn refresh_once(&self) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_refresh().await {
                Ok(report) => {
                    let pairs = Arc::new(report.pairs);
                    let count = pairs.len();
                    *self.pairs.write().await = pairs;

                    let mut stats = self.stats.write().await;
                    stats.refreshes_performed += 1;
                    stats.last_refresh_at = Some(Utc::now());
                    info!(pairs = count, rejections = report.rejections.len(), "market refresh complete");
                    return;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "market refresh failed");
                    let mut stats = self.stats.write().await;
                    stats.refresh_failures += 1;
                    drop(stats);

                    if attempt >= 3 {
                        error!("market refresh aborted after 3 consecutive failures, keeping previous pair set");
                        return;
                    }
                    sleep(self.config.refresh_rate_limit_backoff).await;
                }
            }
        }
    }

    async fn try_refresh(&self) -> Result<crate::matcher::MatchReport, anyhow::Error> {
        let (a_markets, b_markets) = tokio::try_join!(self.venue_a.list_markets(), self.venue_b.list_markets())?;
        Ok(match_markets(&a_markets, &b_markets, self.config.t_sports_hours, self.config.t_crypto_hours, self.config.crypto_matching_enabled))
    }

    async fn tick_loop(&self) {
        let period = std::time::Duration::from_secs(self.config.price_poll_seconds);
        let cooldowns = self.executor.as_ref().map(|e| e.cooldowns());

        loop {
            if self.should_stop.load(Ordering::SeqCst) {
                return;
            }
            let tick_start = Instant::now();
            self.tick_once(cooldowns.as_ref()).await;

            let elapsed = tick_start.elapsed();
            if elapsed > period {
                warn!(elapsed_ms = elapsed.as_millis() as u64, period_ms = period.as_millis() as u64, "tick exceeded its period, next tick delayed (backpressure)");
            } else {
                sleep(period - elapsed).await;
            }
        }
    }

    async fn tick_once(&self, cooldowns: Option<&Arc<CooldownTable>>) {
        let snapshot = self.pairs.read().await.clone();
        if snapshot.is_empty() {
            return;
        }

        let current_cycle = self.cycle.fetch_add(1, Ordering::SeqCst);

        let pair_quotes = fetch_all(&snapshot, self.venue_a.clone(), self.venue_b.clone(), self.config.fetch_workers, self.config.quote_deadline).await;
        let complete = complete_quotes(pair_quotes);

        let mut all_opportunities: Vec<Opportunity> = Vec::new();
        let mut execution_tasks = Vec::new();

        for (pair, a_quote, b_quote) in &complete {
            let opps = find_opportunities(pair, a_quote, b_quote, self.config.min_spread_cents);
            for opp in opps {
                let opp_fk = self.db.insert_opportunity(pair, &opp, a_quote.yes_depth.max(a_quote.no_depth), b_quote.yes_depth.max(b_quote.no_depth), self.executor.is_some()).await;

                if let (Some(executor), Some(cooldowns)) = (&self.executor, cooldowns) {
                    if cooldowns.is_cooling_down(&opp.pair_key, current_cycle).await {
                        all_opportunities.push(opp);
                        continue;
                    }
                    let executor = executor.clone();
                    let pair = pair.clone();
                    let ladder = match opp.strategy {
                        StrategyKind::A => b_quote.no_ladder.clone(),
                        StrategyKind::B => b_quote.yes_ladder.clone(),
                    };
                    let db = self.db.clone();
                    let opp_for_task = opp.clone();
                    execution_tasks.push(tokio::spawn(async move {
                        let trade = executor.execute(&pair, &opp_for_task, &ladder, current_cycle).await;
                        if let Err(e) = db.insert_trade(opp_fk.ok(), &trade).await {
                            error!(error = %e, "failed to persist trade");
                        }
                        trade
                    }));
                }
                all_opportunities.push(opp);
            }
        }

        for task in execution_tasks {
            match task.await {
                Ok(trade) => {
                    let mut stats = self.stats.write().await;
                    stats.trades_executed += 1;
                    info!(status = %trade.status, net_profit_usd = %trade.net_profit_usd, "trade finished");
                }
                Err(e) => error!(error = %e, "execution task panicked"),
            }
        }

        if !all_opportunities.is_empty() {
            if let Err(e) = self.ndjson.write_tick(&all_opportunities).await {
                warn!(error = %e, "failed to append ndjson tick");
            }
        }

        let mut stats = self.stats.write().await;
        stats.ticks_performed += 1;
        stats.opportunities_detected += all_opportunities.len() as u64;
        stats.last_tick_at = Some(Utc::now());
    }
}
