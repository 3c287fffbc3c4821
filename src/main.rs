//! Cross-venue arbitrage scanner CLI.
//!
//! Exactly three mutually exclusive modes: scan-only by default,
//! `--paper` for simulated execution, `--live` for real execution.

use anyhow::Result;
use clap::Parser;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use xvenue_arb::venues::paper::PaperVenueAdapter;
use xvenue_arb::venues::venue_a::VenueAAdapter;
use xvenue_arb::venues::venue_b::VenueBAdapter;
use xvenue_arb::{Config, CooldownTable, Database, Executor, NdjsonWriter, Orchestrator, RunMode, VenueAdapter};

#[derive(Parser)]
#[command(name = "xvenue-arb")]
#[command(about = "Cross-venue arbitrage scanner and two-leg executor for binary prediction markets")]
#[command(version)]
struct Cli {
    /// Simulate execution against virtual wallets instead of scanning only.
    #[arg(long, conflicts_with = "live")]
    paper: bool,

    /// Execute real orders. Requires venue credentials in the environment.
    #[arg(long, conflicts_with = "paper")]
    live: bool,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let mode = match (cli.paper, cli.live) {
        (true, false) => RunMode::Paper,
        (false, true) => RunMode::Live,
        (false, false) => RunMode::ScanOnly,
        (true, true) => unreachable!("clap enforces --paper/--live are mutually exclusive"),
    };

    let config = match Config::from_env(mode) {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    info!(mode = ?config.mode, "starting xvenue-arb");

    let venue_a_live: Arc<dyn VenueAdapter> = Arc::new(VenueAAdapter::new(
        config.venue_a_base_url.clone(),
        config.venue_a_creds.as_ref(),
        config.scan_window_hours,
        config.order_deadline,
        config.fill_deadline,
        config.balance_deadline,
    )?);
    let venue_b_live: Arc<dyn VenueAdapter> = Arc::new(VenueBAdapter::new(
        config.venue_b_base_url.clone(),
        config.venue_b_creds.as_ref(),
        config.scan_window_hours,
        config.quote_deadline,
        config.order_deadline,
        config.balance_deadline,
    ));

    let (venue_a, venue_b): (Arc<dyn VenueAdapter>, Arc<dyn VenueAdapter>) = if config.is_paper() {
        (
            Arc::new(PaperVenueAdapter::new(venue_a_live, xvenue_arb::Venue::A, config.paper_starting_balance, config.venue_a_taker_fee_pct)),
            Arc::new(PaperVenueAdapter::new(venue_b_live, xvenue_arb::Venue::B, config.paper_starting_balance, dec!(0))),
        )
    } else {
        (venue_a_live, venue_b_live)
    };

    let db = Arc::new(Database::new(&config.effective_database_path()).await?);
    let ndjson = Arc::new(NdjsonWriter::new(config.effective_ndjson_path()));

    let executor = if config.mode == RunMode::ScanOnly {
        None
    } else {
        let cooldowns = Arc::new(CooldownTable::new());
        Some(Arc::new(Executor::new(config.clone(), venue_a.clone(), venue_b.clone(), cooldowns)))
    };

    let db_for_summary = db.clone();
    let orchestrator = Orchestrator::new(config, venue_a, venue_b, executor, db, ndjson);
    let stop_handle = orchestrator.stop_handle();
    let stats = orchestrator.stats();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, finishing in-flight ticks");
            stop_handle.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    orchestrator.run().await;

    let stats = stats.read().await;
    info!(
        refreshes = stats.refreshes_performed,
        refresh_failures = stats.refresh_failures,
        ticks = stats.ticks_performed,
        opportunities = stats.opportunities_detected,
        trades = stats.trades_executed,
        "run finished"
    );
    match db_for_summary.summary().await {
        Ok(summary) => info!(
            opportunities = summary.opportunities,
            trades = summary.trades,
            filled = summary.filled,
            partial_stuck = summary.partial_stuck,
            net_profit_usd = summary.net_profit_usd,
            "final database summary"
        ),
        Err(e) => error!("failed to read final database summary: {e}"),
    }

    Ok(())
}
