//! Cross-venue arbitrage scanner and two-leg executor for binary
//! prediction-market contracts.
//!
//! Two independent venues list the same real-world events as binary
//! YES/NO contracts under different schemas. This crate normalizes both
//! into one market shape, matches equivalent contracts across venues,
//! fans out live quotes, detects priced-in arbitrage spreads, and
//! (optionally) executes the two-leg hedge with a strict state machine
//! and unwind path.

pub mod config;
pub mod db;
pub mod errors;
pub mod executor;
pub mod matcher;
pub mod model;
pub mod ndjson;
pub mod normalize;
pub mod opportunity;
pub mod orchestrator;
pub mod quotes;
pub mod venues;

pub use config::{Config, RunMode};
pub use db::Database;
pub use errors::ArbError;
pub use executor::{CooldownTable, Executor};
pub use matcher::{match_markets, MatchReport};
pub use model::{MatchedPair, NormalizedMarket, Opportunity, PairQuotes, Quote, Side, StrategyKind, Tier, Trade, TradeStatus, Venue};
pub use ndjson::NdjsonWriter;
pub use orchestrator::{Orchestrator, RunStats};
pub use venues::VenueAdapter;
