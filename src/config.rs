//! Environment-driven configuration: read the string, parse it, fall
//! back to a documented default.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::time::Duration;

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Run mode selected by the CLI's mutually exclusive flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// No orders placed regardless of credentials.
    ScanOnly,
    /// Simulated execution against virtual wallets.
    Paper,
    /// Real execution; requires credentials.
    Live,
}

/// Venue-A credentials: an RSA key id and a PEM-encoded private key
/// (literal `\n` escaping tolerated).
#[derive(Clone)]
pub struct VenueACredentials {
    pub key_id: String,
    pub private_key_pem: String,
}

/// Venue-B credentials: a wallet private key plus CLOB API credentials,
/// which may be absent and derived deterministically at a fixed nonce.
#[derive(Clone)]
pub struct VenueBCredentials {
    pub private_key: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_passphrase: Option<String>,
    pub funder: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    pub mode: RunMode,
    pub venue_a_base_url: String,
    pub venue_b_base_url: String,
    pub venue_a_creds: Option<VenueACredentials>,
    pub venue_b_creds: Option<VenueBCredentials>,

    pub scan_window_hours: i64,
    pub fetch_workers: usize,
    pub market_refresh_seconds: u64,
    pub price_poll_seconds: u64,
    pub min_spread_cents: Decimal,
    pub exec_max_trade_usd: Decimal,
    pub exec_max_units_per_map: i64,
    pub exec_poly_min_order_usd: Decimal,
    pub leg1_settle_delay: Duration,
    pub exec_unwind_delay: Duration,
    pub exec_unwind_max_attempts: u32,
    pub exec_cooldown_cycles: i64,
    pub crypto_matching_enabled: bool,
    pub t_sports_hours: i64,
    pub t_crypto_hours: i64,

    pub quote_deadline: Duration,
    pub order_deadline: Duration,
    pub fill_deadline: Duration,
    pub balance_deadline: Duration,
    pub refresh_rate_limit_backoff: Duration,

    pub database_path: String,
    pub ndjson_path: String,

    pub paper_starting_balance: Decimal,
    pub venue_a_taker_fee_pct: Decimal,
}

impl Config {
    /// Build from the process environment, applying `.env` first (the
    /// caller is expected to have called `dotenvy::dotenv().ok()`
    /// before this).
    pub fn from_env(mode: RunMode) -> anyhow::Result<Self> {
        let venue_a_creds = match (env::var("VENUE_A_KEY").ok(), env::var("VENUE_A_SECRET").ok()) {
            (Some(key_id), Some(pem)) => Some(VenueACredentials { key_id, private_key_pem: pem }),
            _ => None,
        };

        let venue_b_creds = env::var("VENUE_B_PRIV_KEY").ok().map(|private_key| VenueBCredentials {
            private_key,
            api_key: env::var("VENUE_B_API_KEY").ok(),
            api_secret: env::var("VENUE_B_API_SECRET").ok(),
            api_passphrase: env::var("VENUE_B_API_PASSPHRASE").ok(),
            funder: env::var("VENUE_B_FUNDER").ok(),
        });

        if mode == RunMode::Live && (venue_a_creds.is_none() || venue_b_creds.is_none()) {
            anyhow::bail!(
                "--live requires VENUE_A_KEY/VENUE_A_SECRET and VENUE_B_PRIV_KEY to be set"
            );
        }

        Ok(Self {
            mode,
            venue_a_base_url: env::var("VENUE_A_BASE_URL")
                .unwrap_or_else(|_| "https://venue-a.example.com/trade-api/v2".to_string()),
            venue_b_base_url: env::var("VENUE_B_BASE_URL")
                .unwrap_or_else(|_| "https://venue-b.example.com".to_string()),
            venue_a_creds,
            venue_b_creds,

            scan_window_hours: env_i64("SCAN_WINDOW_HOURS", 72),
            fetch_workers: env_u64("FETCH_WORKERS", 20) as usize,
            market_refresh_seconds: env_u64("MARKET_REFRESH_SECONDS", 7200),
            price_poll_seconds: env_u64("PRICE_POLL_SECONDS", 2),
            min_spread_cents: env_decimal("MIN_SPREAD_CENTS", dec!(3.3)),
            exec_max_trade_usd: env_decimal("EXEC_MAX_TRADE_USD", dec!(50)),
            exec_max_units_per_map: env_i64("EXEC_MAX_UNITS_PER_MAP", 500),
            exec_poly_min_order_usd: env_decimal("EXEC_POLY_MIN_ORDER_USD", dec!(1)),
            leg1_settle_delay: Duration::from_millis(env_u64("LEG1_SETTLE_DELAY_MS", 500)),
            exec_unwind_delay: Duration::from_secs(env_u64("EXEC_UNWIND_DELAY_SECONDS", 2)),
            exec_unwind_max_attempts: env_u64("EXEC_UNWIND_MAX_ATTEMPTS", 3) as u32,
            exec_cooldown_cycles: env_i64("EXEC_COOLDOWN_CYCLES", 30),
            crypto_matching_enabled: env_bool("CRYPTO_MATCHING_ENABLED", false),
            t_sports_hours: env_i64("T_SPORTS_HOURS", 4),
            t_crypto_hours: env_i64("T_CRYPTO_HOURS", 1),

            quote_deadline: Duration::from_secs(2),
            order_deadline: Duration::from_secs(10),
            fill_deadline: Duration::from_secs(10),
            balance_deadline: Duration::from_secs(5),
            refresh_rate_limit_backoff: Duration::from_secs(30),

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "xvenue_arb.db".to_string()),
            ndjson_path: env::var("NDJSON_PATH").unwrap_or_else(|_| "opportunities.ndjson".to_string()),

            paper_starting_balance: dec!(10000),
            venue_a_taker_fee_pct: dec!(0.0175),
        })
    }

    pub fn is_paper(&self) -> bool {
        self.mode == RunMode::Paper
    }

    /// Paper mode persists to a separate path so simulated trades never
    /// mix with live/scan-only history.
    pub fn effective_database_path(&self) -> String {
        if self.is_paper() {
            format!("{}.paper", self.database_path)
        } else {
            self.database_path.clone()
        }
    }

    pub fn effective_ndjson_path(&self) -> String {
        if self.is_paper() {
            format!("{}.paper", self.ndjson_path)
        } else {
            self.ndjson_path.clone()
        }
    }
}
