//! Venue-A (integer-cent CLOB) market listing and normalization.
//!
//! Pulls the ticker apart into league, teams, and an optional map/game
//! number, and falls back to the orderbook endpoint when the summary
//! endpoint doesn't carry a usable ask.

use crate::errors::ArbError;
use crate::model::{AssetClass, Direction, NormalizedMarket, SportSubtype, Venue};
use crate::normalize::team::{extract_map_game_number, normalize_team_name};
use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, warn};

const PAGE_LIMIT: u32 = 1000;

/// Series ticker prefixes that route a market to SPORTS classification.
const SERIES_PREFIXES: &[&str] = &[
    "CS2", "CSGO", "LOL", "VAL", "DOTA2", "NBA", "NHL", "MLB", "NFL", "SOCCER", "EPL", "UCL",
];

const CRYPTO_KEYWORDS: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("btc", "BTC"),
    ("ethereum", "ETH"),
    ("ether", "ETH"),
    ("eth", "ETH"),
    ("solana", "SOL"),
    ("sol", "SOL"),
    ("xrp", "XRP"),
    ("dogecoin", "DOGE"),
    ("doge", "DOGE"),
];

#[derive(Debug, serde::Deserialize)]
struct MarketsPage {
    #[serde(default)]
    markets: Vec<RawMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
struct RawMarket {
    ticker: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    yes_sub_title: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    close_time: Option<String>,
}

/// Fetch and normalize the full venue-A open-markets list, dropping
/// anything outside `scan_window_hours` and anything that fails to
/// classify.
pub async fn fetch_normalized_markets(
    client: &reqwest::Client,
    base_url: &str,
    scan_window_hours: i64,
) -> Result<Vec<NormalizedMarket>, ArbError> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    let horizon = Utc::now() + chrono::Duration::hours(scan_window_hours);

    loop {
        let mut url = format!("{base_url}/markets?status=open&limit={PAGE_LIMIT}");
        if let Some(c) = &cursor {
            url.push_str(&format!("&cursor={c}"));
        }

        let resp = client.get(&url).send().await.map_err(|source| ArbError::Transport {
            venue: Venue::A,
            source,
        })?;

        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit { venue: Venue::A });
        }
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED || resp.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(ArbError::Auth {
                venue: Venue::A,
                status: resp.status().as_u16(),
                message: "market list rejected".to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(ArbError::VenueProtocol {
                venue: Venue::A,
                message: format!("market list HTTP {}", resp.status()),
            });
        }

        let page: MarketsPage = resp.json().await.map_err(|source| ArbError::Transport {
            venue: Venue::A,
            source,
        })?;

        let page_empty = page.markets.is_empty();
        for raw in &page.markets {
            if raw.status != "open" {
                continue;
            }
            match normalize_one(raw, horizon) {
                Some(market) => out.push(market),
                None => debug!(ticker = %raw.ticker, "venue-a market did not classify, dropping"),
            }
        }

        match page.cursor {
            Some(c) if !c.is_empty() && !page_empty => cursor = Some(c),
            _ => break,
        }
    }

    Ok(out)
}

fn normalize_one(raw: &RawMarket, horizon: DateTime<Utc>) -> Option<NormalizedMarket> {
    let resolution_dt = match &raw.close_time {
        Some(s) => DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc),
        None => return None,
    };
    if resolution_dt > horizon || resolution_dt < Utc::now() {
        return None;
    }

    let combined_text = format!("{} {}", raw.title, raw.subtitle.as_deref().unwrap_or(""));

    if is_crypto(&raw.ticker, &combined_text) {
        let (crypto_asset, direction, threshold) = parse_crypto(&combined_text)?;
        return Some(NormalizedMarket {
            venue: Venue::A,
            platform_id: raw.ticker.clone(),
            asset_class: AssetClass::Crypto,
            sport: None,
            team: None,
            opponent: None,
            sport_subtype: None,
            map_number: None,
            crypto_asset: Some(crypto_asset),
            direction: Some(direction),
            threshold: Some(threshold),
            resolution_dt,
            yes_token: raw.ticker.clone(),
            no_token: raw.ticker.clone(),
            raw_title: raw.title.clone(),
        });
    }

    let sport = sports_prefix(&raw.ticker)?;
    let (team, opponent) = parse_sports_title(&raw.title, raw.yes_sub_title.as_deref())?;
    let sport_subtype = if raw.ticker.to_uppercase().contains("MAP") {
        SportSubtype::Map
    } else {
        SportSubtype::Series
    };
    let map_number = extract_map_game_number(&raw.title).or_else(|| extract_map_game_number(&raw.ticker));

    Some(NormalizedMarket {
        venue: Venue::A,
        platform_id: raw.ticker.clone(),
        asset_class: AssetClass::Sports,
        sport: Some(sport.to_string()),
        team: Some(normalize_team_name(&team)),
        opponent: Some(normalize_team_name(&opponent)),
        sport_subtype: Some(sport_subtype),
        map_number,
        crypto_asset: None,
        direction: None,
        threshold: None,
        resolution_dt,
        yes_token: raw.ticker.clone(),
        no_token: raw.ticker.clone(),
        raw_title: raw.title.clone(),
    })
}

fn is_crypto(ticker: &str, text: &str) -> bool {
    let lower = text.to_lowercase();
    let ticker_upper = ticker.to_uppercase();
    CRYPTO_KEYWORDS.iter().any(|(kw, _)| lower.contains(kw)) && !SERIES_PREFIXES.iter().any(|p| ticker_upper.starts_with(p))
}

fn parse_crypto(text: &str) -> Option<(String, Direction, Decimal)> {
    let lower = text.to_lowercase();
    let (_, symbol) = CRYPTO_KEYWORDS.iter().find(|(kw, _)| lower.contains(kw))?;

    let direction = if lower.contains("above") || lower.contains("or more") || lower.contains("≥") || lower.contains(">=") {
        Direction::Above
    } else {
        Direction::Below
    };

    let threshold_re = threshold_regex();
    let raw_num = threshold_re.captures(text)?.get(1)?.as_str();
    let cleaned = raw_num.replace(',', "");
    let threshold = Decimal::from_str(&cleaned).ok()?;

    Some((symbol.to_string(), direction, threshold))
}

fn threshold_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?([\d,]+(?:\.\d+)?)").expect("threshold regex is valid"))
}

fn sports_prefix(ticker: &str) -> Option<&'static str> {
    let upper = ticker.to_uppercase();
    SERIES_PREFIXES.iter().find(|p| upper.starts_with(**p)).copied()
}

/// Matches the single team tokens flanking "vs" (e.g. "DRX vs. T1").
/// Team identifiers in this feed are always a single word, so this
/// deliberately doesn't try to span the whole "Will X win the " prefix
/// that precedes the vs-clause in the title.
fn vs_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\w+)\s+vs\.?\s+(\w+)").expect("vs regex is valid"))
}

fn will_win_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)will\s+(.+?)\s+win\b").expect("will-win regex is valid"))
}

/// Parse `"Will X win the X vs. Y ..."` into `(team, opponent)`. Prefers
/// `yes_sub_title` (the venue's own team-for-this-side hint) over the
/// free-text "will X win" capture when both are present.
fn parse_sports_title(title: &str, yes_sub_title: Option<&str>) -> Option<(String, String)> {
    let vs_caps = vs_regex().captures(title)?;
    let side_a = vs_caps.get(1)?.as_str().trim().to_string();
    let side_b = vs_caps.get(2)?.as_str().trim().to_string();

    let team = match yes_sub_title {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => will_win_regex()
            .captures(title)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| side_a.clone()),
    };

    let team_norm = normalize_team_name(&team);
    if normalize_team_name(&side_a) == team_norm {
        Some((side_a, side_b))
    } else if normalize_team_name(&side_b) == team_norm {
        Some((side_b, side_a))
    } else {
        warn!(title, "venue-a title did not resolve team to a vs-participant");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ticker: &str, title: &str, subtitle: Option<&str>, yes_sub_title: Option<&str>) -> RawMarket {
        RawMarket {
            ticker: ticker.to_string(),
            title: title.to_string(),
            subtitle: subtitle.map(str::to_string),
            yes_sub_title: yes_sub_title.map(str::to_string),
            status: "open".to_string(),
            close_time: Some((Utc::now() + chrono::Duration::hours(1)).to_rfc3339()),
        }
    }

    #[test]
    fn classifies_sports_and_parses_teams() {
        let raw = sample(
            "CS2-25JUL28DRXT1-DRX",
            "Will DRX win the DRX vs. T1 match?",
            None,
            Some("DRX"),
        );
        let market = normalize_one(&raw, Utc::now() + chrono::Duration::hours(72)).unwrap();
        assert_eq!(market.asset_class, AssetClass::Sports);
        assert_eq!(market.team.as_deref(), Some("drx"));
        assert_eq!(market.opponent.as_deref(), Some("t1"));
        assert_eq!(market.sport_subtype, Some(SportSubtype::Series));
    }

    #[test]
    fn detects_map_subtype_and_number() {
        let raw = sample(
            "CS2MAP2-25JUL28DRXT1-DRX",
            "Will DRX win Map 2 of DRX vs. T1?",
            None,
            Some("DRX"),
        );
        let market = normalize_one(&raw, Utc::now() + chrono::Duration::hours(72)).unwrap();
        assert_eq!(market.sport_subtype, Some(SportSubtype::Map));
        assert_eq!(market.map_number, Some(2));
    }

    #[test]
    fn classifies_crypto_with_direction_and_threshold() {
        let raw = sample("KXBTC-25JUL28", "Bitcoin price", Some("$75,750 or above"), None);
        let market = normalize_one(&raw, Utc::now() + chrono::Duration::hours(72)).unwrap();
        assert_eq!(market.asset_class, AssetClass::Crypto);
        assert_eq!(market.crypto_asset.as_deref(), Some("BTC"));
        assert_eq!(market.direction, Some(Direction::Above));
        assert_eq!(market.threshold, Some(Decimal::from_str("75750").unwrap()));
    }

    #[test]
    fn drops_markets_past_scan_window() {
        let mut raw = sample("CS2-X-Y", "Will X win the X vs. Y match?", None, Some("X"));
        raw.close_time = Some((Utc::now() + chrono::Duration::hours(200)).to_rfc3339());
        assert!(normalize_one(&raw, Utc::now() + chrono::Duration::hours(72)).is_none());
    }
}
