//! Venue-B (token CLOB, Gamma-style listing) market normalization.
//!
//! Paginates the Gamma markets endpoint and expands each market into the
//! two-row team/opponent model the matcher expects.

use crate::errors::ArbError;
use crate::model::{AssetClass, Direction, NormalizedMarket, SportSubtype, Venue};
use crate::normalize::team::{extract_map_game_number, normalize_team_name};
use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

const PAGE_LIMIT: u32 = 500;
const SAFETY_LIMIT: u32 = 35_000;

const SPORT_KEYWORDS: &[(&str, &str)] = &[
    ("cs2", "CS2"),
    ("counter-strike", "CS2"),
    ("league of legends", "LOL"),
    ("lol", "LOL"),
    ("valorant", "VAL"),
    ("dota", "DOTA2"),
    ("nba", "NBA"),
    ("nhl", "NHL"),
    ("mlb", "MLB"),
    ("nfl", "NFL"),
    ("premier league", "SOCCER"),
    ("la liga", "SOCCER"),
    ("soccer", "SOCCER"),
    ("football club", "SOCCER"),
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
];

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    id: String,
    question: String,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    end_date_iso: Option<String>,
    #[serde(default)]
    outcomes: Option<String>,
    #[serde(default)]
    clob_token_ids: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
}

/// Fetch and normalize the full venue-B active/open market list. Team
/// markets with two named outcomes expand into two rows (one per team);
/// "Will X win?" YES/NO markets yield one row; draw-inclusive markets
/// are skipped since the pairing model is strictly binary.
pub async fn fetch_normalized_markets(
    client: &reqwest::Client,
    base_url: &str,
    scan_window_hours: i64,
) -> Result<Vec<NormalizedMarket>, ArbError> {
    let mut out = Vec::new();
    let mut offset: u32 = 0;
    let horizon = Utc::now() + chrono::Duration::hours(scan_window_hours);

    loop {
        let url = format!(
            "{base_url}/gamma/markets?active=true&closed=false&limit={PAGE_LIMIT}&offset={offset}"
        );

        let resp = client.get(&url).send().await.map_err(|source| ArbError::Transport {
            venue: Venue::B,
            source,
        })?;

        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit { venue: Venue::B });
        }
        if !resp.status().is_success() {
            return Err(ArbError::VenueProtocol {
                venue: Venue::B,
                message: format!("market list HTTP {}", resp.status()),
            });
        }

        let page: Vec<GammaMarket> = resp.json().await.map_err(|source| ArbError::Transport {
            venue: Venue::B,
            source,
        })?;

        let batch_size = page.len();
        for gm in page {
            out.extend(normalize_one(&gm, horizon));
        }

        if (batch_size as u32) < PAGE_LIMIT {
            break;
        }
        offset += PAGE_LIMIT;
        if offset > SAFETY_LIMIT {
            debug!("venue-b pagination hit safety limit of {SAFETY_LIMIT}");
            break;
        }
    }

    Ok(out)
}

fn normalize_one(gm: &GammaMarket, horizon: DateTime<Utc>) -> Vec<NormalizedMarket> {
    if !gm.active || gm.closed {
        return Vec::new();
    }

    let resolution_dt = match parse_end_date(gm) {
        Some(dt) => dt,
        None => return Vec::new(),
    };
    if resolution_dt > horizon || resolution_dt < Utc::now() {
        return Vec::new();
    }

    let (yes_token, no_token) = parse_token_ids(gm.clob_token_ids.as_deref());
    let (Some(yes_token), Some(no_token)) = (yes_token, no_token) else {
        return Vec::new();
    };

    let outcomes = parse_outcomes(gm.outcomes.as_deref());
    let lower_question = gm.question.to_lowercase();

    if is_crypto(&lower_question) {
        return parse_crypto(&gm.question)
            .map(|(crypto_asset, direction, threshold)| {
                vec![NormalizedMarket {
                    venue: Venue::B,
                    platform_id: gm.id.clone(),
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
                    yes_token: yes_token.clone(),
                    no_token: no_token.clone(),
                    raw_title: gm.question.clone(),
                }]
            })
            .unwrap_or_default();
    }

    let Some(sport) = sport_code(&lower_question) else {
        return Vec::new();
    };
    let sport_subtype = if lower_question.contains("map") {
        SportSubtype::Map
    } else {
        SportSubtype::Series
    };
    let map_number = extract_map_game_number(&gm.question);

    match outcomes.len() {
        2 if !outcomes.iter().any(|o| o.eq_ignore_ascii_case("draw")) && !outcomes.iter().any(|o| o.eq_ignore_ascii_case("yes") || o.eq_ignore_ascii_case("no")) => {
            let team_a = &outcomes[0];
            let team_b = &outcomes[1];
            vec![
                NormalizedMarket {
                    venue: Venue::B,
                    platform_id: format!("{}::{}", gm.id, team_a),
                    asset_class: AssetClass::Sports,
                    sport: Some(sport.to_string()),
                    team: Some(normalize_team_name(team_a)),
                    opponent: Some(normalize_team_name(team_b)),
                    sport_subtype: Some(sport_subtype),
                    map_number,
                    crypto_asset: None,
                    direction: None,
                    threshold: None,
                    resolution_dt,
                    yes_token: yes_token.clone(),
                    no_token: no_token.clone(),
                    raw_title: gm.question.clone(),
                },
                NormalizedMarket {
                    venue: Venue::B,
                    platform_id: format!("{}::{}", gm.id, team_b),
                    asset_class: AssetClass::Sports,
                    sport: Some(sport.to_string()),
                    team: Some(normalize_team_name(team_b)),
                    opponent: Some(normalize_team_name(team_a)),
                    sport_subtype: Some(sport_subtype),
                    map_number,
                    crypto_asset: None,
                    direction: None,
                    threshold: None,
                    resolution_dt,
                    yes_token: no_token,
                    no_token: yes_token,
                    raw_title: gm.question.clone(),
                },
            ]
        }
        _ => {
            // YES/NO "will X win?" style market; skip 3-way draw markets.
            if outcomes.iter().any(|o| o.eq_ignore_ascii_case("draw")) {
                return Vec::new();
            }
            let Some((team, opponent)) = parse_will_win(&gm.question) else {
                return Vec::new();
            };
            vec![NormalizedMarket {
                venue: Venue::B,
                platform_id: gm.id.clone(),
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
                yes_token,
                no_token,
                raw_title: gm.question.clone(),
            }]
        }
    }
}

fn parse_end_date(gm: &GammaMarket) -> Option<DateTime<Utc>> {
    gm.end_date
        .as_ref()
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            gm.end_date_iso.as_ref().and_then(|d| {
                let with_time = format!("{d}T23:59:59Z");
                DateTime::parse_from_rfc3339(&with_time).ok().map(|dt| dt.with_timezone(&Utc))
            })
        })
}

fn parse_outcomes(outcomes_str: Option<&str>) -> Vec<String> {
    outcomes_str
        .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

fn parse_token_ids(ids_str: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(ids_str) = ids_str else {
        return (None, None);
    };
    match serde_json::from_str::<Vec<String>>(ids_str) {
        Ok(ids) => (ids.first().cloned(), ids.get(1).cloned()),
        Err(_) => (None, None),
    }
}

fn sport_code(lower_question: &str) -> Option<&'static str> {
    SPORT_KEYWORDS.iter().find(|(kw, _)| lower_question.contains(kw)).map(|(_, code)| *code)
}

fn is_crypto(lower_question: &str) -> bool {
    CRYPTO_KEYWORDS.iter().any(|(kw, _)| lower_question.contains(kw))
}

fn parse_crypto(question: &str) -> Option<(String, Direction, Decimal)> {
    let lower = question.to_lowercase();
    let (_, symbol) = CRYPTO_KEYWORDS.iter().find(|(kw, _)| lower.contains(kw))?;
    let direction = if lower.contains("above") || lower.contains("or more") || lower.contains("≥") {
        Direction::Above
    } else {
        Direction::Below
    };
    let raw_num = threshold_regex().captures(question)?.get(1)?.as_str();
    let threshold = Decimal::from_str(&raw_num.replace(',', "")).ok()?;
    Some((symbol.to_string(), direction, threshold))
}

fn threshold_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?([\d,]+(?:\.\d+)?)").expect("threshold regex is valid"))
}

fn will_win_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)will\s+(.+?)\s+win\b").expect("will-win regex is valid"))
}

/// Matches the single team token right after "vs" (e.g. "win vs
/// Chelsea"); this feed's "will X win" phrasing puts the named team
/// next to "win", not next to "vs", so the opponent is pulled from this
/// separate clause rather than by comparing both sides of "vs" against
/// the named team.
fn vs_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bvs\.?\s+(\w+)").expect("vs regex is valid"))
}

/// `"Will X win vs Y?"` style question. A market whose opponent can't
/// be resolved this way is dropped rather than emitted with a
/// placeholder, since SPORTS rows must carry a non-empty opponent.
fn parse_will_win(question: &str) -> Option<(String, String)> {
    let team = will_win_regex().captures(question)?.get(1)?.as_str().trim().to_string();
    let opponent = vs_regex().captures(question)?.get(1)?.as_str().trim().to_string();
    Some((team, opponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, question: &str, outcomes: &[&str]) -> GammaMarket {
        GammaMarket {
            id: id.to_string(),
            question: question.to_string(),
            end_date: Some((Utc::now() + chrono::Duration::hours(2)).to_rfc3339()),
            end_date_iso: None,
            outcomes: Some(serde_json::to_string(outcomes).unwrap()),
            clob_token_ids: Some(serde_json::to_string(&["111", "222"]).unwrap()),
            active: true,
            closed: false,
        }
    }

    #[test]
    fn expands_team_market_into_two_rows() {
        let gm = sample("m1", "DRX vs. T1 - CS2 Map 2 winner", &["DRX", "T1"]);
        let rows = normalize_one(&gm, Utc::now() + chrono::Duration::hours(72));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team.as_deref(), Some("drx"));
        assert_eq!(rows[0].opponent.as_deref(), Some("t1"));
        assert_eq!(rows[1].team.as_deref(), Some("t1"));
        assert_eq!(rows[1].opponent.as_deref(), Some("drx"));
        assert_eq!(rows[0].yes_token, "111");
        assert_eq!(rows[1].yes_token, "222");
    }

    #[test]
    fn skips_draw_inclusive_markets() {
        let gm = sample("m2", "Arsenal vs Chelsea winner", &["Arsenal", "Chelsea", "Draw"]);
        let rows = normalize_one(&gm, Utc::now() + chrono::Duration::hours(72));
        assert!(rows.is_empty());
    }

    #[test]
    fn parses_single_outcome_will_win_market() {
        let gm = sample("m4", "Soccer: Will Liverpool win vs Chelsea?", &["Yes", "No"]);
        let rows = normalize_one(&gm, Utc::now() + chrono::Duration::hours(72));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team.as_deref(), Some("liverpool"));
        assert_eq!(rows[0].opponent.as_deref(), Some("chelsea"));
    }

    #[test]
    fn parses_crypto_threshold_and_direction() {
        let gm = sample("m3", "Will Bitcoin be above $75,750 on July 28?", &["Yes", "No"]);
        let rows = normalize_one(&gm, Utc::now() + chrono::Duration::hours(72));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset_class, AssetClass::Crypto);
        assert_eq!(rows[0].crypto_asset.as_deref(), Some("BTC"));
        assert_eq!(rows[0].direction, Some(Direction::Above));
    }
}
