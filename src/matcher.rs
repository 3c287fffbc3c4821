//! Cross-venue pair matching: the 6-criterion sports join and
//! the 4-criterion (feature-flagged) crypto join, with exclusive
//! pairing and rejection-reason recording for observability.

use crate::model::{AssetClass, MatchedPair, NormalizedMarket, SportSubtype};
use chrono::Duration;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    DateGap,
    OpponentMismatch,
    SubtypeMismatch,
    MapNumberMismatch,
    ThresholdMismatch,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectionReason::DateGap => "date_gap",
            RejectionReason::OpponentMismatch => "opponent_mismatch",
            RejectionReason::SubtypeMismatch => "subtype_mismatch",
            RejectionReason::MapNumberMismatch => "map_number_mismatch",
            RejectionReason::ThresholdMismatch => "threshold_mismatch",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Rejection {
    pub b_platform_id: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    pub pairs: Vec<MatchedPair>,
    pub rejections: Vec<Rejection>,
}

/// Run the matcher over the two venues' normalized markets. Crypto
/// matching only runs when `crypto_matching_enabled` is set.
pub fn match_markets(
    venue_a: &[NormalizedMarket],
    venue_b: &[NormalizedMarket],
    t_sports_hours: i64,
    t_crypto_hours: i64,
    crypto_matching_enabled: bool,
) -> MatchReport {
    let mut report = MatchReport::default();
    let mut consumed_a: Vec<bool> = vec![false; venue_a.len()];

    let sports_a: Vec<(usize, &NormalizedMarket)> = venue_a
        .iter()
        .enumerate()
        .filter(|(_, m)| m.asset_class == AssetClass::Sports)
        .collect();
    let mut sports_buckets: HashMap<(String, String, SportSubtype), Vec<usize>> = HashMap::new();
    for (idx, m) in &sports_a {
        if let (Some(sport), Some(team), Some(subtype)) = (&m.sport, &m.team, m.sport_subtype) {
            sports_buckets
                .entry((sport.clone(), team.clone(), subtype))
                .or_default()
                .push(*idx);
        }
    }

    let crypto_a: Vec<(usize, &NormalizedMarket)> = venue_a
        .iter()
        .enumerate()
        .filter(|(_, m)| m.asset_class == AssetClass::Crypto)
        .collect();
    let mut crypto_buckets: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (idx, m) in &crypto_a {
        if let (Some(asset), Some(direction)) = (&m.crypto_asset, m.direction) {
            crypto_buckets
                .entry((asset.clone(), format!("{direction:?}")))
                .or_default()
                .push(*idx);
        }
    }

    let t_sports = Duration::hours(t_sports_hours);
    let t_crypto = Duration::hours(t_crypto_hours);

    for b in venue_b {
        match b.asset_class {
            AssetClass::Sports => {
                let (Some(sport), Some(team), Some(subtype)) = (&b.sport, &b.team, b.sport_subtype) else {
                    continue;
                };
                let Some(candidates) = sports_buckets.get(&(sport.clone(), team.clone(), subtype)) else {
                    continue;
                };
                try_match_sports(candidates, venue_a, b, t_sports, &mut consumed_a, &mut report);
            }
            AssetClass::Crypto => {
                if !crypto_matching_enabled {
                    continue;
                }
                let (Some(asset), Some(direction)) = (&b.crypto_asset, b.direction) else {
                    continue;
                };
                let Some(candidates) = crypto_buckets.get(&(asset.clone(), format!("{direction:?}"))) else {
                    continue;
                };
                try_match_crypto(candidates, venue_a, b, t_crypto, &mut consumed_a, &mut report);
            }
        }
    }

    info!(
        pairs = report.pairs.len(),
        rejections = report.rejections.len(),
        "matcher cycle complete"
    );
    report
}

fn try_match_sports(
    candidates: &[usize],
    venue_a: &[NormalizedMarket],
    b: &NormalizedMarket,
    t_sports: Duration,
    consumed_a: &mut [bool],
    report: &mut MatchReport,
) {
    for &idx in candidates {
        if consumed_a[idx] {
            continue;
        }
        let a = &venue_a[idx];

        if a.opponent != b.opponent {
            report.rejections.push(Rejection { b_platform_id: b.platform_id.clone(), reason: RejectionReason::OpponentMismatch });
            continue;
        }
        if a.sport_subtype != b.sport_subtype {
            report.rejections.push(Rejection { b_platform_id: b.platform_id.clone(), reason: RejectionReason::SubtypeMismatch });
            continue;
        }
        if let (Some(ma), Some(mb)) = (a.map_number, b.map_number) {
            if ma != mb {
                report.rejections.push(Rejection { b_platform_id: b.platform_id.clone(), reason: RejectionReason::MapNumberMismatch });
                continue;
            }
        }
        if (a.resolution_dt - b.resolution_dt).abs() > t_sports {
            report.rejections.push(Rejection { b_platform_id: b.platform_id.clone(), reason: RejectionReason::DateGap });
            continue;
        }

        consumed_a[idx] = true;
        report.pairs.push(MatchedPair { a: a.clone(), b: b.clone() });
        return;
    }
}

fn try_match_crypto(
    candidates: &[usize],
    venue_a: &[NormalizedMarket],
    b: &NormalizedMarket,
    t_crypto: Duration,
    consumed_a: &mut [bool],
    report: &mut MatchReport,
) {
    for &idx in candidates {
        if consumed_a[idx] {
            continue;
        }
        let a = &venue_a[idx];

        if a.threshold != b.threshold {
            report.rejections.push(Rejection { b_platform_id: b.platform_id.clone(), reason: RejectionReason::ThresholdMismatch });
            continue;
        }
        if (a.resolution_dt - b.resolution_dt).abs() > t_crypto {
            report.rejections.push(Rejection { b_platform_id: b.platform_id.clone(), reason: RejectionReason::DateGap });
            continue;
        }

        consumed_a[idx] = true;
        report.pairs.push(MatchedPair { a: a.clone(), b: b.clone() });
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Venue};
    use chrono::Utc;

    fn sports_market(venue: Venue, id: &str, team: &str, opponent: &str, subtype: SportSubtype, map: Option<i32>, dt_offset_min: i64) -> NormalizedMarket {
        NormalizedMarket {
            venue,
            platform_id: id.to_string(),
            asset_class: AssetClass::Sports,
            sport: Some("CS2".to_string()),
            team: Some(team.to_string()),
            opponent: Some(opponent.to_string()),
            sport_subtype: Some(subtype),
            map_number: map,
            crypto_asset: None,
            direction: None,
            threshold: None,
            resolution_dt: Utc::now() + Duration::minutes(dt_offset_min),
            yes_token: "y".to_string(),
            no_token: "n".to_string(),
            raw_title: id.to_string(),
        }
    }

    #[test]
    fn matches_within_tolerance_and_is_exclusive() {
        let a = vec![sports_market(Venue::A, "a1", "drx", "t1", SportSubtype::Series, None, 0)];
        let b = vec![
            sports_market(Venue::B, "b1", "drx", "t1", SportSubtype::Series, None, 10),
            sports_market(Venue::B, "b2", "drx", "t1", SportSubtype::Series, None, 20),
        ];
        let report = match_markets(&a, &b, 4, 1, false);
        assert_eq!(report.pairs.len(), 1);
        assert_eq!(report.pairs[0].b.platform_id, "b1");
    }

    #[test]
    fn rejects_on_opponent_mismatch() {
        let a = vec![sports_market(Venue::A, "a1", "drx", "t1", SportSubtype::Series, None, 0)];
        let b = vec![sports_market(Venue::B, "b1", "drx", "geng", SportSubtype::Series, None, 0)];
        let report = match_markets(&a, &b, 4, 1, false);
        assert!(report.pairs.is_empty());
        assert!(report.rejections.iter().any(|r| r.reason == RejectionReason::OpponentMismatch));
    }

    #[test]
    fn rejects_on_map_number_mismatch_when_both_present() {
        let a = vec![sports_market(Venue::A, "a1", "drx", "t1", SportSubtype::Map, Some(2), 0)];
        let b = vec![sports_market(Venue::B, "b1", "drx", "t1", SportSubtype::Map, Some(3), 0)];
        let report = match_markets(&a, &b, 4, 1, false);
        assert!(report.pairs.is_empty());
    }

    #[test]
    fn map_number_criterion_skipped_when_one_side_absent() {
        let a = vec![sports_market(Venue::A, "a1", "drx", "t1", SportSubtype::Map, None, 0)];
        let b = vec![sports_market(Venue::B, "b1", "drx", "t1", SportSubtype::Map, Some(3), 0)];
        let report = match_markets(&a, &b, 4, 1, false);
        assert_eq!(report.pairs.len(), 1);
    }

    #[test]
    fn rejects_outside_date_tolerance() {
        let a = vec![sports_market(Venue::A, "a1", "drx", "t1", SportSubtype::Series, None, 0)];
        let b = vec![sports_market(Venue::B, "b1", "drx", "t1", SportSubtype::Series, None, 5 * 60)];
        let report = match_markets(&a, &b, 4, 1, false);
        assert!(report.pairs.is_empty());
    }

    #[test]
    fn crypto_disabled_by_default_even_when_criteria_match() {
        let mut a = sports_market(Venue::A, "a1", "", "", SportSubtype::Series, None, 0);
        a.asset_class = AssetClass::Crypto;
        a.sport = None;
        a.team = None;
        a.opponent = None;
        a.sport_subtype = None;
        a.crypto_asset = Some("BTC".to_string());
        a.direction = Some(Direction::Above);
        a.threshold = Some(rust_decimal_macros::dec!(75000));

        let mut b = a.clone();
        b.venue = Venue::B;
        b.platform_id = "b1".to_string();

        let report = match_markets(&[a], &[b], 4, 1, false);
        assert!(report.pairs.is_empty());
    }

    #[test]
    fn crypto_matches_when_enabled() {
        let mut a = sports_market(Venue::A, "a1", "", "", SportSubtype::Series, None, 0);
        a.asset_class = AssetClass::Crypto;
        a.sport = None;
        a.team = None;
        a.opponent = None;
        a.sport_subtype = None;
        a.crypto_asset = Some("BTC".to_string());
        a.direction = Some(Direction::Above);
        a.threshold = Some(rust_decimal_macros::dec!(75000));

        let mut b = a.clone();
        b.venue = Venue::B;
        b.platform_id = "b1".to_string();

        let report = match_markets(&[a], &[b], 4, 1, true);
        assert_eq!(report.pairs.len(), 1);
    }
}
