//! Team-name normalization and map/game number extraction.

use regex::Regex;
use std::sync::OnceLock;

const STOPWORDS: &[&str] = &["team", "esports", "gaming", "fc", "sc", "the"];

fn strip_punctuation(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_punctuation() { ' ' } else { c })
        .collect()
}

/// Drop a trailing token if it is purely numeric, e.g. `["cloud9",
/// "2"]` -> `["cloud9"]`. Operates on the token list, before
/// concatenation removes the word boundary the suffix is anchored to.
fn strip_trailing_numeric_suffix<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    match tokens.split_last() {
        Some((last, rest)) if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) => {
            rest.to_vec()
        }
        _ => tokens.to_vec(),
    }
}

/// Lowercase, strip punctuation, tokenize, drop stopwords, strip a
/// trailing numeric suffix, concatenate. Falls back to the pre-filter
/// token list if stopword filtering would empty the string, so
/// identifiers like "m80" or "g2" survive.
pub fn normalize_team_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let unpunctuated = strip_punctuation(&lowered);
    let tokens: Vec<&str> = unpunctuated.split_whitespace().collect();

    let filtered: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !STOPWORDS.contains(t))
        .collect();

    let chosen = if filtered.is_empty() { tokens } else { filtered };
    let suffix_stripped = strip_trailing_numeric_suffix(&chosen);
    suffix_stripped.concat()
}

fn map_game_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:map|game)\s+(\d+)\b").expect("map/game regex is valid")
    })
}

/// Extract a map/game number from free text. Must not match "2.5 maps"
/// or "over N maps" — the regex only matches `map`/`game` followed by
/// whitespace and an integer, so a leading "over" or trailing "s"
/// plural never satisfies the `\b(?:map|game)\s+(\d+)\b` pattern.
pub fn extract_map_game_number(text: &str) -> Option<i32> {
    map_game_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_trailing_number() {
        assert_eq!(normalize_team_name("Cloud9 2"), "cloud9");
        assert_eq!(normalize_team_name("Team Liquid"), "liquid");
    }

    #[test]
    fn falls_back_to_prefilter_tokens_when_empty() {
        // "m80" alone is not a stopword, but verify a pure-stopword
        // input still yields something rather than empty.
        assert_eq!(normalize_team_name("Team"), "team");
        assert_eq!(normalize_team_name("FC SC"), "fcsc");
    }

    #[test]
    fn preserves_short_identifiers() {
        assert_eq!(normalize_team_name("M80"), "m80");
        assert_eq!(normalize_team_name("G2"), "g2");
    }

    #[test]
    fn idempotent() {
        for input in ["Cloud9 2", "Team Liquid", "G2 Esports", "NAVI"] {
            let once = normalize_team_name(input);
            let twice = normalize_team_name(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn map_number_extraction() {
        assert_eq!(extract_map_game_number("Map 2 winner"), Some(2));
        assert_eq!(extract_map_game_number("Game 3 - will X win"), Some(3));
        assert_eq!(extract_map_game_number("2.5 maps total"), None);
        assert_eq!(extract_map_game_number("over 2 maps"), None);
        assert_eq!(extract_map_game_number("series winner"), None);
    }
}
