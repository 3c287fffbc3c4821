//! Error taxonomy for venue I/O, matching, and execution: one enum, a
//! retryability predicate, and enough context to log a useful line
//! without unwinding the whole call stack.

use crate::model::Venue;
use thiserror::Error;

/// The full error taxonomy named in the error-handling design.
#[derive(Debug, Error)]
pub enum ArbError {
    #[error("[{venue}] transport error: {source}")]
    Transport {
        venue: Venue,
        #[source]
        source: reqwest::Error,
    },

    #[error("[{venue}] rate limited (429)")]
    RateLimit { venue: Venue },

    #[error("[{venue}] auth failed ({status}): {message}")]
    Auth {
        venue: Venue,
        status: u16,
        message: String,
    },

    #[error("[{venue}] unexpected response schema: {message}")]
    VenueProtocol { venue: Venue, message: String },

    #[error("[{venue}] order rejected: {message}")]
    OrderRejected { venue: Venue, message: String },

    #[error("[{venue}] insufficient liquidity after book walk (requested {requested_units} units)")]
    InsufficientLiquidity { venue: Venue, requested_units: i64 },

    #[error("[{venue}] balance too low: have {have}, need {need}")]
    BalanceLow {
        venue: Venue,
        have: rust_decimal::Decimal,
        need: rust_decimal::Decimal,
    },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("[{venue}] call timed out after {deadline_ms}ms")]
    Timeout { venue: Venue, deadline_ms: u64 },
}

impl ArbError {
    /// Quote-side transport and rate-limit failures are safe to retry;
    /// everything else (auth, protocol, rejection, balance, validation)
    /// is a terminal condition for the call that produced it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ArbError::Transport { .. } | ArbError::RateLimit { .. } | ArbError::Timeout { .. })
    }

    pub fn venue(&self) -> Option<Venue> {
        match self {
            ArbError::Transport { venue, .. }
            | ArbError::RateLimit { venue }
            | ArbError::Auth { venue, .. }
            | ArbError::VenueProtocol { venue, .. }
            | ArbError::OrderRejected { venue, .. }
            | ArbError::InsufficientLiquidity { venue, .. }
            | ArbError::BalanceLow { venue, .. }
            | ArbError::Timeout { venue, .. } => Some(*venue),
            ArbError::Validation { .. } => None,
        }
    }

    /// True for 401/403-class failures, which per the error design
    /// pause the executor for that venue until restart.
    pub fn is_fatal_for_venue(&self) -> bool {
        matches!(self, ArbError::Auth { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_transport_are_retryable() {
        assert!(ArbError::RateLimit { venue: Venue::A }.is_retryable());
        assert!(ArbError::Timeout { venue: Venue::B, deadline_ms: 2000 }.is_retryable());
    }

    #[test]
    fn auth_is_fatal_and_not_retryable() {
        let e = ArbError::Auth { venue: Venue::A, status: 401, message: "bad key".into() };
        assert!(e.is_fatal_for_venue());
        assert!(!e.is_retryable());
    }

    #[test]
    fn validation_has_no_venue() {
        let e = ArbError::Validation { message: "spread negative".into() };
        assert_eq!(e.venue(), None);
    }
}
