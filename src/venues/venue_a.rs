//! Venue-A adapter: RSA-PS256 signed REST over an integer-cent CLOB.
//!
//! The signer parses the private key PEM as PKCS1 and falls back to
//! PKCS8, signs `timestamp_ms + METHOD + path` (the body is always
//! signed as an empty string) with `BlindedSigningKey<Sha256>`, and
//! attaches it via the `KALSHI-ACCESS-*` headers.

use crate::config::VenueACredentials;
use crate::errors::ArbError;
use crate::model::{LadderLevel, NormalizedMarket, Quote, Side, Venue};
use crate::normalize::venue_a as normalize_venue_a;
use crate::venues::{OrderPlacement, VenueAdapter};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::HeaderMap;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::{BlindedSigningKey, Signature as PssSignature};
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

/// Holds the parsed RSA private key and signs requests.
#[derive(Clone)]
struct VenueASigner {
    key_id: String,
    signing_key: BlindedSigningKey<Sha256>,
}

impl std::fmt::Debug for VenueASigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueASigner").field("key_id", &self.key_id).field("signing_key", &"<redacted>").finish()
    }
}

impl VenueASigner {
    fn new(creds: &VenueACredentials) -> Result<Self, ArbError> {
        let pem = creds.private_key_pem.replace("\\n", "\n");
        let pem = pem.trim();

        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| ArbError::Auth { venue: Venue::A, status: 0, message: format!("invalid PEM: {e}") })?;

        Ok(Self { key_id: creds.key_id.clone(), signing_key: BlindedSigningKey::<Sha256>::new(private_key) })
    }

    fn sign_request(&self, method: &str, path: &str) -> (String, String) {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let path_clean = path.split('?').next().unwrap_or(path);
        let message = format!("{timestamp}{method}{path_clean}");

        let mut rng = rand::thread_rng();
        let signature: PssSignature = self.signing_key.sign_with_rng(&mut rng, message.as_bytes());
        let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());

        (timestamp, sig_b64)
    }

    fn headers(&self, method: &str, path: &str) -> Result<HeaderMap, ArbError> {
        let (timestamp, signature) = self.sign_request(method, path);
        let mut headers = HeaderMap::new();
        headers.insert(
            "KALSHI-ACCESS-KEY",
            self.key_id.parse().map_err(|_| ArbError::Validation { message: "invalid key id header".into() })?,
        );
        headers.insert(
            "KALSHI-ACCESS-TIMESTAMP",
            timestamp.parse().map_err(|_| ArbError::Validation { message: "invalid timestamp header".into() })?,
        );
        headers.insert(
            "KALSHI-ACCESS-SIGNATURE",
            signature.parse().map_err(|_| ArbError::Validation { message: "invalid signature header".into() })?,
        );
        Ok(headers)
    }
}

pub struct VenueAAdapter {
    client: reqwest::Client,
    base_url: String,
    path_prefix: String,
    signer: Option<VenueASigner>,
    scan_window_hours: i64,
    order_deadline: Duration,
    fill_deadline: Duration,
    balance_deadline: Duration,
}

impl VenueAAdapter {
    pub fn new(
        base_url: String,
        creds: Option<&VenueACredentials>,
        scan_window_hours: i64,
        order_deadline: Duration,
        fill_deadline: Duration,
        balance_deadline: Duration,
    ) -> Result<Self, ArbError> {
        let signer = creds.map(VenueASigner::new).transpose()?;
        let path_prefix = reqwest::Url::parse(&base_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            path_prefix,
            signer,
            scan_window_hours,
            order_deadline,
            fill_deadline,
            balance_deadline,
        })
    }

    fn signed_headers(&self, method: &str, path_suffix: &str) -> Result<HeaderMap, ArbError> {
        let signer = self.signer.as_ref().ok_or(ArbError::Auth { venue: Venue::A, status: 0, message: "no credentials configured".to_string() })?;
        let full_path = format!("{}{}", self.path_prefix, path_suffix);
        signer.headers(method, &full_path)
    }
}

#[derive(Debug, Deserialize)]
struct OrderbookResponse {
    orderbook: OrderbookSides,
}

#[derive(Debug, Deserialize)]
struct OrderbookSides {
    #[serde(default)]
    yes_asks: Vec<[i64; 2]>,
    #[serde(default)]
    no_asks: Vec<[i64; 2]>,
}

#[derive(Debug, Serialize)]
struct PlaceOrderRequest<'a> {
    ticker: &'a str,
    action: &'a str,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<i64>,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
    #[serde(default)]
    filled_count: i64,
    #[serde(default)]
    avg_fill_price: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    #[serde(default)]
    filled_count: i64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: i64,
}

/// Ascending-by-price raw levels reversed into the best-first canonical
/// ladder, since the venue defines "best ask" as the last element.
fn canonical_ladder(raw: &[[i64; 2]]) -> Vec<LadderLevel> {
    raw.iter().rev().map(|[price, size]| LadderLevel { price_cents: Decimal::from(*price), size: *size }).collect()
}

fn side_str(side: Side) -> &'static str {
    match side {
        Side::Yes => "yes",
        Side::No => "no",
    }
}

#[async_trait]
impl VenueAdapter for VenueAAdapter {
    fn name(&self) -> &'static str {
        "venue-a"
    }

    async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
        normalize_venue_a::fetch_normalized_markets(&self.client, &self.base_url, self.scan_window_hours).await
    }

    /// Always reads the orderbook endpoint: the summary endpoint's
    /// `yes_ask`/`no_ask` may be null and a null must never be treated
    /// as zero, and depth/ladder data for the book-walk only lives on
    /// the orderbook endpoint anyway.
    async fn get_quote(&self, market: &NormalizedMarket) -> Result<Quote, ArbError> {
        let url = format!("{}/markets/{}/orderbook", self.base_url, market.platform_id);
        let resp = self.client.get(&url).send().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;

        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit { venue: Venue::A });
        }
        if !resp.status().is_success() {
            return Err(ArbError::VenueProtocol { venue: Venue::A, message: format!("orderbook HTTP {}", resp.status()) });
        }

        let book: OrderbookResponse = resp.json().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;
        let yes_ladder = canonical_ladder(&book.orderbook.yes_asks);
        let no_ladder = canonical_ladder(&book.orderbook.no_asks);

        Ok(Quote {
            yes_ask_cents: yes_ladder.first().map(|l| l.price_cents),
            no_ask_cents: no_ladder.first().map(|l| l.price_cents),
            yes_depth: yes_ladder.first().map(|l| l.size).unwrap_or(0),
            no_depth: no_ladder.first().map(|l| l.size).unwrap_or(0),
            yes_ladder,
            no_ladder,
        })
    }

    async fn place_taker(&self, market: &NormalizedMarket, side: Side, units: i64, limit_price_cents: Decimal) -> Result<OrderPlacement, ArbError> {
        let path = "/portfolio/orders";
        let headers = self.signed_headers("POST", path)?;
        let body = PlaceOrderRequest {
            ticker: &market.platform_id,
            action: "buy",
            side: side_str(side),
            order_type: "limit",
            count: units,
            price: limit_price_cents.round().to_string().parse::<i64>().ok(),
            time_in_force: "immediate_or_cancel",
        };

        let url = format!("{}{path}", self.base_url);
        let resp = tokio::time::timeout(self.order_deadline, self.client.post(&url).headers(headers).json(&body).send())
            .await
            .map_err(|_| ArbError::Timeout { venue: Venue::A, deadline_ms: self.order_deadline.as_millis() as u64 })?
            .map_err(|source| ArbError::Transport { venue: Venue::A, source })?;

        if resp.status().as_u16() == 401 || resp.status().as_u16() == 403 {
            return Err(ArbError::Auth { venue: Venue::A, status: resp.status().as_u16(), message: "order rejected by auth".to_string() });
        }
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ArbError::OrderRejected { venue: Venue::A, message });
        }

        let parsed: PlaceOrderResponse = resp.json().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;
        debug!(order_id = %parsed.order_id, filled = parsed.filled_count, "venue-a order placed");
        Ok(OrderPlacement {
            order_id: parsed.order_id,
            filled_units: parsed.filled_count,
            avg_price_cents: parsed.avg_fill_price.map(Decimal::from).unwrap_or(limit_price_cents),
        })
    }

    async fn cancel(&self, order_id: &str) -> Result<(), ArbError> {
        let path = format!("/portfolio/orders/{order_id}");
        let headers = self.signed_headers("DELETE", &path)?;
        let url = format!("{}{path}", self.base_url);
        let resp = self.client.delete(&url).headers(headers).send().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(ArbError::VenueProtocol { venue: Venue::A, message: format!("cancel HTTP {}", resp.status()) });
        }
        Ok(())
    }

    async fn get_fill(&self, order_id: &str) -> Result<i64, ArbError> {
        let path = format!("/portfolio/orders/{order_id}");
        let headers = self.signed_headers("GET", &path)?;
        let url = format!("{}{path}", self.base_url);
        let resp = tokio::time::timeout(self.fill_deadline, self.client.get(&url).headers(headers).send())
            .await
            .map_err(|_| ArbError::Timeout { venue: Venue::A, deadline_ms: self.fill_deadline.as_millis() as u64 })?
            .map_err(|source| ArbError::Transport { venue: Venue::A, source })?;

        if !resp.status().is_success() {
            return Err(ArbError::VenueProtocol { venue: Venue::A, message: format!("order status HTTP {}", resp.status()) });
        }
        let parsed: OrderStatusResponse = resp.json().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;
        Ok(parsed.filled_count)
    }

    async fn get_balance(&self) -> Result<Decimal, ArbError> {
        let path = "/portfolio/balance";
        let headers = self.signed_headers("GET", path)?;
        let url = format!("{}{path}", self.base_url);
        let resp = tokio::time::timeout(self.balance_deadline, self.client.get(&url).headers(headers).send())
            .await
            .map_err(|_| ArbError::Timeout { venue: Venue::A, deadline_ms: self.balance_deadline.as_millis() as u64 })?
            .map_err(|source| ArbError::Transport { venue: Venue::A, source })?;

        if !resp.status().is_success() {
            return Err(ArbError::VenueProtocol { venue: Venue::A, message: format!("balance HTTP {}", resp.status()) });
        }
        let parsed: BalanceResponse = resp.json().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;
        Ok(Decimal::from(parsed.balance) / Decimal::from(100))
    }

    async fn sell_at_bid(&self, market: &NormalizedMarket, side: Side, units: i64) -> Result<OrderPlacement, ArbError> {
        let path = "/portfolio/orders";
        let headers = self.signed_headers("POST", path)?;
        let body = PlaceOrderRequest {
            ticker: &market.platform_id,
            action: "sell",
            side: side_str(side),
            order_type: "market",
            count: units,
            price: None,
            time_in_force: "immediate_or_cancel",
        };

        let url = format!("{}{path}", self.base_url);
        let resp = tokio::time::timeout(self.order_deadline, self.client.post(&url).headers(headers).json(&body).send())
            .await
            .map_err(|_| ArbError::Timeout { venue: Venue::A, deadline_ms: self.order_deadline.as_millis() as u64 })?
            .map_err(|source| ArbError::Transport { venue: Venue::A, source })?;

        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ArbError::OrderRejected { venue: Venue::A, message });
        }

        let parsed: PlaceOrderResponse = resp.json().await.map_err(|source| ArbError::Transport { venue: Venue::A, source })?;
        Ok(OrderPlacement {
            order_id: parsed.order_id,
            filled_units: parsed.filled_count,
            avg_price_cents: parsed.avg_fill_price.map(Decimal::from).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;

    fn test_signer() -> VenueASigner {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("keygen");
        let pem = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).expect("pem encode");
        VenueASigner::new(&VenueACredentials { key_id: "test-key".to_string(), private_key_pem: pem.to_string() }).unwrap()
    }

    #[test]
    fn sign_request_produces_numeric_timestamp_and_256_byte_signature() {
        let signer = test_signer();
        let (ts, sig) = signer.sign_request("GET", "/trade-api/v2/portfolio/balance?foo=bar");
        assert!(ts.parse::<i64>().is_ok());
        let decoded = base64::engine::general_purpose::STANDARD.decode(&sig).unwrap();
        assert_eq!(decoded.len(), 256);
    }

    #[test]
    fn sign_request_strips_query_params_before_signing() {
        let signer = test_signer();
        let (_, sig1) = signer.sign_request("GET", "/trade-api/v2/portfolio/orders");
        let (_, sig2) = signer.sign_request("GET", "/trade-api/v2/portfolio/orders?limit=5");
        let d1 = base64::engine::general_purpose::STANDARD.decode(&sig1).unwrap();
        let d2 = base64::engine::general_purpose::STANDARD.decode(&sig2).unwrap();
        assert_eq!(d1.len(), 256);
        assert_eq!(d2.len(), 256);
    }

    #[test]
    fn ladder_reverses_ascending_array_to_best_first() {
        let raw = [[30, 5], [32, 3], [35, 1]];
        let ladder = canonical_ladder(&raw);
        assert_eq!(ladder[0].price_cents, Decimal::from(35));
        assert_eq!(ladder.last().unwrap().price_cents, Decimal::from(30));
    }
}
