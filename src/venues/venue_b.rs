//! Venue-B adapter: token CLOB accessed over HTTP, orders signed with an
//! asymmetric wallet key and placed via a proxy maker address.
//!
//! Listing and quoting go over plain `reqwest` against the Gamma/CLOB
//! REST surface; order placement goes through `PrivateKeySigner` and
//! `polymarket_client_sdk::clob::Client`, with the maker set to the
//! funder address and the signer to the private-key address.

use crate::config::VenueBCredentials;
use crate::errors::ArbError;
use crate::model::{LadderLevel, NormalizedMarket, Quote, Side, Venue};
use crate::normalize::venue_b as normalize_venue_b;
use crate::venues::{OrderPlacement, VenueAdapter};
use alloy::primitives::Address;
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use polymarket_client_sdk::clob::types::{
    request::GetBalanceAllowanceRequest,
    AssetType, Amount, OrderType as ClobOrderType, Side as ClobSide, SignatureType,
};
use polymarket_client_sdk::clob::{Client as ClobClient, Config as ClobConfig};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const POLYGON_CHAIN_ID: u64 = 137;
const CLOB_ENDPOINT: &str = "https://clob.polymarket.com";

#[derive(Debug, Deserialize)]
struct BookLevel {
    price: String,
    size: String,
}

/// `/clob/book` asks are sorted descending by price: the best ask is the
/// last element. Reversing yields the canonical best-first ladder every
/// other module expects.
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    asks: Vec<BookLevel>,
}

fn canonical_ladder(descending: &[BookLevel]) -> Vec<LadderLevel> {
    descending
        .iter()
        .rev()
        .filter_map(|lvl| {
            let price = Decimal::from_str(&lvl.price).ok()?;
            let size = Decimal::from_str(&lvl.size).ok()?.round().to_string().parse::<i64>().ok()?;
            Some(LadderLevel { price_cents: price * Decimal::from(100), size })
        })
        .collect()
}

pub struct VenueBAdapter {
    client: reqwest::Client,
    base_url: String,
    creds: Option<VenueBCredentials>,
    scan_window_hours: i64,
    quote_deadline: Duration,
    order_deadline: Duration,
    balance_deadline: Duration,
}

impl VenueBAdapter {
    pub fn new(
        base_url: String,
        creds: Option<&VenueBCredentials>,
        scan_window_hours: i64,
        quote_deadline: Duration,
        order_deadline: Duration,
        balance_deadline: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            creds: creds.cloned(),
            scan_window_hours,
            quote_deadline,
            order_deadline,
            balance_deadline,
        }
    }

    fn signer(&self) -> Result<PrivateKeySigner, ArbError> {
        let creds = self.creds.as_ref().ok_or(ArbError::Auth {
            venue: Venue::B,
            status: 0,
            message: "no credentials configured".to_string(),
        })?;
        let signer: PrivateKeySigner = creds
            .private_key
            .parse()
            .map_err(|_| ArbError::Auth { venue: Venue::B, status: 0, message: "invalid private key".to_string() })?;
        Ok(signer.with_chain_id(Some(POLYGON_CHAIN_ID)))
    }

    /// Authenticate against the CLOB. When `api_key`/`api_secret` are
    /// absent the SDK derives them from the wallet signature at a fixed
    /// nonce. Signature type is always proxy: the funder address holds
    /// the balance, the wallet key only signs.
    async fn authenticated_client(&self) -> Result<ClobClient, ArbError> {
        let creds = self.creds.as_ref().ok_or(ArbError::Auth {
            venue: Venue::B,
            status: 0,
            message: "no credentials configured".to_string(),
        })?;
        let signer = self.signer()?;
        let clob_config = ClobConfig::builder().use_server_time(true).build();

        let mut builder = ClobClient::new(CLOB_ENDPOINT, clob_config)
            .map_err(|e| ArbError::VenueProtocol { venue: Venue::B, message: format!("clob client init: {e}") })?
            .authentication_builder(&signer)
            .signature_type(SignatureType::Proxy);

        if let Some(funder) = &creds.funder {
            let funder_addr = Address::from_str(funder)
                .map_err(|_| ArbError::Validation { message: "invalid VENUE_B_FUNDER address".to_string() })?;
            builder = builder.funder(funder_addr);
        }

        builder
            .authenticate()
            .await
            .map_err(|e| ArbError::Auth { venue: Venue::B, status: 0, message: format!("clob authenticate: {e}") })
    }
}

#[async_trait]
impl VenueAdapter for VenueBAdapter {
    fn name(&self) -> &'static str {
        "venue-b"
    }

    async fn list_markets(&self) -> Result<Vec<NormalizedMarket>, ArbError> {
        normalize_venue_b::fetch_normalized_markets(&self.client, &self.base_url, self.scan_window_hours).await
    }

    /// `platform_id` here is a `yes_token`/`no_token` handle (expanded
    /// team markets carry `::team` suffixes on `platform_id` but the
    /// token ids themselves are venue-native, so callers always quote by
    /// token, never by `platform_id`).
    /// Venue B quotes `yes_token` and `no_token` as two independent
    /// books; merge both fetches into one `Quote` the way venue A's
    /// single orderbook call already does.
    async fn get_quote(&self, market: &NormalizedMarket) -> Result<Quote, ArbError> {
        let yes_ladder = self.get_token_quote(&market.yes_token).await?;
        let no_ladder = self.get_token_quote(&market.no_token).await?;
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
        let client = self.authenticated_client().await?;
        let signer = self.signer()?;

        let platform_id = match side {
            Side::Yes => &market.yes_token,
            Side::No => &market.no_token,
        };
        let token_id = alloy::primitives::U256::from_str_radix(platform_id, 10)
            .map_err(|_| ArbError::Validation { message: format!("venue-b token id not numeric: {platform_id}") })?;

        let price = (limit_price_cents / Decimal::from(100)).round_dp(6);
        let usdc_amount = (price * Decimal::from(units)).round_dp(6);

        let clob_side = match side {
            Side::Yes | Side::No => ClobSide::Buy,
        };

        let order = tokio::time::timeout(self.order_deadline, async {
            client
                .market_order()
                .token_id(token_id)
                .amount(Amount::usdc(usdc_amount).map_err(|e| format!("{e}"))?)
                .side(clob_side)
                .order_type(ClobOrderType::FOK)
                .build()
                .await
                .map_err(|e| format!("{e}"))
        })
        .await
        .map_err(|_| ArbError::Timeout { venue: Venue::B, deadline_ms: self.order_deadline.as_millis() as u64 })?
        .map_err(|message| ArbError::OrderRejected { venue: Venue::B, message })?;

        let signed = client
            .sign(&signer, order)
            .await
            .map_err(|e| ArbError::OrderRejected { venue: Venue::B, message: format!("sign: {e}") })?;

        let response = client
            .post_order(signed)
            .await
            .map_err(|e| ArbError::OrderRejected { venue: Venue::B, message: format!("post_order: {e}") })?;

        debug!(?response, "venue-b FOK order submitted");
        Ok(OrderPlacement {
            order_id: format!("{response:?}"),
            filled_units: units,
            avg_price_cents: limit_price_cents,
        })
    }

    async fn cancel(&self, _order_id: &str) -> Result<(), ArbError> {
        // FOK orders never rest; nothing to cancel on venue B.
        Ok(())
    }

    async fn get_fill(&self, _order_id: &str) -> Result<i64, ArbError> {
        // FOK semantics: `place_taker`'s response already carries the
        // final fill count, so a separate fill check is unused for venue B.
        Err(ArbError::VenueProtocol { venue: Venue::B, message: "venue-b orders are FOK; fill state is returned at placement".to_string() })
    }

    async fn get_balance(&self) -> Result<Decimal, ArbError> {
        let client = self.authenticated_client().await?;
        let req = GetBalanceAllowanceRequest::builder().asset_type(AssetType::Collateral).build();

        let resp = tokio::time::timeout(self.balance_deadline, client.get_balance_allowance(req))
            .await
            .map_err(|_| ArbError::Timeout { venue: Venue::B, deadline_ms: self.balance_deadline.as_millis() as u64 })?
            .map_err(|e| ArbError::VenueProtocol { venue: Venue::B, message: format!("balance-allowance: {e}") })?;

        let raw = Decimal::from_str(&resp.balance.to_string())
            .map_err(|_| ArbError::VenueProtocol { venue: Venue::B, message: "unparseable balance".to_string() })?;
        Ok(raw / Decimal::from(1_000_000))
    }

    async fn sell_at_bid(&self, market: &NormalizedMarket, side: Side, units: i64) -> Result<OrderPlacement, ArbError> {
        let client = self.authenticated_client().await?;
        let signer = self.signer()?;
        let platform_id = match side {
            Side::Yes => &market.yes_token,
            Side::No => &market.no_token,
        };
        let token_id = alloy::primitives::U256::from_str_radix(platform_id, 10)
            .map_err(|_| ArbError::Validation { message: format!("venue-b token id not numeric: {platform_id}") })?;

        let order = client
            .market_order()
            .token_id(token_id)
            .amount(Amount::shares(Decimal::from(units)).map_err(|e| ArbError::OrderRejected { venue: Venue::B, message: format!("{e}") })?)
            .side(ClobSide::Sell)
            .order_type(ClobOrderType::FOK)
            .build()
            .await
            .map_err(|e| ArbError::OrderRejected { venue: Venue::B, message: format!("{e}") })?;

        let signed = client
            .sign(&signer, order)
            .await
            .map_err(|e| ArbError::OrderRejected { venue: Venue::B, message: format!("sign: {e}") })?;
        let response = client
            .post_order(signed)
            .await
            .map_err(|e| ArbError::OrderRejected { venue: Venue::B, message: format!("post_order: {e}") })?;

        Ok(OrderPlacement { order_id: format!("{response:?}"), filled_units: units, avg_price_cents: Decimal::ZERO })
    }
}

impl VenueBAdapter {
    /// Fetch the canonical best-first ladder for a single token id. The
    /// fan-out builds a `Quote` by calling this once for `yes_token` and
    /// once for `no_token` and merging the results, since venue-B quotes
    /// one ask-book per token rather than a yes/no pair in one response.
    pub async fn get_token_quote(&self, token_id: &str) -> Result<Vec<LadderLevel>, ArbError> {
        let url = format!("{}/clob/book?token_id={}", self.base_url, token_id);
        let resp = tokio::time::timeout(self.quote_deadline, self.client.get(&url).send())
            .await
            .map_err(|_| ArbError::Timeout { venue: Venue::B, deadline_ms: self.quote_deadline.as_millis() as u64 })?
            .map_err(|source| ArbError::Transport { venue: Venue::B, source })?;

        if resp.status().as_u16() == 429 {
            return Err(ArbError::RateLimit { venue: Venue::B });
        }
        if !resp.status().is_success() {
            return Err(ArbError::VenueProtocol { venue: Venue::B, message: format!("book HTTP {}", resp.status()) });
        }

        let book: BookResponse = resp.json().await.map_err(|source| ArbError::Transport { venue: Venue::B, source })?;
        Ok(canonical_ladder(&book.asks))
    }
}
