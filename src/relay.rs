//! Session-offer relay
//!
//! Forwards `{prompt, offer}` to `{endpoint}/offer` and normalizes the
//! outcome. Upstream JSON answers pass through with their status untouched;
//! every relay-local failure collapses into one opaque 500 answer.

use crate::config::RelayConfig;
use crate::errors::{ErrorKind, RelayError};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Status reserved for relay-local failures
pub const RELAY_FAILURE_STATUS: u16 = 500;
/// Error text of the opaque failure body
pub const RELAY_FAILURE_MESSAGE: &str = "Failed to process the offer";

/// Inbound relay request
///
/// `prompt` and `offer` distinguish an absent key (`None`) from an explicit
/// `null` (`Some(Value::Null)`); only absent keys are left out upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRequest {
    /// Base URL of the remote endpoint; `/offer` is appended
    pub endpoint: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub offer: Option<Value>,
}

impl OfferRequest {
    pub fn new(endpoint: impl Into<String>, prompt: Option<Value>, offer: Option<Value>) -> Self {
        Self {
            endpoint: endpoint.into(),
            prompt,
            offer,
        }
    }

    pub fn offer_url(&self) -> String {
        format!("{}/offer", self.endpoint)
    }
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Outbound body
#[derive(Serialize)]
struct OfferPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offer: Option<&'a Value>,
}

/// Outcome of one relay attempt
#[derive(Debug, Clone, PartialEq)]
pub enum OfferResult {
    /// Upstream answered with JSON; status and body are upstream's own
    Answered { status: u16, body: Value },
    Failed { kind: ErrorKind, message: String },
}

impl OfferResult {
    pub fn is_answered(&self) -> bool {
        matches!(self, OfferResult::Answered { .. })
    }

    /// The fixed body returned for every relay-local failure
    pub fn failure_body() -> Value {
        json!({ "error": RELAY_FAILURE_MESSAGE })
    }

    /// Status and body as the relay's caller should see them.
    pub fn into_parts(self) -> (u16, Value) {
        match self {
            OfferResult::Answered { status, body } => (status, body),
            OfferResult::Failed { .. } => (RELAY_FAILURE_STATUS, Self::failure_body()),
        }
    }
}

impl From<RelayError> for OfferResult {
    fn from(err: RelayError) -> Self {
        OfferResult::Failed {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Stateless HTTP relay. Clones share one connection pool.
#[derive(Clone, Debug)]
pub struct NegotiationRelay {
    http: Client,
}

impl Default for NegotiationRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiationRelay {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(ms) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let http = builder
            .build()
            .map_err(|e| RelayError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Forward one offer. Exactly one upstream attempt is made.
    pub async fn relay(&self, request: &OfferRequest) -> OfferResult {
        match self.exchange(request).await {
            Ok((status, body)) => {
                log::info!("Offer relayed to {} (status {})", request.endpoint, status);
                OfferResult::Answered { status, body }
            }
            Err(err) => {
                log::error!("Error during fetch to {}: {}", request.endpoint, err);
                err.into()
            }
        }
    }

    async fn exchange(&self, request: &OfferRequest) -> Result<(u16, Value), RelayError> {
        let url = reqwest::Url::parse(&request.offer_url()).map_err(|e| {
            RelayError::invalid_endpoint(format!("{}: {}", request.offer_url(), e))
        })?;

        let payload = OfferPayload {
            prompt: request.prompt.as_ref(),
            offer: request.offer.as_ref(),
        };

        log::debug!("POST {}", url);
        let res = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::transport(e.to_string()))?;

        let status = res.status().as_u16();
        if !is_json(res.headers()) {
            return Err(RelayError::upstream_protocol(format!(
                "Expected JSON, but got non-JSON response (status {}, content-type {:?})",
                status,
                res.headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
            )));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| RelayError::transport(format!("failed to read response body: {e}")))?;
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| RelayError::malformed_body(format!("invalid JSON body: {e}")))?;

        Ok((status, body))
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}
