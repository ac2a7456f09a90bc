//! Payment Event Normalizer
//!
//! Turns a raw provider webhook into a [`PaymentEvent`]. Pure: no store
//! access, logging only.
//!
//! Provider payloads come in several shapes. The payment data object is the
//! first of `data.attributes`, `data`, `attributes`, or the payload root;
//! the amount is `amount` or `amount_received` on that object, falling back
//! to the root `amount`. Amounts are minor units and are converted exactly
//! once, here.
//!
//! Signatures: with a secret configured, a request that carries no
//! signature header at all is rejected as `InvalidSignature` (a 401 at the
//! endpoint); only an unset secret lets unsigned requests through. The hex
//! digest is decoded case-insensitively, so an uppercase signature verifies.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::str::FromStr;
use tracing::{debug, warn};

use core_kernel::{Currency, Money};

use crate::error::NormalizationError;

type HmacSha256 = Hmac<Sha256>;

/// Header names that may carry the signature, checked in order
pub const SIGNATURE_HEADERS: [&str; 3] = [
    "payrex-signature",
    "x-payrex-signature",
    "x-webhook-signature",
];

/// A canonical payment notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Deduplication key
    pub event_id: String,
    /// True when the provider sent no id and one was generated; such
    /// events cannot be deduplicated across redeliveries
    pub id_generated: bool,
    pub event_type: Option<String>,
    /// Amount in major units
    pub amount: Money,
}

impl PaymentEvent {
    /// A synthetic event with a generated id
    pub fn synthetic(prefix: &str, amount: Money) -> Self {
        Self {
            event_id: format!("{}_{}", prefix, Utc::now().timestamp_millis()),
            id_generated: true,
            event_type: Some("test".to_string()),
            amount,
        }
    }
}

/// HMAC-SHA256 signature check over the raw body
///
/// With no secret configured every request passes. That is a known gap:
/// production deployments must set the secret.
#[derive(Clone, Default)]
pub struct SignatureVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Accepts plain hex or `sha256=<hex>`; comparison is constant time
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), NormalizationError> {
        let secret = match &self.secret {
            Some(secret) => secret,
            None => return Ok(()),
        };
        let provided = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(NormalizationError::InvalidSignature)?;
        let provided_hex = provided.strip_prefix("sha256=").unwrap_or(provided);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| NormalizationError::InvalidSignature)?;
        mac.update(body);

        let provided_bytes = match hex::decode(provided_hex) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!(received_prefix = %prefix(provided_hex), "signature is not hex");
                return Err(NormalizationError::InvalidSignature);
            }
        };
        mac.verify_slice(&provided_bytes).map_err(|_| {
            warn!(
                expected_prefix = %prefix(&sign(secret, body)),
                received_prefix = %prefix(provided_hex),
                "signature mismatch"
            );
            NormalizationError::InvalidSignature
        })
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn prefix(s: &str) -> &str {
    s.get(..8).unwrap_or(s)
}

/// Parses provider webhooks into [`PaymentEvent`]s
#[derive(Debug, Clone)]
pub struct Normalizer {
    verifier: SignatureVerifier,
    currency: Currency,
}

impl Normalizer {
    pub fn new(verifier: SignatureVerifier, currency: Currency) -> Self {
        Self { verifier, currency }
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    pub fn normalize(&self, body: &[u8], signature: Option<&str>) -> Result<PaymentEvent, NormalizationError> {
        self.verifier.verify(body, signature)?;

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| NormalizationError::BadPayload(e.to_string()))?;
        if !payload.is_object() {
            return Err(NormalizationError::BadPayload("expected a JSON object".to_string()));
        }

        let (event_id, id_generated) = match extract_event_id(&payload) {
            Some(id) => (id, false),
            None => {
                let id = format!("evt_{}", Utc::now().timestamp_millis());
                warn!(event_id = %id, "webhook has no event id, generated one");
                (id, true)
            }
        };

        let minor = extract_minor_amount(&payload)?;
        let amount = Money::from_minor_decimal(minor, self.currency);
        let event_type = ["type", "event"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        debug!(%event_id, %amount, ?event_type, "webhook normalized");
        Ok(PaymentEvent {
            event_id,
            id_generated,
            event_type,
            amount,
        })
    }
}

fn extract_event_id(payload: &Value) -> Option<String> {
    ["id", "event_id"].iter().find_map(|key| match payload.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn payment_data(payload: &Value) -> &Value {
    let data = payload.get("data").filter(|v| v.is_object());
    data.and_then(|d| d.get("attributes").filter(|v| v.is_object()))
        .or(data)
        .or_else(|| payload.get("attributes").filter(|v| v.is_object()))
        .unwrap_or(payload)
}

fn extract_minor_amount(payload: &Value) -> Result<Decimal, NormalizationError> {
    let data = payment_data(payload);
    let raw = [data.get("amount"), data.get("amount_received"), payload.get("amount")]
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .ok_or(NormalizationError::MissingAmount)?;

    let minor = match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Decimal::from(i)
            } else if let Some(u) = n.as_u64() {
                Decimal::from(u)
            } else {
                let f = n
                    .as_f64()
                    .ok_or_else(|| NormalizationError::InvalidAmount(n.to_string()))?;
                Decimal::try_from(f).map_err(|_| NormalizationError::InvalidAmount(n.to_string()))?
            }
        }
        Value::String(s) => Decimal::from_str(s.trim())
            .map_err(|_| NormalizationError::InvalidAmount(s.clone()))?,
        other => return Err(NormalizationError::InvalidAmount(other.to_string())),
    };

    if minor.is_sign_negative() && !minor.is_zero() {
        return Err(NormalizationError::InvalidAmount(minor.to_string()));
    }
    Ok(minor)
}
