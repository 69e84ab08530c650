//! Stripe webhook handling
//!
//! Verifies the `Stripe-Signature` header against the shared webhook
//! secret before any payload is trusted, then extracts the handful of
//! fields the usage gate cares about. Unhandled event types are
//! acknowledged, not rejected.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::errors::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// A parsed webhook event, reduced to the fields we act on
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventObject {
    /// Billing customer id
    #[serde(default)]
    pub customer: Option<String>,
    /// Our session id, carried through checkout as the client reference
    #[serde(default)]
    pub client_reference_id: Option<String>,
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>,...`) over the
/// raw request body. The signed payload is `"{t}.{body}"` and the expected
/// signature is HMAC-SHA256 under the shared secret. `tolerance_secs`
/// bounds accepted clock skew; pass the current unix time as `now`.
pub fn verify_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in sig_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse().ok();
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| AppError::SignatureVerification {
        message: "Missing timestamp in signature header".to_string(),
    })?;
    if signatures.is_empty() {
        return Err(AppError::SignatureVerification {
            message: "Missing v1 signature in signature header".to_string(),
        });
    }

    if (now - timestamp).unsigned_abs() > tolerance_secs {
        return Err(AppError::SignatureVerification {
            message: "Signature timestamp outside tolerance".to_string(),
        });
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| {
        AppError::SignatureVerification {
            message: "Invalid webhook secret".to_string(),
        }
    })?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison against each candidate signature
    let matched = signatures.iter().any(|sig| {
        sig.len() == expected.len()
            && sig
                .bytes()
                .zip(expected.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    });

    if matched {
        Ok(())
    } else {
        Err(AppError::SignatureVerification {
            message: "Signature mismatch".to_string(),
        })
    }
}

/// Parse a verified payload into an event
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent> {
    serde_json::from_slice(payload).map_err(|e| AppError::InvalidFormat {
        message: format!("Malformed webhook payload: {}", e),
    })
}

/// Build a signature header for `payload` as Stripe would; used by tests
#[cfg(any(test, feature = "test-util"))]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
