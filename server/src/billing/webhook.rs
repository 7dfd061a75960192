//! Payment provider webhooks: signature verification and event parsing.
//!
//! The signature header looks like `t=1700000000,v1=<hex hmac>[,v1=...]`.
//! The signed payload is `"{t}.{raw body}"`, keyed with the endpoint secret.

use ring::hmac;
use serde::Deserialize;

use super::payments::CheckoutSession;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Seconds a signed timestamp stays acceptable
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,
    #[error("Malformed signature header")]
    MalformedSignature,
    #[error("Signature timestamp outside tolerance")]
    Expired,
    #[error("No matching signature")]
    SignatureMismatch,
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::MalformedSignature)?,
                )
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedSignature);
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Compute the `v1` signature for a payload; the counterpart of [`verify_signature`]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(timestamp.to_string().as_bytes());
    ctx.update(b".");
    ctx.update(payload);
    hex::encode(ctx.sign().as_ref())
}

/// A full header value for a payload, as the provider would send it
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!("t={timestamp},v1={}", sign(payload, secret, timestamp))
}

pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let header = parse_header(header.ok_or(WebhookError::MissingSignature)?)?;

    if now.abs_diff(header.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::Expired);
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = Vec::with_capacity(payload.len() + 12);
    signed.extend_from_slice(header.timestamp.to_string().as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);

    let matched = header.signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|tag| hmac::verify(&key, &signed, &tag).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedSubscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    CheckoutCompleted(CheckoutSession),
    InvoicePaid(Invoice),
    SubscriptionDeleted(DeletedSubscription),
    Other { id: String, kind: String },
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let object = raw.data.object;
        let invalid = |e: serde_json::Error| WebhookError::InvalidPayload(e.to_string());

        let event = match raw.kind.as_str() {
            "checkout.session.completed" => {
                WebhookEvent::CheckoutCompleted(serde_json::from_value(object).map_err(invalid)?)
            }
            "invoice.payment_succeeded" => {
                WebhookEvent::InvoicePaid(serde_json::from_value(object).map_err(invalid)?)
            }
            "customer.subscription.deleted" => {
                WebhookEvent::SubscriptionDeleted(serde_json::from_value(object).map_err(invalid)?)
            }
            _ => WebhookEvent::Other {
                id: raw.id,
                kind: raw.kind,
            },
        };

        Ok(event)
    }
}
