//! Signed webhook callbacks.
//!
//! The gateway signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=...]`, where the HMAC-SHA256 covers
//! `"{t}.{raw body}"` under the endpoint's signing secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::PaymentUpdate;
use crate::domain::value_objects::from_minor_units;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    Malformed,
    #[error("timestamp outside the tolerance zone")]
    Expired,
    #[error("no signatures found matching the expected signature for payload")]
    Mismatch,
}

/// Checks `header` against `payload`. `now` is unix seconds.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance: Duration,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > tolerance.as_secs() {
        return Err(SignatureError::Expired);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // verify_slice compares in constant time
    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if matched { Ok(()) } else { Err(SignatureError::Mismatch) }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// Payment facts of a completed checkout session.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutCompleted {
    pub order_id: Uuid,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub amount_total: i64,
    pub currency: String,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Extracts the session fields; the error names the first missing or invalid field.
    pub fn checkout_completed(&self) -> Result<CheckoutCompleted, String> {
        let object = &self.data.object;
        let raw_order_id = object
            .pointer("/metadata/orderId")
            .and_then(|v| v.as_str())
            .ok_or("metadata.orderId is missing")?;
        let order_id = raw_order_id
            .trim()
            .trim_matches('"')
            .parse::<Uuid>()
            .map_err(|_| format!("metadata.orderId {raw_order_id:?} is not an order id"))?;
        let payment_status = object
            .get("payment_status")
            .and_then(|v| v.as_str())
            .ok_or("payment_status is missing")?;
        let amount_total = object
            .get("amount_total")
            .and_then(|v| v.as_i64())
            .ok_or("amount_total is missing")?;
        let currency = object
            .get("currency")
            .and_then(|v| v.as_str())
            .ok_or("currency is missing")?;
        let payment_method = object
            .get("payment_method_types")
            .and_then(|v| v.as_array())
            .and_then(|types| types.first())
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(CheckoutCompleted {
            order_id,
            payment_status: payment_status.to_string(),
            payment_method,
            amount_total,
            currency: currency.to_string(),
        })
    }
}

impl CheckoutCompleted {
    pub fn payment_update(&self) -> PaymentUpdate {
        PaymentUpdate {
            payment_status: self.payment_status.clone().into(),
            payment_method: self.payment_method.clone(),
            total_price: from_minor_units(self.amount_total),
            currency: self.currency.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::aggregates::PaymentStatus;
    use rust_decimal::Decimal;

    pub(crate) fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    pub(crate) fn completed_event(event_id: &str, order_id: &str) -> Vec<u8> {
        serde_json::json!({
            "id": event_id,
            "type": CHECKOUT_COMPLETED,
            "data": { "object": {
                "metadata": { "orderId": order_id },
                "payment_status": "paid",
                "payment_method_types": ["card"],
                "amount_total": 4999,
                "currency": "eur"
            }}
        })
        .to_string()
        .into_bytes()
    }

    const SECRET: &str = "whsec_test";
    const TOLERANCE: Duration = Duration::from_secs(300);

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, SECRET, 1_700_000_000);
        assert_eq!(verify_signature(body, Some(&header), SECRET, TOLERANCE, 1_700_000_100), Ok(()));
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = b"{}";
        let good = sign(body, SECRET, 10);
        let header = format!("t=10,v1=deadbeef,{}", good.split_once(',').unwrap().1);
        assert_eq!(verify_signature(body, Some(&header), SECRET, TOLERANCE, 10), Ok(()));
    }

    #[test]
    fn test_rejections() {
        let body = b"{}";
        let header = sign(body, SECRET, 1_000);
        assert_eq!(verify_signature(body, None, SECRET, TOLERANCE, 1_000), Err(SignatureError::MissingHeader));
        assert_eq!(verify_signature(body, Some("v1=abc"), SECRET, TOLERANCE, 1_000), Err(SignatureError::Malformed));
        assert_eq!(verify_signature(body, Some("t=soon,v1=abc"), SECRET, TOLERANCE, 1_000), Err(SignatureError::Malformed));
        assert_eq!(verify_signature(body, Some(&header), SECRET, TOLERANCE, 1_301), Err(SignatureError::Expired));
        assert_eq!(verify_signature(b"{ }", Some(&header), SECRET, TOLERANCE, 1_000), Err(SignatureError::Mismatch));
        assert_eq!(verify_signature(body, Some(&header), "other", TOLERANCE, 1_000), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_checkout_completed_fields() {
        let order_id = Uuid::now_v7();
        let event = WebhookEvent::parse(&completed_event("evt_1", &format!("\"{order_id}\""))).unwrap();
        let done = event.checkout_completed().unwrap();
        assert_eq!(done.order_id, order_id);
        assert_eq!(done.payment_method.as_deref(), Some("card"));

        let update = done.payment_update();
        assert_eq!(update.payment_status, PaymentStatus::Paid);
        assert_eq!(update.total_price, Decimal::new(4999, 2));
        assert_eq!(update.currency, "eur");
    }

    #[test]
    fn test_checkout_completed_missing_metadata() {
        let body = serde_json::json!({ "id": "evt_2", "type": CHECKOUT_COMPLETED, "data": { "object": { "amount_total": 1 } } });
        let event = WebhookEvent::parse(body.to_string().as_bytes()).unwrap();
        assert!(event.checkout_completed().unwrap_err().contains("orderId"));
        assert!(WebhookEvent::parse(b"not json").is_err());
    }
}
