//! Inbound payment-provider notifications.
//!
//! The provider retries any non-200 response, so every outcome here is
//! acknowledged with HTTP 200. Verification failures are logged and dropped;
//! accepted notifications are pushed onto the reconciliation queue and
//! processed after the acknowledgment goes out.

use crate::{events::Event, AppState};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "data.id")]
    pub data_id: Option<String>,
}

pub async fn mercadopago_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let json: Value = match serde_json::from_slice(&body) {
        Ok(json) => json,
        Err(e) => {
            warn!("webhook carried unparseable body: {}", e);
            return StatusCode::OK;
        }
    };

    let topic = json.get("type").and_then(Value::as_str).unwrap_or("");
    if topic != "payment" {
        info!(topic = %topic, "ignoring non-payment webhook");
        return StatusCode::OK;
    }

    // The provider sends the payment id both as ?data.id= and in the body;
    // the query form is what the signature manifest is computed over.
    let payment_id = query.data_id.or_else(|| {
        json.pointer("/data/id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    });
    let payment_id = match payment_id {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!("payment webhook carried no payment id");
            return StatusCode::OK;
        }
    };

    // An unconfigured secret means no delivery can be verified; those are
    // acknowledged and dropped just like a missing signature.
    let secret = match state.config.mp_webhook_secret.as_deref() {
        Some(secret) => secret,
        None => {
            warn!(payment_id = %payment_id, "mp_webhook_secret not configured; dropping payment webhook");
            return StatusCode::OK;
        }
    };
    if !verify_signature(&headers, &payment_id, secret) {
        warn!(payment_id = %payment_id, "webhook signature verification failed");
        return StatusCode::OK;
    }

    info!(payment_id = %payment_id, "payment webhook accepted");
    state
        .event_sender
        .send_or_log(Event::WebhookVerified {
            provider_payment_id: payment_id.clone(),
        })
        .await;
    state.reconcile.enqueue(payment_id);
    StatusCode::OK
}

/// Checks the provider's `x-signature` header (`ts=<unix>,v1=<hex hmac>`)
/// against an HMAC-SHA256 over `id:<paymentId>;request-id:<rid>;ts:<ts>;`.
fn verify_signature(headers: &HeaderMap, payment_id: &str, secret: &str) -> bool {
    let signature = match headers.get("x-signature").and_then(|h| h.to_str().ok()) {
        Some(value) => value,
        None => return false,
    };
    let request_id = headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let (ts, v1) = match parse_signature_header(signature) {
        Some(parts) => parts,
        None => return false,
    };

    let manifest = format!("id:{};request-id:{};ts:{};", payment_id, request_id, ts);
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(manifest.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, v1)
}

fn parse_signature_header(header: &str) -> Option<(&str, &str)> {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value),
            Some(("v1", value)) => v1 = Some(value),
            _ => {}
        }
    }
    Some((ts?, v1?))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/mercadopago", post(mercadopago_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "webhook_test_secret";

    fn sign(payment_id: &str, request_id: &str, ts: &str) -> String {
        let manifest = format!("id:{};request-id:{};ts:{};", payment_id, request_id, ts);
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_headers(payment_id: &str, request_id: &str, ts: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let v1 = sign(payment_id, request_id, ts);
        headers.insert(
            "x-signature",
            HeaderValue::from_str(&format!("ts={},v1={}", ts, v1)).unwrap(),
        );
        headers.insert("x-request-id", HeaderValue::from_str(request_id).unwrap());
        headers
    }

    #[test]
    fn accepts_valid_signature() {
        let headers = signed_headers("12345", "req-1", "1700000000");
        assert!(verify_signature(&headers, "12345", SECRET));
    }

    #[test]
    fn rejects_tampered_payment_id() {
        let headers = signed_headers("12345", "req-1", "1700000000");
        assert!(!verify_signature(&headers, "99999", SECRET));
    }

    #[test]
    fn rejects_wrong_secret() {
        let headers = signed_headers("12345", "req-1", "1700000000");
        assert!(!verify_signature(&headers, "12345", "another_secret"));
    }

    #[test]
    fn rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(!verify_signature(&headers, "12345", SECRET));
    }

    #[test]
    fn rejects_malformed_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-signature", HeaderValue::from_static("v1=deadbeef"));
        assert!(!verify_signature(&headers, "12345", SECRET));
    }

    #[test]
    fn verdict_is_stable_across_retries() {
        let headers = signed_headers("12345", "req-1", "1700000000");
        let first = verify_signature(&headers, "12345", SECRET);
        for _ in 0..3 {
            assert_eq!(verify_signature(&headers, "12345", SECRET), first);
        }
    }

    #[test]
    fn parses_header_with_spaces() {
        let parsed = parse_signature_header("ts=1700000000, v1=abcdef");
        assert_eq!(parsed, Some(("1700000000", "abcdef")));
    }
}
