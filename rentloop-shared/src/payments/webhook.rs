/// Processor webhook verification and event decoding
///
/// The processor signs each delivery with a `Stripe-Signature` header of the
/// form `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The HMAC-SHA256 is
/// computed over `"{t}.{raw body}"` with the endpoint's shared secret.
/// Nothing in the body may be trusted until [`verify_signature`] succeeds.
///
/// # Example
///
/// ```
/// use rentloop_shared::payments::webhook::{sign_payload, verify_signature, DEFAULT_TOLERANCE_SECS};
///
/// let body = br#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#;
/// let header = sign_payload(body, "whsec_test", 1_700_000_000);
///
/// assert!(verify_signature(body, &header, "whsec_test", 1_700_000_010, DEFAULT_TOLERANCE_SECS).is_ok());
/// assert!(verify_signature(body, &header, "whsec_other", 1_700_000_010, DEFAULT_TOLERANCE_SECS).is_err());
/// ```

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum age of a signed delivery
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Signature verification failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature timestamp outside tolerance")]
    Expired,

    #[error("no matching signature")]
    Mismatch,
}

/// Checks `header` against `payload` signed with `secret`
///
/// `now` is the current unix time in seconds.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::MalformedHeader)?;

        match key {
            "t" => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::MalformedHeader)?)
            }
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }

    let tolerance = u64::try_from(tolerance_secs).unwrap_or(0);
    match now.checked_sub(timestamp).map(i64::unsigned_abs) {
        Some(age) if age <= tolerance => {}
        _ => return Err(SignatureError::Expired),
    }

    for candidate in &signatures {
        if signer(secret, timestamp, payload).verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Produces a valid signature header for `payload`
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mac = signer(secret, timestamp, payload);
    format!("t={},v1={:x}", timestamp, mac.finalize().into_bytes())
}

fn signer(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// A decoded webhook event the marketplace cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEvent {
    /// `payment_intent.succeeded`
    PaymentSucceeded { intent_id: String },

    /// `payment_intent.payment_failed`
    PaymentFailed { intent_id: String },

    /// `charge.refunded`; correlated through the charge's payment intent
    ChargeRefunded { intent_id: Option<String> },

    /// Anything else, acknowledged and ignored
    Other { kind: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: EventObject,
}

#[derive(Debug, Default, Deserialize)]
struct EventObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
}

impl ProcessorEvent {
    /// Decodes a verified webhook body
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(payload)?;
        let object = envelope.data.object;

        let event = match envelope.kind.as_str() {
            "payment_intent.succeeded" => match object.id {
                Some(intent_id) => ProcessorEvent::PaymentSucceeded { intent_id },
                None => ProcessorEvent::Other { kind: envelope.kind },
            },
            "payment_intent.payment_failed" => match object.id {
                Some(intent_id) => ProcessorEvent::PaymentFailed { intent_id },
                None => ProcessorEvent::Other { kind: envelope.kind },
            },
            "charge.refunded" => ProcessorEvent::ChargeRefunded {
                intent_id: object.payment_intent,
            },
            _ => ProcessorEvent::Other { kind: envelope.kind },
        };

        Ok(event)
    }

    /// Processor event type name
    pub fn kind(&self) -> &str {
        match self {
            ProcessorEvent::PaymentSucceeded { .. } => "payment_intent.succeeded",
            ProcessorEvent::PaymentFailed { .. } => "payment_intent.payment_failed",
            ProcessorEvent::ChargeRefunded { .. } => "charge.refunded",
            ProcessorEvent::Other { kind } => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_750_000_000;

    #[test]
    fn test_valid_signature() {
        let body = b"{\"hello\":\"world\"}";
        let header = sign_payload(body, SECRET, NOW);
        assert!(verify_signature(body, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign_payload(b"{\"amount\":100}", SECRET, NOW);
        assert_eq!(
            verify_signature(b"{\"amount\":999}", &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_signature_rejected() {
        let body = b"{}";
        let header = sign_payload(body, SECRET, NOW - 301);
        assert_eq!(
            verify_signature(body, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        for t in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={},v1={}", t, "00".repeat(32));
            assert_eq!(
                verify_signature(b"{}", &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
                Err(SignatureError::Expired)
            );
        }

        let header = sign_payload(b"{}", SECRET, i64::MIN);
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, i64::MAX, DEFAULT_TOLERANCE_SECS),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_second_v1_entry_can_match() {
        let body = b"{}";
        let good = sign_payload(body, SECRET, NOW);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good_sig);
        assert!(verify_signature(body, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", "t=1750000000"] {
            assert_eq!(
                verify_signature(b"{}", header, SECRET, NOW, DEFAULT_TOLERANCE_SECS),
                Err(SignatureError::MalformedHeader),
                "header {:?}",
                header
            );
        }
    }

    #[test]
    fn test_parse_events() {
        let succeeded = br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        assert_eq!(
            ProcessorEvent::parse(succeeded).unwrap(),
            ProcessorEvent::PaymentSucceeded {
                intent_id: "pi_123".to_string()
            }
        );

        let refunded = br#"{"type":"charge.refunded","data":{"object":{"id":"ch_9","payment_intent":"pi_123"}}}"#;
        assert_eq!(
            ProcessorEvent::parse(refunded).unwrap(),
            ProcessorEvent::ChargeRefunded {
                intent_id: Some("pi_123".to_string())
            }
        );

        let other = br#"{"type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
        let event = ProcessorEvent::parse(other).unwrap();
        assert_eq!(event.kind(), "customer.created");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(ProcessorEvent::parse(b"not json").is_err());
    }
}
