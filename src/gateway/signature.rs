//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The
//! MAC is HMAC-SHA256 keyed with the shared secret over `"<t>.<raw body>"`.
//! Any `v1` entry may match; comparison is constant-time.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::MarketError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the HTTP header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies inbound webhook signatures against a shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    /// Creates a verifier. A non-positive tolerance disables the timestamp
    /// window check.
    #[must_use]
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Checks `header` against `payload` at time `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidSignature`] if no secret is configured,
    /// the header is malformed, the timestamp is outside the tolerance
    /// window, or no `v1` signature matches.
    pub fn verify(&self, payload: &[u8], header: &str, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.secret.is_empty() {
            return Err(MarketError::InvalidSignature(
                "webhook secret not configured".to_string(),
            ));
        }

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<Vec<u8>> = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => timestamp = value.parse().ok(),
                "v1" => {
                    if let Ok(bytes) = hex::decode(value) {
                        candidates.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| MarketError::InvalidSignature("missing timestamp".to_string()))?;
        if candidates.is_empty() {
            return Err(MarketError::InvalidSignature(
                "no v1 signature present".to_string(),
            ));
        }
        if self.tolerance_secs > 0 {
            let within = now
                .timestamp()
                .checked_sub(timestamp)
                .is_some_and(|age| age.unsigned_abs() <= self.tolerance_secs.unsigned_abs());
            if !within {
                return Err(MarketError::InvalidSignature(
                    "timestamp outside tolerance".to_string(),
                ));
            }
        }

        let mac = self.mac_for(timestamp, payload)?;
        if candidates
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok())
        {
            Ok(())
        } else {
            Err(MarketError::InvalidSignature(
                "signature mismatch".to_string(),
            ))
        }
    }

    /// Produces a header value for `payload` signed at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Internal`] if the MAC cannot be keyed.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, MarketError> {
        let digest = self.mac_for(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, MarketError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| MarketError::Internal(format!("hmac key: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"id":"evt_1","type":"ping"}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test", 300)
    }

    #[test]
    fn signed_payload_verifies() {
        let now = Utc::now();
        let Ok(header) = verifier().sign(BODY, now.timestamp()) else {
            panic!("signing failed");
        };
        tokio_test::assert_ok!(verifier().verify(BODY, &header, now));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let now = Utc::now();
        let Ok(header) = verifier().sign(BODY, now.timestamp()) else {
            panic!("signing failed");
        };
        let result = verifier().verify(b"{}", &header, now);
        assert!(matches!(result, Err(MarketError::InvalidSignature(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let Ok(header) = WebhookVerifier::new("other", 300).sign(BODY, now.timestamp()) else {
            panic!("signing failed");
        };
        tokio_test::assert_err!(verifier().verify(BODY, &header, now));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let now = Utc::now();
        let Ok(header) = verifier().sign(BODY, now.timestamp() - 3_600) else {
            panic!("signing failed");
        };
        tokio_test::assert_err!(verifier().verify(BODY, &header, now));
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        let now = Utc::now();
        for timestamp in [i64::MIN, i64::MAX] {
            let Ok(header) = verifier().sign(BODY, timestamp) else {
                panic!("signing failed");
            };
            let result = verifier().verify(BODY, &header, now);
            assert!(matches!(result, Err(MarketError::InvalidSignature(_))));
        }
        let result = verifier().verify(BODY, "t=-9223372036854775808,v1=00", now);
        assert!(matches!(result, Err(MarketError::InvalidSignature(_))));
    }

    #[test]
    fn any_matching_v1_entry_is_accepted() {
        let now = Utc::now();
        let Ok(header) = verifier().sign(BODY, now.timestamp()) else {
            panic!("signing failed");
        };
        let rotated = format!("{header},v1={}", "00".repeat(32));
        tokio_test::assert_ok!(verifier().verify(BODY, &rotated, now));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let now = Utc::now();
        for header in ["", "garbage", "t=abc,v1=00", "v1=00"] {
            tokio_test::assert_err!(verifier().verify(BODY, header, now));
        }
    }

    #[test]
    fn empty_secret_rejects_everything() {
        let now = Utc::now();
        let unconfigured = WebhookVerifier::new("", 300);
        let Ok(header) = unconfigured.sign(BODY, now.timestamp()) else {
            panic!("signing failed");
        };
        tokio_test::assert_err!(unconfigured.verify(BODY, &header, now));
    }
}
