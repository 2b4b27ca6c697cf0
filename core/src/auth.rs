//! HMAC-SHA1 request signing.
//!
//! The service authenticates a request by recomputing a signature over the
//! request path, a timestamp and the API key:
//!
//! ```text
//! signing string:  <path-and-query>&Timestamp=<ts>&ApiKey=<key>
//! header value:    Timestamp=<ts>&ApiKey=<key>&Signature=<hex hmac-sha1>
//! ```
//!
//! `<path-and-query>` starts after the host and must match the request line
//! byte for byte. Only the query string is escaped; the timestamp and key are
//! inserted verbatim.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{DolError, Result};

type HmacSha1 = Hmac<Sha1>;

/// Timestamp layout expected by the service: ISO 8601, UTC, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// An API key and its shared secret.
#[derive(Clone)]
pub struct Signer<'a> {
    api_key: &'a str,
    shared_secret: &'a str,
}

impl<'a> Signer<'a> {
    pub fn new(api_key: &'a str, shared_secret: &'a str) -> Self {
        Self {
            api_key,
            shared_secret,
        }
    }

    /// Build the `Authorization` header value for `path`, stamped with the
    /// current time.
    pub fn authorization(&self, path: &str) -> Result<String> {
        self.authorization_at(path, Utc::now())
    }

    /// Build the `Authorization` header value for `path` at a fixed instant.
    pub fn authorization_at(&self, path: &str, now: DateTime<Utc>) -> Result<String> {
        let timestamp = format_timestamp(now);
        let signature = self.signature(&self.signing_string(path, &timestamp))?;
        Ok(format!(
            "Timestamp={timestamp}&ApiKey={}&Signature={signature}",
            self.api_key
        ))
    }

    pub fn signing_string(&self, path: &str, timestamp: &str) -> String {
        format!("{path}&Timestamp={timestamp}&ApiKey={}", self.api_key)
    }

    /// Lowercase hex HMAC-SHA1 of `message` keyed by the shared secret.
    pub fn signature(&self, message: &str) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.shared_secret.as_bytes())
            .map_err(|err| DolError::Signing(err.to_string()))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for Signer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("api_key", &self.api_key)
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frozen() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn timestamp_is_second_precision_utc() {
        assert_eq!(format_timestamp(frozen()), "2016-03-01T12:30:45Z");
    }

    #[test]
    fn hmac_sha1_matches_rfc2202() {
        let signer = Signer::new("unused", "Jefe");
        assert_eq!(
            signer.signature("what do ya want for nothing?").unwrap(),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn signing_string_layout() {
        let signer = Signer::new("demo-key", "demo-secret");
        assert_eq!(
            signer.signing_string("/V1/a/b?%24top=1", "2016-03-01T12:30:45Z"),
            "/V1/a/b?%24top=1&Timestamp=2016-03-01T12:30:45Z&ApiKey=demo-key"
        );
    }

    #[test]
    fn authorization_is_deterministic_for_a_frozen_clock() {
        let signer = Signer::new("demo-key", "demo-secret");
        let path = "/V1/statistics/BLS_Numbers/averageHourlyEarnings12MonthChange\
                    ?%24top=100&%24skip=0&%24select=&%24orderby=&%24filter=";
        let header = signer.authorization_at(path, frozen()).unwrap();
        assert_eq!(
            header,
            "Timestamp=2016-03-01T12:30:45Z&ApiKey=demo-key\
             &Signature=7306a368020db0bb4e5921e4a187d81ae2d2bc9e"
        );
        assert_eq!(header, signer.authorization_at(path, frozen()).unwrap());
    }

    #[test]
    fn signature_depends_on_secret() {
        let a = Signer::new("k", "one").authorization_at("/V1/x", frozen()).unwrap();
        let b = Signer::new("k", "two").authorization_at("/V1/x", frozen()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_and_long_secrets_still_sign() {
        let long = "s".repeat(200);
        for secret in ["", long.as_str()] {
            let signature = Signer::new("k", secret).signature("/V1/x").unwrap();
            assert_eq!(signature.len(), 40);
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", Signer::new("demo-key", "demo-secret"));
        assert!(rendered.contains("demo-key"));
        assert!(!rendered.contains("demo-secret"));
    }
}
