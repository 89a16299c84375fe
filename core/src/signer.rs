//! `APIAuth` request signing.
//!
//! The canonical string is
//! `content-type,content-md5,request-path,date`, signed with HMAC-SHA1 over
//! the secret key and base64-encoded. The server recomputes it from the
//! received headers, so every field must match what goes on the wire.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::error::ConfigError;

type HmacSha1 = Hmac<Sha1>;

/// Media type sent as both `Accept` and `Content-Type`.
pub const CONTENT_TYPE: &str = "application/vnd.api+json";

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// The signed header set for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub content_md5: String,
    pub date: String,
    pub authorization: String,
}

impl SignedHeaders {
    /// Headers in wire order.
    pub fn into_headers(self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), CONTENT_TYPE.to_string()),
            ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
            ("Content-MD5".to_string(), self.content_md5),
            ("Authorization".to_string(), self.authorization),
            ("Date".to_string(), self.date),
        ]
    }
}

/// HMAC-SHA1 signer bound to one key pair.
///
/// The keyed MAC state is built once and cloned per signature.
#[derive(Clone)]
pub struct RequestSigner {
    public_key: String,
    mac: HmacSha1,
}

impl RequestSigner {
    pub fn new(public_key: &str, secret_key: &str) -> Result<Self, ConfigError> {
        let mac = HmacSha1::new_from_slice(secret_key.as_bytes())
            .map_err(|_| ConfigError::InvalidSecretKey)?;
        Ok(Self {
            public_key: public_key.to_string(),
            mac,
        })
    }

    /// Sign a request for `request_path` (base path included) at instant `at`.
    ///
    /// Deterministic: the same path, body and instant always give the same
    /// headers.
    pub fn sign(&self, request_path: &str, body: Option<&str>, at: DateTime<Utc>) -> SignedHeaders {
        let content_md5 = body.map(content_md5).unwrap_or_default();
        let date = http_date(at);
        let canonical = canonical_string(&content_md5, request_path, &date);
        let signature = self.signature(&canonical);
        SignedHeaders {
            authorization: format!("APIAuth {}:{signature}", self.public_key),
            content_md5,
            date,
        }
    }

    /// Base64 HMAC-SHA1 of `canonical`.
    pub fn signature(&self, canonical: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(canonical.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// Base64 MD5 digest of `body`; empty for an empty body.
pub fn content_md5(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    BASE64.encode(Md5::digest(body.as_bytes()))
}

/// RFC 1123 date in GMT, e.g. `Tue, 03 Mar 2015 12:00:00 GMT`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

pub fn canonical_string(content_md5: &str, request_path: &str, date: &str) -> String {
    format!("{CONTENT_TYPE},{content_md5},{request_path},{date}")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn signer() -> RequestSigner {
        RequestSigner::new("public", "secret").unwrap()
    }

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 3, 3, 12, 0, 0).unwrap()
    }

    #[test]
    fn known_hmac_sha1_signature() {
        assert_eq!(signer().signature("message"), "DK9kn+7klT2Hv5A6wRdsReAo3xY=");
    }

    #[test]
    fn content_md5_of_empty_body_is_empty() {
        assert_eq!(content_md5(""), "");
    }

    #[test]
    fn content_md5_is_base64_digest() {
        assert_eq!(content_md5("message"), "eOcxAn2P1Q7WQjQLfJpjsw==");
    }

    #[test]
    fn date_uses_rfc1123_gmt() {
        assert_eq!(http_date(instant()), "Tue, 03 Mar 2015 12:00:00 GMT");
    }

    #[test]
    fn canonical_string_joins_four_fields_in_order() {
        assert_eq!(
            canonical_string("abc==", "/api/v2/users", "Tue, 03 Mar 2015 12:00:00 GMT"),
            "application/vnd.api+json,abc==,/api/v2/users,Tue, 03 Mar 2015 12:00:00 GMT"
        );
    }

    #[test]
    fn signing_is_deterministic_for_same_instant() {
        let s = signer();
        let first = s.sign("/api/v2/things", Some(r#"{"data":{}}"#), instant());
        for _ in 0..5 {
            assert_eq!(s.sign("/api/v2/things", Some(r#"{"data":{}}"#), instant()), first);
        }
    }

    #[test]
    fn signature_changes_with_path() {
        let s = signer();
        let a = s.sign("/api/v2/users/1", None, instant());
        let b = s.sign("/api/v2/users/2", None, instant());
        assert_ne!(a.authorization, b.authorization);
    }

    #[test]
    fn authorization_carries_public_key() {
        let headers = signer().sign("/api/v2/users", None, instant());
        assert!(headers.authorization.starts_with("APIAuth public:"));
        assert!(!headers.authorization.ends_with('\n'));
        assert_eq!(headers.content_md5, "");
    }

    #[test]
    fn headers_are_emitted_in_wire_order() {
        let names: Vec<String> = signer()
            .sign("/p", None, instant())
            .into_headers()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["Accept", "Content-Type", "Content-MD5", "Authorization", "Date"]);
    }

    #[test]
    fn debug_hides_key_material() {
        let rendered = format!("{:?}", signer());
        assert!(rendered.contains("public"));
        assert!(!rendered.contains("secret"));
    }
}
