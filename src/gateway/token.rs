//! Integrity-protected return token.
//!
//! The browser comes back from checkout carrying a token that encodes which
//! submission/feed/form the redirect belongs to, plus a keyed hash of that
//! triple. The token proves nothing about payment state; it only binds the
//! redirect to a submission so the handler knows what to verify remotely.

use crate::error::{AppError, AppErrorKind, AppResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Query parameter the encoded token travels in.
pub const RETURN_TOKEN_PARAM: &str = "payflexi_return";

/// Decoded identity triple carried by a return redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnToken {
    pub submission_id: i64,
    pub feed_id: i64,
    pub form_id: i64,
}

impl ReturnToken {
    pub fn new(submission_id: i64, feed_id: i64, form_id: i64) -> Self {
        Self {
            submission_id,
            feed_id,
            form_id,
        }
    }

    /// Serialize as base64 over `ids=<submission>|<feed>|<form>&hash=<hex>`,
    /// where the hash covers the literal `ids=...` prefix.
    pub fn encode(&self, secret: &str) -> String {
        let ids_query = format!(
            "ids={}|{}|{}",
            self.submission_id, self.feed_id, self.form_id
        );
        let hash = keyed_hash(ids_query.as_bytes(), secret);
        URL_SAFE_NO_PAD.encode(format!("{}&hash={}", ids_query, hash))
    }

    /// Decode and verify a token. Any malformed or tampered token fails
    /// closed with `IntegrityCheckFailed`; callers must not touch stored
    /// state on that path.
    pub fn decode(token: &str, secret: &str) -> AppResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| integrity_failed())?;
        let raw = String::from_utf8(raw).map_err(|_| integrity_failed())?;

        let (ids_query, provided_hash) = raw.split_once("&hash=").ok_or_else(integrity_failed)?;
        let ids = ids_query.strip_prefix("ids=").ok_or_else(integrity_failed)?;

        let expected = keyed_hash(ids_query.as_bytes(), secret);
        if !constant_time_eq(expected.as_bytes(), provided_hash.as_bytes()) {
            return Err(integrity_failed());
        }

        let mut parts = ids.split('|');
        let submission_id = parse_id(parts.next())?;
        let feed_id = parse_id(parts.next())?;
        let form_id = parse_id(parts.next())?;
        if parts.next().is_some() {
            return Err(integrity_failed());
        }

        Ok(Self {
            submission_id,
            feed_id,
            form_id,
        })
    }
}

fn parse_id(part: Option<&str>) -> AppResult<i64> {
    part.and_then(|p| p.parse().ok()).ok_or_else(integrity_failed)
}

fn integrity_failed() -> AppError {
    AppError::new(AppErrorKind::IntegrityCheckFailed)
}

fn keyed_hash(payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "return-secret";

    #[test]
    fn test_round_trip() {
        let token = ReturnToken::new(42, 3, 11);
        let encoded = token.encode(SECRET);
        let decoded = ReturnToken::decode(&encoded, SECRET).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_wrong_secret_fails_closed() {
        let encoded = ReturnToken::new(42, 3, 11).encode(SECRET);
        let result = ReturnToken::decode(&encoded, "other-secret");
        assert!(matches!(
            result.unwrap_err().kind,
            AppErrorKind::IntegrityCheckFailed
        ));
    }

    #[test]
    fn test_tampered_ids_fail_closed() {
        let encoded = ReturnToken::new(42, 3, 11).encode(SECRET);
        let raw = String::from_utf8(URL_SAFE_NO_PAD.decode(encoded).unwrap()).unwrap();
        let tampered = raw.replace("ids=42", "ids=43");
        let token = URL_SAFE_NO_PAD.encode(tampered);
        assert!(ReturnToken::decode(&token, SECRET).is_err());
    }

    #[test]
    fn test_garbage_token_fails_closed() {
        assert!(ReturnToken::decode("not-base64!!!", SECRET).is_err());
        assert!(ReturnToken::decode("", SECRET).is_err());
        let missing_hash = URL_SAFE_NO_PAD.encode("ids=1|2|3");
        assert!(ReturnToken::decode(&missing_hash, SECRET).is_err());
    }
}
