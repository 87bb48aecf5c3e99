//! Bearer token codecs.
//!
//! A token maps statelessly to a [`CallerIdentity`]; nothing is stored server-side.
//! `SignedTokenCodec` is the production scheme (HMAC-SHA256 over id, role,
//! expiry and display name). `PlaceholderTokenCodec` keeps the fixed-literal
//! development scheme (`admin-token` / `user-token-<id>`) and never expires.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::principal::{CallerIdentity, Role, UserId};
use crate::tprintln;

type HmacSha256 = Hmac<Sha256>;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const USER_TOKEN_PREFIX: &str = "user-token-";
pub const PLACEHOLDER_ADMIN_ID: UserId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidToken {
    #[error("token is not in a recognised format")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum TokenKeyError {
    #[error("token signing key must not be empty")]
    Empty,
    #[error("token signing key rejected: {0}")]
    Rejected(String),
}

pub trait TokenCodec: Send + Sync {
    /// Mint a token for `identity`. Only the login handler calls this, after the
    /// credentials have been verified.
    fn encode(&self, identity: &CallerIdentity) -> String;

    fn decode(&self, token: &str) -> Result<CallerIdentity, InvalidToken>;

    /// Short scheme name for logs.
    fn scheme(&self) -> &'static str;
}

/// `base64url(payload) "." base64url(hmac(payload))` with
/// payload = `id|ROLE|exp|display_name`.
#[derive(Clone)]
pub struct SignedTokenCodec {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for SignedTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTokenCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SignedTokenCodec {
    pub fn new(key: &[u8], ttl: Duration) -> Result<Self, TokenKeyError> {
        if key.is_empty() { return Err(TokenKeyError::Empty); }
        let mac = HmacSha256::new_from_slice(key).map_err(|e| TokenKeyError::Rejected(e.to_string()))?;
        Ok(Self { mac, ttl })
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn encode_at(&self, identity: &CallerIdentity, now_unix: i64) -> String {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let exp = now_unix.saturating_add(ttl);
        let payload = format!("{}|{}|{}|{}", identity.id, identity.role, exp, identity.display_name);
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let sig = mac.finalize().into_bytes();
        tprintln!("token.issue id={} role={} exp={}", identity.id, identity.role, exp);
        format!("{}.{}", URL_SAFE_NO_PAD.encode(payload.as_bytes()), URL_SAFE_NO_PAD.encode(sig))
    }

    pub fn decode_at(&self, token: &str, now_unix: i64) -> Result<CallerIdentity, InvalidToken> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(InvalidToken::Malformed)?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| InvalidToken::Malformed)?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| InvalidToken::Malformed)?;

        // Constant-time comparison
        let mut mac = self.mac.clone();
        mac.update(&payload);
        mac.verify_slice(&sig).map_err(|_| InvalidToken::BadSignature)?;

        let text = std::str::from_utf8(&payload).map_err(|_| InvalidToken::Malformed)?;
        let mut parts = text.splitn(4, '|');
        let id = parts.next().and_then(parse_id).ok_or(InvalidToken::Malformed)?;
        let role = parts.next().and_then(|r| r.parse::<Role>().ok()).ok_or(InvalidToken::Malformed)?;
        let exp = parts.next().and_then(|e| e.parse::<i64>().ok()).ok_or(InvalidToken::Malformed)?;
        let display_name = parts.next().ok_or(InvalidToken::Malformed)?;
        if exp <= now_unix { return Err(InvalidToken::Expired); }
        Ok(CallerIdentity::new(id, display_name, role))
    }
}

impl TokenCodec for SignedTokenCodec {
    fn encode(&self, identity: &CallerIdentity) -> String { self.encode_at(identity, chrono::Utc::now().timestamp()) }
    fn decode(&self, token: &str) -> Result<CallerIdentity, InvalidToken> { self.decode_at(token, chrono::Utc::now().timestamp()) }
    fn scheme(&self) -> &'static str { "signed" }
}

/// Fixed-literal development scheme. Not verifiable and never expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTokenCodec;

impl TokenCodec for PlaceholderTokenCodec {
    /// Lossy for admins: every ADMIN identity becomes `admin-token`, which decodes as id 1.
    fn encode(&self, identity: &CallerIdentity) -> String {
        match identity.role {
            Role::Admin => ADMIN_TOKEN.to_string(),
            Role::User => format!("{}{}", USER_TOKEN_PREFIX, identity.id),
        }
    }

    fn decode(&self, token: &str) -> Result<CallerIdentity, InvalidToken> {
        if token == ADMIN_TOKEN {
            return Ok(CallerIdentity::new(PLACEHOLDER_ADMIN_ID, "admin", Role::Admin));
        }
        let suffix = token.strip_prefix(USER_TOKEN_PREFIX).ok_or(InvalidToken::Malformed)?;
        let id = parse_id(suffix).ok_or(InvalidToken::Malformed)?;
        Ok(CallerIdentity::new(id, format!("user{}", id), Role::User))
    }

    fn scheme(&self) -> &'static str { "placeholder" }
}

/// Non-negative decimal id: ASCII digits only, no sign, must fit `u64`.
fn parse_id(s: &str) -> Option<UserId> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) { return None; }
    s.parse::<UserId>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const NOW: i64 = 1_760_000_000;

    fn codec() -> SignedTokenCodec { SignedTokenCodec::new(b"unit-test-key", Duration::from_secs(60)).unwrap() }

    #[test]
    fn placeholder_admin_literal() {
        let id = PlaceholderTokenCodec.decode("admin-token").unwrap();
        assert_eq!(id, CallerIdentity::new(1, "admin", Role::Admin));
    }

    #[test]
    fn placeholder_user_prefix() {
        let id = PlaceholderTokenCodec.decode("user-token-42").unwrap();
        assert_eq!(id, CallerIdentity::new(42, "user42", Role::User));
    }

    #[test]
    fn placeholder_rejects_other_shapes() {
        for t in ["", "admin", "Admin-token", "user-token-", "user-token-abc", "user-token--5", "user-token-+5", "user-token-1 ", "user-token-99999999999999999999999", "xuser-token-5"] {
            assert_eq!(PlaceholderTokenCodec.decode(t), Err(InvalidToken::Malformed), "token {:?}", t);
        }
    }

    #[test]
    fn placeholder_round_trips_canonical_identities() {
        let admin = CallerIdentity::new(1, "admin", Role::Admin);
        assert_eq!(PlaceholderTokenCodec.decode(&PlaceholderTokenCodec.encode(&admin)).unwrap(), admin);
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let n: u64 = rng.gen();
            let user = CallerIdentity::new(n, format!("user{}", n), Role::User);
            assert_eq!(PlaceholderTokenCodec.decode(&PlaceholderTokenCodec.encode(&user)).unwrap(), user);
        }
    }

    #[test]
    fn signed_round_trip() {
        let c = codec();
        let mut rng = rand::thread_rng();
        for i in 0..100 {
            let role = if i % 2 == 0 { Role::User } else { Role::Admin };
            let ident = CallerIdentity::new(rng.gen(), format!("name|with|pipes-{}", i), role);
            let tok = c.encode_at(&ident, NOW);
            assert_eq!(c.decode_at(&tok, NOW).unwrap(), ident);
        }
    }

    #[test]
    fn signed_token_expires() {
        let c = codec();
        let tok = c.encode_at(&CallerIdentity::new(5, "bob", Role::User), NOW);
        assert!(c.decode_at(&tok, NOW + 59).is_ok());
        assert_eq!(c.decode_at(&tok, NOW + 60), Err(InvalidToken::Expired));
    }

    #[test]
    fn oversized_ttl_saturates_instead_of_wrapping() {
        let c = SignedTokenCodec::new(b"unit-test-key", Duration::from_secs(u64::MAX)).unwrap();
        let ident = CallerIdentity::new(5, "bob", Role::User);
        let tok = c.encode_at(&ident, NOW);
        assert_eq!(c.decode_at(&tok, NOW).unwrap(), ident);
    }

    #[test]
    fn signed_token_rejects_tampering() {
        let c = codec();
        let tok = c.encode_at(&CallerIdentity::new(5, "bob", Role::User), NOW);
        let (_, sig) = tok.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(format!("5|ADMIN|{}|bob", NOW + 60));
        let forged = format!("{}.{}", forged_payload, sig);
        assert_eq!(c.decode_at(&forged, NOW), Err(InvalidToken::BadSignature));
    }

    #[test]
    fn signed_token_from_other_key_is_rejected() {
        let other = SignedTokenCodec::new(b"another-key", Duration::from_secs(60)).unwrap();
        let tok = other.encode_at(&CallerIdentity::new(1, "admin", Role::Admin), NOW);
        assert_eq!(codec().decode_at(&tok, NOW), Err(InvalidToken::BadSignature));
    }

    #[test]
    fn signed_rejects_garbage() {
        let c = codec();
        assert_eq!(c.decode_at("admin-token", NOW), Err(InvalidToken::Malformed));
        assert_eq!(c.decode_at("a.b.c", NOW), Err(InvalidToken::Malformed));
        assert_eq!(c.decode_at("", NOW), Err(InvalidToken::Malformed));
    }

    #[test]
    fn signed_codec_requires_key() {
        assert!(matches!(SignedTokenCodec::new(b"", Duration::from_secs(1)), Err(TokenKeyError::Empty)));
    }
}
