//! HMAC verification of the mini-app host's signed `initData` string.
//!
//! Parses `key=value` pairs, builds a data-check-string from every pair
//! except `hash` sorted lexicographically by key, HMAC-SHA256s it with
//! `SHA256(botToken)` as the secret, and compares constant-time against the
//! supplied `hash`. Modeled on `security::crypto::EnvelopeEncryptor`'s shape
//! (a `thiserror` error enum, base64/hex-encoded fields) and
//! `auth::middleware::secrets_match`'s constant-time comparison idiom, reused
//! directly for the hash check.

use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::protocol::ErrorCode;

type HmacSha256 = Hmac<Sha256>;

/// Failures the verifier can return, mapped 1:1 onto machine-readable error
/// codes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InitDataError {
    #[error("initData string is empty")]
    InitDataEmpty,
    #[error("hash field missing")]
    HashMissing,
    #[error("auth_date field missing")]
    AuthDateMissing,
    #[error("auth_date field is not a valid integer")]
    AuthDateInvalid,
    #[error("auth_date is older than the allowed maximum age")]
    AuthDateExpired,
    #[error("HMAC signature does not match")]
    SignatureInvalid,
    #[error("user field missing")]
    UserMissing,
    #[error("user field is not valid JSON")]
    UserInvalid,
}

impl InitDataError {
    #[must_use]
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::InitDataEmpty => ErrorCode::InitDataEmpty,
            Self::HashMissing => ErrorCode::HashMissing,
            Self::AuthDateMissing => ErrorCode::AuthDateMissing,
            Self::AuthDateInvalid => ErrorCode::AuthDateInvalid,
            Self::AuthDateExpired => ErrorCode::AuthDateExpired,
            Self::SignatureInvalid => ErrorCode::SignatureInvalid,
            Self::UserMissing => ErrorCode::UserMissing,
            Self::UserInvalid => ErrorCode::UserInvalid,
        }
    }
}

/// The outcome of a successful verification: just the resolved user id
/// (`{userId = user.id}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: String,
}

#[derive(Deserialize)]
struct InitDataUser {
    id: serde_json::Value,
}

/// Verify a raw `initData` URL-encoded string against `bot_token`.
///
/// `max_age_secs` is the caller-supplied ceiling on `now - auth_date`
/// (the default is 24h, configurable via
/// `SecurityConfig::identity_max_age_secs`).
pub fn verify_init_data(
    raw: &str,
    bot_token: &str,
    max_age_secs: i64,
) -> Result<VerifiedIdentity, InitDataError> {
    if raw.trim().is_empty() {
        return Err(InitDataError::InitDataEmpty);
    }

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut hash: Option<String> = None;
    for segment in raw.split('&') {
        if segment.is_empty() {
            continue;
        }
        let (key, value) = match segment.split_once('=') {
            Some((k, v)) => (k, v),
            None => (segment, ""),
        };
        let decoded_value = percent_decode_str(value)
            .decode_utf8_lossy()
            .replace('+', " ");
        if key == "hash" {
            hash = Some(decoded_value);
        } else {
            pairs.push((key.to_string(), decoded_value));
        }
    }

    let hash = hash.ok_or(InitDataError::HashMissing)?;
    if hash.is_empty() {
        return Err(InitDataError::HashMissing);
    }

    let auth_date_raw = pairs
        .iter()
        .find(|(k, _)| k == "auth_date")
        .map(|(_, v)| v.clone())
        .ok_or(InitDataError::AuthDateMissing)?;
    if auth_date_raw.trim().is_empty() {
        return Err(InitDataError::AuthDateMissing);
    }
    let auth_date: i64 = auth_date_raw
        .trim()
        .parse()
        .map_err(|_| InitDataError::AuthDateInvalid)?;

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let data_check_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac =
        HmacSha256::new_from_slice(&secret).map_err(|_| InitDataError::SignatureInvalid)?;
    mac.update(data_check_string.as_bytes());
    let computed = mac.finalize().into_bytes();
    let computed_hex = hex_encode(&computed);

    if !secrets_match(&computed_hex, &hash) {
        return Err(InitDataError::SignatureInvalid);
    }

    let now = Utc::now().timestamp();
    if now - auth_date > max_age_secs {
        return Err(InitDataError::AuthDateExpired);
    }

    let user_raw = pairs
        .iter()
        .find(|(k, _)| k == "user")
        .map(|(_, v)| v.clone())
        .ok_or(InitDataError::UserMissing)?;
    if user_raw.trim().is_empty() {
        return Err(InitDataError::UserMissing);
    }
    let user: InitDataUser =
        serde_json::from_str(&user_raw).map_err(|_| InitDataError::UserInvalid)?;
    let user_id = match &user.id {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return Err(InitDataError::UserInvalid),
    };

    Ok(VerifiedIdentity { user_id })
}

/// Constant-time comparison, the same idiom as `secrets_match` (length check
/// up front, then `ConstantTimeEq` over the equal-length byte slices).
fn secrets_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(bot_token: &str, pairs: &[(&str, &str)]) -> String {
        let mut sorted: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let data_check_string = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");
        let secret = Sha256::digest(bot_token.as_bytes());
        let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
        mac.update(data_check_string.as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    fn build_init_data(bot_token: &str, auth_date: i64, user_json: &str) -> String {
        let pairs = vec![("auth_date", auth_date.to_string()), ("user", user_json.to_string())];
        let pair_refs: Vec<(&str, &str)> =
            pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let hash = sign(bot_token, &pair_refs);
        format!(
            "auth_date={}&user={}&hash={}",
            auth_date,
            percent_encoding::utf8_percent_encode(
                user_json,
                percent_encoding::NON_ALPHANUMERIC
            ),
            hash
        )
    }

    #[test]
    fn valid_signature_round_trips() {
        let now = Utc::now().timestamp();
        let init_data = build_init_data("bot-token", now, r#"{"id":42}"#);
        let identity = verify_init_data(&init_data, "bot-token", 86_400).unwrap();
        assert_eq!(identity.user_id, "42");
    }

    #[test]
    fn mutated_pair_invalidates_signature() {
        let now = Utc::now().timestamp();
        let mut init_data = build_init_data("bot-token", now, r#"{"id":42}"#);
        init_data = init_data.replace("id%22%3A42", "id%22%3A43");
        let err = verify_init_data(&init_data, "bot-token", 86_400).unwrap_err();
        assert_eq!(err, InitDataError::SignatureInvalid);
    }

    #[test]
    fn mutated_hash_invalidates_signature() {
        let now = Utc::now().timestamp();
        let mut init_data = build_init_data("bot-token", now, r#"{"id":42}"#);
        init_data.push('f');
        let err = verify_init_data(&init_data, "bot-token", 86_400).unwrap_err();
        assert_eq!(err, InitDataError::SignatureInvalid);
    }

    #[test]
    fn empty_init_data_is_rejected() {
        assert_eq!(
            verify_init_data("", "bot-token", 86_400).unwrap_err(),
            InitDataError::InitDataEmpty
        );
    }

    #[test]
    fn missing_hash_is_rejected() {
        let err = verify_init_data("auth_date=1&user=%7B%7D", "bot-token", 86_400).unwrap_err();
        assert_eq!(err, InitDataError::HashMissing);
    }

    #[test]
    fn expired_auth_date_is_rejected() {
        let stale = Utc::now().timestamp() - 100_000;
        let init_data = build_init_data("bot-token", stale, r#"{"id":7}"#);
        let err = verify_init_data(&init_data, "bot-token", 86_400).unwrap_err();
        assert_eq!(err, InitDataError::AuthDateExpired);
    }

    #[test]
    fn invalid_auth_date_is_rejected() {
        let init_data = "auth_date=not_a_number&user=%7B%7D&hash=deadbeef";
        let err = verify_init_data(init_data, "bot-token", 86_400).unwrap_err();
        assert_eq!(err, InitDataError::AuthDateInvalid);
    }

    #[test]
    fn missing_user_is_rejected() {
        let now = Utc::now().timestamp();
        let pairs = vec![("auth_date", now.to_string())];
        let pair_refs: Vec<(&str, &str)> =
            pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let hash = sign("bot-token", &pair_refs);
        let init_data = format!("auth_date={now}&hash={hash}");
        let err = verify_init_data(&init_data, "bot-token", 86_400).unwrap_err();
        assert_eq!(err, InitDataError::UserMissing);
    }
}
