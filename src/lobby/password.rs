//! Room password hashing: scrypt (`N=2^14, r=8, p=1`, 64-byte derived key,
//! 16-byte salt), with constant-time verification.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use getrandom::fill as fill_random;
use scrypt::{scrypt, Params};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::LobbyConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid scrypt parameters: {0}")]
    InvalidParams(String),
    #[error("scrypt key derivation failed")]
    DerivationFailed,
    #[error("stored salt or hash is not valid base64")]
    InvalidEncoding,
    #[error("failed to obtain secure random bytes")]
    EntropyUnavailable,
}

fn params(cfg: &LobbyConfig) -> Result<Params, PasswordError> {
    Params::new(cfg.scrypt_log_n, cfg.scrypt_r, cfg.scrypt_p, cfg.password_key_len)
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))
}

/// Hashes `password` with a freshly generated salt; returns
/// `(password_hash_b64, password_salt_b64)` for storage on the `Room` row.
pub fn hash_password(password: &str, cfg: &LobbyConfig) -> Result<(String, String), PasswordError> {
    let mut salt = vec![0u8; cfg.password_salt_len];
    fill_random(&mut salt).map_err(|_| PasswordError::EntropyUnavailable)?;

    let mut derived = vec![0u8; cfg.password_key_len];
    scrypt(password.as_bytes(), &salt, &params(cfg)?, &mut derived)
        .map_err(|_| PasswordError::DerivationFailed)?;

    Ok((BASE64.encode(&derived), BASE64.encode(&salt)))
}

/// Verifies `password` against a stored `(hash_b64, salt_b64)` pair using a
/// constant-time comparison of the derived keys.
pub fn verify_password(
    password: &str,
    stored_hash_b64: &str,
    stored_salt_b64: &str,
    cfg: &LobbyConfig,
) -> Result<bool, PasswordError> {
    let salt = BASE64
        .decode(stored_salt_b64)
        .map_err(|_| PasswordError::InvalidEncoding)?;
    let expected = BASE64
        .decode(stored_hash_b64)
        .map_err(|_| PasswordError::InvalidEncoding)?;

    let mut derived = vec![0u8; expected.len().max(cfg.password_key_len)];
    scrypt(password.as_bytes(), &salt, &params(cfg)?, &mut derived)
        .map_err(|_| PasswordError::DerivationFailed)?;

    Ok(derived.ct_eq(&expected).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LobbyConfig {
        // Small N for fast tests; production defaults are 2^14.
        LobbyConfig {
            room_code_length: 6,
            scrypt_log_n: 4,
            scrypt_r: 8,
            scrypt_p: 1,
            password_salt_len: 16,
            password_key_len: 64,
        }
    }

    #[test]
    fn matching_password_verifies() {
        let cfg = test_config();
        let (hash, salt) = hash_password("hunter2", &cfg).unwrap();
        assert!(verify_password("hunter2", &hash, &salt, &cfg).unwrap());
    }

    #[test]
    fn wrong_password_fails() {
        let cfg = test_config();
        let (hash, salt) = hash_password("hunter2", &cfg).unwrap();
        assert!(!verify_password("wrong", &hash, &salt, &cfg).unwrap());
    }

    #[test]
    fn distinct_salts_for_same_password() {
        let cfg = test_config();
        let (_, salt_a) = hash_password("hunter2", &cfg).unwrap();
        let (_, salt_b) = hash_password("hunter2", &cfg).unwrap();
        assert_ne!(salt_a, salt_b);
    }
}
