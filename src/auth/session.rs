//! The Session Oracle (C2): mints and resolves bearer session tokens.
//!
//! Modeled on `auth::middleware`'s hashing idiom (SHA-256 over
//! an opaque secret, compared rather than stored in clear) and
//! `reconnection::ReconnectionToken`'s created/expires bookkeeping, adapted
//! from a UUID-per-token scheme to a 24-byte-random/SHA-256-hash
//! scheme.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use getrandom::fill as fill_random;
use sha2::{Digest, Sha256};

use crate::db::{PersistentStore, Session, StoreError};

/// Number of random bytes in a freshly minted session token.
const TOKEN_BYTES: usize = 24;

fn hash_token(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    use std::fmt::Write;
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Generates a fresh URL-safe session token. The raw value is returned to
/// the caller to hand to the client; only its SHA-256 hash is persisted.
#[must_use]
pub fn mint_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    fill_random(&mut bytes).expect("system entropy source must be available");
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Resolves bearer tokens to `tgUserId`s and mints new sessions.
pub struct SessionOracle {
    store: Arc<dyn PersistentStore>,
    ttl_seconds: u64,
}

impl SessionOracle {
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Mints and persists a new session for `user_id`; returns the raw
    /// bearer token to hand back to the client.
    pub async fn create_session(&self, user_id: &str) -> Result<String, StoreError> {
        let raw_token = mint_session_token();
        let now = Utc::now();
        let session = Session {
            token_hash: hash_token(&raw_token),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + Duration::seconds(self.ttl_seconds as i64),
        };
        self.store.insert_session(session).await?;
        Ok(raw_token)
    }

    /// Resolves a raw bearer token to its owning `tgUserId`, iff a
    /// non-expired session exists for its hash.
    pub async fn resolve(&self, raw_token: &str) -> Result<Option<String>, StoreError> {
        let hash = hash_token(raw_token);
        let now = Utc::now();
        let session = self.store.resolve_session(&hash, now).await?;
        Ok(session.map(|s| s.user_id))
    }

    /// Background sweep: deletes session rows whose `expires_at` has
    /// passed. Not on the hot auth path (C1's `prune_expired_sessions`).
    pub async fn prune_expired(&self) -> Result<u64, StoreError> {
        self.store.prune_expired_sessions(Utc::now()).await
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Whether `expires_at` has already elapsed relative to `now`; exposed
    /// for callers that hold a [`Session`] directly (e.g. the gateway's
    /// rejoin path) without re-querying the store.
    #[must_use]
    pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    #[tokio::test]
    async fn create_then_resolve_round_trips() {
        let store = Arc::new(InMemoryStore::new());
        let oracle = SessionOracle::new(store, 3600);
        let token = oracle.create_session("u1").await.unwrap();
        let resolved = oracle.resolve(&token).await.unwrap();
        assert_eq!(resolved.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let store = Arc::new(InMemoryStore::new());
        let oracle = SessionOracle::new(store, 3600);
        let resolved = oracle.resolve("not-a-real-token").await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn expired_session_resolves_to_none() {
        let store = Arc::new(InMemoryStore::new());
        let oracle = SessionOracle::new(store.clone(), 0);
        let token = oracle.create_session("u1").await.unwrap();
        // ttl_seconds=0 means expires_at==created_at; sleep a tick so `now` moves past it.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let resolved = oracle.resolve(&token).await.unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn minted_tokens_are_unique() {
        let a = mint_session_token();
        let b = mint_session_token();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
