//! Security, identity and session configuration types.

use super::defaults::{
    default_cors_origins, default_dev_allow_query_tguserid, default_identity_max_age_secs,
    default_max_connections_per_ip, default_max_message_size, default_session_ttl_seconds,
    session_ttl_floor_seconds,
};
use serde::{Deserialize, Serialize};

/// Security configuration: transport limits, identity-proof verification,
/// and the session oracle's token lifetime.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    /// Allowed CORS origins (comma-separated, or "*" for any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
    /// Maximum WebSocket message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum connections per IP address
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,
    /// Bot token used to derive the HMAC secret for `initData` verification.
    /// Required outside development mode; absence is only tolerated when
    /// `dev_allow_query_tguserid` is set and the process is not in production.
    #[serde(default)]
    pub tg_bot_token: Option<String>,
    /// Maximum age, in seconds, of an `initData.auth_date` before it is
    /// considered expired.
    #[serde(default = "default_identity_max_age_secs")]
    pub identity_max_age_secs: i64,
    /// Session token lifetime in seconds; clamped to a 60s floor.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
    /// Internal key required for privileged (non-gameplay) endpoints.
    #[serde(default)]
    pub internal_key: Option<String>,
    /// Dev-only fallback: accept a bare `tgUserId` query parameter as proof
    /// of identity. Refused outside non-production environments regardless
    /// of this flag.
    #[serde(default = "default_dev_allow_query_tguserid")]
    pub dev_allow_query_tguserid: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: default_cors_origins(),
            max_message_size: default_max_message_size(),
            max_connections_per_ip: default_max_connections_per_ip(),
            tg_bot_token: None,
            identity_max_age_secs: default_identity_max_age_secs(),
            session_ttl_seconds: default_session_ttl_seconds(),
            internal_key: None,
            dev_allow_query_tguserid: default_dev_allow_query_tguserid(),
        }
    }
}

impl SecurityConfig {
    /// Session TTL, clamped to the documented 60s floor.
    #[must_use]
    pub fn effective_session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds.max(session_ttl_floor_seconds())
    }
}
