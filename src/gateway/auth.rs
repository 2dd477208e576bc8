//! Handshake authentication: resolves a `/ws` upgrade request to a
//! `(user_id, display_name)` pair before the socket is accepted.
//!
//! Generalized from `websocket::connection`'s authenticate-
//! then-route shape, which validates an `appId` post-upgrade; here
//! authentication happens pre-upgrade against three credential sources in
//! priority order: an existing session token, a fresh `initData` proof, and
//! (development only) a bare `tgUserId` query parameter.

use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::config::{is_production_mode, Config};
use crate::db::PersistentStore;
use crate::identity::verify_init_data;
use crate::protocol::ErrorCode;

use super::state::GatewayState;

pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub display_name: String,
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}

fn subprotocol_credential(headers: &HeaderMap, prefix: &str) -> Option<String> {
    let value = headers
        .get(axum::http::header::SEC_WEBSOCKET_PROTOCOL)?
        .to_str()
        .ok()?;
    value
        .split(',')
        .map(str::trim)
        .find_map(|candidate| candidate.strip_prefix(prefix).map(str::to_string))
}

fn session_token_candidate(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    bearer_from_headers(headers)
        .or_else(|| query.get("sessionToken").cloned())
        .or_else(|| query.get("token").cloned())
        .or_else(|| query.get("accessToken").cloned())
        .or_else(|| subprotocol_credential(headers, "session_token."))
}

fn init_data_candidate(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<String> {
    headers
        .get("x-telegram-init-data")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query.get("initData").cloned())
        .or_else(|| subprotocol_credential(headers, "init_data."))
}

/// Resolves the connecting client's identity, per the credential-priority
/// order documented above. On success the user is guaranteed to exist in
/// the persistent store (first-login semantics).
pub async fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Result<AuthenticatedIdentity, ErrorCode> {
    if let Some(raw_token) = session_token_candidate(headers, query) {
        match state.sessions.resolve(&raw_token).await {
            Ok(Some(user_id)) => {
                let user = state
                    .store
                    .get_or_create_user(&user_id, &user_id)
                    .await
                    .map_err(|_| ErrorCode::InternalError)?;
                return Ok(AuthenticatedIdentity {
                    user_id: user.user_id,
                    display_name: user.display_name,
                });
            }
            Ok(None) => return Err(ErrorCode::WsAuthFailed),
            Err(_) => return Err(ErrorCode::InternalError),
        }
    }

    if let Some(raw_init_data) = init_data_candidate(headers, query) {
        return authenticate_init_data(state, &raw_init_data).await;
    }

    if dev_fallback_allowed(&state.config) {
        if let Some(user_id) = query.get("tgUserId") {
            let user = state
                .store
                .get_or_create_user(user_id, user_id)
                .await
                .map_err(|_| ErrorCode::InternalError)?;
            return Ok(AuthenticatedIdentity {
                user_id: user.user_id,
                display_name: user.display_name,
            });
        }
    }

    Err(ErrorCode::WsAuthFailed)
}

async fn authenticate_init_data(
    state: &GatewayState,
    raw_init_data: &str,
) -> Result<AuthenticatedIdentity, ErrorCode> {
    let bot_token = state
        .config
        .security
        .tg_bot_token
        .as_deref()
        .ok_or(ErrorCode::WsAuthFailed)?;

    let identity = verify_init_data(raw_init_data, bot_token, state.config.security.identity_max_age_secs)
        .map_err(|e| e.error_code())?;

    let user = state
        .store
        .get_or_create_user(&identity.user_id, &identity.user_id)
        .await
        .map_err(|_| ErrorCode::InternalError)?;

    Ok(AuthenticatedIdentity { user_id: user.user_id, display_name: user.display_name })
}

/// The dev-only `tgUserId` fallback is refused in production regardless of
/// the config flag — a hard safety rail against accidentally shipping it.
fn dev_fallback_allowed(config: &Config) -> bool {
    config.security.dev_allow_query_tguserid && !is_production_mode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_from_headers(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn subprotocol_prefix_is_matched() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::SEC_WEBSOCKET_PROTOCOL,
            "session_token.xyz".parse().unwrap(),
        );
        assert_eq!(subprotocol_credential(&headers, "session_token."), Some("xyz".to_string()));
    }
}
