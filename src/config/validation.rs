//! Configuration validation functions.

use super::Config;

/// Validate configuration for startup.
///
/// Returns `Err` for conditions that must abort startup: a missing
/// `TG_BOT_TOKEN` in production, or a missing `DATABASE_URL` in any mode.
/// Development-only relaxations (dev fallback auth) only warn.
pub fn validate_config_security(config: &Config) -> anyhow::Result<()> {
    let is_prod = is_production_mode();

    if config.database_url.as_deref().map(str::trim).unwrap_or("").is_empty() {
        anyhow::bail!(
            "DATABASE_URL is required (set the `database_url` field or DATABASE_URL env var)"
        );
    }

    let bot_token_present = config
        .security
        .tg_bot_token
        .as_deref()
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false);

    if !bot_token_present {
        if is_prod {
            anyhow::bail!(
                "TG_BOT_TOKEN is required in production for identity-proof verification"
            );
        }
        eprintln!(
            "WARNING: TG_BOT_TOKEN is not configured; initData verification will reject all requests \
             unless security.dev_allow_query_tguserid is enabled for local development"
        );
    }

    if config.security.dev_allow_query_tguserid && is_prod {
        anyhow::bail!(
            "security.dev_allow_query_tguserid must not be enabled in production"
        );
    }

    if config.security.effective_session_ttl_seconds() != config.security.session_ttl_seconds {
        eprintln!(
            "WARNING: security.session_ttl_seconds ({}) is below the 60s floor; clamping",
            config.security.session_ttl_seconds
        );
    }

    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks `BOMBER_ARENA__ENVIRONMENT`, `NODE_ENV`, and the well-known
/// `BOMBER_ARENA_PRODUCTION` / `PRODUCTION` / `PROD` environment variables.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("BOMBER_ARENA__ENVIRONMENT") {
        return mode.eq_ignore_ascii_case("production") || mode.eq_ignore_ascii_case("prod");
    }

    if let Ok(mode) = env::var("NODE_ENV") {
        return mode.eq_ignore_ascii_case("production");
    }

    env::var("BOMBER_ARENA_PRODUCTION").is_ok()
        || env::var("PRODUCTION").is_ok()
        || env::var("PROD").is_ok()
}
