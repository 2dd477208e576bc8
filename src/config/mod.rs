//! Configuration module.
//!
//! Supports JSON configuration files, environment variable overrides, stdin
//! input, and sensible defaults layered in that precedence order (see
//! [`loader::load`]).
//!
//! # Module Structure
//!
//! - [`types`]: Root `Config` struct
//! - [`gameplay`]: Lobby/match/gateway/restart-vote/resume tunables
//! - [`security`]: Identity-proof, session oracle and transport settings
//! - [`logging`]: Logging configuration
//! - [`loader`]: Configuration loading functions
//! - [`validation`]: Configuration validation functions
//! - [`defaults`]: Default value functions

pub mod defaults;
pub mod gameplay;
pub mod loader;
pub mod logging;
pub mod security;
pub mod types;
pub mod validation;

pub use gameplay::{
    GatewayConfig, LobbyConfig, MatchConfig, RateLimitConfig, ResumeConfig, RestartVoteConfig,
};
pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use security::SecurityConfig;
pub use types::Config;
pub use validation::{is_production_mode, validate_config_security};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.port, 3001);
        assert_eq!(config.match_config.tick_rate_hz, 20);
        assert_eq!(config.match_config.tick_period_ms, 50);
        assert_eq!(config.match_config.world_width, 27);
        assert_eq!(config.match_config.world_height, 14);
        assert_eq!(config.match_config.initial_lives, 3);
        assert_eq!(config.match_config.bomb_fuse_ticks, 30);
        assert_eq!(config.match_config.bomb_range, 2);
        assert_eq!(config.match_config.move_duration_ticks, 6);

        assert_eq!(config.gateway.rejoin_grace_secs, 60);
        assert_eq!(config.gateway.rejoin_handshake_secs, 4);
        assert_eq!(config.gateway.stale_connection_secs, 60);
        assert_eq!(config.gateway.stale_room_secs, 90);
        assert_eq!(config.gateway.sweep_interval_secs, 10);

        assert_eq!(config.restart_vote.timeout_secs, 10);
        assert_eq!(config.restart_vote.cooldown_secs, 60);
        assert_eq!(config.restart_vote.spam_strikes, 3);

        assert_eq!(config.resume.ttl_secs, 60);
        assert_eq!(config.lobby.room_code_length, 6);

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization_round_trips() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.port, deserialized.port);
        assert_eq!(
            config.match_config.tick_rate_hz,
            deserialized.match_config.tick_rate_hz
        );
        assert_eq!(
            config.gateway.rejoin_grace_secs,
            deserialized.gateway.rejoin_grace_secs
        );
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn session_ttl_is_clamped_to_floor() {
        let mut config = Config::default();
        config.security.session_ttl_seconds = 5;
        assert_eq!(config.security.effective_session_ttl_seconds(), 60);
    }
}
