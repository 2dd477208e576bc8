//! Root configuration types.

use super::defaults::default_port;
use super::gameplay::{GatewayConfig, LobbyConfig, MatchConfig, RateLimitConfig, ResumeConfig, RestartVoteConfig};
use super::logging::LoggingConfig;
use super::security::SecurityConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Postgres connection string. Required outside tests; `main` fails
    /// startup validation when it is absent.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub lobby: LobbyConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(rename = "match")]
    #[serde(default)]
    pub match_config: MatchConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub restart_vote: RestartVoteConfig,
    #[serde(default)]
    pub resume: ResumeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_url: None,
            security: SecurityConfig::default(),
            lobby: LobbyConfig::default(),
            rate_limit: RateLimitConfig::default(),
            match_config: MatchConfig::default(),
            gateway: GatewayConfig::default(),
            restart_vote: RestartVoteConfig::default(),
            resume: ResumeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Whether the process should behave as a production deployment, per
    /// `NODE_ENV`/`BOMBER_ARENA_PRODUCTION`/`PRODUCTION`/`PROD`.
    #[must_use]
    pub fn is_production(&self) -> bool {
        super::validation::is_production_mode()
    }
}
