//! Match simulator, lobby, gateway and restart-vote tunables.

use super::defaults::*;
use serde::{Deserialize, Serialize};

/// Lobby service (C3) tunables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LobbyConfig {
    /// Room code length; generators must only emit the documented
    /// ambiguous-char-free alphabet.
    #[serde(default = "default_room_code_length")]
    pub room_code_length: usize,
    /// scrypt log2(N) cost parameter.
    #[serde(default = "default_scrypt_log_n")]
    pub scrypt_log_n: u8,
    /// scrypt block size parameter `r`.
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,
    /// scrypt parallelization parameter `p`.
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,
    /// Salt length in bytes.
    #[serde(default = "default_password_salt_len")]
    pub password_salt_len: usize,
    /// Derived key length in bytes.
    #[serde(default = "default_password_key_len")]
    pub password_key_len: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            room_code_length: default_room_code_length(),
            scrypt_log_n: default_scrypt_log_n(),
            scrypt_r: default_scrypt_r(),
            scrypt_p: default_scrypt_p(),
            password_salt_len: default_password_salt_len(),
            password_key_len: default_password_key_len(),
        }
    }
}

/// Rate limiting configuration shared by the lobby (room creation / join
/// attempts, keyed by user) and gateway (input messages, keyed by connection)
/// limiters. Both use the same window-reset idiom but are distinct instances.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of room creation requests per time window.
    #[serde(default = "default_max_room_creations")]
    pub max_room_creations: u32,
    /// Time window for the lobby rate limiter (seconds).
    #[serde(default = "default_lobby_rate_limit_window_secs")]
    pub lobby_window_secs: u64,
    /// Maximum number of join attempts per time window.
    #[serde(default = "default_max_join_attempts")]
    pub max_join_attempts: u32,
    /// Maximum `match:input` messages accepted per connection per second.
    #[serde(default = "default_input_rate_per_sec")]
    pub input_rate_per_sec: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_room_creations: default_max_room_creations(),
            lobby_window_secs: default_lobby_rate_limit_window_secs(),
            max_join_attempts: default_max_join_attempts(),
            input_rate_per_sec: default_input_rate_per_sec(),
        }
    }
}

/// Match simulator and manager (C4/C5) tunables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchConfig {
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    #[serde(default = "default_world_width")]
    pub world_width: u32,
    #[serde(default = "default_world_height")]
    pub world_height: u32,
    #[serde(default = "default_initial_lives")]
    pub initial_lives: u32,
    #[serde(default = "default_max_bombs_per_player")]
    pub max_bombs_per_player: u32,
    #[serde(default = "default_bomb_fuse_ticks")]
    pub bomb_fuse_ticks: u32,
    #[serde(default = "default_bomb_range")]
    pub bomb_range: u32,
    #[serde(default = "default_move_duration_ticks")]
    pub move_duration_ticks: u32,
    #[serde(default = "default_enemy_move_interval_ticks")]
    pub enemy_move_interval_ticks: u32,
    /// Number of AI enemies spawned into a fresh match.
    #[serde(default = "default_enemy_count")]
    pub enemy_count: u32,
    #[serde(default = "default_respawn_delay_ticks")]
    pub respawn_delay_ticks: u32,
    #[serde(default = "default_invuln_ticks")]
    pub invuln_ticks: u32,
    #[serde(default = "default_enemy_contact_cooldown_ticks")]
    pub enemy_contact_cooldown_ticks: u32,
    #[serde(default = "default_input_queue_capacity")]
    pub input_queue_capacity: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            tick_period_ms: default_tick_period_ms(),
            world_width: default_world_width(),
            world_height: default_world_height(),
            initial_lives: default_initial_lives(),
            max_bombs_per_player: default_max_bombs_per_player(),
            bomb_fuse_ticks: default_bomb_fuse_ticks(),
            bomb_range: default_bomb_range(),
            move_duration_ticks: default_move_duration_ticks(),
            enemy_move_interval_ticks: default_enemy_move_interval_ticks(),
            enemy_count: default_enemy_count(),
            respawn_delay_ticks: default_respawn_delay_ticks(),
            invuln_ticks: default_invuln_ticks(),
            enemy_contact_cooldown_ticks: default_enemy_contact_cooldown_ticks(),
            input_queue_capacity: default_input_queue_capacity(),
        }
    }
}

/// WS Gateway (C6) and sweep tunables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_rejoin_grace_secs")]
    pub rejoin_grace_secs: u64,
    #[serde(default = "default_rejoin_handshake_secs")]
    pub rejoin_handshake_secs: u64,
    #[serde(default = "default_stale_connection_secs")]
    pub stale_connection_secs: u64,
    #[serde(default = "default_stale_room_secs")]
    pub stale_room_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_log_snapshot_broadcast")]
    pub log_snapshot_broadcast: bool,
    #[serde(default = "default_log_snapshot_broadcast_every")]
    pub log_snapshot_broadcast_every: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_timeout_secs: default_auth_timeout_secs(),
            rejoin_grace_secs: default_rejoin_grace_secs(),
            rejoin_handshake_secs: default_rejoin_handshake_secs(),
            stale_connection_secs: default_stale_connection_secs(),
            stale_room_secs: default_stale_room_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            log_snapshot_broadcast: default_log_snapshot_broadcast(),
            log_snapshot_broadcast_every: default_log_snapshot_broadcast_every(),
        }
    }
}

/// Restart Vote FSM (C7) tunables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RestartVoteConfig {
    #[serde(default = "default_restart_vote_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_restart_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_restart_spam_strikes")]
    pub spam_strikes: u32,
}

impl Default for RestartVoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_restart_vote_timeout_secs(),
            cooldown_secs: default_restart_cooldown_secs(),
            spam_strikes: default_restart_spam_strikes(),
        }
    }
}

/// Resume Service (C8) tunables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResumeConfig {
    #[serde(default = "default_resume_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_resume_ttl_secs(),
        }
    }
}
