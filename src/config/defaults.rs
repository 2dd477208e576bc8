//! Default value functions for configuration fields.
//!
//! Organized by category so `#[serde(default = ...)]` attributes throughout
//! the configuration system stay close to their documented rationale.

use super::logging::LogFormat;

// =============================================================================
// Root / transport
// =============================================================================

pub const fn default_port() -> u16 {
    3001
}

pub fn default_cors_origins() -> String {
    "http://localhost:3000,http://localhost:5173".to_string()
}

pub const fn default_max_message_size() -> usize {
    65536 // 64KB
}

pub const fn default_max_connections_per_ip() -> usize {
    10
}

// =============================================================================
// Session oracle (C2)
// =============================================================================

/// 30 days, expressed in seconds.
pub const fn default_session_ttl_seconds() -> u64 {
    30 * 24 * 60 * 60
}

/// Sessions may never be configured shorter than this floor.
pub const fn session_ttl_floor_seconds() -> u64 {
    60
}

pub const fn default_identity_max_age_secs() -> i64 {
    24 * 60 * 60
}

pub const fn default_dev_allow_query_tguserid() -> bool {
    false
}

// =============================================================================
// Lobby (C3)
// =============================================================================

pub const fn default_room_code_length() -> usize {
    6
}

pub const fn default_max_room_creations() -> u32 {
    5
}

pub const fn default_lobby_rate_limit_window_secs() -> u64 {
    60
}

pub const fn default_max_join_attempts() -> u32 {
    20
}

pub const fn default_scrypt_log_n() -> u8 {
    14
}

pub const fn default_scrypt_r() -> u32 {
    8
}

pub const fn default_scrypt_p() -> u32 {
    1
}

pub const fn default_password_salt_len() -> usize {
    16
}

pub const fn default_password_key_len() -> usize {
    64
}

// =============================================================================
// Match simulator / manager (C4, C5)
// =============================================================================

pub const fn default_tick_rate_hz() -> u32 {
    20
}

pub const fn default_tick_period_ms() -> u64 {
    50
}

pub const fn default_world_width() -> u32 {
    27
}

pub const fn default_world_height() -> u32 {
    14
}

pub const fn default_initial_lives() -> u32 {
    3
}

pub const fn default_max_bombs_per_player() -> u32 {
    1
}

pub const fn default_bomb_fuse_ticks() -> u32 {
    30
}

pub const fn default_bomb_range() -> u32 {
    2
}

pub const fn default_move_duration_ticks() -> u32 {
    6
}

pub const fn default_enemy_move_interval_ticks() -> u32 {
    10
}

pub const fn default_enemy_count() -> u32 {
    4
}

pub const fn default_respawn_delay_ticks() -> u32 {
    24
}

pub const fn default_invuln_ticks() -> u32 {
    20
}

pub const fn default_enemy_contact_cooldown_ticks() -> u32 {
    12
}

// =============================================================================
// Gateway (C6)
// =============================================================================

pub const fn default_input_rate_per_sec() -> u32 {
    30
}

pub const fn default_input_queue_capacity() -> usize {
    500
}

pub const fn default_rejoin_grace_secs() -> u64 {
    60
}

pub const fn default_rejoin_handshake_secs() -> u64 {
    4
}

pub const fn default_stale_connection_secs() -> u64 {
    60
}

pub const fn default_stale_room_secs() -> u64 {
    90
}

pub const fn default_sweep_interval_secs() -> u64 {
    10
}

pub const fn default_auth_timeout_secs() -> u64 {
    10
}

pub const fn default_log_snapshot_broadcast() -> bool {
    false
}

pub const fn default_log_snapshot_broadcast_every() -> u64 {
    100
}

// =============================================================================
// Restart vote FSM (C7)
// =============================================================================

pub const fn default_restart_vote_timeout_secs() -> u64 {
    10
}

pub const fn default_restart_cooldown_secs() -> u64 {
    60
}

pub const fn default_restart_spam_strikes() -> u32 {
    3
}

// =============================================================================
// Resume service (C8)
// =============================================================================

pub const fn default_resume_ttl_secs() -> u64 {
    60
}

// =============================================================================
// Logging defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    true
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
