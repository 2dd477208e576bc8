//! Shared wire-level types referenced by both client and server messages.

use serde::{Deserialize, Serialize};

/// A single live bomb, as shown to clients inside a [`super::messages::MatchSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BombView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub owner_id: String,
    pub tick_placed: u32,
    pub explode_at_tick: u32,
}

/// Authoritative + interpolation fields for one player, as broadcast in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: String,
    pub display_name: String,
    pub color_id: u8,
    pub skin_id: Option<String>,
    pub last_input_seq: u32,
    pub x: i32,
    pub y: i32,
    pub is_moving: bool,
    pub move_from_x: i32,
    pub move_from_y: i32,
    pub move_to_x: i32,
    pub move_to_y: i32,
    pub move_start_tick: u32,
    pub move_duration_ticks: u32,
    pub move_start_server_time_ms: i64,
    pub move_duration_ms: u32,
    pub lives: u32,
    pub score: i64,
    pub eliminated: bool,
    pub disconnected: bool,
}

/// A single enemy, as broadcast in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub alive: bool,
    pub is_moving: bool,
    pub move_from_x: i32,
    pub move_from_y: i32,
    pub move_to_x: i32,
    pub move_to_y: i32,
    pub move_start_tick: u32,
    pub move_duration_ticks: u32,
    pub move_start_server_time_ms: i64,
}

/// The tile grid plus its deterministic hash, sent once in `match:world_init`
/// and embedded (sans `tiles`) in every `match:snapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldView {
    pub grid_w: u32,
    pub grid_h: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<u8>>,
    pub world_hash: String,
}

/// Embedded bomb/world state inside a snapshot (no full tile array, just the hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotWorld {
    pub grid_w: u32,
    pub grid_h: u32,
    pub world_hash: String,
    pub bombs: Vec<BombView>,
}

/// The full authoritative-state snapshot broadcast every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub version: String,
    pub room_code: String,
    pub match_id: String,
    pub tick: u32,
    pub server_time: i64,
    pub server_time_ms: i64,
    pub world: SnapshotWorld,
    pub score: i64,
    pub players: Vec<PlayerView>,
    pub enemies: Vec<EnemyView>,
}

/// Movement intent carried by a `match:input{payload:{kind:"move",...}}` frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// The tagged payload carried by `match:input`. Only `move` is accepted from
/// the gateway today; bomb placement goes through the dedicated
/// `match:bomb_place` message and `tryPlaceBomb`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputPayload {
    Move { dir: Option<Direction> },
}

/// Coordinates carried by `match:bomb_place`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BombPlacePayload {
    pub x: i32,
    pub y: i32,
}

/// A restart-vote ballot value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RestartVoteChoice {
    Yes,
    No,
}
