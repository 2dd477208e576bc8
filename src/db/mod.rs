//! Persistent store (C1): users, sessions, rooms and room members, with
//! row-level locking for every room mutation.
//!
//! The core's out-of-scope REST surface (wallets, friends, leaderboard, shop)
//! is not modelled here — only the entities the match gateway and lobby
//! service actually touch.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered player, created on first authenticated login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: Option<String>,
    pub display_name: String,
    pub game_nickname: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Room status, independent of the in-match `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomStatus {
    Open,
    Closed,
}

/// Lobby→match phase lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoomPhase {
    Lobby,
    Started,
    Finished,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_code: String,
    pub owner_user_id: String,
    pub name: Option<String>,
    pub capacity: u8,
    pub status: RoomStatus,
    pub phase: RoomPhase,
    pub is_public: bool,
    pub password_hash: Option<String>,
    pub password_salt: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub started_by_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    pub room_code: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub ready: bool,
}

/// A session row keyed by the SHA-256 hash of the bearer token (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Failures the store surfaces; callers translate these into
/// [`crate::protocol::ErrorCode`] values.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room code already in use")]
    RoomCodeConflict,
    #[error("user is not a member of the room")]
    NotAMember,
    #[error("user never joined this room")]
    RoomNotJoined,
    #[error("user is already a member of the room")]
    AlreadyMember,
    #[error("room is full")]
    RoomFull,
    #[error("backing store error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Transactional operations over users/sessions/rooms/room_members.
///
/// Every mutating call is a single transaction with row-level locking on
/// the affected room; the Postgres implementation expresses this with
/// `SELECT ... FOR UPDATE`, the in-memory implementation with a per-room
/// async mutex.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Finds a user by id, creating a minimal record if none exists yet
    /// (first-login semantics).
    async fn get_or_create_user(&self, user_id: &str, display_name: &str) -> StoreResult<User>;

    async fn get_room(&self, room_code: &str) -> StoreResult<Option<Room>>;

    async fn get_members(&self, room_code: &str) -> StoreResult<Vec<RoomMember>>;

    /// `createRoom`: inserts an OPEN/LOBBY room with the owner as a `ready`
    /// member. Caller has already produced a candidate unique `room_code`.
    async fn insert_room(
        &self,
        room_code: &str,
        owner_user_id: &str,
        name: Option<&str>,
        capacity: u8,
        password_hash: Option<&str>,
        password_salt: Option<&str>,
    ) -> StoreResult<Room>;

    /// `joinRoom`: inserts a (not-ready) member row unless already a member.
    async fn insert_member(&self, room_code: &str, user_id: &str) -> StoreResult<()>;

    /// `setReady`
    async fn set_member_ready(&self, room_code: &str, user_id: &str, ready: bool) -> StoreResult<()>;

    /// `startRoom`: sets phase=STARTED, `startedAt=now`, idempotent if
    /// already started.
    async fn start_room(&self, room_code: &str, owner_user_id: &str) -> StoreResult<Room>;

    /// `leaveRoom`: deletes the caller's membership; if caller is owner,
    /// closes the room and deletes all members; deletes the room outright
    /// when the last member leaves.
    async fn remove_member(&self, room_code: &str, user_id: &str) -> StoreResult<()>;

    /// `closeRoom`
    async fn close_room(&self, room_code: &str, owner_user_id: &str) -> StoreResult<()>;

    /// `setRoomPhase`: updates phase; on STARTED keeps `startedAt` idempotent.
    async fn set_room_phase(&self, room_code: &str, phase: RoomPhase) -> StoreResult<()>;

    /// Inserts a session row keyed by `token_hash` (C2). Overwrites any
    /// existing row for the same hash (token collisions are astronomically
    /// unlikely but idempotent overwrite is cheap and harmless).
    async fn insert_session(&self, session: Session) -> StoreResult<()>;

    /// Resolves a token hash to its session row, iff not expired relative to
    /// the caller-supplied `now`. Expired rows are treated as absent but are
    /// not necessarily deleted eagerly.
    async fn resolve_session(&self, token_hash: &str, now: DateTime<Utc>) -> StoreResult<Option<Session>>;

    /// Deletes expired session rows; returns the number removed. Called
    /// periodically, not on the hot auth path.
    async fn prune_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
