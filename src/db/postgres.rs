//! Postgres-backed [`PersistentStore`]. Every mutation runs inside a
//! transaction that takes `SELECT ... FOR UPDATE` on the room row under
//! contention.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};

use super::{
    PersistentStore, Room, RoomMember, RoomPhase, RoomStatus, Session, StoreError, StoreResult,
    User,
};

/// A fixed advisory lock id guarding schema migrations, so only one server
/// instance applies DDL on startup even when several boot concurrently.
const MIGRATION_ADVISORY_LOCK_ID: i64 = 0x626F_6D62; // "bomb" in hex, arbitrary but stable

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Applies schema migrations under a Postgres advisory lock so that a
    /// fleet of concurrently-starting instances does not race on DDL.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_ADVISORY_LOCK_ID)
            .execute(&self.pool)
            .await?;

        let result = sqlx::migrate!("./migrations").run(&self.pool).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_ADVISORY_LOCK_ID)
            .execute(&self.pool)
            .await?;

        result.map_err(anyhow::Error::from)
    }

    fn row_to_room(row: &sqlx::postgres::PgRow) -> Room {
        let status: String = row.get("status");
        let phase: String = row.get("phase");
        Room {
            room_code: row.get("room_code"),
            owner_user_id: row.get("owner_user_id"),
            name: row.get("name"),
            capacity: row.get::<i16, _>("capacity") as u8,
            status: if status == "OPEN" { RoomStatus::Open } else { RoomStatus::Closed },
            phase: match phase.as_str() {
                "STARTED" => RoomPhase::Started,
                "FINISHED" => RoomPhase::Finished,
                _ => RoomPhase::Lobby,
            },
            is_public: row.get("is_public"),
            password_hash: row.get("password_hash"),
            password_salt: row.get("password_salt"),
            started_at: row.get("started_at"),
            started_by_user_id: row.get("started_by_user_id"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(FromRow)]
struct MemberRow {
    room_code: String,
    user_id: String,
    joined_at: DateTime<Utc>,
    ready: bool,
}

impl From<MemberRow> for RoomMember {
    fn from(row: MemberRow) -> Self {
        Self {
            room_code: row.room_code,
            user_id: row.user_id,
            joined_at: row.joined_at,
            ready: row.ready,
        }
    }
}

#[async_trait]
impl PersistentStore for PostgresStore {
    async fn get_or_create_user(&self, user_id: &str, display_name: &str) -> StoreResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (user_id, display_name, created_at, updated_at)
             VALUES ($1, $2, now(), now())
             ON CONFLICT (user_id) DO UPDATE SET updated_at = users.updated_at
             RETURNING user_id, username, display_name, game_nickname, created_at, updated_at",
        )
        .bind(user_id)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(User {
            user_id: row.get("user_id"),
            username: row.get("username"),
            display_name: row.get("display_name"),
            game_nickname: row.get("game_nickname"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn get_room(&self, room_code: &str) -> StoreResult<Option<Room>> {
        let row = sqlx::query("SELECT * FROM rooms WHERE room_code = $1")
            .bind(room_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_room))
    }

    async fn get_members(&self, room_code: &str) -> StoreResult<Vec<RoomMember>> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT room_code, user_id, joined_at, ready FROM room_members WHERE room_code = $1",
        )
        .bind(room_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.into_iter().map(RoomMember::from).collect())
    }

    async fn insert_room(
        &self,
        room_code: &str,
        owner_user_id: &str,
        name: Option<&str>,
        capacity: u8,
        password_hash: Option<&str>,
        password_salt: Option<&str>,
    ) -> StoreResult<Room> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let existing = sqlx::query("SELECT 1 FROM rooms WHERE room_code = $1 FOR UPDATE")
            .bind(room_code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if existing.is_some() {
            return Err(StoreError::RoomCodeConflict);
        }

        let row = sqlx::query(
            "INSERT INTO rooms (room_code, owner_user_id, name, capacity, status, phase,
                                 is_public, password_hash, password_salt, created_at)
             VALUES ($1, $2, $3, $4, 'OPEN', 'LOBBY', $5, $6, $7, now())
             RETURNING *",
        )
        .bind(room_code)
        .bind(owner_user_id)
        .bind(name)
        .bind(i16::from(capacity))
        .bind(password_hash.is_none())
        .bind(password_hash)
        .bind(password_salt)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "INSERT INTO room_members (room_code, user_id, joined_at, ready)
             VALUES ($1, $2, now(), true)",
        )
        .bind(room_code)
        .bind(owner_user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::row_to_room(&row))
    }

    async fn insert_member(&self, room_code: &str, user_id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let room = sqlx::query("SELECT 1 FROM rooms WHERE room_code = $1 FOR UPDATE")
            .bind(room_code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if room.is_none() {
            return Err(StoreError::RoomNotFound);
        }

        sqlx::query(
            "INSERT INTO room_members (room_code, user_id, joined_at, ready)
             VALUES ($1, $2, now(), false)
             ON CONFLICT (room_code, user_id) DO NOTHING",
        )
        .bind(room_code)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn set_member_ready(&self, room_code: &str, user_id: &str, ready: bool) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE room_members SET ready = $3 WHERE room_code = $1 AND user_id = $2",
        )
        .bind(room_code)
        .bind(user_id)
        .bind(ready)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotAMember);
        }
        Ok(())
    }

    async fn start_room(&self, room_code: &str, owner_user_id: &str) -> StoreResult<Room> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let row = sqlx::query("SELECT * FROM rooms WHERE room_code = $1 FOR UPDATE")
            .bind(room_code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::RoomNotFound)?;

        let already_started: Option<DateTime<Utc>> = row.get("started_at");
        let updated = if already_started.is_none() {
            sqlx::query(
                "UPDATE rooms SET phase = 'STARTED', started_at = now(), started_by_user_id = $2
                 WHERE room_code = $1 RETURNING *",
            )
            .bind(room_code)
            .bind(owner_user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
        } else {
            row
        };

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::row_to_room(&updated))
    }

    async fn remove_member(&self, room_code: &str, user_id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let room = sqlx::query("SELECT owner_user_id FROM rooms WHERE room_code = $1 FOR UPDATE")
            .bind(room_code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(room) = room else {
            return Err(StoreError::RoomNotJoined);
        };
        let owner_user_id: String = room.get("owner_user_id");

        if owner_user_id == user_id {
            sqlx::query("DELETE FROM room_members WHERE room_code = $1")
                .bind(room_code)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            sqlx::query("DELETE FROM rooms WHERE room_code = $1")
                .bind(room_code)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        } else {
            let deleted = sqlx::query("DELETE FROM room_members WHERE room_code = $1 AND user_id = $2")
                .bind(room_code)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

            if deleted.rows_affected() == 0 {
                return Err(StoreError::RoomNotJoined);
            }

            let remaining: i64 = sqlx::query("SELECT count(*) AS c FROM room_members WHERE room_code = $1")
                .bind(room_code)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .get("c");

            if remaining == 0 {
                sqlx::query("DELETE FROM rooms WHERE room_code = $1")
                    .bind(room_code)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn close_room(&self, room_code: &str, owner_user_id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let row = sqlx::query("SELECT owner_user_id FROM rooms WHERE room_code = $1 FOR UPDATE")
            .bind(room_code)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::RoomNotFound)?;
        let owner: String = row.get("owner_user_id");
        if owner != owner_user_id {
            return Err(StoreError::NotAMember);
        }

        sqlx::query("UPDATE rooms SET status = 'CLOSED' WHERE room_code = $1")
            .bind(room_code)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("DELETE FROM room_members WHERE room_code = $1")
            .bind(room_code)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn set_room_phase(&self, room_code: &str, phase: RoomPhase) -> StoreResult<()> {
        let phase_str = match phase {
            RoomPhase::Lobby => "LOBBY",
            RoomPhase::Started => "STARTED",
            RoomPhase::Finished => "FINISHED",
        };

        let result = sqlx::query(
            "UPDATE rooms SET phase = $2,
                 started_at = CASE WHEN $2 = 'STARTED' AND started_at IS NULL THEN now() ELSE started_at END
             WHERE room_code = $1",
        )
        .bind(room_code)
        .bind(phase_str)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RoomNotFound);
        }
        Ok(())
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (token_hash) DO UPDATE SET expires_at = excluded.expires_at",
        )
        .bind(&session.token_hash)
        .bind(&session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn resolve_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT token_hash, user_id, created_at, expires_at FROM sessions
             WHERE token_hash = $1 AND expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.map(|row| Session {
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn prune_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
