//! In-memory [`PersistentStore`], used in tests and for local development
//! without a Postgres instance. Mirrors the locking discipline of the real
//! store: one mutex per room code serializes every mutation against that
//! room, while cross-room operations proceed independently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    PersistentStore, Room, RoomMember, RoomPhase, RoomStatus, Session, StoreError, StoreResult,
    User,
};

#[derive(Default)]
pub struct InMemoryStore {
    users: DashMap<String, User>,
    rooms: DashMap<String, Room>,
    members: DashMap<String, Vec<RoomMember>>,
    room_locks: DashMap<String, Arc<Mutex<()>>>,
    sessions: DashMap<String, Session>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, room_code: &str) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn get_or_create_user(&self, user_id: &str, display_name: &str) -> StoreResult<User> {
        if let Some(user) = self.users.get(user_id) {
            return Ok(user.clone());
        }
        let now = Utc::now();
        let user = User {
            user_id: user_id.to_string(),
            username: None,
            display_name: display_name.to_string(),
            game_nickname: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user_id.to_string(), user.clone());
        Ok(user)
    }

    async fn get_room(&self, room_code: &str) -> StoreResult<Option<Room>> {
        Ok(self.rooms.get(room_code).map(|r| r.clone()))
    }

    async fn get_members(&self, room_code: &str) -> StoreResult<Vec<RoomMember>> {
        Ok(self.members.get(room_code).map(|m| m.clone()).unwrap_or_default())
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
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        if self.rooms.contains_key(room_code) {
            return Err(StoreError::RoomCodeConflict);
        }

        let now = Utc::now();
        let room = Room {
            room_code: room_code.to_string(),
            owner_user_id: owner_user_id.to_string(),
            name: name.map(str::to_string),
            capacity,
            status: RoomStatus::Open,
            phase: RoomPhase::Lobby,
            is_public: password_hash.is_none(),
            password_hash: password_hash.map(str::to_string),
            password_salt: password_salt.map(str::to_string),
            started_at: None,
            started_by_user_id: None,
            created_at: now,
        };
        self.rooms.insert(room_code.to_string(), room.clone());
        self.members.insert(
            room_code.to_string(),
            vec![RoomMember {
                room_code: room_code.to_string(),
                user_id: owner_user_id.to_string(),
                joined_at: now,
                ready: true,
            }],
        );
        Ok(room)
    }

    async fn insert_member(&self, room_code: &str, user_id: &str) -> StoreResult<()> {
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        if !self.rooms.contains_key(room_code) {
            return Err(StoreError::RoomNotFound);
        }
        let mut members = self.members.entry(room_code.to_string()).or_default();
        if members.iter().any(|m| m.user_id == user_id) {
            return Ok(());
        }
        members.push(RoomMember {
            room_code: room_code.to_string(),
            user_id: user_id.to_string(),
            joined_at: Utc::now(),
            ready: false,
        });
        Ok(())
    }

    async fn set_member_ready(&self, room_code: &str, user_id: &str, ready: bool) -> StoreResult<()> {
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        let mut members = self
            .members
            .get_mut(room_code)
            .ok_or(StoreError::RoomNotFound)?;
        let member = members
            .iter_mut()
            .find(|m| m.user_id == user_id)
            .ok_or(StoreError::NotAMember)?;
        member.ready = ready;
        Ok(())
    }

    async fn start_room(&self, room_code: &str, owner_user_id: &str) -> StoreResult<Room> {
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        let mut room = self.rooms.get_mut(room_code).ok_or(StoreError::RoomNotFound)?;
        if room.started_at.is_none() {
            room.phase = RoomPhase::Started;
            room.started_at = Some(Utc::now());
            room.started_by_user_id = Some(owner_user_id.to_string());
        }
        Ok(room.clone())
    }

    async fn remove_member(&self, room_code: &str, user_id: &str) -> StoreResult<()> {
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        let is_owner = self
            .rooms
            .get(room_code)
            .map(|r| r.owner_user_id == user_id)
            .unwrap_or(false);

        if is_owner {
            self.rooms.remove(room_code);
            self.members.remove(room_code);
            return Ok(());
        }

        let is_member = self
            .members
            .get(room_code)
            .map(|members| members.iter().any(|m| m.user_id == user_id))
            .unwrap_or(false);
        if !is_member {
            return Err(StoreError::RoomNotJoined);
        }

        let mut remove_room = false;
        if let Some(mut members) = self.members.get_mut(room_code) {
            members.retain(|m| m.user_id != user_id);
            remove_room = members.is_empty();
        }
        if remove_room {
            self.rooms.remove(room_code);
            self.members.remove(room_code);
        }
        Ok(())
    }

    async fn close_room(&self, room_code: &str, owner_user_id: &str) -> StoreResult<()> {
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        let owner_matches = self
            .rooms
            .get(room_code)
            .map(|r| r.owner_user_id == owner_user_id)
            .ok_or(StoreError::RoomNotFound)?;
        if !owner_matches {
            return Err(StoreError::NotAMember);
        }
        if let Some(mut room) = self.rooms.get_mut(room_code) {
            room.status = RoomStatus::Closed;
        }
        self.members.remove(room_code);
        Ok(())
    }

    async fn set_room_phase(&self, room_code: &str, phase: RoomPhase) -> StoreResult<()> {
        let lock = self.lock_for(room_code);
        let _guard = lock.lock().await;

        let mut room = self.rooms.get_mut(room_code).ok_or(StoreError::RoomNotFound)?;
        if phase == RoomPhase::Started && room.started_at.is_none() {
            room.started_at = Some(Utc::now());
        }
        room.phase = phase;
        Ok(())
    }

    async fn insert_session(&self, session: Session) -> StoreResult<()> {
        self.sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn resolve_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        Ok(self
            .sessions
            .get(token_hash)
            .map(|s| s.clone())
            .filter(|s| s.expires_at > now))
    }

    async fn prune_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - self.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_room_seeds_owner_as_ready_member() {
        let store = InMemoryStore::new();
        store
            .insert_room("ABC234", "u1", None, 2, None, None)
            .await
            .unwrap();
        let members = store.get_members("ABC234").await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].ready);
    }

    #[tokio::test]
    async fn duplicate_room_code_conflicts() {
        let store = InMemoryStore::new();
        store
            .insert_room("ABC234", "u1", None, 2, None, None)
            .await
            .unwrap();
        let err = store
            .insert_room("ABC234", "u2", None, 2, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RoomCodeConflict));
    }

    #[tokio::test]
    async fn leave_room_as_owner_deletes_all_members() {
        let store = InMemoryStore::new();
        store
            .insert_room("ABC234", "u1", None, 2, None, None)
            .await
            .unwrap();
        store.insert_member("ABC234", "u2").await.unwrap();
        store.remove_member("ABC234", "u1").await.unwrap();
        assert!(store.get_room("ABC234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leave_room_as_last_member_deletes_room() {
        let store = InMemoryStore::new();
        store
            .insert_room("ABC234", "u1", None, 2, None, None)
            .await
            .unwrap();
        store.remove_member("ABC234", "u1").await.unwrap();
        assert!(store.get_room("ABC234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leave_room_rejects_non_member() {
        let store = InMemoryStore::new();
        store
            .insert_room("ABC234", "u1", None, 2, None, None)
            .await
            .unwrap();
        let err = store.remove_member("ABC234", "u2").await.unwrap_err();
        assert!(matches!(err, StoreError::RoomNotJoined));
    }

    #[tokio::test]
    async fn leave_room_rejects_unknown_room() {
        let store = InMemoryStore::new();
        let err = store.remove_member("NOPE99", "u1").await.unwrap_err();
        assert!(matches!(err, StoreError::RoomNotJoined));
    }

    #[tokio::test]
    async fn start_room_is_idempotent_for_started_at() {
        let store = InMemoryStore::new();
        store
            .insert_room("ABC234", "u1", None, 2, None, None)
            .await
            .unwrap();
        let first = store.start_room("ABC234", "u1").await.unwrap();
        let second = store.start_room("ABC234", "u1").await.unwrap();
        assert_eq!(first.started_at, second.started_at);
    }
}
