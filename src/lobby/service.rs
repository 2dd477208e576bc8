use std::sync::Arc;

use thiserror::Error;

use super::password::{hash_password, verify_password, PasswordError};
use crate::config::LobbyConfig;
use crate::db::{PersistentStore, Room, RoomMember, RoomPhase, RoomStatus, StoreError};
use crate::protocol::room_codes::{generate_room_code, normalize_room_code};
use crate::protocol::ErrorCode;

/// Maximum room-code generation attempts before surfacing a conflict.
const MAX_CODE_ATTEMPTS: u8 = 8;

#[derive(Debug, Error)]
pub enum LobbyError {
    #[error("capacity must be 2, 3, or 4")]
    CapacityInvalid,
    #[error("room code generation collided too many times")]
    RoomCodeConflict,
    #[error("room not found")]
    RoomNotFound,
    #[error("room is closed")]
    RoomClosed,
    #[error("room_started")]
    RoomStarted,
    #[error("room is full")]
    RoomFull,
    #[error("incorrect password")]
    WrongPassword,
    #[error("caller is not a member of the room")]
    NotAMember,
    #[error("caller never joined this room")]
    RoomNotJoined,
    #[error("caller is not the room owner")]
    Forbidden,
    #[error("fewer than two players, or more than capacity, are in the room")]
    NotEnoughPlayers,
    #[error("not every non-owner member is ready")]
    NotAllReady,
    #[error("password hashing failure: {0}")]
    Password(#[from] PasswordError),
    #[error("backing store error: {0}")]
    Store(#[from] StoreError),
}

impl LobbyError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::CapacityInvalid => ErrorCode::CapacityInvalid,
            Self::RoomCodeConflict => ErrorCode::RoomCodeConflict,
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::RoomClosed => ErrorCode::RoomClosed,
            Self::RoomStarted => ErrorCode::RoomStarted,
            Self::RoomFull => ErrorCode::RoomFull,
            Self::WrongPassword => ErrorCode::WrongPassword,
            Self::NotAMember => ErrorCode::NotAMember,
            Self::RoomNotJoined => ErrorCode::RoomNotJoined,
            Self::Forbidden => ErrorCode::Forbidden,
            Self::NotEnoughPlayers => ErrorCode::NotEnoughPlayers,
            Self::NotAllReady => ErrorCode::NotAllReady,
            Self::Password(_) | Self::Store(_) => ErrorCode::InternalError,
        }
    }
}

/// Room Lobby Service (C3).
pub struct RoomLobbyService {
    store: Arc<dyn PersistentStore>,
    config: LobbyConfig,
}

impl RoomLobbyService {
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore>, config: LobbyConfig) -> Self {
        Self { store, config }
    }

    /// `createRoom(owner, capacity, name?, password?)`.
    pub async fn create_room(
        &self,
        owner_user_id: &str,
        capacity: u8,
        name: Option<&str>,
        password: Option<&str>,
    ) -> Result<Room, LobbyError> {
        if !(2..=4).contains(&capacity) {
            return Err(LobbyError::CapacityInvalid);
        }

        let (password_hash, password_salt) = match password {
            Some(pw) if !pw.is_empty() => {
                let (hash, salt) = hash_password(pw, &self.config)?;
                (Some(hash), Some(salt))
            }
            _ => (None, None),
        };

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code(self.config.room_code_length);
            match self
                .store
                .insert_room(
                    &code,
                    owner_user_id,
                    name,
                    capacity,
                    password_hash.as_deref(),
                    password_salt.as_deref(),
                )
                .await
            {
                Ok(room) => return Ok(room),
                Err(StoreError::RoomCodeConflict) => continue,
                Err(other) => return Err(other.into()),
            }
        }
        Err(LobbyError::RoomCodeConflict)
    }

    /// `joinRoom(user, code, password?)`. Idempotent for an existing member.
    pub async fn join_room(
        &self,
        user_id: &str,
        room_code: &str,
        password: Option<&str>,
    ) -> Result<Room, LobbyError> {
        let code = normalize_room_code(room_code);
        let room = self.fetch_open_room(&code).await?;
        if room.phase != RoomPhase::Lobby {
            return Err(LobbyError::RoomStarted);
        }

        let members = self.store.get_members(&code).await?;
        if members.iter().any(|m| m.user_id == user_id) {
            return Ok(room);
        }
        if members.len() >= room.capacity as usize {
            return Err(LobbyError::RoomFull);
        }

        if room.has_password() {
            let (hash, salt) = (
                room.password_hash.as_deref().unwrap_or_default(),
                room.password_salt.as_deref().unwrap_or_default(),
            );
            let supplied = password.unwrap_or_default();
            if !verify_password(supplied, hash, salt, &self.config)? {
                return Err(LobbyError::WrongPassword);
            }
        }

        self.store.insert_member(&code, user_id).await?;
        Ok(room)
    }

    /// `setReady(user, code, ready)`.
    pub async fn set_ready(&self, user_id: &str, room_code: &str, ready: bool) -> Result<(), LobbyError> {
        let code = normalize_room_code(room_code);
        let room = self.fetch_open_room(&code).await?;
        if room.phase != RoomPhase::Lobby {
            return Err(LobbyError::RoomStarted);
        }
        self.store
            .set_member_ready(&code, user_id, ready)
            .await
            .map_err(|e| match e {
                StoreError::NotAMember => LobbyError::NotAMember,
                other => other.into(),
            })
    }

    /// `startRoom(owner, code)`.
    pub async fn start_room(&self, owner_user_id: &str, room_code: &str) -> Result<Room, LobbyError> {
        let code = normalize_room_code(room_code);
        let room = self.fetch_open_room(&code).await?;
        if room.owner_user_id != owner_user_id {
            return Err(LobbyError::Forbidden);
        }
        if room.phase != RoomPhase::Lobby {
            return Err(LobbyError::RoomStarted);
        }

        let members = self.store.get_members(&code).await?;
        if members.len() < 2 || members.len() > room.capacity as usize {
            return Err(LobbyError::NotEnoughPlayers);
        }
        let all_non_owner_ready = members
            .iter()
            .filter(|m| m.user_id != owner_user_id)
            .all(|m| m.ready);
        if !all_non_owner_ready {
            return Err(LobbyError::NotAllReady);
        }

        Ok(self.store.start_room(&code, owner_user_id).await?)
    }

    /// `leaveRoom(user)`, scoped to a known room code (the gateway tracks
    /// which room a connection is attached to).
    pub async fn leave_room(&self, user_id: &str, room_code: &str) -> Result<(), LobbyError> {
        let code = normalize_room_code(room_code);
        self.store
            .remove_member(&code, user_id)
            .await
            .map_err(|e| match e {
                StoreError::RoomNotJoined => LobbyError::RoomNotJoined,
                other => other.into(),
            })
    }

    /// `closeRoom(owner, code)`.
    pub async fn close_room(&self, owner_user_id: &str, room_code: &str) -> Result<(), LobbyError> {
        let code = normalize_room_code(room_code);
        self.store
            .close_room(&code, owner_user_id)
            .await
            .map_err(|e| match e {
                StoreError::NotAMember => LobbyError::Forbidden,
                other => other.into(),
            })
    }

    /// `setRoomPhase(code, phase)`.
    pub async fn set_room_phase(&self, room_code: &str, phase: RoomPhase) -> Result<(), LobbyError> {
        let code = normalize_room_code(room_code);
        Ok(self.store.set_room_phase(&code, phase).await?)
    }

    pub async fn get_room(&self, room_code: &str) -> Result<Option<Room>, LobbyError> {
        Ok(self.store.get_room(&normalize_room_code(room_code)).await?)
    }

    pub async fn get_members(&self, room_code: &str) -> Result<Vec<RoomMember>, LobbyError> {
        Ok(self.store.get_members(&normalize_room_code(room_code)).await?)
    }

    async fn fetch_open_room(&self, code: &str) -> Result<Room, LobbyError> {
        let room = self.store.get_room(code).await?.ok_or(LobbyError::RoomNotFound)?;
        if room.status == RoomStatus::Closed {
            return Err(LobbyError::RoomClosed);
        }
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;

    fn service() -> RoomLobbyService {
        RoomLobbyService::new(Arc::new(InMemoryStore::new()), LobbyConfig::default())
    }

    #[tokio::test]
    async fn create_room_rejects_bad_capacity() {
        let svc = service();
        let err = svc.create_room("owner", 5, None, None).await.unwrap_err();
        assert!(matches!(err, LobbyError::CapacityInvalid));
    }

    #[tokio::test]
    async fn join_existing_member_is_idempotent() {
        let svc = service();
        let room = svc.create_room("owner", 2, None, None).await.unwrap();
        svc.join_room("owner", &room.room_code, None).await.unwrap();
        let members = svc.get_members(&room.room_code).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].ready);
    }

    #[tokio::test]
    async fn full_room_rejects_join() {
        let svc = service();
        let room = svc.create_room("owner", 2, None, None).await.unwrap();
        svc.join_room("p2", &room.room_code, None).await.unwrap();
        let err = svc.join_room("p3", &room.room_code, None).await.unwrap_err();
        assert!(matches!(err, LobbyError::RoomFull));
    }

    #[tokio::test]
    async fn password_mismatch_is_rejected() {
        let svc = service();
        let room = svc
            .create_room("owner", 2, None, Some("hunter2"))
            .await
            .unwrap();
        let err = svc
            .join_room("p2", &room.room_code, Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, LobbyError::WrongPassword));

        svc.join_room("p2", &room.room_code, Some("hunter2"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn start_requires_all_non_owner_ready() {
        let svc = service();
        let room = svc.create_room("owner", 2, None, None).await.unwrap();
        svc.join_room("p2", &room.room_code, None).await.unwrap();

        let err = svc.start_room("owner", &room.room_code).await.unwrap_err();
        assert!(matches!(err, LobbyError::NotAllReady));

        svc.set_ready("p2", &room.room_code, true).await.unwrap();
        let started = svc.start_room("owner", &room.room_code).await.unwrap();
        assert_eq!(started.phase, RoomPhase::Started);
    }

    #[tokio::test]
    async fn non_owner_cannot_start() {
        let svc = service();
        let room = svc.create_room("owner", 2, None, None).await.unwrap();
        svc.join_room("p2", &room.room_code, None).await.unwrap();
        svc.set_ready("p2", &room.room_code, true).await.unwrap();
        let err = svc.start_room("p2", &room.room_code).await.unwrap_err();
        assert!(matches!(err, LobbyError::Forbidden));
    }

    #[tokio::test]
    async fn leave_room_rejects_non_member() {
        let svc = service();
        let room = svc.create_room("owner", 2, None, None).await.unwrap();
        let err = svc.leave_room("stranger", &room.room_code).await.unwrap_err();
        assert!(matches!(err, LobbyError::RoomNotJoined));
    }

    #[tokio::test]
    async fn owner_leaving_closes_room() {
        let svc = service();
        let room = svc.create_room("owner", 2, None, None).await.unwrap();
        svc.join_room("p2", &room.room_code, None).await.unwrap();
        svc.leave_room("owner", &room.room_code).await.unwrap();
        assert!(svc.get_room(&room.room_code).await.unwrap().is_none());
    }
}
