//! Resume Service (C8): a bounded-TTL marker of each user's last active
//! multiplayer session, consulted at (re)auth and on `room:join` to offer
//! resume.
//!
//! Modeled on `reconnection::ReconnectionManager` (a
//! `DashMap<PlayerId, _>` of lazily-expired entries with `touch`/`consume`
//! verbs), generalized from a single reconnection token to a
//! mode-tagged `ResumeRecord`.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::db::RoomPhase;
use crate::lobby::RoomLobbyService;
use crate::match_sim::MatchManager;

/// Which kind of session a [`ResumeRecord`] refers to. Singleplayer resume
/// is tracked by this service too (§3) even though the simulator in this
/// crate only implements multiplayer matches; the `roomCode`/`matchId`
/// fields are simply absent for that mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    Multiplayer,
    Singleplayer,
}

#[derive(Debug, Clone)]
pub struct ResumeRecord {
    pub user_id: String,
    pub mode: ResumeMode,
    pub room_code: Option<String>,
    pub match_id: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub intentionally_terminated: bool,
}

/// Why `resolveResumeEligibility` answered `eligible=false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    Expired,
    IntentionallyTerminated,
    RoomNotStarted,
    NotAMember,
    MatchMissing,
    MatchEnded,
}

#[derive(Debug, Clone)]
pub enum ResumeEligibility {
    Eligible { room_code: String, match_id: String },
    Ineligible { reason: IneligibleReason },
}

/// In-memory `userId -> ResumeRecord` index, TTL = `ttl_secs` from last
/// activity (default 60s).
pub struct ResumeService {
    records: DashMap<String, ResumeRecord>,
    ttl_secs: i64,
}

impl ResumeService {
    #[must_use]
    pub fn new(ttl_secs: u64) -> Self {
        Self { records: DashMap::new(), ttl_secs: ttl_secs as i64 }
    }

    /// `touchMultiplayer`: upserts an active multiplayer resume marker.
    pub fn touch_multiplayer(&self, user_id: &str, room_code: &str, match_id: &str) {
        let now = Utc::now();
        self.records.insert(
            user_id.to_string(),
            ResumeRecord {
                user_id: user_id.to_string(),
                mode: ResumeMode::Multiplayer,
                room_code: Some(room_code.to_string()),
                match_id: Some(match_id.to_string()),
                last_activity_at: now,
                expires_at: now + Duration::seconds(self.ttl_secs),
                intentionally_terminated: false,
            },
        );
    }

    /// `touchSingleplayer`: upserts a singleplayer resume marker.
    pub fn touch_singleplayer(&self, user_id: &str) {
        let now = Utc::now();
        self.records.insert(
            user_id.to_string(),
            ResumeRecord {
                user_id: user_id.to_string(),
                mode: ResumeMode::Singleplayer,
                room_code: None,
                match_id: None,
                last_activity_at: now,
                expires_at: now + Duration::seconds(self.ttl_secs),
                intentionally_terminated: false,
            },
        );
    }

    /// Marks the user's current record as intentionally ended (e.g. they
    /// left the room themselves), so resume offers stop even inside the TTL.
    pub fn mark_intentionally_terminated(&self, user_id: &str) {
        if let Some(mut record) = self.records.get_mut(user_id) {
            record.intentionally_terminated = true;
        }
    }

    /// `getActiveSession`: returns the record iff it has not expired,
    /// expiring (and removing) it lazily otherwise.
    #[must_use]
    pub fn get_active_session(&self, user_id: &str) -> Option<ResumeRecord> {
        let now = Utc::now();
        let record = self.records.get(user_id)?;
        if record.expires_at <= now {
            drop(record);
            self.records.remove(user_id);
            return None;
        }
        Some(record.clone())
    }

    /// `consumeMultiplayerResume(user, room, match)`: succeeds iff the record
    /// is a live, non-terminated multiplayer entry matching the triple, and
    /// clears it.
    pub fn consume_multiplayer_resume(&self, user_id: &str, room_code: &str, match_id: &str) -> bool {
        let Some(record) = self.get_active_session(user_id) else { return false };
        let matches = record.mode == ResumeMode::Multiplayer
            && !record.intentionally_terminated
            && record.room_code.as_deref() == Some(room_code)
            && record.match_id.as_deref() == Some(match_id);
        if matches {
            self.records.remove(user_id);
        }
        matches
    }

    /// `resolveResumeEligibility(user, record)`: cross-checks a multiplayer
    /// record against the lobby (C3) and match manager (C5), clearing stale
    /// records as it goes.
    pub async fn resolve_resume_eligibility(
        &self,
        user_id: &str,
        lobby: &RoomLobbyService,
        matches: &MatchManager,
    ) -> ResumeEligibility {
        let Some(record) = self.get_active_session(user_id) else {
            return ResumeEligibility::Ineligible { reason: IneligibleReason::Expired };
        };
        if record.intentionally_terminated {
            self.records.remove(user_id);
            return ResumeEligibility::Ineligible { reason: IneligibleReason::IntentionallyTerminated };
        }
        if record.mode != ResumeMode::Multiplayer {
            return ResumeEligibility::Ineligible { reason: IneligibleReason::RoomNotStarted };
        }
        let (Some(room_code), Some(match_id)) = (record.room_code.clone(), record.match_id.clone()) else {
            self.records.remove(user_id);
            return ResumeEligibility::Ineligible { reason: IneligibleReason::RoomNotStarted };
        };

        let room = match lobby.get_room(&room_code).await {
            Ok(Some(room)) if room.phase == RoomPhase::Started => room,
            _ => {
                self.records.remove(user_id);
                return ResumeEligibility::Ineligible { reason: IneligibleReason::RoomNotStarted };
            }
        };

        let members = lobby.get_members(&room.room_code).await.unwrap_or_default();
        if !members.iter().any(|m| m.user_id == user_id) {
            self.records.remove(user_id);
            return ResumeEligibility::Ineligible { reason: IneligibleReason::NotAMember };
        }

        let Some(handle) = matches.get(&match_id) else {
            self.records.remove(user_id);
            return ResumeEligibility::Ineligible { reason: IneligibleReason::MatchMissing };
        };
        let ended = handle.lock().await.ended;
        if ended {
            self.records.remove(user_id);
            return ResumeEligibility::Ineligible { reason: IneligibleReason::MatchEnded };
        }

        ResumeEligibility::Eligible { room_code, match_id }
    }
}

impl Default for ResumeService {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_then_get_returns_record() {
        let svc = ResumeService::new(60);
        svc.touch_multiplayer("u1", "ROOM01", "m1");
        let record = svc.get_active_session("u1").unwrap();
        assert_eq!(record.room_code.as_deref(), Some("ROOM01"));
    }

    #[test]
    fn expired_record_is_pruned_lazily() {
        let svc = ResumeService::new(0);
        svc.touch_multiplayer("u1", "ROOM01", "m1");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(svc.get_active_session("u1").is_none());
    }

    #[test]
    fn consume_matches_only_exact_triple() {
        let svc = ResumeService::new(60);
        svc.touch_multiplayer("u1", "ROOM01", "m1");
        assert!(!svc.consume_multiplayer_resume("u1", "ROOM01", "m2"));
        assert!(svc.consume_multiplayer_resume("u1", "ROOM01", "m1"));
        assert!(svc.get_active_session("u1").is_none());
    }

    #[test]
    fn intentionally_terminated_blocks_consume() {
        let svc = ResumeService::new(60);
        svc.touch_multiplayer("u1", "ROOM01", "m1");
        svc.mark_intentionally_terminated("u1");
        assert!(!svc.consume_multiplayer_resume("u1", "ROOM01", "m1"));
    }
}
