//! Match Manager (C5): owns every live [`MatchState`] behind a per-match
//! mutex, and the `roomCode -> matchId` index the gateway uses to route
//! inbound frames.
//!
//! Modeled on `coordination::room_coordinator::RoomCoordinator` (a
//! `DashMap` of `Arc<Mutex<_>>` per room, looked up by code, with a
//! companion index map) — generalized here from one P2P room to one
//! tick-simulated match, plus the stable-slot bookkeeping restart needs.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::MatchConfig;

use super::state::{new_match_state, MatchState};

/// Thread-safe handle to one match's authoritative state.
pub type MatchHandle = Arc<Mutex<MatchState>>;

/// Keeps every live match and the room -> match routing index.
///
/// Also remembers each room's last slot order (user id, display name pairs)
/// so a restarted match reuses the same seat/colour assignment rather than
/// reshuffling spawns every time a room plays again.
pub struct MatchManager {
    matches: DashMap<String, MatchHandle>,
    room_to_match: DashMap<String, String>,
    room_slot_order: DashMap<String, Vec<(String, String)>>,
}

impl Default for MatchManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
            room_to_match: DashMap::new(),
            room_slot_order: DashMap::new(),
        }
    }

    /// Starts a new match for `room_code`. If the room has played before,
    /// `slot_order` is expected to carry forward the same membership order
    /// so corner spawns and colour ids stay stable across restarts. Any match
    /// already running for this room is ended first, so a restart never
    /// leaves a stale match ticking alongside the new one.
    pub fn create_match(
        &self,
        room_code: &str,
        slot_order: Vec<(String, String)>,
        config: MatchConfig,
    ) -> (String, MatchHandle) {
        if let Some(old_id) = self.match_id_for_room(room_code) {
            self.end_match(&old_id);
        }

        let match_id = Uuid::new_v4().to_string();
        self.room_slot_order.insert(room_code.to_string(), slot_order.clone());
        let state = new_match_state(match_id.clone(), room_code.to_string(), slot_order, config);
        let handle: MatchHandle = Arc::new(Mutex::new(state));
        self.matches.insert(match_id.clone(), handle.clone());
        self.room_to_match.insert(room_code.to_string(), match_id.clone());
        (match_id, handle)
    }

    #[must_use]
    pub fn get(&self, match_id: &str) -> Option<MatchHandle> {
        self.matches.get(match_id).map(|h| h.clone())
    }

    #[must_use]
    pub fn match_id_for_room(&self, room_code: &str) -> Option<String> {
        self.room_to_match.get(room_code).map(|id| id.clone())
    }

    #[must_use]
    pub fn get_for_room(&self, room_code: &str) -> Option<MatchHandle> {
        let match_id = self.match_id_for_room(room_code)?;
        self.get(&match_id)
    }

    /// The slot order remembered from the room's most recent match, if any.
    #[must_use]
    pub fn last_slot_order(&self, room_code: &str) -> Option<Vec<(String, String)>> {
        self.room_slot_order.get(room_code).map(|v| v.clone())
    }

    /// Tears down a finished match, keeping the remembered slot order so a
    /// restart-vote-triggered rematch can reuse it.
    pub fn end_match(&self, match_id: &str) {
        if let Some((_, handle)) = self.matches.remove(match_id) {
            drop(handle);
        }
        self.room_to_match.retain(|_, id| id != match_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> Vec<(String, String)> {
        vec![("u1".into(), "Alice".into()), ("u2".into(), "Bob".into())]
    }

    #[test]
    fn create_match_indexes_by_room_and_id() {
        let mgr = MatchManager::new();
        let (match_id, _handle) = mgr.create_match("ROOM01", slots(), MatchConfig::default());
        assert!(mgr.get(&match_id).is_some());
        assert_eq!(mgr.match_id_for_room("ROOM01"), Some(match_id));
    }

    #[test]
    fn end_match_removes_both_indices() {
        let mgr = MatchManager::new();
        let (match_id, _handle) = mgr.create_match("ROOM01", slots(), MatchConfig::default());
        mgr.end_match(&match_id);
        assert!(mgr.get(&match_id).is_none());
        assert!(mgr.get_for_room("ROOM01").is_none());
    }

    #[test]
    fn create_match_ends_existing_match_for_room() {
        let mgr = MatchManager::new();
        let (first_id, _handle) = mgr.create_match("ROOM01", slots(), MatchConfig::default());
        let (second_id, _handle) = mgr.create_match("ROOM01", slots(), MatchConfig::default());

        assert_ne!(first_id, second_id);
        assert!(mgr.get(&first_id).is_none());
        assert_eq!(mgr.match_id_for_room("ROOM01"), Some(second_id));
    }

    #[test]
    fn restart_reuses_remembered_slot_order() {
        let mgr = MatchManager::new();
        let (first_id, _) = mgr.create_match("ROOM01", slots(), MatchConfig::default());
        mgr.end_match(&first_id);
        let remembered = mgr.last_slot_order("ROOM01").unwrap();
        assert_eq!(remembered, slots());
        let (_second_id, handle) = mgr.create_match("ROOM01", remembered, MatchConfig::default());
        let state = handle.try_lock().unwrap();
        assert_eq!(state.slot_order, vec!["u1".to_string(), "u2".to_string()]);
    }
}
