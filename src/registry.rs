//! Room Registry (C9): in-memory liveness index of connections/rooms used by
//! the gateway's background sweep and auto-finalize decisions.
//!
//! Modeled on `coordination::room_coordinator`'s DashMap-of-sets ownership
//! shape, generalized from P2P peer membership to this crate's per-room
//! "who is attached right now" and "when did this room last see
//! activity" bookkeeping — deliberately separate from [`crate::db`] (which
//! tracks durable room membership) and from [`crate::match_sim::MatchState`]
//! (which tracks in-match player liveness).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Tracks, per room, the set of currently-attached connection ids and the
/// timestamp of last activity (any inbound frame, join, or tick broadcast).
pub struct RoomRegistry {
    attached: DashMap<String, HashSet<uuid::Uuid>>,
    last_activity: DashMap<String, DateTime<Utc>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { attached: DashMap::new(), last_activity: DashMap::new() }
    }

    pub fn attach(&self, room_code: &str, connection_id: uuid::Uuid) {
        self.attached.entry(room_code.to_string()).or_default().insert(connection_id);
        self.touch(room_code);
    }

    pub fn detach(&self, room_code: &str, connection_id: uuid::Uuid) {
        if let Some(mut set) = self.attached.get_mut(room_code) {
            set.remove(&connection_id);
        }
        self.touch(room_code);
    }

    pub fn touch(&self, room_code: &str) {
        self.last_activity.insert(room_code.to_string(), Utc::now());
    }

    #[must_use]
    pub fn attached_count(&self, room_code: &str) -> usize {
        self.attached.get(room_code).map_or(0, |s| s.len())
    }

    /// Seconds since the room last saw any activity, or `None` if unknown.
    #[must_use]
    pub fn idle_secs(&self, room_code: &str, now: DateTime<Utc>) -> Option<i64> {
        self.last_activity.get(room_code).map(|t| (now - *t).num_seconds())
    }

    /// Whether this room is a candidate for the stale sweep: no attached
    /// connections and idle past `stale_room_secs`.
    #[must_use]
    pub fn is_stale(&self, room_code: &str, stale_room_secs: i64, now: DateTime<Utc>) -> bool {
        self.attached_count(room_code) == 0
            && self.idle_secs(room_code, now).is_some_and(|idle| idle > stale_room_secs)
    }

    /// Drops all bookkeeping for a finalized/closed room.
    pub fn forget(&self, room_code: &str) {
        self.attached.remove(room_code);
        self.last_activity.remove(room_code);
    }

    /// Every room code currently tracked, for the sweep task to iterate.
    #[must_use]
    pub fn known_rooms(&self) -> Vec<String> {
        self.last_activity.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_then_detach_updates_count() {
        let registry = RoomRegistry::new();
        let id = uuid::Uuid::new_v4();
        registry.attach("ROOM01", id);
        assert_eq!(registry.attached_count("ROOM01"), 1);
        registry.detach("ROOM01", id);
        assert_eq!(registry.attached_count("ROOM01"), 0);
    }

    #[test]
    fn stale_requires_empty_and_idle() {
        let registry = RoomRegistry::new();
        registry.touch("ROOM01");
        assert!(!registry.is_stale("ROOM01", 90, Utc::now()));
        assert!(registry.is_stale("ROOM01", 90, Utc::now() + chrono::Duration::seconds(91)));
    }

    #[test]
    fn forget_clears_all_state() {
        let registry = RoomRegistry::new();
        let id = uuid::Uuid::new_v4();
        registry.attach("ROOM01", id);
        registry.forget("ROOM01");
        assert_eq!(registry.attached_count("ROOM01"), 0);
        assert!(registry.idle_secs("ROOM01", Utc::now()).is_none());
    }
}
