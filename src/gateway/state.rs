//! Shared gateway state: every service the dispatch/tick/sweep tasks need,
//! plus the live connection index.
//!
//! Grounded on `coordination::room_coordinator`'s `DashMap`-of-shared-state
//! ownership pattern — one struct, cloned behind an `Arc`, handed to every
//! spawned task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::SessionOracle;
use crate::config::Config;
use crate::db::PersistentStore;
use crate::lobby::RoomLobbyService;
use crate::match_sim::MatchManager;
use crate::metrics::ServerMetrics;
use crate::registry::RoomRegistry;
use crate::resume::ResumeService;
use crate::restart_vote::RestartVoteFsm;

use super::connection::ConnectionCtx;

/// A rejoin handshake in flight: `mp:rejoin_ack` was sent, awaiting either
/// `mp:rejoin_ready` or the handshake timeout.
pub struct PendingRejoin {
    pub connection_id: Uuid,
    pub user_id: String,
    pub room_code: String,
    pub match_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Bundles every service the gateway drives, shared by every connection
/// task, the per-match tick loops, and the background sweep.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub store: Arc<dyn PersistentStore>,
    pub sessions: Arc<SessionOracle>,
    pub lobby: Arc<RoomLobbyService>,
    pub matches: Arc<MatchManager>,
    pub resume: Arc<ResumeService>,
    pub restart_votes: Arc<RestartVoteFsm>,
    pub registry: Arc<RoomRegistry>,
    pub metrics: Arc<ServerMetrics>,
    pub connections: DashMap<Uuid, Arc<ConnectionCtx>>,
    pub rejoins: DashMap<String, PendingRejoin>,
    pub tick_tasks: DashMap<String, JoinHandle<()>>,
}

impl GatewayState {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn PersistentStore>,
        sessions: Arc<SessionOracle>,
        lobby: Arc<RoomLobbyService>,
        matches: Arc<MatchManager>,
        resume: Arc<ResumeService>,
        restart_votes: Arc<RestartVoteFsm>,
        registry: Arc<RoomRegistry>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            sessions,
            lobby,
            matches,
            resume,
            restart_votes,
            registry,
            metrics,
            connections: DashMap::new(),
            rejoins: DashMap::new(),
            tick_tasks: DashMap::new(),
        }
    }

    /// Sends `message` to every connection currently bound to `room_code`,
    /// regardless of match attachment. Used for room-level (restart-vote)
    /// broadcasts.
    pub fn broadcast_to_room(&self, room_code: &str, message: &crate::protocol::ServerMessage) {
        let payload = std::sync::Arc::new(message.clone());
        for entry in &self.connections {
            let ctx = entry.value();
            if ctx.room_code().as_deref() == Some(room_code) {
                if ctx.try_send_arc(payload.clone()).is_err() {
                    self.metrics.increment_websocket_messages_dropped();
                }
            }
        }
    }

    /// Sends `message` only to connections bound to both `room_code` and
    /// `match_id` — the broadcast filter invariant: a connection that has
    /// moved on to a different match never receives another match's events
    /// even if it is still attached to the room.
    pub fn broadcast_to_match(
        &self,
        room_code: &str,
        match_id: &str,
        message: &crate::protocol::ServerMessage,
    ) {
        let payload = std::sync::Arc::new(message.clone());
        for entry in &self.connections {
            let ctx = entry.value();
            if ctx.room_code().as_deref() != Some(room_code) {
                continue;
            }
            if ctx.match_id().as_deref() == Some(match_id) {
                if ctx.try_send_arc(payload.clone()).is_err() {
                    self.metrics.increment_websocket_messages_dropped();
                }
            } else {
                self.metrics.increment_broadcast_filter_drops();
            }
        }
    }

    #[must_use]
    pub fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}
