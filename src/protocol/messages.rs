//! WebSocket wire protocol: `/ws` inbound/outbound message envelopes.
//!
//! All frames are UTF-8 JSON tagged by `type` — message and field names are
//! preserved verbatim (including the `room:`/`match:`/`mp:` namespacing)
//! since clients match on these literal strings.

use serde::{Deserialize, Serialize};

use super::types::{BombPlacePayload, InputPayload, MatchSnapshot, RestartVoteChoice, WorldView};

/// Messages sent from client to server over `/ws`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "ping")]
    Ping { id: i64, t: i64 },

    #[serde(rename = "room:join")]
    RoomJoin { #[serde(rename = "roomId")] room_id: String },

    #[serde(rename = "room:leave")]
    RoomLeave,

    #[serde(rename = "match:start")]
    MatchStart,

    #[serde(rename = "match:input")]
    MatchInput { seq: u32, payload: InputPayload },

    #[serde(rename = "match:bomb_place")]
    MatchBombPlace { payload: BombPlacePayload },

    #[serde(rename = "mp:rejoin_ready")]
    MpRejoinReady {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "rejoinAttemptId")]
        rejoin_attempt_id: String,
    },

    #[serde(rename = "mp:snapshot_applied")]
    MpSnapshotApplied {
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "rejoinAttemptId", skip_serializing_if = "Option::is_none", default)]
        rejoin_attempt_id: Option<String>,
    },

    #[serde(rename = "room:restart_propose")]
    RoomRestartPropose,

    #[serde(rename = "room:restart_vote")]
    RoomRestartVote { vote: RestartVoteChoice },
}

/// Messages sent from server to client over `/ws`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected")]
    Connected,

    #[serde(rename = "pong")]
    Pong { id: i64, t: i64, #[serde(rename = "serverNow")] server_now: i64 },

    /// `error` carries the bare `ErrorCode` wire string, or a
    /// `"<code>:<reason>"` qualified form (e.g. `room_started:rejoin_grace_expired`)
    /// when a more specific reason than the code alone applies.
    #[serde(rename = "match:error")]
    MatchError { error: String },

    #[serde(rename = "match:started")]
    MatchStarted {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "matchId")]
        match_id: String,
    },

    #[serde(rename = "match:world_init")]
    MatchWorldInit {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "matchId")]
        match_id: String,
        world: WorldView,
    },

    #[serde(rename = "match:snapshot")]
    MatchSnapshot { snapshot: MatchSnapshot },

    #[serde(rename = "match:bomb_spawned")]
    MatchBombSpawned {
        id: String,
        x: i32,
        y: i32,
        #[serde(rename = "ownerId")]
        owner_id: String,
        #[serde(rename = "explodeAtTick")]
        explode_at_tick: u32,
    },

    #[serde(rename = "match:bomb_exploded")]
    MatchBombExploded {
        id: String,
        cells: Vec<(i32, i32)>,
    },

    #[serde(rename = "match:tiles_destroyed")]
    MatchTilesDestroyed { cells: Vec<(i32, i32)> },

    #[serde(rename = "match:player_damaged")]
    MatchPlayerDamaged {
        #[serde(rename = "userId")]
        user_id: String,
        lives: u32,
    },

    #[serde(rename = "match:player_eliminated")]
    MatchPlayerEliminated {
        #[serde(rename = "userId")]
        user_id: String,
    },

    #[serde(rename = "match:player_respawned")]
    MatchPlayerRespawned {
        #[serde(rename = "userId")]
        user_id: String,
        x: i32,
        y: i32,
    },

    #[serde(rename = "match:end")]
    MatchEnd {
        #[serde(rename = "winnerUserId")]
        winner_user_id: Option<String>,
        reason: String,
    },

    #[serde(rename = "mp:rejoin_ack")]
    MpRejoinAck {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "matchId")]
        match_id: String,
        #[serde(rename = "serverTime")]
        server_time: i64,
        #[serde(rename = "rejoinAttemptId")]
        rejoin_attempt_id: String,
    },

    #[serde(rename = "mp:rejoin_sync")]
    MpRejoinSync {
        #[serde(rename = "matchId")]
        match_id: String,
    },

    #[serde(rename = "room:restart_proposed")]
    RoomRestartProposed {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "byUserId")]
        by_user_id: String,
        #[serde(rename = "expiresAt")]
        expires_at: i64,
    },

    #[serde(rename = "room:restart_vote_state")]
    RoomRestartVoteState {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "yesCount")]
        yes_count: u32,
        total: u32,
    },

    #[serde(rename = "room:restart_accepted")]
    RoomRestartAccepted {
        #[serde(rename = "roomCode")]
        room_code: String,
    },

    #[serde(rename = "room:restart_cancelled")]
    RoomRestartCancelled {
        #[serde(rename = "roomCode")]
        room_code: String,
        reason: String,
    },

    #[serde(rename = "room:restart_cooldown")]
    RoomRestartCooldown {
        #[serde(rename = "roomCode")]
        room_code: String,
        #[serde(rename = "retryAtMs")]
        retry_at_ms: i64,
    },

    #[serde(rename = "room:restart_rejected")]
    RoomRestartRejected {
        #[serde(rename = "roomCode")]
        room_code: String,
        reason: String,
        #[serde(rename = "retryAtMs", skip_serializing_if = "Option::is_none", default)]
        retry_at_ms: Option<i64>,
    },

    #[serde(rename = "ws_player_kicked")]
    WsPlayerKicked { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ping_round_trips_with_literal_tag() {
        let msg = ClientMessage::Ping { id: 1, t: 1000 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ping");
        let back: ClientMessage = serde_json::from_value(json).unwrap();
        matches!(back, ClientMessage::Ping { .. });
    }

    #[test]
    fn room_join_uses_camelcase_room_id() {
        let msg = ClientMessage::RoomJoin { room_id: "ABC123".into() };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["roomId"], "ABC123");
    }

    #[test]
    fn match_input_move_payload_tags_kind() {
        let msg = ClientMessage::MatchInput {
            seq: 7,
            payload: InputPayload::Move { dir: Some(super::super::types::Direction::Right) },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["payload"]["kind"], "move");
        assert_eq!(json["payload"]["dir"], "right");
    }

    #[test]
    fn server_match_end_serializes_literal_tag() {
        let msg = ServerMessage::MatchEnd {
            winner_user_id: Some("u1".into()),
            reason: "elimination".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "match:end");
        assert_eq!(json["winnerUserId"], "u1");
    }

    #[test]
    fn restart_vote_choice_serializes_lowercase() {
        let msg = ClientMessage::RoomRestartVote { vote: RestartVoteChoice::Yes };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["vote"], "yes");
    }
}
