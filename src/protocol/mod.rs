//! Protocol module: error codes, the `/ws` message envelopes, and room-code
//! generation.

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod types;

pub use error_codes::ErrorCode;
pub use messages::{ClientMessage, ServerMessage};
pub use room_codes::{generate_room_code, normalize_room_code};
pub use types::{
    BombPlacePayload, BombView, Direction, EnemyView, InputPayload, MatchSnapshot, PlayerView,
    RestartVoteChoice, SnapshotWorld, WorldView,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trips_through_server_message() {
        let msg = ServerMessage::MatchError { error: ErrorCode::RoomNotFound.as_str().to_string() };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::MatchError { error } => assert_eq!(error, ErrorCode::RoomNotFound.as_str()),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn qualified_error_carries_reason_suffix() {
        let msg = ServerMessage::MatchError { error: ErrorCode::RoomStarted.qualified("rejoin_grace_expired") };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["error"], "room_started:rejoin_grace_expired");
    }

    #[test]
    fn room_code_alphabet_excludes_ambiguous_chars() {
        let code = generate_room_code(6);
        assert_eq!(code.len(), 6);
        assert_eq!(normalize_room_code(&code.to_ascii_lowercase()), code);
    }
}
