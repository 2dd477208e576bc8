//! Room Lobby Service (C3): transactional create/join/leave/close/ready/start
//! operations over the persistent store.
//!
//! Modeled on `protocol::room_codes::generate_clean_room_code_of_length`
//! (room-code alphabet, reused near-verbatim in `crate::protocol::room_codes`)
//! and `protocol::room_state::Room`'s lifecycle methods (`can_join`,
//! `add_player`, lobby-state transitions), generalized from a
//! Waiting/Lobby/Finalized FSM to the OPEN/CLOSED × LOBBY/STARTED/
//! FINISHED model used here.

pub mod password;
pub mod service;

pub use service::{LobbyError, RoomLobbyService};
