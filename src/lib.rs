#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Bomber Arena Server
//!
//! Authoritative tick-synchronous server for real-time multiplayer grid-bomb
//! matches: a WebSocket gateway in front of a deterministic 20Hz match
//! simulator, a Postgres-backed room lobby, and the identity/session/resume
//! services that bind a Telegram mini-app login to a live match.

/// Session Oracle (C2): bearer token minting/resolution.
pub mod auth;

/// Layered configuration loading (file/env/stdin) and validation.
pub mod config;

/// Persistent store (C1): users, sessions, rooms and room members.
pub mod db;

/// WebSocket gateway (C6): connection handshake, dispatch, and the
/// background sweep task.
pub mod gateway;

/// Identity-proof verification for the mini-app login handshake.
pub mod identity;

/// Room Lobby Service (C3).
pub mod lobby;

/// Structured logging configuration.
pub mod logging;

/// Match Simulator (C4) and Match Manager (C5).
pub mod match_sim;

/// Metrics collection and reporting.
pub mod metrics;

/// WebSocket message protocol definitions.
pub mod protocol;

/// Room Registry (C9): connection/room liveness index for the sweep task.
pub mod registry;

/// Restart Vote FSM (C7).
pub mod restart_vote;

/// Resume Service (C8).
pub mod resume;

/// Deterministic FNV-1a hashing for `worldHash` and seeded AI choices.
pub mod rng;
