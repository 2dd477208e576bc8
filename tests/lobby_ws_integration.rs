mod test_helpers;

use serde_json::json;
use test_helpers::{connect_with_token, mint_token, next_json, next_json_of_type, send_json, start_test_server};

/// Full happy-path flow: two players join a room over `/ws`, the owner
/// starts the match once the guest is ready, and both sockets receive
/// `match:started` + `match:world_init` with the same `matchId`.
#[tokio::test]
async fn two_player_room_join_and_match_start() {
    let (addr, state) = start_test_server().await;

    let owner_token = mint_token(&state, "owner-1").await;
    let guest_token = mint_token(&state, "guest-1").await;

    let room = state.lobby.create_room("owner-1", 2, Some("Test Room"), None).await.unwrap();

    let (mut owner_sink, mut owner_src) = connect_with_token(addr, &owner_token).await;
    let (mut guest_sink, mut guest_src) = connect_with_token(addr, &guest_token).await;

    assert_eq!(next_json(&mut owner_src, 5).await["type"], "connected");
    assert_eq!(next_json(&mut guest_src, 5).await["type"], "connected");

    send_json(&mut owner_sink, json!({"type": "room:join", "roomId": room.room_code})).await;
    send_json(&mut guest_sink, json!({"type": "room:join", "roomId": room.room_code})).await;

    state.lobby.set_ready("guest-1", &room.room_code, true).await.unwrap();

    send_json(&mut owner_sink, json!({"type": "match:start"})).await;

    let owner_started = next_json_of_type(&mut owner_src, "match:started", 5).await;
    let guest_started = next_json_of_type(&mut guest_src, "match:started", 5).await;
    assert_eq!(owner_started["roomCode"], room.room_code.as_str());
    assert_eq!(owner_started["matchId"], guest_started["matchId"]);

    let owner_world = next_json_of_type(&mut owner_src, "match:world_init", 5).await;
    assert_eq!(owner_world["world"]["gridW"], 27);
    assert_eq!(owner_world["world"]["gridH"], 14);
    assert!(owner_world["world"]["worldHash"].as_str().unwrap().len() > 0);

    let snapshot = next_json_of_type(&mut owner_src, "match:snapshot", 5).await;
    assert_eq!(snapshot["snapshot"]["players"].as_array().unwrap().len(), 2);
}

/// `match:start` by a non-owner is rejected with `forbidden` and no match is
/// created.
#[tokio::test]
async fn non_owner_cannot_start_match() {
    let (addr, state) = start_test_server().await;

    let owner_token = mint_token(&state, "owner-2").await;
    let guest_token = mint_token(&state, "guest-2").await;
    let room = state.lobby.create_room("owner-2", 2, None, None).await.unwrap();

    let (mut owner_sink, mut owner_src) = connect_with_token(addr, &owner_token).await;
    let (mut guest_sink, mut guest_src) = connect_with_token(addr, &guest_token).await;
    next_json(&mut owner_src, 5).await;
    next_json(&mut guest_src, 5).await;

    send_json(&mut owner_sink, json!({"type": "room:join", "roomId": room.room_code})).await;
    send_json(&mut guest_sink, json!({"type": "room:join", "roomId": room.room_code})).await;

    // Guest is not ready yet, and the owner is not the caller here anyway.
    send_json(&mut guest_sink, json!({"type": "match:start"})).await;

    let error = next_json_of_type(&mut guest_src, "match:error", 5).await;
    assert_eq!(error["error"], "forbidden");
}

/// A wrong-password join is rejected.
#[tokio::test]
async fn password_mismatch_rejects_join() {
    let (addr, state) = start_test_server().await;

    let owner_token = mint_token(&state, "owner-3").await;
    let joiner_token = mint_token(&state, "joiner-3").await;
    let room = state.lobby.create_room("owner-3", 4, None, Some("hunter2")).await.unwrap();

    let (_owner_sink, mut owner_src) = connect_with_token(addr, &owner_token).await;
    let (mut joiner_sink, mut joiner_src) = connect_with_token(addr, &joiner_token).await;
    next_json(&mut owner_src, 5).await;
    next_json(&mut joiner_src, 5).await;

    // room:join over the gateway doesn't carry a password today; verify the
    // lobby service itself enforces the mismatch directly.
    let result = state.lobby.join_room("joiner-3", &room.room_code, Some("wrong")).await;
    assert!(matches!(result, Err(bomber_arena_server::lobby::LobbyError::WrongPassword)));

    let ok = state.lobby.join_room("joiner-3", &room.room_code, Some("hunter2")).await;
    assert!(ok.is_ok());

    drop(joiner_sink);
}

/// `ping`/`pong` round-trips the client-supplied `id`/`t`.
#[tokio::test]
async fn ping_pong_round_trips() {
    let (addr, state) = start_test_server().await;
    let token = mint_token(&state, "pinger").await;
    let (mut sink, mut src) = connect_with_token(addr, &token).await;
    next_json(&mut src, 5).await;

    send_json(&mut sink, json!({"type": "ping", "id": 42, "t": 1000})).await;
    let pong = next_json_of_type(&mut src, "pong", 5).await;
    assert_eq!(pong["id"], 42);
    assert_eq!(pong["t"], 1000);
}

/// A reconnecting player who answers `mp:rejoin_ready` with a `matchId` that
/// doesn't match the pending handshake is dropped silently: no resync bundle
/// is sent, and the handshake is still consumed so a later, correct retry
/// with the same `rejoinAttemptId` can't replay it either.
#[tokio::test]
async fn rejoin_ready_with_mismatched_match_id_is_dropped() {
    let (addr, state) = start_test_server().await;

    let owner_token = mint_token(&state, "owner-4").await;
    let guest_token = mint_token(&state, "guest-4").await;
    let room = state.lobby.create_room("owner-4", 2, None, None).await.unwrap();

    let (mut owner_sink, mut owner_src) = connect_with_token(addr, &owner_token).await;
    let (mut guest_sink, mut guest_src) = connect_with_token(addr, &guest_token).await;
    next_json(&mut owner_src, 5).await;
    next_json(&mut guest_src, 5).await;

    send_json(&mut owner_sink, json!({"type": "room:join", "roomId": room.room_code})).await;
    send_json(&mut guest_sink, json!({"type": "room:join", "roomId": room.room_code})).await;
    state.lobby.set_ready("guest-4", &room.room_code, true).await.unwrap();

    send_json(&mut owner_sink, json!({"type": "match:start"})).await;
    next_json_of_type(&mut owner_src, "match:started", 5).await;
    next_json_of_type(&mut guest_src, "match:started", 5).await;

    // Simulate a disconnect/rejoin by re-attaching the guest's user id over a
    // fresh socket while the match is still running.
    drop(guest_sink);
    let (mut rejoin_sink, mut rejoin_src) = connect_with_token(addr, &guest_token).await;
    next_json(&mut rejoin_src, 5).await;
    send_json(&mut rejoin_sink, json!({"type": "room:join", "roomId": room.room_code})).await;

    let ack = next_json_of_type(&mut rejoin_src, "mp:rejoin_ack", 5).await;
    let rejoin_attempt_id = ack["rejoinAttemptId"].as_str().unwrap().to_string();

    send_json(
        &mut rejoin_sink,
        json!({
            "type": "mp:rejoin_ready",
            "roomCode": room.room_code,
            "matchId": "not-the-real-match-id",
            "rejoinAttemptId": rejoin_attempt_id,
        }),
    )
    .await;

    // No resync bundle should arrive; only the periodic snapshot broadcasts
    // keep flowing.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        let frame = next_json(&mut rejoin_src, 2).await;
        assert_ne!(frame["type"], "mp:rejoin_sync");
    }
}

/// An unauthenticated `/ws` upgrade is refused before the socket opens.
#[tokio::test]
async fn unauthenticated_connection_is_refused() {
    let (addr, _state) = start_test_server().await;
    let url = format!("ws://{addr}/ws");
    let result = tokio_tungstenite::connect_async(&url).await;
    assert!(result.is_err());
}
