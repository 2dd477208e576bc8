//! The rejoin handshake: a reconnecting client is sent
//! `mp:rejoin_ack` and has `rejoin_handshake_secs` to answer with
//! `mp:rejoin_ready` before the gateway gives up and force-syncs it anyway.
//!
//! Generalized from `reconnection::ReconnectionManager`'s
//! token/expiry bookkeeping (`register_disconnection` / `validate_reconnection`
//! / `cleanup_expired`), here keyed by a one-shot `rejoinAttemptId` rather
//! than a long-lived reconnection token.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::protocol::types::WorldView;
use crate::protocol::ServerMessage;

use super::connection::ConnectionCtx;
use super::state::{GatewayState, PendingRejoin};

/// Starts a rejoin handshake for a reconnecting player: marks them
/// reconnected in the match state, sends `mp:rejoin_ack`, and records a
/// pending handshake for the sweep task to expire if the client never
/// answers.
pub async fn begin_rejoin(
    state: &Arc<GatewayState>,
    ctx: &Arc<ConnectionCtx>,
    room_code: &str,
    match_id: &str,
) {
    let Some(handle) = state.matches.get(match_id) else { return };
    {
        let mut match_state = handle.lock().await;
        match_state.mark_player_reconnected(&ctx.user_id);
    }

    ctx.set_room_code(Some(room_code.to_string()));
    ctx.set_match_id(Some(match_id.to_string()));

    let rejoin_attempt_id = Uuid::new_v4().to_string();
    ctx.set_rejoin_attempt_id(Some(rejoin_attempt_id.clone()));

    let expires_at = Utc::now() + Duration::seconds(state.config.gateway.rejoin_handshake_secs as i64);
    state.rejoins.insert(
        rejoin_attempt_id.clone(),
        PendingRejoin {
            connection_id: ctx.connection_id,
            user_id: ctx.user_id.clone(),
            room_code: room_code.to_string(),
            match_id: match_id.to_string(),
            expires_at,
        },
    );

    state.metrics.increment_rejoin_handshakes_started();

    let _ = ctx.try_send(ServerMessage::MpRejoinAck {
        room_code: room_code.to_string(),
        match_id: match_id.to_string(),
        server_time: GatewayState::now_ms(),
        rejoin_attempt_id,
    });
}

/// Handles `mp:rejoin_ready`: completes the handshake and sends the full
/// resync bundle (`mp:rejoin_sync` + world + the latest snapshot). The
/// `(roomCode, matchId, rejoinAttemptId)` triple must match the pending
/// handshake exactly; a mismatch is logged and the frame is dropped rather
/// than resyncing the wrong match.
pub async fn complete_rejoin(
    state: &Arc<GatewayState>,
    ctx: &Arc<ConnectionCtx>,
    room_code: &str,
    match_id: &str,
    rejoin_attempt_id: &str,
) {
    let Some((_, pending)) = state.rejoins.remove(rejoin_attempt_id) else { return };
    if pending.connection_id != ctx.connection_id {
        return;
    }
    if pending.room_code != room_code || pending.match_id != match_id {
        tracing::warn!(
            user_id = %ctx.user_id,
            %rejoin_attempt_id,
            expected_room_code = %pending.room_code,
            got_room_code = %room_code,
            expected_match_id = %pending.match_id,
            got_match_id = %match_id,
            "mp:rejoin_ready room/match mismatch, dropping"
        );
        return;
    }

    state.metrics.increment_rejoin_handshakes_completed();
    send_resync_bundle(state, ctx, &pending.match_id).await;
}

/// Called by the sweep task for handshakes whose deadline has passed
/// without an `mp:rejoin_ready`: force-syncs the client anyway rather than
/// leaving it stalled.
pub async fn expire_rejoin(state: &Arc<GatewayState>, pending: PendingRejoin) {
    state.metrics.increment_rejoin_handshakes_expired();
    let Some(ctx) = state.connections.get(&pending.connection_id).map(|e| e.value().clone()) else {
        return;
    };
    send_resync_bundle(state, &ctx, &pending.match_id).await;
}

async fn send_resync_bundle(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>, match_id: &str) {
    ctx.set_rejoin_attempt_id(None);

    let Some(handle) = state.matches.get(match_id) else { return };
    let match_state = handle.lock().await;

    let _ = ctx.try_send(ServerMessage::MatchStarted {
        room_code: match_state.room_code.clone(),
        match_id: match_id.to_string(),
    });
    let _ = ctx.try_send(ServerMessage::MpRejoinSync { match_id: match_id.to_string() });

    let world = WorldView {
        grid_w: match_state.world.grid_w,
        grid_h: match_state.world.grid_h,
        tiles: Some(match_state.world.tiles.clone()),
        world_hash: match_state.world.world_hash.clone(),
    };
    let _ = ctx.try_send(ServerMessage::MatchWorldInit {
        room_code: match_state.room_code.clone(),
        match_id: match_id.to_string(),
        world,
    });

    let _ = ctx.try_send(crate::match_sim::build_snapshot(&match_state, GatewayState::now_ms()));
}
