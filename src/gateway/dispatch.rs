//! Routes one parsed [`ClientMessage`] to the appropriate service call and
//! reply/broadcast.

use std::sync::Arc;

use crate::db::RoomPhase;
use crate::match_sim::BombRejectReason;
use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::restart_vote::VoteOutcome;

use super::connection::ConnectionCtx;
use super::match_runtime::{resolve_slot_order, start_match};
use super::rejoin;
use super::state::GatewayState;

fn bomb_reject_error_code(reason: BombRejectReason) -> ErrorCode {
    tracing::debug!(?reason, "bomb placement rejected");
    ErrorCode::InvalidPayload
}

pub async fn dispatch(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>, message: ClientMessage) {
    ctx.touch(GatewayState::now_ms());

    match message {
        ClientMessage::Ping { id, t } => {
            let _ = ctx.try_send(ServerMessage::Pong { id, t, server_now: GatewayState::now_ms() });
        }

        ClientMessage::RoomJoin { room_id } => handle_room_join(state, ctx, &room_id).await,

        ClientMessage::RoomLeave => handle_room_leave(state, ctx).await,

        ClientMessage::MatchStart => handle_match_start(state, ctx).await,

        ClientMessage::MatchInput { seq, payload } => handle_match_input(state, ctx, seq, payload).await,

        ClientMessage::MatchBombPlace { payload: _ } => {
            // The client's (x, y) is advisory only; the authoritative cell
            // is read from the match state under lock.
            handle_bomb_place(state, ctx).await;
        }

        ClientMessage::MpRejoinReady { room_code, match_id, rejoin_attempt_id } => {
            rejoin::complete_rejoin(state, ctx, &room_code, &match_id, &rejoin_attempt_id).await;
        }

        ClientMessage::MpSnapshotApplied { match_id, .. } => {
            tracing::debug!(user_id = %ctx.user_id, %match_id, "rejoin snapshot applied");
        }

        ClientMessage::RoomRestartPropose => handle_restart_propose(state, ctx).await,

        ClientMessage::RoomRestartVote { vote } => handle_restart_vote(state, ctx, vote).await,
    }
}

async fn handle_room_join(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>, room_id: &str) {
    let room = match state.lobby.get_room(room_id).await {
        Ok(Some(room)) => room,
        Ok(None) => {
            let _ =
                ctx.try_send(ServerMessage::MatchError { error: ErrorCode::RoomNotFound.as_str().to_string() });
            return;
        }
        Err(err) => {
            let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
            return;
        }
    };

    if room.status == crate::db::RoomStatus::Closed {
        let _ = ctx.try_send(ServerMessage::MatchError { error: ErrorCode::RoomClosed.as_str().to_string() });
        return;
    }

    if room.phase != RoomPhase::Lobby {
        handle_room_join_in_progress(state, ctx, room).await;
        return;
    }

    let room = match state.lobby.join_room(&ctx.user_id, &room.room_code, None).await {
        Ok(room) => room,
        Err(err) => {
            let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
            return;
        }
    };

    ctx.set_room_code(Some(room.room_code.clone()));
    state.registry.attach(&room.room_code, ctx.connection_id);
    state.metrics.increment_rooms_joined();
}

/// `room:join` against a room whose match is already `STARTED` (or has just
/// `FINISHED`): only a known member of the active match may attach, and
/// only within the rejoin grace window, or by displacing their own stale
/// socket still attached to the same room.
async fn handle_room_join_in_progress(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>, room: crate::db::Room) {
    let members = match state.lobby.get_members(&room.room_code).await {
        Ok(members) => members,
        Err(err) => {
            let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
            return;
        }
    };
    if !members.iter().any(|m| m.user_id == ctx.user_id) {
        let _ = ctx.try_send(ServerMessage::MatchError { error: ErrorCode::NotAMember.as_str().to_string() });
        return;
    }

    let match_id_and_handle = state
        .matches
        .match_id_for_room(&room.room_code)
        .and_then(|id| state.matches.get(&id).map(|handle| (id, handle)));
    let Some((match_id, handle)) = match_id_and_handle else {
        let _ = ctx.try_send(ServerMessage::MatchError {
            error: ErrorCode::RoomStarted.qualified("match_missing"),
        });
        return;
    };

    // A stale socket for the same user still attached to this room: the
    // caller is reconnecting (new tab/reload) rather than rejoining after a
    // detected disconnect, so the grace-window check doesn't apply.
    let mut displaced_stale_socket = false;
    for entry in &state.connections {
        let other = entry.value();
        if other.connection_id != ctx.connection_id
            && other.user_id == ctx.user_id
            && other.room_code().as_deref() == Some(room.room_code.as_str())
        {
            other.request_close();
            displaced_stale_socket = true;
        }
    }

    let rejoinable = {
        let match_state = handle.lock().await;
        !match_state.ended
            && (displaced_stale_socket
                || match_state
                    .is_player_rejoinable(&ctx.user_id, state.config.gateway.rejoin_grace_secs as i64))
    };
    if !rejoinable {
        let _ = ctx.try_send(ServerMessage::MatchError {
            error: ErrorCode::RoomStarted.qualified("rejoin_grace_expired"),
        });
        return;
    }

    state.resume.touch_multiplayer(&ctx.user_id, &room.room_code, &match_id);
    rejoin::begin_rejoin(state, ctx, &room.room_code, &match_id).await;
    state.registry.attach(&room.room_code, ctx.connection_id);
}

async fn handle_room_leave(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>) {
    let Some(room_code) = ctx.room_code() else { return };
    let _ = state.lobby.leave_room(&ctx.user_id, &room_code).await;
    state.registry.detach(&room_code, ctx.connection_id);
    state.resume.mark_intentionally_terminated(&ctx.user_id);
    ctx.set_room_code(None);
    ctx.set_match_id(None);
}

async fn handle_match_start(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>) {
    let Some(room_code) = ctx.room_code() else {
        let _ = ctx.try_send(ServerMessage::MatchError { error: ErrorCode::NotInRoom.as_str().to_string() });
        return;
    };

    if let Err(err) = state.lobby.start_room(&ctx.user_id, &room_code).await {
        let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
        return;
    }

    let slot_order = match resolve_slot_order(state, &room_code).await {
        Ok(order) => order,
        Err(err) => {
            let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
            return;
        }
    };

    start_match(state, &room_code, slot_order).await;
}

async fn handle_match_input(
    state: &Arc<GatewayState>,
    ctx: &Arc<ConnectionCtx>,
    seq: u32,
    payload: crate::protocol::types::InputPayload,
) {
    let Some(match_id) = ctx.match_id() else { return };
    if !ctx.try_acquire_input_slot() {
        state.metrics.increment_input_rate_limit_rejections();
        return;
    }
    let Some(handle) = state.matches.get(&match_id) else { return };
    let mut match_state = handle.lock().await;
    match_state.enqueue_input(crate::match_sim::QueuedInput {
        user_id: ctx.user_id.clone(),
        seq,
        payload,
    });
}

async fn handle_bomb_place(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>) {
    let Some(match_id) = ctx.match_id() else { return };
    let Some(room_code) = ctx.room_code() else { return };
    let Some(handle) = state.matches.get(&match_id) else { return };

    let result = {
        let mut match_state = handle.lock().await;
        let Some((x, y)) = match_state.player_position(&ctx.user_id) else {
            return;
        };
        match_state.try_place_bomb(&ctx.user_id, x, y)
    };

    match result {
        Ok(bomb) => {
            state.metrics.increment_bombs_placed();
            state.broadcast_to_match(
                &room_code,
                &match_id,
                &ServerMessage::MatchBombSpawned {
                    id: bomb.id,
                    x: bomb.x,
                    y: bomb.y,
                    owner_id: bomb.owner_user_id,
                    explode_at_tick: bomb.explode_at_tick,
                },
            );
        }
        Err(reason) => {
            state.metrics.increment_bomb_place_rejections();
            let _ = ctx.try_send(ServerMessage::MatchError { error: bomb_reject_error_code(reason).as_str().to_string() });
        }
    }
}

/// A restart vote may only be proposed once the room's current match has
/// ended, or by a player already eliminated within a still-running match.
async fn restart_propose_allowed(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>, room_code: &str) -> bool {
    let Some(match_id) = state.matches.match_id_for_room(room_code) else {
        // No live match (already FINISHED and torn down): allowed.
        return true;
    };
    let Some(handle) = state.matches.get(&match_id) else { return true };
    let match_state = handle.lock().await;
    match_state.ended
        || match_state.players.get(&ctx.user_id).is_some_and(crate::match_sim::PlayerState::is_eliminated)
}

async fn handle_restart_propose(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>) {
    let Some(room_code) = ctx.room_code() else { return };

    if !restart_propose_allowed(state, ctx, &room_code).await {
        let _ = ctx.try_send(ServerMessage::MatchError {
            error: ErrorCode::RestartProposeNotAllowed.as_str().to_string(),
        });
        return;
    }

    let members = match state.lobby.get_members(&room_code).await {
        Ok(members) => members,
        Err(err) => {
            let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
            return;
        }
    };
    let member_ids: Vec<String> = members.into_iter().map(|m| m.user_id).collect();

    match state.restart_votes.propose(&room_code, &ctx.user_id, &member_ids) {
        Ok(expires_at) => {
            state.metrics.increment_restart_votes_proposed();
            state.broadcast_to_room(
                &room_code,
                &ServerMessage::RoomRestartProposed {
                    room_code: room_code.clone(),
                    by_user_id: ctx.user_id.clone(),
                    expires_at: expires_at.timestamp_millis(),
                },
            );
        }
        Err(err) => {
            let retry_at_ms = match &err {
                crate::restart_vote::RestartVoteError::Cooldown { retry_at_ms } => Some(*retry_at_ms),
                _ => None,
            };
            let _ = ctx.try_send(ServerMessage::RoomRestartRejected {
                room_code,
                reason: err.to_string(),
                retry_at_ms,
            });
        }
    }
}

async fn handle_restart_vote(
    state: &Arc<GatewayState>,
    ctx: &Arc<ConnectionCtx>,
    vote: crate::protocol::types::RestartVoteChoice,
) {
    let Some(room_code) = ctx.room_code() else { return };
    let yes = matches!(vote, crate::protocol::types::RestartVoteChoice::Yes);

    match state.restart_votes.vote(&room_code, &ctx.user_id, yes) {
        Ok(VoteOutcome::Pending { yes_count, total }) => {
            state.broadcast_to_room(
                &room_code,
                &ServerMessage::RoomRestartVoteState { room_code, yes_count, total },
            );
        }
        Ok(VoteOutcome::Accepted) => {
            state.metrics.increment_restart_votes_accepted();
            state.broadcast_to_room(
                &room_code,
                &ServerMessage::RoomRestartAccepted { room_code: room_code.clone() },
            );

            if let Err(err) = state.lobby.set_room_phase(&room_code, RoomPhase::Started).await {
                tracing::warn!(%room_code, error = %err, "failed to mark room started for restart");
                return;
            }
            match resolve_slot_order(state, &room_code).await {
                Ok(slot_order) => start_match(state, &room_code, slot_order).await,
                Err(err) => tracing::warn!(%room_code, error = %err, "failed to resolve restart slot order"),
            }
        }
        Ok(VoteOutcome::Cancelled { retry_at_ms: _ }) => {
            state.metrics.increment_restart_votes_cancelled();
            state.broadcast_to_room(
                &room_code,
                &ServerMessage::RoomRestartCancelled {
                    room_code,
                    reason: "vote_rejected".to_string(),
                },
            );
        }
        Err(err) => {
            let _ = ctx.try_send(ServerMessage::MatchError { error: err.error_code().as_str().to_string() });
        }
    }
}
