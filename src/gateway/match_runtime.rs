//! Owns the per-match `tokio::time::interval` tick loop and the shared
//! "start a match for this room" sequence used by both `match:start` and an
//! accepted restart vote.
//!
//! The interval loop itself follows the periodic-spawn idiom in
//! `auth::middleware`'s `start_cleanup_task`/`rate_limit`'s
//! `start_cleanup_task`, generalized from a cleanup sweep to a fixed-rate
//! simulation step. No blocking I/O runs inside the tick itself — the
//! match-end phase transition is posted to the store only once, after the
//! match-owning mutex has already been released.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::db::RoomPhase;
use crate::match_sim::run_tick;
use crate::protocol::types::WorldView;
use crate::protocol::ServerMessage;

use super::state::GatewayState;

/// Builds the ordered slot list for a fresh match: reuse the room's
/// remembered order if every member is still present, otherwise fall back
/// to join order.
pub async fn resolve_slot_order(
    state: &GatewayState,
    room_code: &str,
) -> Result<Vec<(String, String)>, crate::lobby::LobbyError> {
    let members = state.lobby.get_members(room_code).await?;

    if let Some(remembered) = state.matches.last_slot_order(room_code) {
        let member_ids: std::collections::HashSet<&str> =
            members.iter().map(|m| m.user_id.as_str()).collect();
        if remembered.len() == members.len()
            && remembered.iter().all(|(uid, _)| member_ids.contains(uid.as_str()))
        {
            return Ok(remembered);
        }
    }

    let mut ordered = members;
    ordered.sort_by_key(|m| m.joined_at);
    let mut slots = Vec::with_capacity(ordered.len());
    for member in ordered {
        let user = state
            .store
            .get_or_create_user(&member.user_id, &member.user_id)
            .await
            .map_err(crate::lobby::LobbyError::from)?;
        slots.push((user.user_id, user.display_name));
    }
    Ok(slots)
}

/// Creates a match for `room_code`, binds every attached connection to it,
/// broadcasts `match:started`/`match:world_init`, and spawns the tick loop.
pub async fn start_match(state: &Arc<GatewayState>, room_code: &str, slot_order: Vec<(String, String)>) {
    let old_match_id = state.matches.match_id_for_room(room_code);

    let (match_id, _handle) =
        state.matches.create_match(room_code, slot_order.clone(), state.config.match_config.clone());

    if let Some(old_id) = old_match_id {
        if old_id != match_id {
            if let Some((_, handle)) = state.tick_tasks.remove(&old_id) {
                handle.abort();
            }
        }
    }

    for entry in &state.connections {
        let ctx = entry.value();
        if ctx.room_code().as_deref() == Some(room_code) {
            ctx.set_match_id(Some(match_id.clone()));
        }
    }

    for (user_id, _display_name) in &slot_order {
        state.resume.touch_multiplayer(user_id, room_code, &match_id);
    }

    state.metrics.increment_matches_created();

    state.broadcast_to_room(
        room_code,
        &ServerMessage::MatchStarted { room_code: room_code.to_string(), match_id: match_id.clone() },
    );

    if let Some(handle) = state.matches.get(&match_id) {
        let world = {
            let guard = handle.lock().await;
            WorldView {
                grid_w: guard.world.grid_w,
                grid_h: guard.world.grid_h,
                tiles: Some(guard.world.tiles.clone()),
                world_hash: guard.world.world_hash.clone(),
            }
        };
        state.broadcast_to_room(
            room_code,
            &ServerMessage::MatchWorldInit {
                room_code: room_code.to_string(),
                match_id: match_id.clone(),
                world,
            },
        );
    }

    spawn_tick_loop(state.clone(), room_code.to_string(), match_id);
}

fn spawn_tick_loop(state: Arc<GatewayState>, room_code: String, match_id: String) {
    let period = Duration::from_millis(state.config.match_config.tick_period_ms);
    let rejoin_grace_secs = state.config.gateway.rejoin_grace_secs as i64;

    let task_match_id = match_id.clone();
    let join_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let Some(handle) = state.matches.get(&match_id) else { break };
            let (events, ended) = {
                let mut match_state = handle.lock().await;
                let now_ms = GatewayState::now_ms();
                let events = run_tick(&mut match_state, rejoin_grace_secs, now_ms);
                (events, match_state.ended)
            };

            state.metrics.increment_ticks_run();
            for event in &events {
                state.broadcast_to_match(&room_code, &match_id, event);
            }

            if ended {
                let _ = state.lobby.set_room_phase(&room_code, RoomPhase::Finished).await;
                state.matches.end_match(&match_id);
                state.metrics.increment_matches_ended();
                break;
            }
        }

        state.tick_tasks.remove(&match_id);
    });

    state.tick_tasks.insert(task_match_id, join_handle);
}
