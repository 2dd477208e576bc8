//! WebSocket Gateway (C6): the `/ws` upgrade handshake, per-connection
//! send/receive tasks, message dispatch, and the background sweep task that
//! reaps stale connections/rooms and times out restart votes and rejoin
//! handshakes.
//!
//! The upgrade handler and split sender/receiver task shape are modeled on
//! `websocket::handler::websocket_handler` +
//! `websocket::connection::handle_socket`, generalized from a
//! post-upgrade `Authenticate` frame to pre-upgrade authentication
//! ([`auth::authenticate`]) since this gateway's credential sources (bearer
//! token, `initData`, dev `tgUserId`) are all available before the upgrade
//! completes.

pub mod auth;
pub mod connection;
pub mod dispatch;
pub mod match_runtime;
pub mod rate_limit;
pub mod rejoin;
pub mod state;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::protocol::{ClientMessage, ServerMessage};

use connection::{ConnectionCtx, OUTBOUND_QUEUE_CAPACITY};
use state::{GatewayState, PendingRejoin};

/// Builds the `/ws` router plus health, metrics, and resume-eligibility
/// endpoints, CORS'd per `security.cors_origins` the way `routes::create_router`
/// is.
#[must_use]
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let cors = build_cors(&state.config.security.cors_origins);

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/resume/eligibility", get(resume_eligibility_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(origins: &str) -> CorsLayer {
    if origins == "*" {
        return CorsLayer::permissive();
    }
    let parsed: Vec<_> =
        origins.split(',').filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok()).collect();
    if parsed.is_empty() {
        tracing::warn!("no valid CORS origins configured, using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new().allow_origin(parsed).allow_methods(Any).allow_headers(Any)
    }
}

async fn health_check(State(state): State<Arc<GatewayState>>) -> &'static str {
    let _ = &state;
    "OK"
}

async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> axum::Json<crate::metrics::MetricsSnapshot> {
    axum::Json(state.metrics.snapshot().await)
}

/// `GET /resume/eligibility`: the one REST surface this crate exposes for
/// C8, gating the mini-app client's "resume last match" prompt.
/// Authenticates with the same credential sources as the WS handshake.
#[derive(serde::Serialize)]
struct ResumeEligibilityResponse {
    eligible: bool,
    room_code: Option<String>,
    match_id: Option<String>,
    reason: Option<&'static str>,
}

async fn resume_eligibility_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let identity = match auth::authenticate(&state, &headers, &query).await {
        Ok(identity) => identity,
        Err(error) => {
            return axum::http::StatusCode::from_u16(error.http_status())
                .unwrap_or(axum::http::StatusCode::UNAUTHORIZED)
                .into_response();
        }
    };

    let eligibility = state
        .resume
        .resolve_resume_eligibility(&identity.user_id, &state.lobby, &state.matches)
        .await;

    let body = match eligibility {
        crate::resume::ResumeEligibility::Eligible { room_code, match_id } => ResumeEligibilityResponse {
            eligible: true,
            room_code: Some(room_code),
            match_id: Some(match_id),
            reason: None,
        },
        crate::resume::ResumeEligibility::Ineligible { reason } => ResumeEligibilityResponse {
            eligible: false,
            room_code: None,
            match_id: None,
            reason: Some(match reason {
                crate::resume::IneligibleReason::Expired => "expired",
                crate::resume::IneligibleReason::IntentionallyTerminated => "intentionally_terminated",
                crate::resume::IneligibleReason::RoomNotStarted => "room_not_started",
                crate::resume::IneligibleReason::NotAMember => "not_a_member",
                crate::resume::IneligibleReason::MatchMissing => "match_missing",
                crate::resume::IneligibleReason::MatchEnded => "match_ended",
            }),
        },
    };

    axum::Json(body).into_response()
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    match auth::authenticate(&state, &headers, &query).await {
        Ok(identity) => ws.on_upgrade(move |socket| {
            handle_socket(socket, state, identity.user_id, identity.display_name)
        }),
        Err(error) => {
            state.metrics.increment_auth_failures();
            axum::http::StatusCode::from_u16(error.http_status())
                .unwrap_or(axum::http::StatusCode::UNAUTHORIZED)
                .into_response()
        }
    }
}

use axum::response::IntoResponse;

/// Owns one `/ws` socket for its lifetime: splits it into a send task (drains
/// `ctx`'s outbound channel) and a receive loop (parses frames, dispatches
/// them, and watches for a close request from either side).
async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, user_id: String, display_name: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(OUTBOUND_QUEUE_CAPACITY);
    let (close_tx, mut close_rx) = mpsc::channel::<()>(1);

    let ctx = Arc::new(ConnectionCtx::new(
        user_id,
        display_name,
        tx,
        close_tx,
        state.config.rate_limit.input_rate_per_sec,
        GatewayState::now_ms(),
    ));

    state.connections.insert(ctx.connection_id, ctx.clone());
    state.metrics.increment_connections();

    let _ = ctx.try_send(ServerMessage::Connected);

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = serde_json::to_string(message.as_ref()) else { continue };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            _ = close_rx.recv() => break,
            frame = receiver.next() => {
                let Some(frame) = frame else { break };
                let Ok(frame) = frame else { break };
                match frame {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => dispatch::dispatch(&state, &ctx, message).await,
                            Err(error) => {
                                tracing::debug!(%error, user_id = %ctx.user_id, "rejected malformed client frame");
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    send_task.abort();
    teardown_connection(&state, &ctx).await;
}

/// Cleans up every index a live connection participated in: the gateway's
/// own connection table, the room registry, and (if mid-match) the match
/// simulator's disconnect bookkeeping so the tick loop starts the rejoin
/// grace window.
async fn teardown_connection(state: &Arc<GatewayState>, ctx: &Arc<ConnectionCtx>) {
    state.connections.remove(&ctx.connection_id);
    state.metrics.decrement_active_connections();

    let Some(room_code) = ctx.room_code() else { return };
    state.registry.detach(&room_code, ctx.connection_id);

    if let Some(match_id) = ctx.match_id() {
        if let Some(handle) = state.matches.get(&match_id) {
            let mut match_state = handle.lock().await;
            if !match_state.ended {
                match_state.mark_player_disconnected(&ctx.user_id);
            }
        }
    }
}

/// Runs forever on a background task, sweeping every `sweep_interval_secs`:
/// reaps idle connections and stale rooms, times out overdue rejoin
/// handshakes, expires restart-vote proposals (kicking spam proposers), and
/// prunes expired sessions. Modeled on `rate_limit`'s/`auth`'s
/// cleanup-task idiom of a plain `tokio::time::interval` loop rather than a
/// `tokio-cron-scheduler`-style dependency.
pub async fn run_sweep_task(state: Arc<GatewayState>) {
    let period = Duration::from_secs(state.config.gateway.sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        sweep_once(&state).await;
    }
}

async fn sweep_once(state: &Arc<GatewayState>) {
    let now = chrono::Utc::now();
    let now_ms = GatewayState::now_ms();

    reap_idle_connections(state, now_ms);
    finalize_stale_rooms(state, now).await;
    sweep_rejoin_handshakes(state, now).await;
    sweep_restart_votes(state, now).await;

    match state.sessions.prune_expired().await {
        Ok(0) => {}
        Ok(count) => tracing::debug!(count, "pruned expired sessions"),
        Err(error) => tracing::warn!(%error, "failed to prune expired sessions"),
    }
}

fn reap_idle_connections(state: &Arc<GatewayState>, now_ms: i64) {
    let stale_secs = state.config.gateway.stale_connection_secs as i64;
    let mut reaped = 0u64;
    for entry in &state.connections {
        let ctx = entry.value();
        if ctx.idle_ms(now_ms) > stale_secs * 1000 {
            ctx.request_close();
            reaped += 1;
        }
    }
    if reaped > 0 {
        state.metrics.add_stale_connections_reaped(reaped);
    }
}

async fn finalize_stale_rooms(state: &Arc<GatewayState>, now: chrono::DateTime<chrono::Utc>) {
    let stale_secs = state.config.gateway.stale_room_secs as i64;
    let rejoin_grace_secs = state.config.gateway.rejoin_grace_secs as i64;
    let mut finalized = 0u64;
    for room_code in state.registry.known_rooms() {
        if !state.registry.is_stale(&room_code, stale_secs, now) {
            continue;
        }

        let match_id = state.matches.match_id_for_room(&room_code);
        if let Some(match_id) = &match_id {
            if let Some(handle) = state.matches.get(match_id) {
                let rejoinable = handle.lock().await.has_rejoinable_players(rejoin_grace_secs);
                if rejoinable {
                    continue;
                }
            }
        }

        if let Some(match_id) = match_id {
            state.matches.end_match(&match_id);
        }
        let _ = state.lobby.set_room_phase(&room_code, crate::db::RoomPhase::Finished).await;
        state.registry.forget(&room_code);
        finalized += 1;
    }
    if finalized > 0 {
        state.metrics.add_stale_rooms_finalized(finalized);
    }
}

async fn sweep_rejoin_handshakes(state: &Arc<GatewayState>, now: chrono::DateTime<chrono::Utc>) {
    let expired: Vec<(String, PendingRejoin)> = state
        .rejoins
        .iter()
        .filter(|entry| entry.value().expires_at <= now)
        .map(|entry| (entry.key().clone(), clone_pending(entry.value())))
        .collect();

    for (attempt_id, pending) in expired {
        state.rejoins.remove(&attempt_id);
        rejoin::expire_rejoin(state, pending).await;
    }
}

fn clone_pending(pending: &PendingRejoin) -> PendingRejoin {
    PendingRejoin {
        connection_id: pending.connection_id,
        user_id: pending.user_id.clone(),
        room_code: pending.room_code.clone(),
        match_id: pending.match_id.clone(),
        expires_at: pending.expires_at,
    }
}

async fn sweep_restart_votes(state: &Arc<GatewayState>, now: chrono::DateTime<chrono::Utc>) {
    for timed_out in state.restart_votes.sweep_timeouts(now) {
        state.broadcast_to_room(
            &timed_out.room_code,
            &ServerMessage::RoomRestartCancelled {
                room_code: timed_out.room_code.clone(),
                reason: "timeout".to_string(),
            },
        );
        state.broadcast_to_room(
            &timed_out.room_code,
            &ServerMessage::RoomRestartCooldown {
                room_code: timed_out.room_code.clone(),
                retry_at_ms: timed_out.retry_at_ms,
            },
        );

        if timed_out.should_kick {
            state.metrics.increment_restart_vote_spam_kicks();
            for entry in &state.connections {
                let ctx = entry.value();
                if ctx.user_id == timed_out.proposer_user_id
                    && ctx.room_code().as_deref() == Some(timed_out.room_code.as_str())
                {
                    let _ = ctx.try_send(ServerMessage::WsPlayerKicked { reason: "restart_spam".to_string() });
                    ctx.request_close();
                }
            }
        }
    }
}
