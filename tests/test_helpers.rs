#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use bomber_arena_server::auth::SessionOracle;
use bomber_arena_server::config::Config;
use bomber_arena_server::db::{InMemoryStore, PersistentStore};
use bomber_arena_server::gateway::{self, state::GatewayState};
use bomber_arena_server::lobby::RoomLobbyService;
use bomber_arena_server::match_sim::MatchManager;
use bomber_arena_server::metrics::ServerMetrics;
use bomber_arena_server::registry::RoomRegistry;
use bomber_arena_server::resume::ResumeService;
use bomber_arena_server::restart_vote::RestartVoteFsm;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Boots an in-process gateway with an in-memory store, bound to an
/// ephemeral port. Mirrors the `create_test_server` + `start_server_with_instance`
/// shape but with this crate's own service wiring (`main::build_gateway_state`,
/// duplicated here since that helper is private to the binary crate).
pub async fn start_test_server() -> (SocketAddr, Arc<GatewayState>) {
    let config = Arc::new(Config::default());
    let store: Arc<dyn PersistentStore> = Arc::new(InMemoryStore::new());

    let sessions = Arc::new(SessionOracle::new(store.clone(), config.security.effective_session_ttl_seconds()));
    let lobby = Arc::new(RoomLobbyService::new(store.clone(), config.lobby.clone()));
    let matches = Arc::new(MatchManager::new());
    let resume = Arc::new(ResumeService::new(config.resume.ttl_secs));
    let restart_votes = Arc::new(RestartVoteFsm::new(
        config.restart_vote.timeout_secs,
        config.restart_vote.cooldown_secs,
        config.restart_vote.spam_strikes,
    ));
    let registry = Arc::new(RoomRegistry::new());
    let metrics = Arc::new(ServerMetrics::new());

    let state = Arc::new(GatewayState::new(
        config, store, sessions, lobby, matches, resume, restart_votes, registry, metrics,
    ));

    let router = gateway::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    // Give the listener a moment to start accepting.
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    (addr, state)
}

/// Mints a real session token for `user_id` against the server's own
/// session oracle, the same credential source the production client uses
/// (`sessionToken` query parameter), rather than the dev `tgUserId`
/// fallback, which production config keeps disabled.
pub async fn mint_token(state: &GatewayState, user_id: &str) -> String {
    state.store.get_or_create_user(user_id, user_id).await.unwrap();
    state.sessions.create_session(user_id).await.unwrap()
}

pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub async fn connect_with_token(addr: SocketAddr, token: &str) -> (WsSink, WsSource) {
    use futures_util::StreamExt;

    let url = format!("ws://{addr}/ws?sessionToken={token}");
    let (ws_stream, _) = tokio::time::timeout(std::time::Duration::from_secs(5), connect_async(&url))
        .await
        .expect("websocket connect timed out")
        .expect("failed to connect");
    ws_stream.split()
}

/// Reads the next text frame within `secs`, parsed as JSON. Panics (failing
/// the test) on timeout or a non-text frame, mirroring the `send_and_receive`
/// helper.
pub async fn next_json(source: &mut WsSource, secs: u64) -> serde_json::Value {
    use futures_util::StreamExt;

    let frame = tokio::time::timeout(std::time::Duration::from_secs(secs), source.next())
        .await
        .expect("timed out waiting for server message")
        .expect("connection closed")
        .expect("websocket error");

    match frame {
        Message::Text(text) => serde_json::from_str(&text).expect("server sent non-JSON text frame"),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

/// Reads frames until one whose `type` field matches `expected_type`,
/// discarding any interleaved messages (e.g. redundant `match:snapshot`
/// ticks racing the assertion). Bounded by `secs` total across all reads.
pub async fn next_json_of_type(source: &mut WsSource, expected_type: &str, secs: u64) -> serde_json::Value {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(secs);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(remaining > std::time::Duration::ZERO, "timed out waiting for type={expected_type}");
        let value = next_json(source, remaining.as_secs().max(1)).await;
        if value["type"] == expected_type {
            return value;
        }
    }
}

pub async fn send_json(sink: &mut WsSink, value: serde_json::Value) {
    use futures_util::SinkExt;
    sink.send(Message::Text(value.to_string().into())).await.unwrap();
}
