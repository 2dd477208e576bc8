//! Per-connection state held for the lifetime of one `/ws` socket.
//!
//! The room/match attachment is interior-mutable so the tick loop and the
//! sweep task can read a connection's current routing without taking the
//! per-match mutex, and so the receive loop never has to hold a lock across
//! an `.await` point. Modeled on `websocket::connection`'s
//! split-sender/receiver-task shape, generalized from one `tx` channel per
//! client to a [`ConnectionCtx`] that also tracks room/match binding and a
//! per-connection input rate limiter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerMessage;

use super::rate_limit::InputRateLimiter;

/// Queue capacity for one connection's outbound message channel.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Everything the gateway tracks about one live WebSocket connection.
pub struct ConnectionCtx {
    pub connection_id: Uuid,
    pub user_id: String,
    pub display_name: String,
    tx: mpsc::Sender<Arc<ServerMessage>>,
    close_tx: mpsc::Sender<()>,
    room_code: RwLock<Option<String>>,
    match_id: RwLock<Option<String>>,
    rejoin_attempt_id: RwLock<Option<String>>,
    last_activity_ms: AtomicI64,
    input_limiter: std::sync::Mutex<InputRateLimiter>,
}

impl ConnectionCtx {
    #[must_use]
    pub fn new(
        user_id: String,
        display_name: String,
        tx: mpsc::Sender<Arc<ServerMessage>>,
        close_tx: mpsc::Sender<()>,
        input_rate_per_sec: u32,
        now_ms: i64,
    ) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            user_id,
            display_name,
            tx,
            close_tx,
            room_code: RwLock::new(None),
            match_id: RwLock::new(None),
            rejoin_attempt_id: RwLock::new(None),
            last_activity_ms: AtomicI64::new(now_ms),
            input_limiter: std::sync::Mutex::new(InputRateLimiter::new(input_rate_per_sec)),
        }
    }

    /// Enqueues a message for the send task; never blocks. A full queue
    /// drops the message, a `try_send` + dropped-count
    /// idiom rather than exerting backpressure on the tick loop.
    pub fn try_send(&self, message: ServerMessage) -> Result<(), mpsc::error::TrySendError<Arc<ServerMessage>>> {
        self.tx.try_send(Arc::new(message))
    }

    /// Same as [`Self::try_send`] but for a message already shared via
    /// `Arc`, so a room/match broadcast serializes its payload once instead
    /// of once per recipient.
    pub fn try_send_arc(
        &self,
        message: Arc<ServerMessage>,
    ) -> Result<(), mpsc::error::TrySendError<Arc<ServerMessage>>> {
        self.tx.try_send(message)
    }

    /// Requests the connection's main task tear down the socket.
    pub fn request_close(&self) {
        let _ = self.close_tx.try_send(());
    }

    #[must_use]
    pub fn room_code(&self) -> Option<String> {
        self.room_code.read().expect("room_code lock poisoned").clone()
    }

    pub fn set_room_code(&self, value: Option<String>) {
        *self.room_code.write().expect("room_code lock poisoned") = value;
    }

    #[must_use]
    pub fn match_id(&self) -> Option<String> {
        self.match_id.read().expect("match_id lock poisoned").clone()
    }

    pub fn set_match_id(&self, value: Option<String>) {
        *self.match_id.write().expect("match_id lock poisoned") = value;
    }

    #[must_use]
    pub fn rejoin_attempt_id(&self) -> Option<String> {
        self.rejoin_attempt_id.read().expect("rejoin lock poisoned").clone()
    }

    pub fn set_rejoin_attempt_id(&self, value: Option<String>) {
        *self.rejoin_attempt_id.write().expect("rejoin lock poisoned") = value;
    }

    pub fn touch(&self, now_ms: i64) {
        self.last_activity_ms.store(now_ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn idle_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_activity_ms.load(Ordering::Relaxed))
    }

    /// Returns `true` if the connection is still within its per-second
    /// input budget, consuming one unit of it if so.
    #[must_use]
    pub fn try_acquire_input_slot(&self) -> bool {
        self.input_limiter.lock().expect("rate limiter lock poisoned").try_acquire()
    }
}
