use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Comprehensive metrics collection for the match server.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub connection_errors: AtomicU64,
    pub websocket_messages_dropped: AtomicU64,
    pub auth_failures: AtomicU64,

    // Room lifecycle metrics (C3)
    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub rooms_closed: AtomicU64,
    pub room_creation_failures: AtomicU64,
    pub room_join_failures: AtomicU64,
    pub room_code_collisions: AtomicU64,

    // Match simulator metrics (C4/C5)
    pub matches_created: AtomicU64,
    pub matches_ended: AtomicU64,
    pub ticks_run: AtomicU64,
    pub tick_budget_overruns: AtomicU64,
    pub bombs_placed: AtomicU64,
    pub bomb_place_rejections: AtomicU64,
    pub bombs_exploded: AtomicU64,
    pub player_damage_events: AtomicU64,
    pub player_eliminations: AtomicU64,
    pub player_respawns: AtomicU64,
    pub enemy_contact_hits: AtomicU64,

    // Gateway metrics (C6)
    pub rejoin_handshakes_started: AtomicU64,
    pub rejoin_handshakes_completed: AtomicU64,
    pub rejoin_handshakes_expired: AtomicU64,
    pub broadcast_filter_drops: AtomicU64,
    pub stale_connections_reaped: AtomicU64,
    pub stale_rooms_finalized: AtomicU64,

    // Restart vote metrics (C7)
    pub restart_votes_proposed: AtomicU64,
    pub restart_votes_accepted: AtomicU64,
    pub restart_votes_cancelled: AtomicU64,
    pub restart_vote_spam_kicks: AtomicU64,

    // Resume service metrics (C8)
    pub resume_records_touched: AtomicU64,
    pub resume_records_consumed: AtomicU64,
    pub resume_records_expired: AtomicU64,

    // Rate limiting metrics
    pub lobby_rate_limit_rejections: AtomicU64,
    pub input_rate_limit_rejections: AtomicU64,

    // Performance metrics
    pub query_count: AtomicU64,
    pub average_response_times: Arc<RwLock<ResponseTimeTracker>>,
    pub latency_histogram_clamped_samples: AtomicU64,

    // Error tracking
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,
    pub websocket_errors: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct ResponseTimeTracker {
    operations: HashMap<String, OperationLatencyHistogram>,
    lowest_discernible_micros: u64,
    highest_trackable_micros: u64,
    significant_figures: u8,
}

const DEFAULT_LOWEST_DISCERNIBLE_MICROS: u64 = 1;
const DEFAULT_HIGHEST_TRACKABLE_MICROS: u64 = 300_000_000; // 5 minutes in microseconds
const DEFAULT_SIGNIFICANT_FIGURES: u8 = 3;

#[derive(Debug, Clone)]
struct OperationLatencyHistogram {
    /// Optional histogram - None if all creation attempts failed (should be rare)
    histogram: Option<Histogram<u64>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub rooms: RoomMetrics,
    pub matches: MatchMetrics,
    pub gateway: GatewayMetrics,
    pub restart_vote: RestartVoteMetrics,
    pub resume: ResumeMetrics,
    pub rate_limiting: RateLimitingMetrics,
    pub performance: PerformanceMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub connection_errors: u64,
    pub websocket_messages_dropped: u64,
    pub auth_failures: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_closed: u64,
    pub room_creation_failures: u64,
    pub room_join_failures: u64,
    pub room_code_collisions: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchMetrics {
    pub matches_created: u64,
    pub matches_ended: u64,
    pub ticks_run: u64,
    pub tick_budget_overruns: u64,
    pub bombs_placed: u64,
    pub bomb_place_rejections: u64,
    pub bombs_exploded: u64,
    pub player_damage_events: u64,
    pub player_eliminations: u64,
    pub player_respawns: u64,
    pub enemy_contact_hits: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayMetrics {
    pub rejoin_handshakes_started: u64,
    pub rejoin_handshakes_completed: u64,
    pub rejoin_handshakes_expired: u64,
    pub broadcast_filter_drops: u64,
    pub stale_connections_reaped: u64,
    pub stale_rooms_finalized: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RestartVoteMetrics {
    pub proposed: u64,
    pub accepted: u64,
    pub cancelled: u64,
    pub spam_kicks: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResumeMetrics {
    pub touched: u64,
    pub consumed: u64,
    pub expired: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitingMetrics {
    pub lobby_rejections: u64,
    pub input_rejections: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PerformanceMetrics {
    pub query_count: u64,
    pub average_tick_ms: Option<f64>,
    pub average_query_ms: Option<f64>,
    pub tick_latency: OperationLatencyMetrics,
    pub query_latency: OperationLatencyMetrics,
    pub latency_histogram_clamped_samples: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct OperationLatencyMetrics {
    pub average_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sample_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub websocket_errors: u64,
    pub total_errors: u64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            websocket_messages_dropped: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            rooms_joined: AtomicU64::new(0),
            rooms_closed: AtomicU64::new(0),
            room_creation_failures: AtomicU64::new(0),
            room_join_failures: AtomicU64::new(0),
            room_code_collisions: AtomicU64::new(0),
            matches_created: AtomicU64::new(0),
            matches_ended: AtomicU64::new(0),
            ticks_run: AtomicU64::new(0),
            tick_budget_overruns: AtomicU64::new(0),
            bombs_placed: AtomicU64::new(0),
            bomb_place_rejections: AtomicU64::new(0),
            bombs_exploded: AtomicU64::new(0),
            player_damage_events: AtomicU64::new(0),
            player_eliminations: AtomicU64::new(0),
            player_respawns: AtomicU64::new(0),
            enemy_contact_hits: AtomicU64::new(0),
            rejoin_handshakes_started: AtomicU64::new(0),
            rejoin_handshakes_completed: AtomicU64::new(0),
            rejoin_handshakes_expired: AtomicU64::new(0),
            broadcast_filter_drops: AtomicU64::new(0),
            stale_connections_reaped: AtomicU64::new(0),
            stale_rooms_finalized: AtomicU64::new(0),
            restart_votes_proposed: AtomicU64::new(0),
            restart_votes_accepted: AtomicU64::new(0),
            restart_votes_cancelled: AtomicU64::new(0),
            restart_vote_spam_kicks: AtomicU64::new(0),
            resume_records_touched: AtomicU64::new(0),
            resume_records_consumed: AtomicU64::new(0),
            resume_records_expired: AtomicU64::new(0),
            lobby_rate_limit_rejections: AtomicU64::new(0),
            input_rate_limit_rejections: AtomicU64::new(0),
            query_count: AtomicU64::new(0),
            average_response_times: Arc::new(RwLock::new(ResponseTimeTracker::new())),
            latency_histogram_clamped_samples: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            websocket_errors: AtomicU64::new(0),
        }
    }

    // Connection metrics
    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        let _ =
            self.active_connections
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    if current > 0 {
                        Some(current - 1)
                    } else {
                        None
                    }
                });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connection_errors(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_messages_dropped(&self) {
        self.websocket_messages_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Room lifecycle metrics
    pub fn increment_rooms_created(&self) {
        self.rooms_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_joined(&self) {
        self.rooms_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rooms_closed(&self) {
        self.rooms_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_creation_failures(&self) {
        self.room_creation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_join_failures(&self) {
        self.room_join_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_room_code_collisions(&self) {
        self.room_code_collisions.fetch_add(1, Ordering::Relaxed);
    }

    // Match simulator metrics
    pub fn increment_matches_created(&self) {
        self.matches_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_matches_ended(&self) {
        self.matches_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ticks_run(&self) {
        self.ticks_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tick_budget_overruns(&self) {
        self.tick_budget_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bombs_placed(&self) {
        self.bombs_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bomb_place_rejections(&self) {
        self.bomb_place_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bombs_exploded(&self) {
        self.bombs_exploded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_player_damage_events(&self) {
        self.player_damage_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_player_eliminations(&self) {
        self.player_eliminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_player_respawns(&self) {
        self.player_respawns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_enemy_contact_hits(&self) {
        self.enemy_contact_hits.fetch_add(1, Ordering::Relaxed);
    }

    // Gateway metrics
    pub fn increment_rejoin_handshakes_started(&self) {
        self.rejoin_handshakes_started
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejoin_handshakes_completed(&self) {
        self.rejoin_handshakes_completed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejoin_handshakes_expired(&self) {
        self.rejoin_handshakes_expired
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_broadcast_filter_drops(&self) {
        self.broadcast_filter_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_stale_connections_reaped(&self, count: u64) {
        self.stale_connections_reaped
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_stale_rooms_finalized(&self, count: u64) {
        self.stale_rooms_finalized
            .fetch_add(count, Ordering::Relaxed);
    }

    // Restart vote metrics
    pub fn increment_restart_votes_proposed(&self) {
        self.restart_votes_proposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_restart_votes_accepted(&self) {
        self.restart_votes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_restart_votes_cancelled(&self) {
        self.restart_votes_cancelled
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_restart_vote_spam_kicks(&self) {
        self.restart_vote_spam_kicks
            .fetch_add(1, Ordering::Relaxed);
    }

    // Resume service metrics
    pub fn increment_resume_records_touched(&self) {
        self.resume_records_touched
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_resume_records_consumed(&self) {
        self.resume_records_consumed
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_resume_records_expired(&self) {
        self.resume_records_expired
            .fetch_add(1, Ordering::Relaxed);
    }

    // Rate limiting metrics
    pub fn increment_lobby_rate_limit_rejections(&self) {
        self.lobby_rate_limit_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_input_rate_limit_rejections(&self) {
        self.input_rate_limit_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    // Performance metrics
    pub fn increment_query_count(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_response_time(&self, operation: &str, duration: Duration) {
        let mut tracker = self.average_response_times.write().await;
        if tracker.add_sample(operation, duration) {
            self.latency_histogram_clamped_samples
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_latency_histogram_clamps(&self) {
        self.latency_histogram_clamped_samples
            .fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn increment_validation_errors(&self) {
        self.validation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_internal_errors(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_websocket_errors(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let tracker = self.average_response_times.read().await;
        let tick_latency = tracker.get_latency_metrics("tick").unwrap_or_default();
        let query_latency = tracker.get_latency_metrics("query").unwrap_or_default();

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                connection_errors: self.connection_errors.load(Ordering::Relaxed),
                websocket_messages_dropped: self
                    .websocket_messages_dropped
                    .load(Ordering::Relaxed),
                auth_failures: self.auth_failures.load(Ordering::Relaxed),
            },
            rooms: RoomMetrics {
                rooms_created: self.rooms_created.load(Ordering::Relaxed),
                rooms_joined: self.rooms_joined.load(Ordering::Relaxed),
                rooms_closed: self.rooms_closed.load(Ordering::Relaxed),
                room_creation_failures: self.room_creation_failures.load(Ordering::Relaxed),
                room_join_failures: self.room_join_failures.load(Ordering::Relaxed),
                room_code_collisions: self.room_code_collisions.load(Ordering::Relaxed),
            },
            matches: MatchMetrics {
                matches_created: self.matches_created.load(Ordering::Relaxed),
                matches_ended: self.matches_ended.load(Ordering::Relaxed),
                ticks_run: self.ticks_run.load(Ordering::Relaxed),
                tick_budget_overruns: self.tick_budget_overruns.load(Ordering::Relaxed),
                bombs_placed: self.bombs_placed.load(Ordering::Relaxed),
                bomb_place_rejections: self.bomb_place_rejections.load(Ordering::Relaxed),
                bombs_exploded: self.bombs_exploded.load(Ordering::Relaxed),
                player_damage_events: self.player_damage_events.load(Ordering::Relaxed),
                player_eliminations: self.player_eliminations.load(Ordering::Relaxed),
                player_respawns: self.player_respawns.load(Ordering::Relaxed),
                enemy_contact_hits: self.enemy_contact_hits.load(Ordering::Relaxed),
            },
            gateway: GatewayMetrics {
                rejoin_handshakes_started: self.rejoin_handshakes_started.load(Ordering::Relaxed),
                rejoin_handshakes_completed: self
                    .rejoin_handshakes_completed
                    .load(Ordering::Relaxed),
                rejoin_handshakes_expired: self
                    .rejoin_handshakes_expired
                    .load(Ordering::Relaxed),
                broadcast_filter_drops: self.broadcast_filter_drops.load(Ordering::Relaxed),
                stale_connections_reaped: self.stale_connections_reaped.load(Ordering::Relaxed),
                stale_rooms_finalized: self.stale_rooms_finalized.load(Ordering::Relaxed),
            },
            restart_vote: RestartVoteMetrics {
                proposed: self.restart_votes_proposed.load(Ordering::Relaxed),
                accepted: self.restart_votes_accepted.load(Ordering::Relaxed),
                cancelled: self.restart_votes_cancelled.load(Ordering::Relaxed),
                spam_kicks: self.restart_vote_spam_kicks.load(Ordering::Relaxed),
            },
            resume: ResumeMetrics {
                touched: self.resume_records_touched.load(Ordering::Relaxed),
                consumed: self.resume_records_consumed.load(Ordering::Relaxed),
                expired: self.resume_records_expired.load(Ordering::Relaxed),
            },
            rate_limiting: RateLimitingMetrics {
                lobby_rejections: self.lobby_rate_limit_rejections.load(Ordering::Relaxed),
                input_rejections: self.input_rate_limit_rejections.load(Ordering::Relaxed),
            },
            performance: PerformanceMetrics {
                query_count: self.query_count.load(Ordering::Relaxed),
                average_tick_ms: tracker.get_average("tick"),
                average_query_ms: tracker.get_average("query"),
                tick_latency,
                query_latency,
                latency_histogram_clamped_samples: self
                    .latency_histogram_clamped_samples
                    .load(Ordering::Relaxed),
            },
            errors: {
                let validation_errors = self.validation_errors.load(Ordering::Relaxed);
                let internal_errors = self.internal_errors.load(Ordering::Relaxed);
                let websocket_errors = self.websocket_errors.load(Ordering::Relaxed);
                ErrorMetrics {
                    validation_errors,
                    internal_errors,
                    websocket_errors,
                    total_errors: validation_errors + internal_errors + websocket_errors,
                }
            },
        }
    }

    pub async fn health_status(&self) -> HealthStatus {
        let snapshot = self.snapshot().await;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if snapshot.matches.tick_budget_overruns > 0 {
            warnings.push(format!(
                "{} tick(s) exceeded the 50ms budget",
                snapshot.matches.tick_budget_overruns
            ));
        }
        if snapshot.gateway.broadcast_filter_drops > 100 {
            warnings.push(format!(
                "{} broadcasts dropped by the room/match filter invariant",
                snapshot.gateway.broadcast_filter_drops
            ));
        }
        if snapshot.errors.internal_errors > 0 {
            issues.push(format!(
                "{} internal error(s) recorded",
                snapshot.errors.internal_errors
            ));
        }

        let status = if !issues.is_empty() {
            HealthStatusLevel::Unhealthy
        } else if !warnings.is_empty() {
            HealthStatusLevel::Degraded
        } else {
            HealthStatusLevel::Healthy
        };

        HealthStatus {
            status,
            issues,
            warnings,
            metrics: snapshot,
        }
    }
}

impl Default for ResponseTimeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTimeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
            lowest_discernible_micros: DEFAULT_LOWEST_DISCERNIBLE_MICROS,
            highest_trackable_micros: DEFAULT_HIGHEST_TRACKABLE_MICROS,
            significant_figures: DEFAULT_SIGNIFICANT_FIGURES,
        }
    }

    #[cfg(test)]
    pub fn with_bounds(
        lowest_discernible_micros: u64,
        highest_trackable_micros: u64,
        significant_figures: u8,
    ) -> Self {
        Self {
            operations: HashMap::new(),
            lowest_discernible_micros: lowest_discernible_micros.max(1),
            highest_trackable_micros: highest_trackable_micros
                .max(lowest_discernible_micros.max(1)),
            significant_figures: significant_figures.clamp(1, 5),
        }
    }

    pub fn add_sample(&mut self, operation: &str, duration: Duration) -> bool {
        let micros = duration_to_micros(duration);
        let lowest = self.lowest_discernible_micros;
        let highest = self.highest_trackable_micros;
        let significant = self.significant_figures;
        let histogram = self
            .operations
            .entry(operation.to_string())
            .or_insert_with(|| OperationLatencyHistogram::new(lowest, highest, significant));

        histogram.record(micros, highest)
    }

    pub fn get_average(&self, operation: &str) -> Option<f64> {
        self.get_latency_metrics(operation)
            .and_then(|metrics| metrics.average_ms)
    }

    pub fn get_latency_metrics(&self, operation: &str) -> Option<OperationLatencyMetrics> {
        let histogram = self.operations.get(operation)?;
        histogram.metrics()
    }
}

impl OperationLatencyHistogram {
    fn new(
        lowest_discernible_micros: u64,
        highest_trackable_micros: u64,
        significant_figures: u8,
    ) -> Self {
        let lowest = lowest_discernible_micros.max(1);
        let highest = highest_trackable_micros.max(lowest);
        let sig_figs = significant_figures.clamp(1, 5);

        let histogram = Histogram::new_with_bounds(lowest, highest, sig_figs)
            .or_else(|e| {
                tracing::warn!(
                    target: "metrics",
                    error = %e,
                    lowest,
                    highest,
                    sig_figs,
                    "Failed to create histogram with requested bounds, using unbounded fallback"
                );
                Histogram::new(2)
            })
            .or_else(|_| {
                tracing::error!(target: "metrics", "Histogram::new(2) failed, trying sig_figs=1");
                Histogram::new(1)
            })
            .ok();

        if histogram.is_none() {
            tracing::error!(target: "metrics", "All histogram creation attempts failed - metrics will not be recorded");
        }

        Self { histogram }
    }

    fn record(&mut self, micros: u64, highest_trackable_micros: u64) -> bool {
        let was_clamped = micros > highest_trackable_micros;
        let value = if was_clamped {
            highest_trackable_micros
        } else {
            micros
        };
        if let Some(ref mut histogram) = self.histogram {
            if let Err(error) = histogram.record(value) {
                tracing::warn!(
                    target: "metrics",
                    %error,
                    clamped_value = value,
                    highest_trackable_micros,
                    "failed to record latency sample"
                );
            }
        }
        was_clamped
    }

    fn metrics(&self) -> Option<OperationLatencyMetrics> {
        let histogram = self.histogram.as_ref()?;
        if histogram.is_empty() {
            return None;
        }

        Some(OperationLatencyMetrics {
            average_ms: Some(histogram.mean() / MICROS_PER_MS),
            p50_ms: Some(self.percentile(50.0)),
            p95_ms: Some(self.percentile(95.0)),
            p99_ms: Some(self.percentile(99.0)),
            min_ms: Some(histogram.min() as f64 / MICROS_PER_MS),
            max_ms: Some(histogram.max() as f64 / MICROS_PER_MS),
            sample_count: histogram.len(),
        })
    }

    fn percentile(&self, percentile: f64) -> f64 {
        self.histogram
            .as_ref()
            .map(|h| h.value_at_percentile(percentile) as f64 / MICROS_PER_MS)
            .unwrap_or(0.0)
    }
}

const MICROS_PER_MS: f64 = 1000.0;

fn duration_to_micros(duration: Duration) -> u64 {
    duration.as_micros().min(u128::from(u64::MAX)) as u64
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: HealthStatusLevel,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum HealthStatusLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Utility struct for timing operations (tick loop, DB queries) and feeding
/// the result into [`ServerMetrics::record_response_time`].
pub struct OperationTimer {
    operation: String,
    start: Instant,
    metrics: Arc<ServerMetrics>,
}

impl OperationTimer {
    #[must_use]
    pub fn new(operation: &str, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
            metrics,
        }
    }

    pub async fn finish(self) {
        let duration = self.start.elapsed();
        self.metrics
            .record_response_time(&self.operation, duration)
            .await;
    }

    pub async fn finish_with_result<T, E>(self, result: &Result<T, E>) {
        let duration = self.start.elapsed();
        self.metrics
            .record_response_time(&self.operation, duration)
            .await;

        if result.is_err() {
            match self.operation.as_str() {
                "room_creation" => self.metrics.increment_room_creation_failures(),
                "room_join" => self.metrics.increment_room_join_failures(),
                "query" => self.metrics.increment_internal_errors(),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_active_connections_no_underflow() {
        let metrics = ServerMetrics::new();

        for _ in 0..10 {
            metrics.decrement_active_connections();
        }

        assert_eq!(metrics.active_connections.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.disconnections.load(Ordering::Relaxed), 10);
    }

    #[tokio::test]
    async fn snapshot_reflects_incremented_counters() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_rooms_created();
        metrics.increment_matches_created();
        metrics.increment_bombs_placed();
        metrics.increment_restart_votes_proposed();

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.connections.total_connections, 1);
        assert_eq!(snapshot.rooms.rooms_created, 1);
        assert_eq!(snapshot.matches.matches_created, 1);
        assert_eq!(snapshot.matches.bombs_placed, 1);
        assert_eq!(snapshot.restart_vote.proposed, 1);
    }

    #[tokio::test]
    async fn health_status_is_healthy_with_no_issues() {
        let metrics = ServerMetrics::new();
        let health = metrics.health_status().await;
        assert_eq!(health.status, HealthStatusLevel::Healthy);
        assert!(health.issues.is_empty());
    }

    #[tokio::test]
    async fn health_status_flags_internal_errors_as_unhealthy() {
        let metrics = ServerMetrics::new();
        metrics.increment_internal_errors();
        let health = metrics.health_status().await;
        assert_eq!(health.status, HealthStatusLevel::Unhealthy);
        assert_eq!(health.issues.len(), 1);
    }

    #[tokio::test]
    async fn response_time_tracker_records_tick_latency() {
        let metrics = Arc::new(ServerMetrics::new());
        let timer = OperationTimer::new("tick", metrics.clone());
        timer.finish().await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.performance.tick_latency.sample_count, 1);
    }
}
