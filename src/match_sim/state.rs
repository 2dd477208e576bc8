//! In-memory match state: players, bombs, enemies and the per-match input
//! queue. No example file owns a tick-driven simulation directly, so the
//! data-ownership shape here is modeled on `reconnection::ReconnectionManager`
//! (a struct owning lock-guarded maps with window/expiry arithmetic)
//! generalized to a single match's mutable state, owned by one per-match
//! actor.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::config::MatchConfig;
use crate::protocol::types::{Direction, InputPayload};
use crate::rng::seeded_choice;

use super::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerLifeState {
    Alive,
    DeadRespawning,
    Eliminated,
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub user_id: String,
    pub display_name: String,
    pub color_id: u8,
    pub skin_id: Option<String>,
    pub last_input_seq: u32,
    pub x: i32,
    pub y: i32,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub state: PlayerLifeState,
    pub intent_dir: Option<Direction>,
    pub is_moving: bool,
    pub move_from_x: i32,
    pub move_from_y: i32,
    pub move_to_x: i32,
    pub move_to_y: i32,
    pub move_start_tick: u32,
    pub move_duration_ticks: u32,
    pub move_start_server_time_ms: i64,
    pub respawn_at_tick: Option<u32>,
    pub invuln_until_tick: u32,
    pub last_enemy_hit_tick: u32,
    pub lives: u32,
    pub score: i64,
}

impl PlayerState {
    #[must_use]
    pub fn new(user_id: String, display_name: String, color_id: u8, spawn: (i32, i32), lives: u32) -> Self {
        Self {
            user_id,
            display_name,
            color_id,
            skin_id: None,
            last_input_seq: 0,
            x: spawn.0,
            y: spawn.1,
            spawn_x: spawn.0,
            spawn_y: spawn.1,
            state: PlayerLifeState::Alive,
            intent_dir: None,
            is_moving: false,
            move_from_x: spawn.0,
            move_from_y: spawn.1,
            move_to_x: spawn.0,
            move_to_y: spawn.1,
            move_start_tick: 0,
            move_duration_ticks: 0,
            move_start_server_time_ms: 0,
            respawn_at_tick: None,
            invuln_until_tick: 0,
            last_enemy_hit_tick: 0,
            lives,
            score: 0,
        }
    }

    #[must_use]
    pub fn is_eliminated(&self) -> bool {
        self.state == PlayerLifeState::Eliminated
    }
}

#[derive(Debug, Clone)]
pub struct Bomb {
    pub id: String,
    pub owner_user_id: String,
    pub x: i32,
    pub y: i32,
    pub tick_placed: u32,
    pub explode_at_tick: u32,
    pub range: u32,
}

#[derive(Debug, Clone)]
pub struct EnemyState {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub alive: bool,
    pub last_dir: Option<u8>,
    pub is_moving: bool,
    pub move_from_x: i32,
    pub move_from_y: i32,
    pub move_to_x: i32,
    pub move_to_y: i32,
    pub move_start_tick: u32,
    pub move_duration_ticks: u32,
    pub move_start_server_time_ms: i64,
}

impl EnemyState {
    #[must_use]
    pub fn new(id: String, x: i32, y: i32) -> Self {
        Self {
            id,
            x,
            y,
            alive: true,
            last_dir: None,
            is_moving: false,
            move_from_x: x,
            move_from_y: y,
            move_to_x: x,
            move_to_y: y,
            move_start_tick: 0,
            move_duration_ticks: 0,
            move_start_server_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuedInput {
    pub user_id: String,
    pub seq: u32,
    pub payload: InputPayload,
}

/// Reason a `tryPlaceBomb` call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BombRejectReason {
    PlayerMissing,
    PlayerEliminated,
    PlayerNotAlive,
    WrongCell,
    CellNotTraversable,
    TooManyBombs,
    CellOccupiedByBomb,
}

impl BombRejectReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlayerMissing => "player_missing",
            Self::PlayerEliminated => "player_eliminated",
            Self::PlayerNotAlive => "player_not_alive",
            Self::WrongCell => "wrong_cell",
            Self::CellNotTraversable => "cell_not_traversable",
            Self::TooManyBombs => "too_many_bombs",
            Self::CellOccupiedByBomb => "cell_occupied_by_bomb",
        }
    }
}

/// The full in-memory authoritative state of one match.
pub struct MatchState {
    pub match_id: String,
    pub room_code: String,
    pub tick: u32,
    pub world: World,
    pub players: HashMap<String, PlayerState>,
    /// Stable per-room slot order (user ids), preserved across restarts.
    pub slot_order: Vec<String>,
    pub disconnected_players: HashMap<String, DateTime<Utc>>,
    pub bombs: HashMap<String, Bomb>,
    pub enemies: HashMap<String, EnemyState>,
    pub input_queue: VecDeque<QueuedInput>,
    pub event_seq: u64,
    pub ended: bool,
    pub config: MatchConfig,
    next_bomb_id: u64,
}

impl MatchState {
    #[must_use]
    pub fn players_not_eliminated(&self) -> Vec<&PlayerState> {
        self.players.values().filter(|p| !p.is_eliminated()).collect()
    }

    /// Adds an input to the FIFO queue, dropping the oldest entry if the
    /// configured capacity (`inputQueue.length <= 500`) would be exceeded.
    pub fn enqueue_input(&mut self, input: QueuedInput) {
        if self.input_queue.len() >= self.config.input_queue_capacity {
            self.input_queue.pop_front();
        }
        self.input_queue.push_back(input);
    }

    /// `markPlayerDisconnected`: records the disconnection and purges the
    /// player's queued inputs.
    pub fn mark_player_disconnected(&mut self, user_id: &str) {
        self.disconnected_players.insert(user_id.to_string(), Utc::now());
        self.input_queue.retain(|i| i.user_id != user_id);
    }

    /// `isPlayerRejoinable`: true iff disconnected within the grace window.
    #[must_use]
    pub fn is_player_rejoinable(&self, user_id: &str, grace_secs: i64) -> bool {
        match self.disconnected_players.get(user_id) {
            Some(at) => (Utc::now() - *at).num_seconds() <= grace_secs,
            None => false,
        }
    }

    /// `markPlayerReconnected`: clears the disconnection marker without
    /// touching lives or position.
    pub fn mark_player_reconnected(&mut self, user_id: &str) {
        self.disconnected_players.remove(user_id);
    }

    /// Whether any disconnected player could still rejoin within the grace
    /// window. The gateway's stale-room sweep only finalizes a room once
    /// this is false ("idle > 90s with no active connections and no
    /// rejoinable players").
    #[must_use]
    pub fn has_rejoinable_players(&self, grace_secs: i64) -> bool {
        self.disconnected_players
            .keys()
            .any(|user_id| self.is_player_rejoinable(user_id, grace_secs))
    }

    /// The player's authoritative grid cell, used by the gateway to place
    /// bombs at the server-known position rather than a client-supplied one.
    #[must_use]
    pub fn player_position(&self, user_id: &str) -> Option<(i32, i32)> {
        self.players.get(user_id).map(|p| (p.x, p.y))
    }

    #[must_use]
    pub fn bombs_owned_by(&self, user_id: &str) -> usize {
        self.bombs.values().filter(|b| b.owner_user_id == user_id).count()
    }

    #[must_use]
    pub fn bomb_at(&self, x: i32, y: i32) -> Option<&Bomb> {
        self.bombs.values().find(|b| b.x == x && b.y == y)
    }

    fn next_bomb_id(&mut self) -> String {
        self.next_bomb_id += 1;
        format!("{}-bomb-{}", self.match_id, self.next_bomb_id)
    }

    /// `tryPlaceBomb`: validates and, on success, inserts a [`Bomb`].
    /// Returns the new bomb on success or the machine-readable reject
    /// reason on failure.
    pub fn try_place_bomb(&mut self, user_id: &str, x: i32, y: i32) -> Result<Bomb, BombRejectReason> {
        let Some(player) = self.players.get(user_id) else {
            return Err(BombRejectReason::PlayerMissing);
        };
        if player.is_eliminated() {
            return Err(BombRejectReason::PlayerEliminated);
        }
        if player.state != PlayerLifeState::Alive {
            return Err(BombRejectReason::PlayerNotAlive);
        }
        if player.x != x || player.y != y {
            return Err(BombRejectReason::WrongCell);
        }
        if !self.world.is_empty(x, y) {
            return Err(BombRejectReason::CellNotTraversable);
        }
        if self.bombs_owned_by(user_id) >= self.config.max_bombs_per_player as usize {
            return Err(BombRejectReason::TooManyBombs);
        }
        if self.bomb_at(x, y).is_some() {
            return Err(BombRejectReason::CellOccupiedByBomb);
        }

        let bomb = Bomb {
            id: self.next_bomb_id(),
            owner_user_id: user_id.to_string(),
            x,
            y,
            tick_placed: self.tick,
            explode_at_tick: self.tick + self.config.bomb_fuse_ticks,
            range: self.config.bomb_range,
        };
        self.bombs.insert(bomb.id.clone(), bomb.clone());
        Ok(bomb)
    }
}

/// Deterministically places `count` enemies on empty, non-player-spawn
/// cells. The candidate set and pick order are seeded from `matchId` alone,
/// so the same room rematching with the same world dimensions spawns
/// enemies at the same cells (determinism extends to initial state, not
/// just tick transitions).
fn spawn_enemies(world: &World, count: u32, match_id: &str, player_spawns: &[(i32, i32)]) -> HashMap<String, EnemyState> {
    let mut candidates: Vec<(i32, i32)> = Vec::new();
    for y in 0..world.grid_h as i32 {
        for x in 0..world.grid_w as i32 {
            if world.is_empty(x, y) && !player_spawns.contains(&(x, y)) {
                candidates.push((x, y));
            }
        }
    }

    let mut enemies = HashMap::new();
    for idx in 0..count {
        if candidates.is_empty() {
            break;
        }
        let id = format!("{match_id}-enemy-{idx}");
        let pick = seeded_choice(&[match_id, "enemy_spawn", &idx.to_string()], candidates.len());
        let (x, y) = candidates.remove(pick);
        enemies.insert(id.clone(), EnemyState::new(id, x, y));
    }
    enemies
}

/// Constructs the initial world + spawn assignment for a fresh match, shared
/// by both direct construction and [`super::manager::MatchManager`].
pub(super) fn new_match_state(
    match_id: String,
    room_code: String,
    slot_order: Vec<(String, String)>,
    config: MatchConfig,
) -> MatchState {
    let world = World::generate(config.world_width, config.world_height);
    let spawns = world.corner_spawns();

    let mut players = HashMap::new();
    let mut order = Vec::new();
    for (idx, (user_id, display_name)) in slot_order.into_iter().enumerate() {
        let spawn = spawns[idx % spawns.len()];
        let color_id = (idx % 4) as u8;
        players.insert(
            user_id.clone(),
            PlayerState::new(user_id.clone(), display_name, color_id, spawn, config.initial_lives),
        );
        order.push(user_id);
    }

    let enemies = spawn_enemies(&world, config.enemy_count, &match_id, &spawns);

    MatchState {
        match_id,
        room_code,
        tick: 0,
        world,
        players,
        slot_order: order,
        disconnected_players: HashMap::new(),
        bombs: HashMap::new(),
        enemies,
        input_queue: VecDeque::new(),
        event_seq: 0,
        ended: false,
        config,
        next_bomb_id: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MatchConfig {
        MatchConfig::default()
    }

    fn single_player_match() -> MatchState {
        new_match_state(
            "m1".into(),
            "ROOM01".into(),
            vec![("u1".into(), "Alice".into())],
            config(),
        )
    }

    #[test]
    fn bomb_place_succeeds_on_own_cell() {
        let mut m = single_player_match();
        let (x, y) = (m.players["u1"].x, m.players["u1"].y);
        let bomb = m.try_place_bomb("u1", x, y).unwrap();
        assert_eq!(bomb.owner_user_id, "u1");
        assert_eq!(bomb.explode_at_tick, m.config.bomb_fuse_ticks);
    }

    #[test]
    fn bomb_place_rejects_wrong_cell() {
        let mut m = single_player_match();
        let (x, y) = (m.players["u1"].x, m.players["u1"].y);
        let err = m.try_place_bomb("u1", x + 1, y).unwrap_err();
        assert_eq!(err, BombRejectReason::WrongCell);
    }

    #[test]
    fn bomb_place_enforces_max_bombs_per_player() {
        let mut m = single_player_match();
        m.config.max_bombs_per_player = 1;
        let (x, y) = (m.players["u1"].x, m.players["u1"].y);
        m.try_place_bomb("u1", x, y).unwrap();
        let err = m.try_place_bomb("u1", x, y).unwrap_err();
        assert!(matches!(err, BombRejectReason::CellOccupiedByBomb | BombRejectReason::TooManyBombs));
    }

    #[test]
    fn disconnect_then_rejoin_clears_marker() {
        let mut m = single_player_match();
        m.mark_player_disconnected("u1");
        assert!(m.is_player_rejoinable("u1", 60));
        m.mark_player_reconnected("u1");
        assert!(!m.is_player_rejoinable("u1", 60));
    }

    #[test]
    fn has_rejoinable_players_tracks_disconnect_state() {
        let mut m = single_player_match();
        assert!(!m.has_rejoinable_players(60));
        m.mark_player_disconnected("u1");
        assert!(m.has_rejoinable_players(60));
        m.disconnected_players.insert("u1".into(), Utc::now() - chrono::Duration::seconds(61));
        assert!(!m.has_rejoinable_players(60));
    }

    #[test]
    fn enqueue_input_drops_oldest_beyond_capacity() {
        let mut m = single_player_match();
        m.config.input_queue_capacity = 2;
        for seq in 0..5 {
            m.enqueue_input(QueuedInput {
                user_id: "u1".into(),
                seq,
                payload: InputPayload::Move { dir: None },
            });
        }
        assert_eq!(m.input_queue.len(), 2);
        assert_eq!(m.input_queue.front().unwrap().seq, 3);
    }

    #[test]
    fn fresh_match_spawns_configured_enemy_count() {
        let m = single_player_match();
        assert_eq!(m.enemies.len(), m.config.enemy_count as usize);
        assert!(m.enemies.values().all(|e| e.alive));
    }

    #[test]
    fn enemies_never_spawn_on_a_player_spawn_cell() {
        let m = single_player_match();
        let player_spawns: Vec<(i32, i32)> = m.players.values().map(|p| (p.spawn_x, p.spawn_y)).collect();
        for enemy in m.enemies.values() {
            assert!(!player_spawns.contains(&(enemy.x, enemy.y)));
        }
    }

    #[test]
    fn enemy_spawn_placement_is_deterministic() {
        let a = single_player_match();
        let b = single_player_match();
        let mut a_cells: Vec<(i32, i32)> = a.enemies.values().map(|e| (e.x, e.y)).collect();
        let mut b_cells: Vec<(i32, i32)> = b.enemies.values().map(|e| (e.x, e.y)).collect();
        a_cells.sort_unstable();
        b_cells.sort_unstable();
        assert_eq!(a_cells, b_cells);
    }
}
