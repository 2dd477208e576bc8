//! The fixed-rate tick loop, resolved in this order: prune disconnects →
//! respawns → input drain → movement → enemy AI → enemy contact → bomb
//! explosions → end check → snapshot.
//!
//! Modeled on `coordination::room_coordinator`'s lock-then-mutate-then-
//! broadcast discipline (acquire exclusive access, mutate, emit events,
//! release), generalized here to the per-tick resolution order; the caller
//! (`manager::MatchManager`) owns the `tokio::time::interval` loop in
//! `auth::middleware`'s/`rate_limit`'s periodic-spawn idiom.

use std::collections::HashSet;

use crate::protocol::types::{BombView, Direction, EnemyView, MatchSnapshot, PlayerView, SnapshotWorld};
use crate::protocol::ServerMessage;
use crate::rng::seeded_choice;

use super::state::{Bomb, MatchState, PlayerLifeState};

const DIR_VECTORS: [(Direction, i32, i32); 4] = [
    (Direction::Up, 0, -1),
    (Direction::Down, 0, 1),
    (Direction::Left, -1, 0),
    (Direction::Right, 1, 0),
];

fn opposite(dir: Direction) -> Direction {
    match dir {
        Direction::Up => Direction::Down,
        Direction::Down => Direction::Up,
        Direction::Left => Direction::Right,
        Direction::Right => Direction::Left,
    }
}

fn dir_index(dir: Direction) -> u8 {
    match dir {
        Direction::Up => 0,
        Direction::Down => 1,
        Direction::Left => 2,
        Direction::Right => 3,
    }
}

fn dir_from_index(idx: u8) -> Direction {
    match idx {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}

fn vector_for(dir: Direction) -> (i32, i32) {
    DIR_VECTORS.iter().find(|(d, _, _)| *d == dir).map(|(_, dx, dy)| (*dx, *dy)).unwrap_or((0, 0))
}

/// Runs a single tick and returns every event to broadcast, in emission
/// order. `rejoin_grace_secs` comes from the gateway's `GatewayConfig`;
/// `now_ms` stamps presentation fields.
pub fn run_tick(state: &mut MatchState, rejoin_grace_secs: i64, now_ms: i64) -> Vec<ServerMessage> {
    let mut events = Vec::new();
    let tick = state.tick;

    prune_disconnected_past_grace(state, rejoin_grace_secs);
    advance_respawns(state, tick, &mut events);
    drain_input_queue(state);
    advance_player_movement(state, tick, now_ms);
    step_enemy_ai(state, tick, now_ms);
    resolve_enemy_contact(state, tick, &mut events);
    resolve_bomb_explosions(state, tick, &mut events);
    check_match_end(state, &mut events);
    events.push(build_snapshot(state, now_ms));

    state.tick = state.tick.wrapping_add(1);
    events
}

fn prune_disconnected_past_grace(state: &mut MatchState, grace_secs: i64) {
    let expired: Vec<String> = state
        .disconnected_players
        .iter()
        .filter(|(_, at)| (chrono::Utc::now() - **at).num_seconds() > grace_secs)
        .map(|(id, _)| id.clone())
        .collect();

    for user_id in expired {
        if let Some(player) = state.players.get_mut(&user_id) {
            player.state = PlayerLifeState::Eliminated;
            player.lives = 0;
            player.is_moving = false;
            player.intent_dir = None;
        }
        state.disconnected_players.remove(&user_id);
    }
}

fn advance_respawns(state: &mut MatchState, tick: u32, events: &mut Vec<ServerMessage>) {
    for player in state.players.values_mut() {
        if player.state != PlayerLifeState::DeadRespawning {
            continue;
        }
        let Some(respawn_at) = player.respawn_at_tick else { continue };
        if respawn_at > tick {
            continue;
        }
        player.state = PlayerLifeState::Alive;
        player.x = player.spawn_x;
        player.y = player.spawn_y;
        player.is_moving = false;
        player.intent_dir = None;
        player.respawn_at_tick = None;
        player.invuln_until_tick = tick + state.config.invuln_ticks;
        player.last_enemy_hit_tick = 0;
        events.push(ServerMessage::MatchPlayerRespawned {
            user_id: player.user_id.clone(),
            x: player.x,
            y: player.y,
        });
    }
}

fn drain_input_queue(state: &mut MatchState) {
    let inputs: Vec<_> = state.input_queue.drain(..).collect();
    for input in inputs {
        let Some(player) = state.players.get_mut(&input.user_id) else { continue };
        if player.is_eliminated() || player.state == PlayerLifeState::DeadRespawning {
            continue;
        }
        if input.seq <= player.last_input_seq {
            continue;
        }
        match input.payload {
            crate::protocol::types::InputPayload::Move { dir } => {
                player.intent_dir = dir;
            }
        }
        player.last_input_seq = input.seq;
    }
}

fn advance_player_movement(state: &mut MatchState, tick: u32, now_ms: i64) {
    let mut occupied: HashSet<(i32, i32)> = state
        .players
        .values()
        .filter(|p| !p.is_eliminated())
        .map(|p| (p.x, p.y))
        .collect();

    // Finish animations already in flight.
    for player in state.players.values_mut() {
        if player.is_moving && tick.saturating_sub(player.move_start_tick) >= player.move_duration_ticks {
            player.is_moving = false;
            player.move_from_x = player.move_to_x;
            player.move_from_y = player.move_to_y;
        }
    }

    // Attempt a new one-cell step for players currently idle with an intent.
    for user_id in state.slot_order.clone() {
        let Some(player) = state.players.get(&user_id) else { continue };
        if player.is_eliminated() || player.state == PlayerLifeState::DeadRespawning {
            continue;
        }
        if player.is_moving {
            continue;
        }
        let Some(dir) = player.intent_dir else { continue };
        let (dx, dy) = vector_for(dir);
        let (tx, ty) = (player.x + dx, player.y + dy);

        if !state.world.is_empty(tx, ty) || occupied.contains(&(tx, ty)) {
            continue;
        }

        occupied.remove(&(player.x, player.y));
        occupied.insert((tx, ty));

        let player = state.players.get_mut(&user_id).expect("checked above");
        player.move_from_x = player.x;
        player.move_from_y = player.y;
        player.move_to_x = tx;
        player.move_to_y = ty;
        player.x = tx;
        player.y = ty;
        player.move_start_tick = tick;
        player.move_duration_ticks = state.config.move_duration_ticks;
        player.move_start_server_time_ms = now_ms;
        player.is_moving = true;
    }
}

fn step_enemy_ai(state: &mut MatchState, tick: u32, now_ms: i64) {
    let interval = state.config.enemy_move_interval_ticks;
    if interval == 0 || tick % interval != 0 {
        return;
    }
    let match_id = state.match_id.clone();
    let enemy_ids: Vec<String> = state.enemies.keys().cloned().collect();

    for enemy_id in enemy_ids {
        let (x, y, alive, is_moving, last_dir) = {
            let e = &state.enemies[&enemy_id];
            (e.x, e.y, e.alive, e.is_moving, e.last_dir)
        };
        if !alive || is_moving {
            continue;
        }

        let occupied_by_other_enemies: HashSet<(i32, i32)> = state
            .enemies
            .values()
            .filter(|e| e.id != enemy_id && e.alive)
            .map(|e| (e.x, e.y))
            .collect();

        let candidates: Vec<Direction> = DIR_VECTORS
            .iter()
            .filter_map(|(dir, dx, dy)| {
                let (tx, ty) = (x + dx, y + dy);
                if state.world.is_empty(tx, ty) && !occupied_by_other_enemies.contains(&(tx, ty)) {
                    Some(*dir)
                } else {
                    None
                }
            })
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let chosen = if let Some(last) = last_dir {
            let last_dir_enum = dir_from_index(last);
            if candidates.contains(&last_dir_enum) {
                Some(last_dir_enum)
            } else {
                None
            }
        } else {
            None
        };

        let chosen = chosen.or_else(|| {
            let backtrack = last_dir.map(|d| opposite(dir_from_index(d)));
            let non_backtrack: Vec<Direction> = candidates
                .iter()
                .copied()
                .filter(|d| Some(*d) != backtrack)
                .collect();
            let pool = if non_backtrack.is_empty() { &candidates } else { &non_backtrack };
            let tick_str = tick.to_string();
            let idx = seeded_choice(&[match_id.as_str(), tick_str.as_str(), enemy_id.as_str()], pool.len());
            pool.get(idx).copied()
        });

        let Some(dir) = chosen else { continue };
        let (dx, dy) = vector_for(dir);
        let (tx, ty) = (x + dx, y + dy);

        let enemy = state.enemies.get_mut(&enemy_id).expect("enemy exists");
        enemy.move_from_x = enemy.x;
        enemy.move_from_y = enemy.y;
        enemy.move_to_x = tx;
        enemy.move_to_y = ty;
        enemy.x = tx;
        enemy.y = ty;
        enemy.last_dir = Some(dir_index(dir));
        enemy.move_start_tick = tick;
        enemy.move_duration_ticks = state.config.move_duration_ticks;
        enemy.move_start_server_time_ms = now_ms;
        enemy.is_moving = true;
    }
}

fn resolve_enemy_contact(state: &mut MatchState, tick: u32, events: &mut Vec<ServerMessage>) {
    let enemy_positions: Vec<(i32, i32)> =
        state.enemies.values().filter(|e| e.alive).map(|e| (e.x, e.y)).collect();

    let hit_users: Vec<String> = state
        .players
        .values()
        .filter(|p| {
            p.state == PlayerLifeState::Alive
                && p.invuln_until_tick <= tick
                && tick.saturating_sub(p.last_enemy_hit_tick) >= state.config.enemy_contact_cooldown_ticks
                && enemy_positions.contains(&(p.x, p.y))
        })
        .map(|p| p.user_id.clone())
        .collect();

    for user_id in hit_users {
        if let Some(player) = state.players.get_mut(&user_id) {
            player.last_enemy_hit_tick = tick;
        }
        apply_damage(state, &user_id, tick, events);
    }
}

fn apply_damage(state: &mut MatchState, user_id: &str, tick: u32, events: &mut Vec<ServerMessage>) {
    let Some(player) = state.players.get_mut(user_id) else { return };
    player.lives = player.lives.saturating_sub(1);
    let lives = player.lives;
    events.push(ServerMessage::MatchPlayerDamaged { user_id: user_id.to_string(), lives });

    if lives == 0 {
        player.state = PlayerLifeState::Eliminated;
        player.is_moving = false;
        events.push(ServerMessage::MatchPlayerEliminated { user_id: user_id.to_string() });
    } else {
        player.state = PlayerLifeState::DeadRespawning;
        player.respawn_at_tick = Some(tick + state.config.respawn_delay_ticks);
        player.is_moving = false;
    }
}

fn resolve_bomb_explosions(state: &mut MatchState, tick: u32, events: &mut Vec<ServerMessage>) {
    let mut already_damaged: HashSet<String> = HashSet::new();

    loop {
        let due_id = state
            .bombs
            .values()
            .filter(|b| b.explode_at_tick <= tick)
            .min_by_key(|b| (b.explode_at_tick, b.id.clone()))
            .map(|b| b.id.clone());

        let Some(id) = due_id else { break };
        let bomb: Bomb = state.bombs.remove(&id).expect("bomb exists");

        let blast_cells = compute_blast_cells(state, &bomb);
        let mut destroyed_tiles = Vec::new();
        for &(x, y) in &blast_cells {
            if state.world.tile_at(x, y) == Some(super::world::TILE_BRICK) {
                state.world.clear_brick(x, y);
                destroyed_tiles.push((x, y));
            }
        }

        let hit_users: Vec<String> = state
            .players
            .values()
            .filter(|p| {
                p.state == PlayerLifeState::Alive
                    && p.invuln_until_tick <= tick
                    && !already_damaged.contains(&p.user_id)
                    && blast_cells.contains(&(p.x, p.y))
            })
            .map(|p| p.user_id.clone())
            .collect();

        for user_id in &hit_users {
            already_damaged.insert(user_id.clone());
        }

        let killed_enemies: Vec<String> = state
            .enemies
            .values()
            .filter(|e| e.alive && blast_cells.contains(&(e.x, e.y)))
            .map(|e| e.id.clone())
            .collect();
        for enemy_id in &killed_enemies {
            if let Some(enemy) = state.enemies.get_mut(enemy_id) {
                enemy.alive = false;
            }
        }

        events.push(ServerMessage::MatchBombExploded { id: bomb.id.clone(), cells: blast_cells });
        if !destroyed_tiles.is_empty() {
            events.push(ServerMessage::MatchTilesDestroyed { cells: destroyed_tiles });
        }
        for user_id in hit_users {
            apply_damage(state, &user_id, tick, events);
        }
    }
}

/// Computes the axis-aligned blast footprint for a bomb: origin plus up to
/// `range` cells in each direction, stopping at (and including) the first
/// brick, or stopping before a hard wall.
fn compute_blast_cells(state: &MatchState, bomb: &Bomb) -> Vec<(i32, i32)> {
    let mut cells = vec![(bomb.x, bomb.y)];
    for (_, dx, dy) in DIR_VECTORS {
        for step in 1..=bomb.range as i32 {
            let (x, y) = (bomb.x + dx * step, bomb.y + dy * step);
            match state.world.tile_at(x, y) {
                Some(super::world::TILE_WALL) | None => break,
                Some(super::world::TILE_BRICK) => {
                    cells.push((x, y));
                    break;
                }
                _ => cells.push((x, y)),
            }
        }
    }
    cells
}

fn check_match_end(state: &mut MatchState, events: &mut Vec<ServerMessage>) {
    if state.ended {
        return;
    }
    let remaining: Vec<&String> = state
        .players
        .values()
        .filter(|p| !p.is_eliminated())
        .map(|p| &p.user_id)
        .collect();

    if remaining.len() <= 1 {
        state.ended = true;
        let (winner, reason) = if remaining.len() == 1 {
            (Some(remaining[0].clone()), "elimination")
        } else {
            (None, "draw")
        };
        events.push(ServerMessage::MatchEnd { winner_user_id: winner, reason: reason.to_string() });
    }
}

/// Builds the `match:snapshot` event for the current state, independent of
/// tick advancement. Used both by `run_tick`'s final step and by the
/// gateway's rejoin resync bundle.
pub fn build_snapshot(state: &MatchState, now_ms: i64) -> ServerMessage {
    let bombs: Vec<BombView> = state
        .bombs
        .values()
        .map(|b| BombView {
            id: b.id.clone(),
            x: b.x,
            y: b.y,
            owner_id: b.owner_user_id.clone(),
            tick_placed: b.tick_placed,
            explode_at_tick: b.explode_at_tick,
        })
        .collect();

    let players: Vec<PlayerView> = state
        .slot_order
        .iter()
        .filter_map(|id| state.players.get(id))
        .map(|p| PlayerView {
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            color_id: p.color_id,
            skin_id: p.skin_id.clone(),
            last_input_seq: p.last_input_seq,
            x: p.x,
            y: p.y,
            is_moving: p.is_moving,
            move_from_x: p.move_from_x,
            move_from_y: p.move_from_y,
            move_to_x: p.move_to_x,
            move_to_y: p.move_to_y,
            move_start_tick: p.move_start_tick,
            move_duration_ticks: if p.is_moving { p.move_duration_ticks } else { 0 },
            move_start_server_time_ms: p.move_start_server_time_ms,
            move_duration_ms: if p.is_moving {
                p.move_duration_ticks * state.config.tick_period_ms as u32
            } else {
                0
            },
            lives: p.lives,
            score: p.score,
            eliminated: p.is_eliminated(),
            disconnected: state.disconnected_players.contains_key(&p.user_id),
        })
        .collect();

    let enemies: Vec<EnemyView> = state
        .enemies
        .values()
        .map(|e| EnemyView {
            id: e.id.clone(),
            x: e.x,
            y: e.y,
            alive: e.alive,
            is_moving: e.is_moving,
            move_from_x: e.move_from_x,
            move_from_y: e.move_from_y,
            move_to_x: e.move_to_x,
            move_to_y: e.move_to_y,
            move_start_tick: e.move_start_tick,
            move_duration_ticks: e.move_duration_ticks,
            move_start_server_time_ms: e.move_start_server_time_ms,
        })
        .collect();

    let score: i64 = players.iter().map(|p| p.score.max(0)).sum();

    ServerMessage::MatchSnapshot {
        snapshot: MatchSnapshot {
            version: "match_v1".to_string(),
            room_code: state.room_code.clone(),
            match_id: state.match_id.clone(),
            tick: state.tick,
            server_time: now_ms,
            server_time_ms: now_ms,
            world: SnapshotWorld {
                grid_w: state.world.grid_w,
                grid_h: state.world.grid_h,
                world_hash: state.world.world_hash.clone(),
                bombs,
            },
            score,
            players,
            enemies,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::match_sim::state::{new_match_state, QueuedInput};
    use crate::protocol::types::InputPayload;

    fn two_player_match() -> MatchState {
        new_match_state(
            "m1".into(),
            "ROOM01".into(),
            vec![("u1".into(), "Alice".into()), ("u2".into(), "Bob".into())],
            MatchConfig::default(),
        )
    }

    #[test]
    fn move_into_wall_does_not_move_player() {
        let mut m = two_player_match();
        let (sx, sy) = (m.players["u1"].x, m.players["u1"].y);
        m.enqueue_input(QueuedInput { user_id: "u1".into(), seq: 1, payload: InputPayload::Move { dir: Some(Direction::Up) } });
        run_tick(&mut m, 60, 0);
        // (1,1) spawn moving up hits the border wall at y=0; position unchanged.
        assert_eq!((m.players["u1"].x, m.players["u1"].y), (sx, sy));
    }

    #[test]
    fn move_right_into_empty_cell_commits_immediately() {
        let mut m = two_player_match();
        m.enqueue_input(QueuedInput { user_id: "u1".into(), seq: 1, payload: InputPayload::Move { dir: Some(Direction::Right) } });
        run_tick(&mut m, 60, 0);
        assert_eq!(m.players["u1"].x, 2);
        assert!(m.players["u1"].is_moving);
    }

    #[test]
    fn bomb_explodes_after_fuse_ticks() {
        let mut m = two_player_match();
        m.config.bomb_fuse_ticks = 2;
        let (x, y) = (m.players["u1"].x, m.players["u1"].y);
        m.try_place_bomb("u1", x, y).unwrap();
        run_tick(&mut m, 60, 0);
        let events = run_tick(&mut m, 60, 0);
        assert!(events.iter().any(|e| matches!(e, ServerMessage::MatchBombExploded { .. })));
    }

    #[test]
    fn damage_at_zero_lives_eliminates_player() {
        let mut m = two_player_match();
        m.config.initial_lives = 1;
        m.players.get_mut("u1").unwrap().lives = 1;
        let mut events = Vec::new();
        apply_damage(&mut m, "u1", 0, &mut events);
        assert!(events.iter().any(|e| matches!(e, ServerMessage::MatchPlayerEliminated { .. })));
        assert!(m.players["u1"].is_eliminated());
    }

    #[test]
    fn match_ends_when_one_player_remains() {
        let mut m = two_player_match();
        m.players.get_mut("u2").unwrap().state = PlayerLifeState::Eliminated;
        m.players.get_mut("u2").unwrap().lives = 0;
        let events = run_tick(&mut m, 60, 0);
        assert!(events.iter().any(|e| matches!(e, ServerMessage::MatchEnd { winner_user_id: Some(w), .. } if w == "u1")));
        assert!(m.ended);
    }

    #[test]
    fn disconnect_past_grace_eliminates_player() {
        let mut m = two_player_match();
        m.mark_player_disconnected("u2");
        // Backdate the disconnection past the grace window.
        m.disconnected_players.insert("u2".into(), chrono::Utc::now() - chrono::Duration::seconds(61));
        run_tick(&mut m, 60, 0);
        assert!(m.players["u2"].is_eliminated());
    }
}
