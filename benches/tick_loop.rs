use std::hint::black_box;

use bomber_arena_server::config::MatchConfig;
use bomber_arena_server::match_sim::{run_tick, MatchManager, QueuedInput};
use bomber_arena_server::protocol::{Direction, InputPayload};
use criterion::{criterion_group, criterion_main, Criterion};

fn slots(n: usize) -> Vec<(String, String)> {
    (0..n).map(|i| (format!("u{i}"), format!("Player {i}"))).collect()
}

fn bench_tick_idle(c: &mut Criterion) {
    let manager = MatchManager::new();
    let (_id, handle) = manager.create_match("ROOM01", slots(4), MatchConfig::default());

    c.bench_function("tick_idle_4_players", |b| {
        b.iter(|| {
            let mut state = handle.try_lock().unwrap();
            let events = run_tick(&mut state, 60, black_box(0));
            black_box(events);
        });
    });
}

fn bench_tick_with_input_drain(c: &mut Criterion) {
    let manager = MatchManager::new();
    let (_id, handle) = manager.create_match("ROOM02", slots(4), MatchConfig::default());

    c.bench_function("tick_with_queued_moves", |b| {
        b.iter(|| {
            let mut state = handle.try_lock().unwrap();
            for (i, user_id) in ["u0", "u1", "u2", "u3"].iter().enumerate() {
                state.enqueue_input(QueuedInput {
                    user_id: (*user_id).to_string(),
                    seq: state.tick + 1,
                    payload: InputPayload::Move { dir: Some(dir_for(i)) },
                });
            }
            let events = run_tick(&mut state, 60, black_box(0));
            black_box(events);
        });
    });
}

fn dir_for(i: usize) -> Direction {
    match i % 4 {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}

fn bench_tick_with_bombs(c: &mut Criterion) {
    let manager = MatchManager::new();
    let (_id, handle) = manager.create_match("ROOM03", slots(4), MatchConfig::default());
    {
        let mut state = handle.try_lock().unwrap();
        let positions: Vec<(String, i32, i32)> = state
            .players
            .values()
            .map(|p| (p.user_id.clone(), p.x, p.y))
            .collect();
        for (user_id, x, y) in positions {
            let _ = state.try_place_bomb(&user_id, x, y);
        }
    }

    c.bench_function("tick_with_live_bombs", |b| {
        b.iter(|| {
            let mut state = handle.try_lock().unwrap();
            let events = run_tick(&mut state, 60, black_box(0));
            black_box(events);
        });
    });
}

criterion_group!(tick_loop, bench_tick_idle, bench_tick_with_input_drain, bench_tick_with_bombs);
criterion_main!(tick_loop);
