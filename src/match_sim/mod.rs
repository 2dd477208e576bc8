//! Match Simulator (C4) and Match Manager (C5): deterministic tick-driven
//! Bomberman-style simulation.

mod manager;
mod state;
mod tick;
mod world;

pub use manager::{MatchHandle, MatchManager};
pub use state::{Bomb, BombRejectReason, EnemyState, MatchState, PlayerLifeState, PlayerState, QueuedInput};
pub use tick::{build_snapshot, run_tick};
pub use world::World;
