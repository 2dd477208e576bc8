//! Deterministic tile-grid generation and `worldHash`. No example file
//! builds game geometry directly — the byte-for-byte tile rules here are
//! hashed with the same FNV-1a-32 primitive used for the enemy AI's seeded
//! choices ([`crate::rng`]).

use crate::rng::fnv1a_32_hex;

/// A cell is empty, a hard (indestructible) wall, or a destructible brick.
pub const TILE_EMPTY: u8 = 0;
pub const TILE_WALL: u8 = 1;
pub const TILE_BRICK: u8 = 2;

/// The static tile grid plus its deterministic hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    pub grid_w: u32,
    pub grid_h: u32,
    pub tiles: Vec<u8>,
    pub world_hash: String,
}

impl World {
    #[must_use]
    pub fn generate(grid_w: u32, grid_h: u32) -> Self {
        let tiles = build_world_tiles(grid_w, grid_h);
        let world_hash = fnv1a_32_hex(&tiles);
        Self { grid_w, grid_h, tiles, world_hash }
    }

    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.grid_w && (y as u32) < self.grid_h
    }

    #[must_use]
    pub fn tile_at(&self, x: i32, y: i32) -> Option<u8> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.tiles.get((y as u32 * self.grid_w + x as u32) as usize).copied()
    }

    #[must_use]
    pub fn is_empty(&self, x: i32, y: i32) -> bool {
        self.tile_at(x, y) == Some(TILE_EMPTY)
    }

    /// Destroys a brick, turning it into an empty cell. No-op for any other
    /// tile kind or out-of-bounds coordinate.
    pub fn clear_brick(&mut self, x: i32, y: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = (y as u32 * self.grid_w + x as u32) as usize;
        if let Some(tile) = self.tiles.get_mut(idx) {
            if *tile == TILE_BRICK {
                *tile = TILE_EMPTY;
            }
        }
    }

    /// The four deterministic corner spawn points, guaranteed safe by the
    /// 3x3 empty regions: top-left, top-right, bottom-left, bottom-right.
    #[must_use]
    pub fn corner_spawns(&self) -> [(i32, i32); 4] {
        let w = self.grid_w as i32;
        let h = self.grid_h as i32;
        [(1, 1), (w - 2, 1), (1, h - 2), (w - 2, h - 2)]
    }
}

/// Whether `(x, y)` lies in one of the four 3x3 corner-safe regions,
/// computed the same way regardless of grid size.
fn in_corner_safe_zone(x: u32, y: u32, w: u32, h: u32) -> bool {
    let left = x >= 1 && x <= 3;
    let right = w >= 5 && x >= w - 4 && x <= w - 2;
    let top = y >= 1 && y <= 3;
    let bottom = h >= 5 && y >= h - 4 && y <= h - 2;
    (left || right) && (top || bottom)
}

/// Builds the `gridW * gridH` tile array:
/// - outer border and `(x,y)` with `x%2==0 && y%2==0` are hard walls;
/// - a 3x3 corner region at each corner is always empty;
/// - remaining interior cells follow `(x+y)%3==0 => brick`.
#[must_use]
pub fn build_world_tiles(grid_w: u32, grid_h: u32) -> Vec<u8> {
    let mut tiles = vec![TILE_EMPTY; (grid_w * grid_h) as usize];
    for y in 0..grid_h {
        for x in 0..grid_w {
            let idx = (y * grid_w + x) as usize;
            let on_border = x == 0 || y == 0 || x == grid_w - 1 || y == grid_h - 1;
            let tile = if on_border {
                TILE_WALL
            } else if in_corner_safe_zone(x, y, grid_w, grid_h) {
                TILE_EMPTY
            } else if x % 2 == 0 && y % 2 == 0 {
                TILE_WALL
            } else if (x + y) % 3 == 0 {
                TILE_BRICK
            } else {
                TILE_EMPTY
            };
            tiles[idx] = tile;
        }
    }
    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_is_all_walls() {
        let world = World::generate(27, 14);
        for x in 0..world.grid_w {
            assert_eq!(world.tile_at(x as i32, 0), Some(TILE_WALL));
            assert_eq!(world.tile_at(x as i32, (world.grid_h - 1) as i32), Some(TILE_WALL));
        }
        for y in 0..world.grid_h {
            assert_eq!(world.tile_at(0, y as i32), Some(TILE_WALL));
            assert_eq!(world.tile_at((world.grid_w - 1) as i32, y as i32), Some(TILE_WALL));
        }
    }

    #[test]
    fn even_even_interior_cells_are_pillars_outside_corners() {
        let world = World::generate(27, 14);
        // (6,6) is interior, even/even, and outside every corner-safe zone.
        assert_eq!(world.tile_at(6, 6), Some(TILE_WALL));
    }

    #[test]
    fn corner_regions_are_empty() {
        let world = World::generate(27, 14);
        for x in 1..=3 {
            for y in 1..=3 {
                assert_eq!(world.tile_at(x, y), Some(TILE_EMPTY), "({x},{y})");
            }
        }
    }

    #[test]
    fn world_hash_is_deterministic() {
        let a = World::generate(27, 14);
        let b = World::generate(27, 14);
        assert_eq!(a.world_hash, b.world_hash);
        assert_eq!(a.world_hash.len(), 8);
    }

    #[test]
    fn corner_spawns_are_always_empty() {
        let world = World::generate(27, 14);
        for (x, y) in world.corner_spawns() {
            assert!(world.is_empty(x, y), "spawn ({x},{y}) should be empty");
        }
    }

    #[test]
    fn clear_brick_only_affects_bricks() {
        let mut world = World::generate(27, 14);
        let wall_pos = (6, 6);
        assert_eq!(world.tile_at(wall_pos.0, wall_pos.1), Some(TILE_WALL));
        world.clear_brick(wall_pos.0, wall_pos.1);
        assert_eq!(world.tile_at(wall_pos.0, wall_pos.1), Some(TILE_WALL));
    }
}
