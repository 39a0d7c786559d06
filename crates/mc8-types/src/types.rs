/// Monotonically-allocated entity identifier. The world starts handing
/// these out at 100 (matches the source's `nextEID = 100`).
pub type EntityId = i32;

pub const FIRST_ENTITY_ID: EntityId = 100;

/// A block position in the world (x, y, z integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }
}

/// A chunk position (x, z), in chunk coordinates (block coordinate >> 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// A 3D position with double precision, as carried on the wire for
/// players and entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos::new((self.x.floor() as i32) >> 4, (self.z.floor() as i32) >> 4)
    }
}

/// Truncate-toward-zero scale-by-32 conversion used for wire-level absolute
/// and relative position fields (`int(d * 32.0)` in the source — Python's
/// `int()` truncates toward zero, same as Rust's `as i32` cast on an `f64`).
pub fn absolute_int(d: f64) -> i32 {
    (d * 32.0) as i32
}

/// A single inventory slot. `None` represents an empty slot (the source's
/// `itemId = -1, count = 0, uses = 0` sentinel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemStack {
    pub item_id: i32,
    pub count: i8,
    pub uses: i16,
}

impl ItemStack {
    pub fn new(item_id: i32, count: i8, uses: i16) -> Self {
        Self {
            item_id,
            count,
            uses,
        }
    }
}

/// Fixed-size player inventory: exactly 45 slots, no crafting grid, no
/// transactional semantics (see Non-goals).
pub const INVENTORY_SIZE: usize = 45;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_int_truncates_toward_zero() {
        assert_eq!(absolute_int(1.0), 32);
        assert_eq!(absolute_int(-1.0), -32);
        assert_eq!(absolute_int(0.03), 0);
        assert_eq!(absolute_int(-0.03), 0);
    }

    #[test]
    fn chunk_pos_from_block_uses_arithmetic_shift() {
        assert_eq!(BlockPos::new(-1, 0, -1).chunk_pos(), ChunkPos::new(-1, -1));
        assert_eq!(BlockPos::new(16, 0, 16).chunk_pos(), ChunkPos::new(1, 1));
    }
}
