use mc8_protocol::ServerPacket;
use mc8_types::EntityId;
use std::collections::HashSet;

pub const BLOCKS_LEN: usize = 32768;
pub const NIBBLE_ARRAY_LEN: usize = 16384;

/// A single 16×128×16 block column. Chunks are read-only once loaded —
/// there is no block-write path (see Non-goals); `PlayerDigging` is
/// decoded but never mutates a chunk's arrays.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub cx: i32,
    pub cz: i32,
    pub blocks: Box<[u8; BLOCKS_LEN]>,
    pub block_meta: Box<[u8; NIBBLE_ARRAY_LEN]>,
    pub block_light: Box<[u8; NIBBLE_ARRAY_LEN]>,
    pub sky_light: Box<[u8; NIBBLE_ARRAY_LEN]>,
    pub terrain_populated: bool,
    /// A persistent chunk is never unloaded from a client once loaded.
    pub persistent: bool,
    pub occupants: HashSet<EntityId>,
}

impl Chunk {
    pub fn new(
        cx: i32,
        cz: i32,
        blocks: Box<[u8; BLOCKS_LEN]>,
        block_meta: Box<[u8; NIBBLE_ARRAY_LEN]>,
        block_light: Box<[u8; NIBBLE_ARRAY_LEN]>,
        sky_light: Box<[u8; NIBBLE_ARRAY_LEN]>,
        terrain_populated: bool,
    ) -> Self {
        Self {
            cx,
            cz,
            blocks,
            block_meta,
            block_light,
            sky_light,
            terrain_populated,
            persistent: false,
            occupants: HashSet::new(),
        }
    }

    /// Block index for a position given in chunk-relative-mod block
    /// coordinates: `y + relZ*128 + relX*128*16`, `relX = x & 15`, `relZ = z & 15`.
    pub fn block_index(x: i32, y: i32, z: i32) -> usize {
        let rel_x = (x & 15) as usize;
        let rel_z = (z & 15) as usize;
        y as usize + rel_z * 128 + rel_x * 128 * 16
    }

    pub fn block_at(&self, x: i32, y: i32, z: i32) -> u8 {
        self.blocks[Self::block_index(x, y, z)]
    }

    /// Read a nibble (4 bits) out of a packed array: low nibble = lower
    /// index, high nibble = higher index, two blocks per byte.
    fn nibble(array: &[u8], index: usize) -> u8 {
        let byte = array[index / 2];
        if index % 2 == 0 {
            byte & 0x0F
        } else {
            (byte >> 4) & 0x0F
        }
    }

    pub fn block_meta_at(&self, x: i32, y: i32, z: i32) -> u8 {
        Self::nibble(&*self.block_meta, Self::block_index(x, y, z))
    }

    pub fn block_light_at(&self, x: i32, y: i32, z: i32) -> u8 {
        Self::nibble(&*self.block_light, Self::block_index(x, y, z))
    }

    pub fn sky_light_at(&self, x: i32, y: i32, z: i32) -> u8 {
        Self::nibble(&*self.sky_light, Self::block_index(x, y, z))
    }

    /// Build the `MapChunk` packet for sending this entire chunk to a
    /// client: concatenate the four arrays (81920 bytes) and zlib-compress.
    pub fn to_map_chunk_packet(&self) -> ServerPacket {
        use std::io::Write;

        let mut raw = Vec::with_capacity(BLOCKS_LEN + NIBBLE_ARRAY_LEN * 3);
        raw.extend_from_slice(&*self.blocks);
        raw.extend_from_slice(&*self.block_meta);
        raw.extend_from_slice(&*self.block_light);
        raw.extend_from_slice(&*self.sky_light);

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw).expect("writing to an in-memory buffer cannot fail");
        let compressed = encoder.finish().expect("zlib finish on an in-memory buffer cannot fail");

        ServerPacket::MapChunk {
            block_x: self.cx * 16,
            block_y: 0,
            block_z: self.cz * 16,
            size_x: 15,
            size_y: 127,
            size_z: 15,
            compressed,
        }
    }

    pub fn pre_chunk_packet(&self, load: bool) -> ServerPacket {
        ServerPacket::PreChunk { cx: self.cx, cz: self.cz, load }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_chunk() -> Chunk {
        Chunk::new(
            0,
            0,
            Box::new([0u8; BLOCKS_LEN]),
            Box::new([0u8; NIBBLE_ARRAY_LEN]),
            Box::new([0u8; NIBBLE_ARRAY_LEN]),
            Box::new([0u8; NIBBLE_ARRAY_LEN]),
            true,
        )
    }

    #[test]
    fn block_index_matches_formula() {
        assert_eq!(Chunk::block_index(0, 0, 0), 0);
        assert_eq!(Chunk::block_index(0, 1, 0), 1);
        assert_eq!(Chunk::block_index(0, 0, 1), 128);
        assert_eq!(Chunk::block_index(1, 0, 0), 128 * 16);
        // masking wraps world coordinates into chunk-relative space
        assert_eq!(Chunk::block_index(16, 0, 0), 0);
    }

    #[test]
    fn nibble_packing_low_then_high() {
        let mut chunk = empty_chunk();
        chunk.block_meta[0] = 0xAB; // index 0 -> low nibble 0xB, index 1 -> high nibble 0xA
        assert_eq!(Chunk::nibble(&*chunk.block_meta, 0), 0xB);
        assert_eq!(Chunk::nibble(&*chunk.block_meta, 1), 0xA);
    }

    #[test]
    fn map_chunk_packet_has_full_chunk_dimensions() {
        let chunk = empty_chunk();
        match chunk.to_map_chunk_packet() {
            ServerPacket::MapChunk { size_x, size_y, size_z, .. } => {
                assert_eq!((size_x, size_y, size_z), (15, 127, 15));
            }
            _ => panic!("expected MapChunk"),
        }
    }

    #[test]
    fn persistent_flag_defaults_false() {
        assert!(!empty_chunk().persistent);
    }
}
