use crate::chunk::{Chunk, BLOCKS_LEN, NIBBLE_ARRAY_LEN};
use mc8_nbt::NbtValue;
use mc8_types::base36;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldLoadError {
    #[error("world directory is missing")]
    WorldMissing,
    #[error("failed to read level.dat: {0}")]
    LevelDat(std::io::Error),
    #[error("level.dat is malformed: {0}")]
    LevelDatNbt(#[from] mc8_nbt::reader::NbtReadError),
}

/// Chunk coordinates keyed by their signed base-36 string form — the same
/// representation used on disk, carried into memory as the map key
/// (`spec.md` §4.2: "the key in the chunk map is the signed base-36
/// string of the full coordinate", not the masked directory-path form).
pub type ChunkKey = (String, String);

pub fn chunk_key(cx: i32, cz: i32) -> ChunkKey {
    (base36::encode(cx as i64), base36::encode(cz as i64))
}

#[derive(Debug)]
pub struct LoadedWorld {
    pub seed: i64,
    pub spawn: (i32, i32, i32),
    pub chunks: HashMap<ChunkKey, Chunk>,
}

impl LoadedWorld {
    pub fn get_chunk(&self, cx: i32, cz: i32) -> Option<&Chunk> {
        self.chunks.get(&chunk_key(cx, cz))
    }

    pub fn get_chunk_mut(&mut self, cx: i32, cz: i32) -> Option<&mut Chunk> {
        self.chunks.get_mut(&chunk_key(cx, cz))
    }
}

/// Load a world directory: `level.dat` for seed/spawn, then every chunk
/// file found two directories deep. Malformed chunk files are logged and
/// skipped, never fatal — only a missing root directory aborts the load.
pub fn load_world(root: &Path) -> Result<LoadedWorld, WorldLoadError> {
    if !root.is_dir() {
        return Err(WorldLoadError::WorldMissing);
    }

    let level_dat_path = root.join("level.dat");
    let level_dat_bytes = fs::read(&level_dat_path).map_err(WorldLoadError::LevelDat)?;
    let level_dat = mc8_nbt::reader::read_gzip_file(&level_dat_bytes)?;

    let data = level_dat.get("Data");
    let seed = data
        .and_then(|d| d.get("RandomSeed"))
        .and_then(long_value)
        .unwrap_or(0);
    let spawn_x = data.and_then(|d| d.get("SpawnX")).and_then(NbtValue::as_int).unwrap_or(0);
    let spawn_y = data.and_then(|d| d.get("SpawnY")).and_then(NbtValue::as_int).unwrap_or(64);
    let spawn_z = data.and_then(|d| d.get("SpawnZ")).and_then(NbtValue::as_int).unwrap_or(0);

    let mut chunks = HashMap::new();
    walk_regions(root, &mut chunks);

    Ok(LoadedWorld { seed, spawn: (spawn_x, spawn_y, spawn_z), chunks })
}

fn long_value(v: &NbtValue) -> Option<i64> {
    match v {
        NbtValue::Long(l) => Some(*l),
        _ => None,
    }
}

fn walk_regions(root: &Path, chunks: &mut HashMap<(String, String), Chunk>) {
    let Ok(top_entries) = fs::read_dir(root) else { return };
    for top in top_entries.flatten() {
        if !top.path().is_dir() {
            continue;
        }
        let Ok(second_entries) = fs::read_dir(top.path()) else { continue };
        for second in second_entries.flatten() {
            if !second.path().is_dir() {
                continue;
            }
            let Ok(files) = fs::read_dir(second.path()) else { continue };
            for file in files.flatten() {
                let path = file.path();
                if path.is_dir() {
                    continue;
                }
                match load_chunk_file(&top.file_name().to_string_lossy(), &second.file_name().to_string_lossy(), &path) {
                    Ok(Some((key, chunk))) => {
                        chunks.insert(key, chunk);
                    }
                    Ok(None) => {}
                    Err(reason) => {
                        tracing::warn!(path = %path.display(), %reason, "skipping malformed chunk file");
                    }
                }
            }
        }
    }
}

/// Validate and load one candidate chunk file. Returns `Ok(None)` for
/// files that are silently ignored (wrong name shape is a different case
/// from a *malformed* chunk — only files that look like a chunk file but
/// fail a coordinate check are logged as `MalformedChunk`).
fn load_chunk_file(dir_x: &str, dir_z: &str, path: &Path) -> Result<Option<(ChunkKey, Chunk)>, String> {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return Ok(None),
    };

    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() != 4 || parts[0] != "c" || parts[3] != "dat" {
        return Ok(None);
    }

    let cx = base36::decode(parts[1]).ok_or_else(|| format!("bad x coordinate {:?}", parts[1]))?;
    let cz = base36::decode(parts[2]).ok_or_else(|| format!("bad z coordinate {:?}", parts[2]))?;

    let expected_dir_x = base36::encode(cx & 63);
    let expected_dir_z = base36::encode(cz & 63);
    if dir_x != expected_dir_x || dir_z != expected_dir_z {
        return Err(format!(
            "directory ({dir_x}, {dir_z}) does not match masked coordinate ({expected_dir_x}, {expected_dir_z})"
        ));
    }

    let cx = cx as i32;
    let cz = cz as i32;

    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let nbt = mc8_nbt::reader::read_gzip_file(&bytes).map_err(|e| e.to_string())?;
    let level = nbt.get("Level").ok_or("missing Level compound")?;

    let nbt_x = level.get("xPos").and_then(NbtValue::as_int).ok_or("missing xPos")?;
    let nbt_z = level.get("zPos").and_then(NbtValue::as_int).ok_or("missing zPos")?;
    if nbt_x != cx || nbt_z != cz {
        return Err(format!(
            "Level.xPos/zPos ({nbt_x},{nbt_z}) does not match filename coordinate ({cx},{cz})"
        ));
    }

    let terrain_populated = level
        .get("TerrainPopulated")
        .map(|v| matches!(v, NbtValue::Byte(b) if *b != 0))
        .unwrap_or(false);

    let blocks = fixed_byte_array::<BLOCKS_LEN>(level.get("Blocks"), "Blocks")?;
    let block_meta = fixed_byte_array::<NIBBLE_ARRAY_LEN>(level.get("Data"), "Data")?;
    let block_light = fixed_byte_array::<NIBBLE_ARRAY_LEN>(level.get("BlockLight"), "BlockLight")?;
    let sky_light = fixed_byte_array::<NIBBLE_ARRAY_LEN>(level.get("SkyLight"), "SkyLight")?;

    let chunk = Chunk::new(cx, cz, blocks, block_meta, block_light, sky_light, terrain_populated);
    Ok(Some((chunk_key(cx, cz), chunk)))
}

fn fixed_byte_array<const N: usize>(value: Option<&NbtValue>, field: &str) -> Result<Box<[u8; N]>, String> {
    let bytes = value
        .and_then(NbtValue::as_byte_array)
        .ok_or_else(|| format!("missing or wrong-typed {field}"))?;
    if bytes.len() != N {
        return Err(format!("{field} has length {} (expected {})", bytes.len(), N));
    }
    let mut out = Box::new([0u8; N]);
    for (dst, &src) in out.iter_mut().zip(bytes) {
        *dst = src as u8;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use mc8_nbt::{nbt_compound, NbtValue};
    use std::io::Write;
    use tempfile::tempdir;

    fn write_gzip_nbt(path: &Path, root: NbtValue) {
        let mut buf = BytesMut::new();
        root.write_root_named("", &mut buf);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&buf).unwrap();
        let gz = encoder.finish().unwrap();
        fs::write(path, gz).unwrap();
    }

    fn sample_chunk_nbt(cx: i32, cz: i32) -> NbtValue {
        nbt_compound! {
            "Level" => nbt_compound! {
                "xPos" => NbtValue::Int(cx),
                "zPos" => NbtValue::Int(cz),
                "TerrainPopulated" => NbtValue::Byte(1),
                "Blocks" => NbtValue::ByteArray(vec![0; BLOCKS_LEN]),
                "Data" => NbtValue::ByteArray(vec![0; NIBBLE_ARRAY_LEN]),
                "BlockLight" => NbtValue::ByteArray(vec![0; NIBBLE_ARRAY_LEN]),
                "SkyLight" => NbtValue::ByteArray(vec![0; NIBBLE_ARRAY_LEN]),
            },
        }
    }

    fn write_level_dat(root: &Path) {
        write_gzip_nbt(
            &root.join("level.dat"),
            nbt_compound! {
                "Data" => nbt_compound! {
                    "RandomSeed" => NbtValue::Long(42),
                    "SpawnX" => NbtValue::Int(0),
                    "SpawnY" => NbtValue::Int(64),
                    "SpawnZ" => NbtValue::Int(0),
                },
            },
        );
    }

    #[test]
    fn missing_directory_is_world_missing() {
        let err = load_world(Path::new("/nonexistent/definitely/not/here")).unwrap_err();
        assert!(matches!(err, WorldLoadError::WorldMissing));
    }

    #[test]
    fn loads_a_valid_chunk() {
        let dir = tempdir().unwrap();
        write_level_dat(dir.path());

        let cx = 3;
        let cz = -1;
        let sub = dir.path().join(base36::encode((cx & 63) as i64)).join(base36::encode((cz & 63) as i64));
        fs::create_dir_all(&sub).unwrap();
        let file = sub.join(format!("c.{}.{}.dat", base36::encode(cx as i64), base36::encode(cz as i64)));
        write_gzip_nbt(&file, sample_chunk_nbt(cx, cz));

        let world = load_world(dir.path()).unwrap();
        assert_eq!(world.seed, 42);
        assert_eq!(world.spawn, (0, 64, 0));
        assert!(world.get_chunk(cx, cz).is_some());
        assert!(world.get_chunk(99, 99).is_none());
    }

    #[test]
    fn directory_mismatch_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        write_level_dat(dir.path());

        // chunk (3,-1) filed under the WRONG masked directory (0,0)
        let sub = dir.path().join("0").join("0");
        fs::create_dir_all(&sub).unwrap();
        let file = sub.join("c.3.-1.dat");
        write_gzip_nbt(&file, sample_chunk_nbt(3, -1));

        let world = load_world(dir.path()).unwrap();
        assert!(world.get_chunk(3, -1).is_none());
    }

    #[test]
    fn non_chunk_files_are_ignored_silently() {
        let dir = tempdir().unwrap();
        write_level_dat(dir.path());
        let sub = dir.path().join("0").join("0");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("README.txt"), b"not a chunk").unwrap();

        let world = load_world(dir.path()).unwrap();
        assert!(world.chunks.is_empty());
    }
}
