//! World persistence in the beta region format.
//!
//! Chunks are stored as NBT `Level` compounds inside `region/r.X.Z.mcr`
//! region files (32×32 chunks each); world metadata lives in a gzipped NBT
//! `level.dat` next to the region directory.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fastnbt::ByteArray;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use voxelcraft_engine::world::chunk::{Biome, Chunk};
use voxelcraft_engine::world::data::{WORLD_DATA_VERSION, WorldData};
use voxelcraft_engine::world::position::{BlockPos, ChunkPos};
use voxelcraft_engine::world::store::ChunkStorage;

/// Chunks per region file along each axis.
const REGION_WIDTH: i32 = 32;

// ── Chunk NBT structs (serde) ────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug)]
struct ChunkNbt {
    #[serde(rename = "Level")]
    level: LevelNbt,
}

#[derive(Serialize, Deserialize, Debug)]
struct LevelNbt {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "LastUpdate")]
    last_update: i64,
    #[serde(rename = "Blocks")]
    blocks: ByteArray,
    #[serde(rename = "Data")]
    data: ByteArray,
    #[serde(rename = "SkyLight")]
    sky_light: ByteArray,
    #[serde(rename = "BlockLight")]
    block_light: ByteArray,
    #[serde(rename = "HeightMap")]
    height_map: ByteArray,
    #[serde(rename = "TerrainPopulated")]
    terrain_populated: i8,
    #[serde(rename = "Biome", default)]
    biome: i8,
}

// ── level.dat NBT structs ────────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug)]
struct LevelDat {
    #[serde(rename = "Data")]
    data: LevelDataNbt,
}

#[derive(Serialize, Deserialize, Debug)]
struct LevelDataNbt {
    #[serde(rename = "LevelName")]
    level_name: String,
    #[serde(rename = "RandomSeed")]
    random_seed: i64,
    #[serde(rename = "Time")]
    time: i64,
    #[serde(rename = "SpawnX")]
    spawn_x: i32,
    #[serde(rename = "SpawnY")]
    spawn_y: i32,
    #[serde(rename = "SpawnZ")]
    spawn_z: i32,
    #[serde(rename = "LastPlayed")]
    last_played: i64,
    #[serde(rename = "SizeOnDisk", default)]
    size_on_disk: i64,
    #[serde(default = "default_version")]
    version: i32,
    #[serde(rename = "raining", default)]
    raining: i8,
    #[serde(rename = "rainTime", default)]
    rain_time: i32,
    #[serde(rename = "thundering", default)]
    thundering: i8,
    #[serde(rename = "thunderTime", default)]
    thunder_time: i32,
}

fn default_version() -> i32 {
    WORLD_DATA_VERSION
}

// ── Byte array helpers ───────────────────────────────────────────────────────

fn to_byte_array(bytes: &[u8]) -> ByteArray {
    ByteArray::new(bytes.iter().map(|b| *b as i8).collect())
}

fn from_byte_array(array: ByteArray) -> Vec<u8> {
    array.into_inner().into_iter().map(|b| b as u8).collect()
}

// ── Conversion ───────────────────────────────────────────────────────────────

fn chunk_to_nbt(chunk: &Chunk) -> ChunkNbt {
    let pos = chunk.pos();
    ChunkNbt {
        level: LevelNbt {
            x_pos: pos.x,
            z_pos: pos.z,
            last_update: chunk.last_saved() as i64,
            blocks: to_byte_array(chunk.raw_blocks()),
            data: to_byte_array(chunk.raw_data()),
            sky_light: to_byte_array(chunk.raw_sky_light()),
            block_light: to_byte_array(chunk.raw_block_light()),
            height_map: to_byte_array(chunk.raw_height_map()),
            terrain_populated: chunk.populated as i8,
            biome: chunk.biome().id() as i8,
        },
    }
}

fn nbt_to_chunk(nbt: ChunkNbt) -> Result<Chunk> {
    let level = nbt.level;
    let pos = ChunkPos::new(level.x_pos, level.z_pos);
    let mut chunk = Chunk::from_raw(
        pos,
        from_byte_array(level.blocks),
        from_byte_array(level.data),
        from_byte_array(level.sky_light),
        from_byte_array(level.block_light),
        from_byte_array(level.height_map),
    )
    .ok_or_else(|| anyhow!("chunk {} has malformed block or light arrays", pos))?;
    chunk.set_biome(Biome::from_id(level.biome as u8));
    chunk.populated = level.terrain_populated != 0;
    chunk.mark_saved(level.last_update.max(0) as u64);
    Ok(chunk)
}

fn world_data_to_nbt(data: &WorldData, size_on_disk: i64) -> LevelDat {
    LevelDat {
        data: LevelDataNbt {
            level_name: data.name.clone(),
            random_seed: data.seed,
            time: data.time as i64,
            spawn_x: data.spawn.x,
            spawn_y: data.spawn.y,
            spawn_z: data.spawn.z,
            last_played: data.last_played,
            size_on_disk,
            version: data.version,
            raining: data.raining as i8,
            rain_time: data.rain_time,
            thundering: data.thundering as i8,
            thunder_time: data.thunder_time,
        },
    }
}

fn nbt_to_world_data(nbt: LevelDat) -> WorldData {
    let d = nbt.data;
    WorldData {
        name: d.level_name,
        seed: d.random_seed,
        time: d.time.max(0) as u64,
        spawn: BlockPos::new(d.spawn_x, d.spawn_y, d.spawn_z),
        raining: d.raining != 0,
        rain_time: d.rain_time,
        thundering: d.thundering != 0,
        thunder_time: d.thunder_time,
        last_played: d.last_played,
        version: d.version,
    }
}

// ── Region storage ───────────────────────────────────────────────────────────

/// [`ChunkStorage`] backed by region files under `<dir>/region/` and a
/// `level.dat` in `<dir>`.
///
/// Region files stay open between calls; [`ChunkStorage::flush`] syncs and
/// closes them.
pub struct RegionStorage {
    dir: PathBuf,
    regions: HashMap<(i32, i32), fastanvil::Region<File>>,
}

impl RegionStorage {
    /// Open (creating if needed) the world directory `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join("region"))
            .with_context(|| format!("creating world directory {}", dir.display()))?;
        Ok(Self {
            dir,
            regions: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn region_path(&self, rx: i32, rz: i32) -> PathBuf {
        self.dir.join("region").join(format!("r.{}.{}.mcr", rx, rz))
    }

    pub fn open_regions(&self) -> usize {
        self.regions.len()
    }

    /// The region file holding `pos`, opened on first use. Without `create`
    /// a missing file yields `None`.
    fn region(&mut self, pos: ChunkPos, create: bool) -> Result<Option<&mut fastanvil::Region<File>>> {
        let key = (pos.x.div_euclid(REGION_WIDTH), pos.z.div_euclid(REGION_WIDTH));
        if !self.regions.contains_key(&key) {
            let path = self.region_path(key.0, key.1);
            if !create && !path.exists() {
                return Ok(None);
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .with_context(|| format!("opening region file {}", path.display()))?;
            let empty = file.metadata()?.len() == 0;
            let region = if empty {
                fastanvil::Region::new(file)
            } else {
                fastanvil::Region::from_stream(file)
            }
            .with_context(|| format!("parsing region file {}", path.display()))?;
            self.regions.insert(key, region);
        }
        Ok(self.regions.get_mut(&key))
    }

    fn level_path(&self) -> PathBuf {
        self.dir.join("level.dat")
    }

    /// Total bytes of all region files on disk.
    fn size_on_disk(&self) -> i64 {
        let Ok(entries) = fs::read_dir(self.dir.join("region")) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len() as i64)
            .sum()
    }
}

impl ChunkStorage for RegionStorage {
    fn load_chunk(&mut self, pos: ChunkPos) -> Result<Option<Chunk>> {
        let Some(region) = self.region(pos, false)? else {
            return Ok(None);
        };
        let local_x = pos.x.rem_euclid(REGION_WIDTH) as usize;
        let local_z = pos.z.rem_euclid(REGION_WIDTH) as usize;
        let Some(bytes) = region
            .read_chunk(local_x, local_z)
            .with_context(|| format!("reading chunk {}", pos))?
        else {
            return Ok(None);
        };
        let nbt: ChunkNbt =
            fastnbt::from_bytes(&bytes).with_context(|| format!("deserializing chunk {}", pos))?;
        nbt_to_chunk(nbt).map(Some)
    }

    fn save_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        let pos = chunk.pos();
        let bytes = fastnbt::to_bytes(&chunk_to_nbt(chunk))
            .with_context(|| format!("serializing chunk {}", pos))?;
        let region = self
            .region(pos, true)?
            .ok_or_else(|| anyhow!("no region file for chunk {}", pos))?;
        region
            .write_chunk(
                pos.x.rem_euclid(REGION_WIDTH) as usize,
                pos.z.rem_euclid(REGION_WIDTH) as usize,
                &bytes,
            )
            .with_context(|| format!("writing chunk {}", pos))?;
        Ok(())
    }

    fn load_world_data(&mut self) -> Result<Option<WorldData>> {
        let path = self.level_path();
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        let mut raw = Vec::new();
        GzDecoder::new(file)
            .read_to_end(&mut raw)
            .with_context(|| format!("decompressing {}", path.display()))?;
        let nbt: LevelDat =
            fastnbt::from_bytes(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(nbt_to_world_data(nbt)))
    }

    /// Write `level.dat_new`, keep the previous file as `level.dat_old`, then
    /// move the new file into place.
    fn save_world_data(&mut self, data: &WorldData) -> Result<()> {
        let nbt = world_data_to_nbt(data, self.size_on_disk());
        let raw = fastnbt::to_bytes(&nbt).context("serializing level.dat")?;

        let fresh = self.dir.join("level.dat_new");
        let old = self.dir.join("level.dat_old");
        let current = self.level_path();

        let mut encoder = GzEncoder::new(
            File::create(&fresh).with_context(|| format!("creating {}", fresh.display()))?,
            Compression::default(),
        );
        encoder.write_all(&raw)?;
        encoder.finish()?.sync_all()?;

        if current.exists() {
            fs::rename(&current, &old).context("backing up level.dat")?;
        }
        fs::rename(&fresh, &current).context("replacing level.dat")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let regions = std::mem::take(&mut self.regions);
        let count = regions.len();
        for ((rx, rz), region) in regions {
            let file = region
                .into_inner()
                .with_context(|| format!("closing region r.{}.{}", rx, rz))?;
            file.sync_all()
                .with_context(|| format!("syncing region r.{}.{}", rx, rz))?;
        }
        tracing::debug!("Flushed {} region files in {}", count, self.dir.display());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;
    use crate::generator::FlatGenerator;
    use voxelcraft_engine::world::store::ChunkGenerator;
    use std::sync::Arc;
    use voxelcraft_engine::world::World;
    use voxelcraft_engine::world::config::WorldConfig;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn open_world(dir: &Path) -> World {
        World::open(
            "roundtrip",
            42,
            WorldConfig::default(),
            Arc::new(blocks::registry()),
            Box::new(FlatGenerator::classic()),
            Box::new(RegionStorage::open(dir).unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_chunk_nbt_roundtrip() {
        let mut chunk = FlatGenerator::classic()
            .with_biome(Biome::Taiga)
            .generate(ChunkPos::new(-3, 7));
        chunk.mark_saved(1234);
        let bytes = fastnbt::to_bytes(&chunk_to_nbt(&chunk)).unwrap();
        let back = nbt_to_chunk(fastnbt::from_bytes(&bytes).unwrap()).unwrap();

        assert_eq!(back.pos(), ChunkPos::new(-3, 7));
        assert_eq!(back.raw_blocks(), chunk.raw_blocks());
        assert_eq!(back.biome(), Biome::Taiga);
        assert_eq!(back.last_saved(), 1234);
        assert!(back.populated);
        assert!(!back.is_dirty());
    }

    #[test]
    fn test_malformed_chunk_is_an_error() {
        let mut nbt = chunk_to_nbt(&Chunk::new(ChunkPos::new(0, 0)));
        nbt.level.blocks = ByteArray::new(vec![0; 10]);
        assert!(nbt_to_chunk(nbt).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = scratch_dir("voxelcraft_test_persistence");
        let glass = BlockPos::new(5, 63, 5);
        let far_glass = BlockPos::new(-20, 63, 40);

        {
            let mut world = open_world(&tmp);
            world.preload(ChunkPos::new(0, 0), 1).unwrap();
            world.set_type(glass, blocks::GLASS);
            world.set_type(far_glass, blocks::GLASS);
            world.set_time(5000);
            world.set_spawn(BlockPos::new(3, 63, 3));
            assert!(world.save(true, None).unwrap() >= 9);
        }

        assert!(tmp.join("level.dat").exists());
        assert!(tmp.join("region/r.0.0.mcr").exists());
        assert!(tmp.join("region/r.-1.0.mcr").exists());

        let mut world = open_world(&tmp);
        assert_eq!(world.data().name, "roundtrip");
        assert_eq!(world.time(), 5000);
        assert_eq!(world.spawn(), BlockPos::new(3, 63, 3));

        world.store_mut().get_or_create(ChunkPos::new(0, 0)).unwrap();
        world.store_mut().get_or_create(far_glass.chunk()).unwrap();
        assert_eq!(world.get_type(glass), blocks::GLASS);
        assert_eq!(world.get_type(far_glass), blocks::GLASS);
        assert_eq!(world.get_type(BlockPos::new(5, 62, 5)), blocks::GRASS);
        assert_eq!(world.store().dirty_count(), 0);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_level_dat_keeps_a_backup() {
        let tmp = scratch_dir("voxelcraft_test_level_backup");
        let mut storage = RegionStorage::open(&tmp).unwrap();
        let mut data = WorldData::new("backup", 7);
        storage.save_world_data(&data).unwrap();
        data.time = 99;
        data.raining = true;
        storage.save_world_data(&data).unwrap();

        assert!(tmp.join("level.dat_old").exists());
        let loaded = storage.load_world_data().unwrap().unwrap();
        assert_eq!(loaded, data);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn test_missing_chunk_loads_as_none() {
        let tmp = scratch_dir("voxelcraft_test_missing_chunk");
        let mut storage = RegionStorage::open(&tmp).unwrap();
        assert!(storage.load_chunk(ChunkPos::new(100, 100)).unwrap().is_none());
        assert_eq!(storage.open_regions(), 0);
        let _ = fs::remove_dir_all(&tmp);
    }
}
