use super::block::{Block, BlockId};
use super::entity::EntityId;
use super::nibble::NibbleArray;
use super::position::{ChunkPos, LocalBlockPos};
use crate::rules::BlockRegistry;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Number of blocks along each horizontal axis of a chunk.
pub const CHUNK_WIDTH: usize = 16;
/// Number of blocks along the vertical axis of a chunk.
pub const CHUNK_HEIGHT: usize = 128;
/// Total block count in one chunk.
pub const CHUNK_VOLUME: usize = CHUNK_WIDTH * CHUNK_WIDTH * CHUNK_HEIGHT;

/// A chunk holding entities is re-saved at least this often (in ticks) even
/// when no block changed, so entity positions persist.
const ENTITY_SAVE_INTERVAL: u64 = 600;

/// Coarse climate of a chunk, used by weather effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    #[default]
    Plains,
    Forest,
    Taiga,
    Tundra,
    Desert,
}

impl Biome {
    pub const ALL: [Biome; 5] = [
        Biome::Plains,
        Biome::Forest,
        Biome::Taiga,
        Biome::Tundra,
        Biome::Desert,
    ];

    /// Snow forms and water freezes here while it rains.
    pub const fn can_snow(self) -> bool {
        matches!(self, Biome::Taiga | Biome::Tundra)
    }

    pub const fn can_rain(self) -> bool {
        !matches!(self, Biome::Desert)
    }

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Self {
        Self::ALL.get(id as usize).copied().unwrap_or_default()
    }
}

/// Vertical span of a column whose sky exposure changed after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightChange {
    pub old: u8,
    pub new: u8,
}

impl HeightChange {
    pub fn min_y(&self) -> i32 {
        self.old.min(self.new) as i32
    }

    pub fn max_y(&self) -> i32 {
        self.old.max(self.new) as i32
    }
}

/// A 16x128x16 column of blocks.
///
/// Block ids are stored one byte per block; metadata and both light channels
/// are nibble arrays sharing the same `x << 11 | z << 7 | y` index.
#[derive(Clone)]
pub struct Chunk {
    pos: ChunkPos,
    blocks: Box<[u8]>,
    data: NibbleArray,
    sky_light: NibbleArray,
    block_light: NibbleArray,
    /// Per column: lowest y at and above which every block is transparent.
    height_map: [u8; CHUNK_WIDTH * CHUNK_WIDTH],
    biome: Biome,
    pub entities: IndexSet<EntityId>,
    pub populated: bool,
    dirty: bool,
    last_saved: u64,
    pub last_seen: u64,
}

impl Chunk {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            blocks: vec![0; CHUNK_VOLUME].into_boxed_slice(),
            data: NibbleArray::new(CHUNK_VOLUME),
            sky_light: NibbleArray::new(CHUNK_VOLUME),
            block_light: NibbleArray::new(CHUNK_VOLUME),
            height_map: [0; CHUNK_WIDTH * CHUNK_WIDTH],
            biome: Biome::default(),
            entities: IndexSet::new(),
            populated: false,
            dirty: false,
            last_saved: 0,
            last_seen: 0,
        }
    }

    /// Rebuild a chunk from persisted arrays. Returns `None` if any array has
    /// the wrong size.
    pub fn from_raw(
        pos: ChunkPos,
        blocks: Vec<u8>,
        data: Vec<u8>,
        sky_light: Vec<u8>,
        block_light: Vec<u8>,
        height_map: Vec<u8>,
    ) -> Option<Self> {
        if blocks.len() != CHUNK_VOLUME {
            return None;
        }
        let mut chunk = Self::new(pos);
        chunk.blocks = blocks.into_boxed_slice();
        chunk.data = NibbleArray::from_bytes(data, CHUNK_VOLUME)?;
        chunk.sky_light = NibbleArray::from_bytes(sky_light, CHUNK_VOLUME)?;
        chunk.block_light = NibbleArray::from_bytes(block_light, CHUNK_VOLUME)?;
        chunk.height_map = height_map.try_into().ok()?;
        Some(chunk)
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Move a chunk whose persisted position disagrees with where it was
    /// requested from.
    pub fn set_pos(&mut self, pos: ChunkPos) {
        self.pos = pos;
    }

    pub fn biome(&self) -> Biome {
        self.biome
    }

    pub fn set_biome(&mut self, biome: Biome) {
        self.biome = biome;
    }

    // ── Blocks ──

    #[inline]
    pub fn block_id(&self, pos: LocalBlockPos) -> BlockId {
        BlockId(self.blocks[pos.index()])
    }

    #[inline]
    pub fn block_data(&self, pos: LocalBlockPos) -> u8 {
        self.data.get(pos.index())
    }

    pub fn block(&self, pos: LocalBlockPos) -> Block {
        Block::new(self.block_id(pos), self.block_data(pos))
    }

    /// Unconditional write used by generators. Does not touch the height map,
    /// light or the dirty flag; call [`Chunk::generate_sky_light`] afterwards.
    pub fn put_block(&mut self, pos: LocalBlockPos, block: Block) {
        let index = pos.index();
        self.blocks[index] = block.id.0;
        self.data.set(index, block.data);
    }

    /// Write a block, keeping the height map and the column's sky light in
    /// step. Returns the previous block and, when the column's sky cap moved,
    /// the span that needs relighting. Returns `None` when nothing changed.
    pub fn set_block(
        &mut self,
        pos: LocalBlockPos,
        block: Block,
        registry: &BlockRegistry,
    ) -> Option<(Block, Option<HeightChange>)> {
        let old = self.block(pos);
        if old == block {
            return None;
        }
        self.put_block(pos, block);
        self.dirty = true;

        let old_opacity = registry.get(old.id).opacity;
        let new_opacity = registry.get(block.id).opacity;
        let height = if old_opacity != new_opacity {
            self.update_height(pos, registry)
        } else {
            None
        };
        Some((old, height))
    }

    /// Write only the metadata nibble. Returns the previous value, or `None`
    /// if unchanged.
    pub fn set_data(&mut self, pos: LocalBlockPos, data: u8) -> Option<u8> {
        let old = self.block_data(pos);
        if old == data & 0xF {
            return None;
        }
        self.data.set(pos.index(), data);
        self.dirty = true;
        Some(old)
    }

    fn update_height(&mut self, pos: LocalBlockPos, registry: &BlockRegistry) -> Option<HeightChange> {
        let column = pos.column();
        let old = self.height_map[column];
        let new = self.scan_height(pos.x, pos.z, registry);
        if new == old {
            return None;
        }
        self.height_map[column] = new;
        self.relight_column(pos.x, pos.z, registry);
        Some(HeightChange { old, new })
    }

    fn scan_height(&self, x: u8, z: u8, registry: &BlockRegistry) -> u8 {
        let mut y = CHUNK_HEIGHT as u8;
        while y > 0 {
            let below = LocalBlockPos::new(x, y - 1, z);
            if registry.get(self.block_id(below)).opacity > 0 {
                break;
            }
            y -= 1;
        }
        y
    }

    /// Refill a column's sky light after its cap moved: full light above the
    /// cap, then attenuated by at least one per block below it.
    fn relight_column(&mut self, x: u8, z: u8, registry: &BlockRegistry) {
        let height = self.height_map[LocalBlockPos::new(x, 0, z).column()];
        for y in height..CHUNK_HEIGHT as u8 {
            self.sky_light.set(LocalBlockPos::new(x, y, z).index(), 15);
        }
        let mut light: u8 = 15;
        for y in (0..height).rev() {
            let pos = LocalBlockPos::new(x, y, z);
            let opacity = registry.get(self.block_id(pos)).opacity.max(1);
            light = light.saturating_sub(opacity);
            self.sky_light.set(pos.index(), light);
        }
    }

    // ── Height map & sky ──

    /// Compute the height map and initial sky light for a freshly generated
    /// chunk.
    pub fn generate_sky_light(&mut self, registry: &BlockRegistry) {
        for x in 0..CHUNK_WIDTH as u8 {
            for z in 0..CHUNK_WIDTH as u8 {
                let height = self.scan_height(x, z, registry);
                self.height_map[LocalBlockPos::new(x, 0, z).column()] = height;

                let mut light: u8 = 15;
                for y in (0..CHUNK_HEIGHT as u8).rev() {
                    let pos = LocalBlockPos::new(x, y, z);
                    light = light.saturating_sub(registry.get(self.block_id(pos)).opacity);
                    self.sky_light.set(pos.index(), light);
                }
            }
        }
    }

    pub fn height(&self, x: u8, z: u8) -> u8 {
        self.height_map[LocalBlockPos::new(x, 0, z).column()]
    }

    /// Whether nothing opaque sits above this position.
    pub fn can_see_sky(&self, pos: LocalBlockPos) -> bool {
        pos.y >= self.height(pos.x, pos.z)
    }

    // ── Light ──

    pub fn sky_light(&self, pos: LocalBlockPos) -> u8 {
        self.sky_light.get(pos.index())
    }

    pub fn block_light(&self, pos: LocalBlockPos) -> u8 {
        self.block_light.get(pos.index())
    }

    pub fn set_sky_light(&mut self, pos: LocalBlockPos, value: u8) {
        self.sky_light.set(pos.index(), value);
        self.dirty = true;
    }

    pub fn set_block_light(&mut self, pos: LocalBlockPos, value: u8) {
        self.block_light.set(pos.index(), value);
        self.dirty = true;
    }

    // ── Persistence bookkeeping ──

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_saved(&mut self, now: u64) {
        self.dirty = false;
        self.last_saved = now;
    }

    /// World time of the last save.
    pub fn last_saved(&self) -> u64 {
        self.last_saved
    }

    /// Whether a save pass should write this chunk. Chunks holding entities
    /// are re-saved periodically even when clean.
    pub fn needs_saving(&self, force: bool, now: u64) -> bool {
        let has_entities = !self.entities.is_empty();
        if force {
            return self.dirty || (has_entities && now != self.last_saved);
        }
        self.dirty || (has_entities && now >= self.last_saved + ENTITY_SAVE_INTERVAL)
    }

    pub fn raw_blocks(&self) -> &[u8] {
        &self.blocks
    }

    pub fn raw_data(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn raw_sky_light(&self) -> &[u8] {
        self.sky_light.as_bytes()
    }

    pub fn raw_block_light(&self) -> &[u8] {
        self.block_light.as_bytes()
    }

    pub fn raw_height_map(&self) -> &[u8] {
        &self.height_map
    }
}
