//! Chunk lifecycle: lookup, load-or-generate, save and eviction.
//!
//! Chunks live in a `SlotMap` addressed through a position index. A
//! single-slot cache remembers the most recently resolved position so that
//! repeated access to the same chunk never touches the index.

use super::chunk::Chunk;
use super::data::WorldData;
use super::position::ChunkPos;
use crate::error::WorldError;
use crate::rules::BlockRegistry;
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

new_key_type! {
    pub struct ChunkKey;
}

/// Non-forced saves write at most this many chunks per call.
pub const MAX_SAVES_PER_CALL: usize = 24;
/// At most this many queued chunks are evicted per call.
pub const MAX_UNLOADS_PER_CALL: usize = 100;
/// Progress is reported every this many saved chunks.
const PROGRESS_STEP: usize = 10;

// ── Collaborator traits ──

/// Produces the initial contents of chunks that were never saved.
pub trait ChunkGenerator: Send + Sync {
    fn generate(&self, pos: ChunkPos) -> Chunk;
}

impl<F> ChunkGenerator for F
where
    F: Fn(ChunkPos) -> Chunk + Send + Sync,
{
    fn generate(&self, pos: ChunkPos) -> Chunk {
        self(pos)
    }
}

/// Generator that leaves every chunk empty.
pub struct EmptyGenerator;

impl ChunkGenerator for EmptyGenerator {
    fn generate(&self, pos: ChunkPos) -> Chunk {
        Chunk::new(pos)
    }
}

/// Persistent chunk and world-data storage. Calls are synchronous; failures
/// propagate to the caller of load/save/unload.
pub trait ChunkStorage: Send {
    fn load_chunk(&mut self, pos: ChunkPos) -> anyhow::Result<Option<Chunk>>;
    fn save_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<()>;
    fn load_world_data(&mut self) -> anyhow::Result<Option<WorldData>>;
    fn save_world_data(&mut self, data: &WorldData) -> anyhow::Result<()>;

    /// Push buffered writes to their final destination.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Storage that remembers nothing.
pub struct NullStorage;

impl ChunkStorage for NullStorage {
    fn load_chunk(&mut self, _pos: ChunkPos) -> anyhow::Result<Option<Chunk>> {
        Ok(None)
    }

    fn save_chunk(&mut self, _chunk: &Chunk) -> anyhow::Result<()> {
        Ok(())
    }

    fn load_world_data(&mut self) -> anyhow::Result<Option<WorldData>> {
        Ok(None)
    }

    fn save_world_data(&mut self, _data: &WorldData) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    chunks: HashMap<ChunkPos, Chunk>,
    data: Option<WorldData>,
    chunk_saves: usize,
    flushes: usize,
    fail_loads: bool,
    fail_saves: bool,
}

/// In-memory storage. Clones share the same contents, so a test can keep a
/// handle while the world owns another.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().expect("memory storage poisoned")
    }

    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.lock().chunks.contains_key(&pos)
    }

    pub fn stored_chunk(&self, pos: ChunkPos) -> Option<Chunk> {
        self.lock().chunks.get(&pos).cloned()
    }

    pub fn insert_chunk(&self, chunk: Chunk) {
        self.lock().chunks.insert(chunk.pos(), chunk);
    }

    pub fn world_data(&self) -> Option<WorldData> {
        self.lock().data.clone()
    }

    /// Total chunk writes so far.
    pub fn chunk_saves(&self) -> usize {
        self.lock().chunk_saves
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    /// Make every subsequent load fail.
    pub fn fail_loads(&self, fail: bool) {
        self.lock().fail_loads = fail;
    }

    /// Make every subsequent chunk save fail.
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }
}

impl ChunkStorage for MemoryStorage {
    fn load_chunk(&mut self, pos: ChunkPos) -> anyhow::Result<Option<Chunk>> {
        let inner = self.lock();
        if inner.fail_loads {
            anyhow::bail!("storage unavailable");
        }
        Ok(inner.chunks.get(&pos).cloned())
    }

    fn save_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<()> {
        let mut inner = self.lock();
        if inner.fail_saves {
            anyhow::bail!("storage is read-only");
        }
        inner.chunk_saves += 1;
        inner.chunks.insert(chunk.pos(), chunk.clone());
        Ok(())
    }

    fn load_world_data(&mut self) -> anyhow::Result<Option<WorldData>> {
        Ok(self.lock().data.clone())
    }

    fn save_world_data(&mut self, data: &WorldData) -> anyhow::Result<()> {
        self.lock().data = Some(data.clone());
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }
}

// ── Chunk store ──

/// Sparse map of loaded chunks backed by a generator and a storage.
pub struct ChunkStore {
    slots: SlotMap<ChunkKey, Chunk>,
    index: IndexMap<ChunkPos, ChunkKey>,
    /// Most recently resolved chunk. Cleared on eviction of that chunk.
    last: Mutex<Option<(ChunkPos, ChunkKey)>>,
    index_lookups: AtomicU64,
    unload_queue: IndexSet<ChunkPos>,
    /// Current world time, stamped onto chunks as they are loaded.
    clock: u64,
    registry: Arc<BlockRegistry>,
    generator: Box<dyn ChunkGenerator>,
    storage: Box<dyn ChunkStorage>,
}

impl ChunkStore {
    pub fn new(
        registry: Arc<BlockRegistry>,
        generator: Box<dyn ChunkGenerator>,
        storage: Box<dyn ChunkStorage>,
    ) -> Self {
        Self {
            slots: SlotMap::with_key(),
            index: IndexMap::new(),
            last: Mutex::new(None),
            index_lookups: AtomicU64::new(0),
            unload_queue: IndexSet::new(),
            clock: 0,
            registry,
            generator,
            storage,
        }
    }

    pub(crate) fn set_clock(&mut self, now: u64) {
        self.clock = now;
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub(crate) fn storage_mut(&mut self) -> &mut dyn ChunkStorage {
        &mut *self.storage
    }

    /// Number of times the position index has been consulted. Cache hits do
    /// not count.
    pub fn index_lookups(&self) -> u64 {
        self.index_lookups.load(Ordering::Relaxed)
    }

    fn lookup(&self, pos: ChunkPos) -> Option<ChunkKey> {
        let mut last = self.last.lock().expect("chunk cache poisoned");
        if let Some((cached, key)) = *last {
            if cached == pos {
                return Some(key);
            }
        }
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
        let key = self.index.get(&pos).copied()?;
        *last = Some((pos, key));
        Some(key)
    }

    pub fn is_chunk_loaded(&self, pos: ChunkPos) -> bool {
        self.lookup(pos).is_some()
    }

    /// A loaded chunk, without loading.
    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        let key = self.lookup(pos)?;
        self.slots.get(key)
    }

    pub fn chunk_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        let key = self.lookup(pos)?;
        self.slots.get_mut(key)
    }

    /// The chunk at `pos`, loading it from storage or generating it first if
    /// necessary.
    pub fn get_or_create(&mut self, pos: ChunkPos) -> Result<&mut Chunk, WorldError> {
        if let Some(key) = self.lookup(pos) {
            return Ok(&mut self.slots[key]);
        }
        let chunk = self.load_or_generate(pos)?;
        let key = self.insert(chunk);
        Ok(&mut self.slots[key])
    }

    fn load_or_generate(&mut self, pos: ChunkPos) -> Result<Chunk, WorldError> {
        let loaded = self
            .storage
            .load_chunk(pos)
            .map_err(|source| WorldError::ChunkLoad { pos, source })?;
        let chunk = match loaded {
            Some(mut chunk) => {
                if chunk.pos() != pos {
                    tracing::warn!("chunk stored at {} claims to be {}, relocating", pos, chunk.pos());
                    chunk.set_pos(pos);
                }
                chunk
            }
            None => generate(&*self.generator, &self.registry, pos),
        };
        Ok(chunk)
    }

    /// Insert a chunk, replacing any chunk already at its position.
    pub fn insert(&mut self, mut chunk: Chunk) -> ChunkKey {
        let pos = chunk.pos();
        chunk.last_seen = self.clock;
        if let Some(&key) = self.index.get(&pos) {
            self.slots[key] = chunk;
            return key;
        }
        let key = self.slots.insert(chunk);
        self.index.insert(pos, key);
        *self.last.get_mut().expect("chunk cache poisoned") = Some((pos, key));
        key
    }

    /// Drop a chunk without saving it.
    pub fn remove(&mut self, pos: ChunkPos) -> Option<Chunk> {
        let key = self.index.swap_remove(&pos)?;
        let mut last = self.last.lock().expect("chunk cache poisoned");
        if matches!(*last, Some((cached, _)) if cached == pos) {
            *last = None;
        }
        drop(last);
        self.unload_queue.shift_remove(&pos);
        self.slots.remove(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Loaded chunk positions in load order.
    pub fn loaded_positions(&self) -> Vec<ChunkPos> {
        self.index.keys().copied().collect()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.slots.values()
    }

    pub fn dirty_count(&self) -> usize {
        self.slots.values().filter(|c| c.is_dirty()).count()
    }

    // ── Unloading ──

    /// Refresh `last_seen` for chunks near an anchor and queue the rest for
    /// eviction once their grace period has elapsed. Chunks within
    /// `keep_radius` of `spawn` are never queued.
    pub fn queue_unused(
        &mut self,
        now: u64,
        anchors: &[ChunkPos],
        view_radius: i32,
        spawn: ChunkPos,
        keep_radius: i32,
        grace: u64,
    ) {
        for chunk in self.slots.values_mut() {
            let pos = chunk.pos();
            if anchors.iter().any(|a| a.distance(pos) <= view_radius) {
                chunk.last_seen = now;
                self.unload_queue.shift_remove(&pos);
                continue;
            }
            if keep_radius >= 0 && spawn.distance(pos) <= keep_radius {
                continue;
            }
            if now.saturating_sub(chunk.last_seen) >= grace {
                self.unload_queue.insert(pos);
            }
        }
    }

    pub fn queued_unloads(&self) -> usize {
        self.unload_queue.len()
    }

    /// Take up to [`MAX_UNLOADS_PER_CALL`] queued positions, oldest first.
    pub fn take_unload_batch(&mut self) -> Vec<ChunkPos> {
        let n = self.unload_queue.len().min(MAX_UNLOADS_PER_CALL);
        self.unload_queue.drain(..n).collect()
    }

    /// Save (if needed) and evict one chunk. On a save failure the chunk
    /// stays loaded.
    pub fn unload(&mut self, pos: ChunkPos, now: u64) -> Result<bool, WorldError> {
        let Some(key) = self.index.get(&pos).copied() else {
            return Ok(false);
        };
        if self.slots[key].needs_saving(true, now) {
            self.save_key(key, now)?;
        }
        self.remove(pos);
        Ok(true)
    }

    // ── Saving ──

    fn save_key(&mut self, key: ChunkKey, now: u64) -> Result<(), WorldError> {
        let chunk = &mut self.slots[key];
        self.storage
            .save_chunk(chunk)
            .map_err(|source| WorldError::ChunkSave {
                pos: chunk.pos(),
                source,
            })?;
        chunk.mark_saved(now);
        Ok(())
    }

    /// Save chunks that need it. A non-forced save stops after
    /// [`MAX_SAVES_PER_CALL`] chunks; a forced one writes everything and
    /// flushes the storage. `progress` receives a percentage every ten
    /// chunks. Returns the number of chunks written.
    pub fn save_all(
        &mut self,
        force: bool,
        now: u64,
        mut progress: Option<&mut dyn FnMut(u8)>,
    ) -> Result<usize, WorldError> {
        let pending: Vec<ChunkKey> = self
            .slots
            .iter()
            .filter(|(_, chunk)| chunk.needs_saving(force, now))
            .map(|(key, _)| key)
            .collect();
        let total = pending.len();
        let mut saved = 0;
        for key in pending {
            self.save_key(key, now)?;
            saved += 1;
            if saved % PROGRESS_STEP == 0 {
                if let Some(report) = progress.as_mut() {
                    report((saved * 100 / total) as u8);
                }
            }
            if !force && saved >= MAX_SAVES_PER_CALL {
                return Ok(saved);
            }
        }
        if force {
            self.storage.flush().map_err(WorldError::Flush)?;
        }
        Ok(saved)
    }

    // ── Preloading ──

    /// Make every chunk in the square of `radius` around `center` resident.
    /// Stored chunks are read one by one; missing ones are generated in
    /// parallel. Returns how many chunks were added.
    pub fn preload(&mut self, center: ChunkPos, radius: i32) -> Result<usize, WorldError> {
        let missing: Vec<ChunkPos> = center
            .square(radius)
            .filter(|pos| !self.index.contains_key(pos))
            .collect();

        let mut to_generate = Vec::new();
        let mut added = 0;
        for pos in missing {
            let loaded = self
                .storage
                .load_chunk(pos)
                .map_err(|source| WorldError::ChunkLoad { pos, source })?;
            match loaded {
                Some(mut chunk) => {
                    chunk.set_pos(pos);
                    self.insert(chunk);
                    added += 1;
                }
                None => to_generate.push(pos),
            }
        }

        let generator = &*self.generator;
        let registry = &*self.registry;
        let generated: Vec<Chunk> = to_generate
            .par_iter()
            .map(|&pos| generate(generator, registry, pos))
            .collect();
        added += generated.len();
        for chunk in generated {
            self.insert(chunk);
        }
        Ok(added)
    }
}

fn generate(generator: &dyn ChunkGenerator, registry: &BlockRegistry, pos: ChunkPos) -> Chunk {
    let mut chunk = generator.generate(pos);
    chunk.set_pos(pos);
    chunk.generate_sky_light(registry);
    chunk.mark_dirty();
    chunk
}
