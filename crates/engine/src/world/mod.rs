pub mod ambient;
pub mod block;
pub mod chunk;
pub mod config;
pub mod data;
pub mod entity;
pub mod hook;
pub mod mutation;
pub mod nibble;
pub mod physics;
pub mod position;
pub mod store;
pub mod tick_driver;
pub mod weather;

use crate::error::WorldError;
use crate::light::LightBatch;
use crate::rules::BlockRegistry;
use crate::tick::ScheduledTicks;
use config::WorldConfig;
use data::WorldData;
use entity::{Entity, EntityId};
use hook::{MutationContext, MutationHook, MutationKind, WorldObserver};
use position::{BlockPos, ChunkPos};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use slotmap::SlotMap;
use std::sync::Arc;
use store::{ChunkGenerator, ChunkStorage, ChunkStore};

/// The simulated world: chunk store, scheduled ticks, pending light work,
/// entities and world metadata.
///
/// All mutation goes through `&mut self`; a world is driven by one thread
/// and shared by wrapping it in a mutex.
pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) registry: Arc<BlockRegistry>,
    pub(crate) store: ChunkStore,
    pub(crate) ticks: ScheduledTicks,
    pub(crate) light: LightBatch,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    pub(crate) data: WorldData,

    pub(crate) prev_rain: f32,
    pub(crate) rain: f32,
    pub(crate) prev_thunder: f32,
    pub(crate) thunder: f32,
    pub(crate) sky_subtracted: u8,

    /// General-purpose randomness for block behaviors.
    pub(crate) rng: SmallRng,
    /// Linear congruential state for ambient sampling.
    pub(crate) lcg: i32,
    pub(crate) cave_sound_cooldown: u32,

    pub(crate) observers: Vec<Box<dyn WorldObserver>>,
    pub(crate) hook: Option<Arc<dyn MutationHook>>,
    /// Snapshot worlds never propagate physics.
    pub(crate) is_static: bool,
    pub(crate) physics_suppressed: u32,
    /// First chunk failure hit by a write that could only report `false`.
    pub(crate) fault: Option<WorldError>,
}

impl World {
    pub fn new(
        config: WorldConfig,
        data: WorldData,
        registry: Arc<BlockRegistry>,
        generator: Box<dyn ChunkGenerator>,
        storage: Box<dyn ChunkStorage>,
    ) -> Self {
        let mut rng = SmallRng::seed_from_u64(data.seed as u64);
        let lcg = rng.next_u32() as i32;
        let mut store = ChunkStore::new(Arc::clone(&registry), generator, storage);
        store.set_clock(data.time);
        let light = LightBatch::new(config.light_lookback, config.light_ceiling);
        let rain = if data.raining { 1.0 } else { 0.0 };
        let thunder = if data.thundering { 1.0 } else { 0.0 };

        let mut world = Self {
            config,
            registry,
            store,
            ticks: ScheduledTicks::new(),
            light,
            entities: SlotMap::with_key(),
            data,
            prev_rain: rain,
            rain,
            prev_thunder: thunder,
            thunder,
            sky_subtracted: 0,
            rng,
            lcg,
            cave_sound_cooldown: 0,
            observers: Vec::new(),
            hook: None,
            is_static: false,
            physics_suppressed: 0,
            fault: None,
        };
        world.cave_sound_cooldown = world.next_cave_cooldown();
        world.sky_subtracted = world.calculate_sky_subtracted();
        world
    }

    /// Open a world, reading its metadata from `storage` or starting a new
    /// one named `name` with `seed`.
    pub fn open(
        name: &str,
        seed: i64,
        config: WorldConfig,
        registry: Arc<BlockRegistry>,
        generator: Box<dyn ChunkGenerator>,
        mut storage: Box<dyn ChunkStorage>,
    ) -> Result<Self, WorldError> {
        let data = match storage.load_world_data().map_err(WorldError::WorldData)? {
            Some(data) => {
                tracing::info!("Loaded world '{}' at time {}", data.name, data.time);
                data
            }
            None => {
                tracing::info!("Creating new world '{}' with seed {}", name, seed);
                WorldData::new(name, seed)
            }
        };
        Ok(Self::new(config, data, registry, generator, storage))
    }

    // ── Accessors ──

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Tunables can be changed between ticks.
    pub fn config_mut(&mut self) -> &mut WorldConfig {
        &mut self.config
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    pub fn data(&self) -> &WorldData {
        &self.data
    }

    pub fn time(&self) -> u64 {
        self.data.time
    }

    pub fn set_time(&mut self, time: u64) {
        self.data.time = time;
        self.store.set_clock(time);
    }

    pub fn spawn(&self) -> BlockPos {
        self.data.spawn
    }

    pub fn set_spawn(&mut self, spawn: BlockPos) {
        self.data.spawn = spawn;
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
    }

    // ── Hooks & observers ──

    pub fn set_hook(&mut self, hook: Arc<dyn MutationHook>) {
        self.hook = Some(hook);
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    pub fn add_observer(&mut self, observer: Box<dyn WorldObserver>) {
        self.observers.push(observer);
    }

    /// Ask the veto hook whether a mutation may happen. Always true without
    /// a hook.
    pub fn allows(&self, kind: MutationKind, pos: BlockPos, ctx: &MutationContext<'_>) -> bool {
        let Some(hook) = &self.hook else {
            return true;
        };
        let allowed = hook.should_proceed(kind, pos, ctx);
        if !allowed {
            tracing::debug!("{} at {} vetoed", kind.name(), pos);
        }
        allowed
    }

    // ── Chunk access ──

    pub fn is_chunk_loaded(&self, pos: ChunkPos) -> bool {
        self.store.is_chunk_loaded(pos)
    }

    /// Load or generate a chunk. A failure is latched and logged; the next
    /// `tick` reports it.
    pub(crate) fn ensure_chunk(&mut self, pos: ChunkPos) -> bool {
        let result = self.store.get_or_create(pos).map(|_| ());
        match result {
            Ok(()) => true,
            Err(err) => {
                self.latch(err);
                false
            }
        }
    }

    pub(crate) fn latch(&mut self, err: WorldError) {
        let cause = std::error::Error::source(&err)
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::error!("{}: {}", err, cause);
        if self.fault.is_none() {
            self.fault = Some(err);
        }
    }

    /// Make the square of `radius` chunks around `center` resident.
    pub fn preload(&mut self, center: ChunkPos, radius: i32) -> Result<usize, WorldError> {
        let added = self.store.preload(center, radius)?;
        tracing::info!("Prepared {} chunks around {}", added, center);
        Ok(added)
    }

    // ── Entities ──

    pub fn spawn_entity(&mut self, entity: Entity) -> EntityId {
        let chunk = entity.chunk;
        let id = self.entities.insert(entity);
        if let Some(c) = self.store.chunk_mut(chunk) {
            c.entities.insert(id);
        }
        id
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        if let Some(c) = self.store.chunk_mut(entity.chunk) {
            c.entities.shift_remove(&id);
        }
        Some(entity)
    }

    /// Move an entity, updating chunk membership when it crosses a border.
    pub fn move_entity(&mut self, id: EntityId, x: f64, y: f64, z: f64) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        let from = entity.chunk;
        let to = Entity::chunk_of(x, z);
        entity.x = x;
        entity.y = y;
        entity.z = z;
        entity.chunk = to;
        if from != to {
            if let Some(c) = self.store.chunk_mut(from) {
                c.entities.shift_remove(&id);
            }
            if let Some(c) = self.store.chunk_mut(to) {
                c.entities.insert(id);
            }
        }
        true
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn players(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().filter(|(_, e)| e.is_player())
    }

    /// Start or stop sleeping. Waking resets the sleep counter.
    pub fn set_sleeping(&mut self, id: EntityId, sleeping: bool) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.sleeping = sleeping;
        if !sleeping {
            entity.sleep_ticks = 0;
        }
        true
    }
}
