//! Shared fixtures: a tiny block registry whose behaviors bump thread-local
//! counters, plus observer and hook doubles.

#![allow(dead_code)]

use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use voxelcraft_engine::rules::{BlockRegistry, BlockType, Material};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::config::WorldConfig;
use voxelcraft_engine::world::data::WorldData;
use voxelcraft_engine::world::hook::{MutationContext, MutationHook, MutationKind, WorldObserver};
use voxelcraft_engine::world::position::BlockPos;
use voxelcraft_engine::world::store::{EmptyGenerator, MemoryStorage};

pub const STONE: BlockId = BlockId(1);
/// Counts scheduled ticks.
pub const TICKER: BlockId = BlockId(2);
/// Counts random ticks.
pub const SPROUT: BlockId = BlockId(3);
/// Counts neighbor notifications.
pub const SENSOR: BlockId = BlockId(4);
pub const LAMP: BlockId = BlockId(5);
pub const GLASS: BlockId = BlockId(6);
pub const WATER: BlockId = BlockId(7);
/// Turns into stone as soon as it is placed.
pub const MAGMA: BlockId = BlockId(8);
/// Stores an attachment nibble of 5 when placed.
pub const PEG: BlockId = BlockId(9);

thread_local! {
    pub static SCHEDULED_RUNS: Cell<u32> = const { Cell::new(0) };
    pub static RANDOM_RUNS: Cell<u32> = const { Cell::new(0) };
    pub static NEIGHBOR_CALLS: Cell<u32> = const { Cell::new(0) };
    pub static LAST_CHANGED: Cell<BlockId> = const { Cell::new(BlockId::AIR) };
}

pub fn count(counter: &'static std::thread::LocalKey<Cell<u32>>) -> u32 {
    counter.with(Cell::get)
}

pub fn reset_counters() {
    SCHEDULED_RUNS.with(|c| c.set(0));
    RANDOM_RUNS.with(|c| c.set(0));
    NEIGHBOR_CALLS.with(|c| c.set(0));
    LAST_CHANGED.with(|c| c.set(BlockId::AIR));
}

fn on_scheduled(_world: &mut World, _pos: BlockPos) {
    SCHEDULED_RUNS.with(|c| c.set(c.get() + 1));
}

fn on_random(_world: &mut World, _pos: BlockPos) {
    RANDOM_RUNS.with(|c| c.set(c.get() + 1));
}

fn on_neighbor(_world: &mut World, _pos: BlockPos, changed: BlockId) {
    NEIGHBOR_CALLS.with(|c| c.set(c.get() + 1));
    LAST_CHANGED.with(|c| c.set(changed));
}

fn harden(world: &mut World, pos: BlockPos) {
    world.set_type(pos, STONE);
}

fn attach_peg(world: &mut World, pos: BlockPos) {
    world.set_data_raw(pos, 5);
}

pub fn registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.register(STONE, BlockType::solid("stone").with_resistance(1.0));
    registry.register(
        TICKER,
        BlockType::new("ticker", Material::Decoration).scheduled_tick(on_scheduled),
    );
    registry.register(SPROUT, BlockType::new("sprout", Material::Plant).random_tick(on_random));
    registry.register(SENSOR, BlockType::new("sensor", Material::Decoration).neighbor(on_neighbor));
    registry.register(LAMP, BlockType::new("lamp", Material::Glass).with_opacity(0).with_emission(15));
    registry.register(GLASS, BlockType::new("glass", Material::Glass).with_opacity(0));
    registry.register(WATER, BlockType::new("water", Material::Water).with_opacity(3));
    registry.register(MAGMA, BlockType::solid("magma").with_emission(3).placed(harden));
    registry.register(PEG, BlockType::new("peg", Material::Decoration).placed(attach_peg));
    registry
}

pub fn world() -> World {
    world_with(WorldConfig::default(), MemoryStorage::new())
}

pub fn world_with(config: WorldConfig, storage: MemoryStorage) -> World {
    reset_counters();
    World::new(
        config,
        WorldData::new("test", 1),
        Arc::new(registry()),
        Box::new(EmptyGenerator),
        Box::new(storage),
    )
}

/// Observer counting block changes.
#[derive(Clone, Default)]
pub struct ChangeCounter(pub Arc<AtomicUsize>);

impl ChangeCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl WorldObserver for ChangeCounter {
    fn block_changed(&mut self, _pos: BlockPos, _old: Block, _new: Block) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Observer recording every change in order.
#[derive(Clone, Default)]
pub struct ChangeLog(pub Arc<Mutex<Vec<(BlockPos, Block, Block)>>>);

impl ChangeLog {
    /// Last reported block at `pos`.
    pub fn last_at(&self, pos: BlockPos) -> Option<Block> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _, _)| *p == pos)
            .map(|(_, _, new)| *new)
    }
}

impl WorldObserver for ChangeLog {
    fn block_changed(&mut self, pos: BlockPos, old: Block, new: Block) {
        self.0.lock().unwrap().push((pos, old, new));
    }
}

/// Hook denying one kind of mutation.
pub struct Deny(pub MutationKind);

impl MutationHook for Deny {
    fn should_proceed(&self, kind: MutationKind, _pos: BlockPos, _ctx: &MutationContext<'_>) -> bool {
        kind != self.0
    }
}
