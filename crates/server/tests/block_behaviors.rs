//! Block behaviors running inside a real world: fluids, falling blocks,
//! melting and decay on the superflat terrain.

use std::sync::{Arc, Mutex};

use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::config::WorldConfig;
use voxelcraft_engine::world::data::WorldData;
use voxelcraft_engine::world::hook::{MutationKind, WorldObserver};
use voxelcraft_engine::world::position::{BlockPos, ChunkPos};
use voxelcraft_engine::world::store::MemoryStorage;

use voxelcraft_server::blocks::{
    self, COBBLESTONE, GLASS, GRASS, ICE, LAVA, LEAVES, LOG, OBSIDIAN, SAND, STATIONARY_WATER, TORCH,
    WATER,
};
use voxelcraft_server::event_bus::HookRegistry;
use voxelcraft_server::generator::FlatGenerator;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Superflat world with the nine chunks around the origin loaded. The
/// surface is grass at y = 62.
fn flat_world() -> World {
    let mut world = World::new(
        WorldConfig::default(),
        WorldData::new("behaviors", 7),
        Arc::new(blocks::registry()),
        Box::new(FlatGenerator::classic()),
        Box::new(MemoryStorage::new()),
    );
    world.preload(ChunkPos::new(0, 0), 1).unwrap();
    world
}

fn run_ticks(world: &mut World, ticks: usize) {
    for _ in 0..ticks {
        world.tick().unwrap();
    }
}

fn settle_light(world: &mut World) {
    for _ in 0..64 {
        if !world.update_lighting() {
            break;
        }
    }
}

/// Keeps the last reported block per position.
#[derive(Clone, Default)]
struct LastSeen(Arc<Mutex<Vec<(BlockPos, Block)>>>);

impl LastSeen {
    fn at(&self, pos: BlockPos) -> Option<Block> {
        let seen = self.0.lock().unwrap();
        seen.iter().rev().find(|(p, _)| *p == pos).map(|(_, b)| *b)
    }
}

impl WorldObserver for LastSeen {
    fn block_changed(&mut self, pos: BlockPos, _old: Block, new: Block) {
        self.0.lock().unwrap().push((pos, new));
    }
}

fn is_water(id: BlockId) -> bool {
    id == WATER || id == STATIONARY_WATER
}

// ---------------------------------------------------------------------------
// Fluids
// ---------------------------------------------------------------------------

#[test]
fn water_spreads_seven_blocks_on_flat_ground() {
    let mut world = flat_world();
    let source = BlockPos::new(8, 63, 8);
    assert!(world.set_type_and_data(source, WATER, 0));

    run_ticks(&mut world, 200);

    assert!(is_water(world.get_type(source)));
    assert_eq!(world.get_data(source), 0);
    for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
        for k in 1..=7 {
            let pos = source.add(dx * k, 0, dz * k);
            assert!(is_water(world.get_type(pos)), "no water at {}", pos);
            assert_eq!(world.get_data(pos) as i32, k, "wrong distance at {}", pos);
        }
        let beyond = source.add(dx * 8, 0, dz * 8);
        assert!(world.get_type(beyond).is_air(), "water leaked to {}", beyond);
    }
    // Nothing seeps into the ground.
    assert_eq!(world.get_type(source.down()), GRASS);
}

#[test]
fn water_falls_off_a_ledge() {
    let mut world = flat_world();
    // A glass pillar with a source on top.
    for y in 63..66 {
        world.set_type(BlockPos::new(4, y, 4), GLASS);
    }
    let top = BlockPos::new(4, 66, 4);
    world.set_type_and_data(top, WATER, 0);

    run_ticks(&mut world, 100);

    let beside = BlockPos::new(5, 66, 4);
    assert!(is_water(world.get_type(beside)));
    // Fluid below the rim is falling and reaches the ground.
    let ground = BlockPos::new(5, 63, 4);
    assert!(is_water(world.get_type(ground)));
    assert!(world.get_data(BlockPos::new(5, 65, 4)) >= 8);
}

#[test]
fn lava_next_to_water_hardens() {
    let mut world = flat_world();
    world.set_type_and_data(BlockPos::new(9, 63, 8), STATIONARY_WATER, 0);

    let source = BlockPos::new(10, 63, 8);
    world.set_type_and_data(source, LAVA, 0);
    assert_eq!(world.get_type(source), OBSIDIAN);

    let flow = BlockPos::new(8, 63, 8);
    world.set_type_and_data(flow, LAVA, 2);
    assert_eq!(world.get_type(flow), COBBLESTONE);
}

#[test]
fn observers_see_hardened_lava() {
    let mut world = flat_world();
    let seen = LastSeen::default();
    world.add_observer(Box::new(seen.clone()));
    world.set_type_and_data(BlockPos::new(9, 63, 8), STATIONARY_WATER, 0);

    let source = BlockPos::new(10, 63, 8);
    world.set_type_and_data(source, LAVA, 0);
    assert_eq!(world.get_type(source), OBSIDIAN);
    assert_eq!(seen.at(source), Some(world.get_block(source)));
}

#[test]
fn observers_see_the_torch_attachment() {
    let mut world = flat_world();
    let seen = LastSeen::default();
    world.add_observer(Box::new(seen.clone()));

    let torch = BlockPos::new(8, 63, 8);
    world.set_type(torch, TORCH);
    assert_eq!(world.get_data(torch), 5);
    assert_eq!(seen.at(torch), Some(Block::new(TORCH, 5)));
}

#[test]
fn flow_veto_stops_spreading() {
    let mut world = flat_world();
    let hooks = Arc::new(HookRegistry::new());
    // Fluids may not leave the x = 8 column.
    hooks.register(MutationKind::Flow, "dam", 0, |pos, _| pos.x == 8);
    world.set_hook(hooks.clone());

    let source = BlockPos::new(8, 63, 8);
    world.set_type_and_data(source, WATER, 0);
    run_ticks(&mut world, 100);

    assert!(is_water(world.get_type(BlockPos::new(8, 63, 11))));
    assert!(world.get_type(BlockPos::new(9, 63, 8)).is_air());
    assert!(world.get_type(BlockPos::new(7, 63, 8)).is_air());
    assert!(hooks.denied() > 0);
}

// ---------------------------------------------------------------------------
// Falling blocks
// ---------------------------------------------------------------------------

#[test]
fn sand_drops_to_the_ground() {
    let mut world = flat_world();
    let high = BlockPos::new(3, 90, 3);
    world.set_type(high, SAND);
    assert_eq!(world.get_type(high), SAND);

    run_ticks(&mut world, 5);

    assert!(world.get_type(high).is_air());
    assert_eq!(world.get_type(BlockPos::new(3, 63, 3)), SAND);
}

#[test]
fn sand_falls_when_its_support_goes() {
    let mut world = flat_world();
    let support = BlockPos::new(6, 63, 6);
    world.set_type(support, GLASS);
    world.set_type(support.up(), SAND);
    run_ticks(&mut world, 5);
    assert_eq!(world.get_type(support.up()), SAND);

    world.set_type(support, BlockId::AIR);
    run_ticks(&mut world, 5);
    assert!(world.get_type(support.up()).is_air());
    assert_eq!(world.get_type(support), SAND);
}

// ---------------------------------------------------------------------------
// Melting and decay
// ---------------------------------------------------------------------------

fn ice_beside_torch(world: &mut World) -> BlockPos {
    world.set_type_and_data(BlockPos::new(8, 63, 8), TORCH, 5);
    let ice = BlockPos::new(9, 63, 8);
    world.set_type(ice, ICE);
    settle_light(world);
    ice
}

#[test]
fn ice_melts_beside_a_torch() {
    let mut world = flat_world();
    let ice = ice_beside_torch(&mut world);
    assert_eq!(world.get_type(BlockPos::new(8, 63, 8)), TORCH);

    assert!(world.random_tick_at(ice));
    assert_eq!(world.get_type(ice), STATIONARY_WATER);
}

#[test]
fn fade_veto_keeps_ice_frozen() {
    let mut world = flat_world();
    let hooks = Arc::new(HookRegistry::new());
    hooks.register(MutationKind::Fade, "eternal-winter", 0, |_, _| false);
    world.set_hook(hooks.clone());

    let ice = ice_beside_torch(&mut world);
    world.random_tick_at(ice);
    assert_eq!(world.get_type(ice), ICE);
    assert_eq!(hooks.denied(), 1);
}

#[test]
fn ice_in_the_dark_stays() {
    let mut world = flat_world();
    let ice = BlockPos::new(12, 63, 12);
    world.set_type(ice, ICE);
    settle_light(&mut world);
    world.random_tick_at(ice);
    assert_eq!(world.get_type(ice), ICE);
}

#[test]
fn leaves_without_a_log_decay() {
    let mut world = flat_world();
    let log = BlockPos::new(2, 70, 2);
    world.set_type(log, LOG);
    let held = log.add(1, 0, 0);
    world.set_type_and_data(held, LEAVES, 8);
    let loose = BlockPos::new(12, 70, 12);
    world.set_type_and_data(loose, LEAVES, 8);

    world.random_tick_at(held);
    world.random_tick_at(loose);

    assert_eq!(world.get_type(held), LEAVES);
    assert_eq!(world.get_data(held) & 8, 0);
    assert!(world.get_type(loose).is_air());
}
