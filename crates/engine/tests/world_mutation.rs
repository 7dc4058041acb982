//! Block grid, mutation gateway, physics fan-out and chunk store behavior.

mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use voxelcraft_engine::WorldError;
use voxelcraft_engine::light::LightChannel;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::config::WorldConfig;
use voxelcraft_engine::world::entity::Entity;
use voxelcraft_engine::world::hook::MutationKind;
use voxelcraft_engine::world::position::{BlockPos, ChunkPos};
use voxelcraft_engine::world::store::MemoryStorage;

// ---------------------------------------------------------------------------
// Round trips and range checks
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_type_round_trips(
        x in -32_000_000i32..32_000_000,
        y in 0i32..128,
        z in -32_000_000i32..32_000_000,
        id in 0u8..=255,
    ) {
        let mut world = world();
        let pos = BlockPos::new(x, y, z);
        world.set_type(pos, BlockId(id));
        prop_assert_eq!(world.get_type(pos), BlockId(id));
    }

    #[test]
    fn out_of_range_writes_are_rejected(
        x in prop_oneof![-40_000_000i32..-32_000_000, 32_000_000i32..40_000_000, -100i32..100],
        y in prop_oneof![-200i32..0, 128i32..400],
        z in -100i32..100,
        id in 1u8..=255,
    ) {
        let mut world = world();
        let changes = ChangeCounter::default();
        world.add_observer(Box::new(changes.clone()));
        let pos = BlockPos::new(x, y, z);

        prop_assert!(!world.set_type(pos, BlockId(id)));
        prop_assert!(!world.set_data(pos, 3));
        prop_assert!(!world.set_type_and_data(pos, BlockId(id), 3));
        prop_assert!(!world.set_type_raw(pos, BlockId(id)));
        prop_assert!(!world.set_data_raw(pos, 3));
        prop_assert!(!world.set_type_and_data_raw(pos, BlockId(id), 3));
        prop_assert!(!world.place_block(pos, BlockId(id), 0));
        prop_assert_eq!(changes.get(), 0);
        prop_assert!(world.store().is_empty());
    }
}

#[test]
fn unchanged_writes_report_false() {
    let mut world = world();
    let pos = BlockPos::new(1, 10, 1);
    assert!(world.set_type_and_data(pos, STONE, 2));
    assert!(!world.set_type_and_data(pos, STONE, 2));
    assert!(!world.set_data(pos, 2));
    assert!(world.set_data(pos, 5));
    assert_eq!(world.get_data(pos), 5);
    assert!(world.set_type(pos, STONE));
    assert_eq!(world.get_data(pos), 0);
}

// ---------------------------------------------------------------------------
// Notification fan-out
// ---------------------------------------------------------------------------

#[test]
fn notifying_write_reaches_observers_and_all_six_neighbors() {
    let mut world = world();
    let changes = ChangeCounter::default();
    world.add_observer(Box::new(changes.clone()));
    let center = BlockPos::new(8, 64, 8);
    for n in center.neighbors() {
        world.set_type_raw(n, SENSOR);
    }
    assert_eq!(changes.get(), 0);

    assert!(world.set_type(center, STONE));
    assert_eq!(changes.get(), 1);
    assert_eq!(count(&NEIGHBOR_CALLS), 6);
    assert_eq!(LAST_CHANGED.with(|c| c.get()), STONE);
}

#[test]
fn metadata_changes_also_notify_neighbors() {
    let mut world = world();
    let center = BlockPos::new(8, 64, 8);
    world.set_type_raw(center.up(), SENSOR);
    world.set_type_raw(center, STONE);
    assert!(world.set_data(center, 4));
    assert_eq!(count(&NEIGHBOR_CALLS), 1);
}

#[test]
fn observers_end_on_the_stored_block_when_placement_rewrites_it() {
    let mut world = world();
    let log = ChangeLog::default();
    world.add_observer(Box::new(log.clone()));
    let pos = BlockPos::new(8, 64, 8);
    world.set_type_raw(pos.up(), SENSOR);

    assert!(world.set_type(pos, MAGMA));
    assert_eq!(world.get_type(pos), STONE);
    assert_eq!(log.last_at(pos), Some(world.get_block(pos)));
    assert_eq!(LAST_CHANGED.with(|c| c.get()), STONE);
}

#[test]
fn silent_data_fixups_during_placement_are_reported() {
    let mut world = world();
    let log = ChangeLog::default();
    world.add_observer(Box::new(log.clone()));
    let pos = BlockPos::new(8, 64, 8);

    assert!(world.set_type(pos, PEG));
    assert_eq!(world.get_data(pos), 5);
    assert_eq!(log.last_at(pos), Some(Block::new(PEG, 5)));
}

#[test]
fn raw_write_is_silent() {
    let mut world = world();
    let changes = ChangeCounter::default();
    world.add_observer(Box::new(changes.clone()));
    let center = BlockPos::new(8, 64, 8);
    world.set_type_raw(center.up(), SENSOR);
    world.store_mut().get_or_create(ChunkPos::new(0, 0)).unwrap();

    assert!(world.set_type_raw(center, LAMP));
    assert_eq!(changes.get(), 0);
    assert_eq!(count(&NEIGHBOR_CALLS), 0);
    assert_eq!(world.pending_light_updates(), 0);
}

#[test]
fn neighbors_in_unloaded_chunks_are_skipped() {
    let mut world = world();
    // x = 15 is the chunk's east edge; the chunk at x = 16 is never loaded.
    let edge = BlockPos::new(15, 64, 0);
    assert!(world.set_type(edge, STONE));
    assert!(!world.is_chunk_loaded(ChunkPos::new(1, 0)));
}

#[test]
fn static_world_suppresses_physics() {
    let mut world = world();
    let center = BlockPos::new(8, 64, 8);
    world.set_type_raw(center.up(), SENSOR);
    world.set_static(true);
    assert!(world.set_type(center, STONE));
    assert_eq!(count(&NEIGHBOR_CALLS), 0);

    world.set_static(false);
    world.with_physics_suppressed(|w| w.set_type(center, GLASS));
    assert_eq!(count(&NEIGHBOR_CALLS), 0);
    world.set_type(center, STONE);
    assert_eq!(count(&NEIGHBOR_CALLS), 1);
}

#[test]
fn vetoed_physics_skips_the_reaction() {
    let mut world = world();
    let center = BlockPos::new(8, 64, 8);
    world.set_type_raw(center.up(), SENSOR);
    world.set_hook(Arc::new(Deny(MutationKind::Physics)));
    assert!(world.set_type(center, STONE));
    assert_eq!(count(&NEIGHBOR_CALLS), 0);
}

#[test]
fn light_relevant_change_queues_both_channels() {
    let mut world = world();
    let pos = BlockPos::new(8, 64, 8);
    world.store_mut().get_or_create(ChunkPos::new(0, 0)).unwrap();
    assert!(world.set_type(pos, LAMP));
    assert!(world.pending_light_updates() >= 2);

    let mut world = common::world();
    world.store_mut().get_or_create(ChunkPos::new(0, 0)).unwrap();
    world.set_type_raw(pos, GLASS);
    // Same opacity and emission as before: nothing to relight.
    assert!(world.set_data(pos, 1));
    assert_eq!(world.pending_light_updates(), 0);
}

// ---------------------------------------------------------------------------
// Build eligibility and vetoes
// ---------------------------------------------------------------------------

#[test]
fn vetoed_placement_leaves_no_trace() {
    let mut world = world();
    let changes = ChangeCounter::default();
    world.add_observer(Box::new(changes.clone()));
    world.set_hook(Arc::new(Deny(MutationKind::Place)));
    let pos = BlockPos::new(3, 60, 3);

    assert!(!world.place_block(pos, STONE, 0));
    assert_eq!(world.get_type(pos), BlockId::AIR);
    assert_eq!(changes.get(), 0);

    world.clear_hook();
    assert!(world.place_block(pos, STONE, 0));
    assert_eq!(changes.get(), 1);
}

#[test]
fn placement_respects_entities_and_occupants() {
    let mut world = world();
    let pos = BlockPos::new(3, 60, 3);
    world.store_mut().get_or_create(ChunkPos::new(0, 0)).unwrap();
    world.spawn_entity(Entity::new(3.5, 60.0, 3.5, 0.6, 1.8));

    assert!(!world.can_place(STONE, pos, false));
    assert!(world.can_place(STONE, pos, true));
    // Non-colliding blocks ignore entities.
    assert!(world.can_place(SENSOR, pos, false));

    let beside = BlockPos::new(5, 60, 5);
    world.set_type_raw(beside, WATER);
    assert!(world.can_place(STONE, beside, false));
    world.set_type_raw(beside, GLASS);
    assert!(!world.can_place(STONE, beside, false));
    assert!(!world.can_place(BlockId::AIR, BlockPos::new(7, 60, 7), false));
}

#[test]
fn vetoed_break_keeps_block() {
    let mut world = world();
    let pos = BlockPos::new(1, 1, 1);
    world.set_type(pos, STONE);
    world.set_hook(Arc::new(Deny(MutationKind::Break)));
    assert!(!world.break_block(pos));
    assert_eq!(world.get_type(pos), STONE);
    world.clear_hook();
    assert!(world.break_block(pos));
    assert_eq!(world.get_type(pos), BlockId::AIR);
}

#[test]
fn explosion_is_vetoed_as_a_whole() {
    let mut world = world();
    for x in 4..12 {
        for y in 60..68 {
            for z in 4..12 {
                world.set_type_raw(BlockPos::new(x, y, z), STONE);
            }
        }
    }
    world.set_hook(Arc::new(Deny(MutationKind::Explode)));
    assert_eq!(world.explode(8.0, 64.0, 8.0, 3.0), 0);
    assert_eq!(world.get_type(BlockPos::new(8, 64, 8)), STONE);

    world.clear_hook();
    let removed = world.explode(8.0, 64.0, 8.0, 3.0);
    assert!(removed > 0);
    assert_eq!(world.get_type(BlockPos::new(8, 64, 8)), BlockId::AIR);
    // Far corner is out of reach.
    assert_eq!(world.get_type(BlockPos::new(4, 60, 4)), STONE);
}

// ---------------------------------------------------------------------------
// Chunk store
// ---------------------------------------------------------------------------

#[test]
fn repeated_get_or_create_hits_the_cache() {
    let mut world = world();
    let store = world.store_mut();
    let pos = ChunkPos::new(2, 3);
    store.get_or_create(pos).unwrap();
    let lookups = store.index_lookups();
    let chunk = store.get_or_create(pos).unwrap();
    assert_eq!(chunk.pos(), pos);
    assert_eq!(store.index_lookups(), lookups);

    store.get_or_create(ChunkPos::new(0, 0)).unwrap();
    assert!(store.index_lookups() > lookups);
}

#[test]
fn stored_chunks_are_loaded_not_regenerated() {
    let storage = MemoryStorage::new();
    let mut world = world_with(WorldConfig::default(), storage.clone());
    let pos = BlockPos::new(40, 70, -3);
    world.set_type(pos, STONE);
    world.save(true, None).unwrap();
    assert!(storage.contains(pos.chunk()));

    let mut reopened = world_with(WorldConfig::default(), storage);
    reopened.store_mut().get_or_create(pos.chunk()).unwrap();
    assert_eq!(reopened.get_type(pos), STONE);
}

#[test]
fn load_failure_surfaces_from_tick() {
    let storage = MemoryStorage::new();
    let mut world = world_with(WorldConfig::default(), storage.clone());
    storage.fail_loads(true);

    assert!(!world.set_type(BlockPos::new(100, 10, 100), STONE));
    match world.tick() {
        Err(WorldError::ChunkLoad { pos, .. }) => assert_eq!(pos, ChunkPos::new(6, 6)),
        other => panic!("expected a chunk load error, got {other:?}"),
    }
    storage.fail_loads(false);
    assert!(world.tick().is_ok());
}

#[test]
fn chunks_far_from_players_unload_after_grace() {
    let storage = MemoryStorage::new();
    let config = WorldConfig {
        spawn_keep_radius: -1,
        unload_grace_ticks: 5,
        autosave_interval: 0,
        ..WorldConfig::default()
    };
    let mut world = world_with(config, storage.clone());
    world.preload(ChunkPos::new(0, 0), 6).unwrap();
    assert_eq!(world.store().len(), 169);
    world.spawn_entity(Entity::player("alex", 8.0, 64.0, 8.0));

    let mut unloaded = 0;
    for _ in 0..10 {
        let report = world.tick().unwrap();
        assert!(report.chunks_unloaded <= 100);
        unloaded += report.chunks_unloaded;
    }
    // Everything is within the default view radius of 10.
    assert_eq!(unloaded, 0);

    world.config_mut().view_radius = 2;
    for _ in 0..10 {
        unloaded += world.tick().unwrap().chunks_unloaded;
    }
    assert_eq!(unloaded, 169 - 25);
    assert_eq!(world.store().len(), 25);
    assert!(storage.contains(ChunkPos::new(6, 6)));
}

#[test]
fn vetoed_unload_keeps_chunk() {
    let config = WorldConfig {
        spawn_keep_radius: -1,
        unload_grace_ticks: 0,
        autosave_interval: 0,
        ..WorldConfig::default()
    };
    let mut world = world_with(config, MemoryStorage::new());
    world.preload(ChunkPos::new(0, 0), 0).unwrap();
    world.set_hook(Arc::new(Deny(MutationKind::ChunkUnload)));
    world.tick().unwrap();
    assert!(world.is_chunk_loaded(ChunkPos::new(0, 0)));
    world.clear_hook();
    world.tick().unwrap();
    assert!(!world.is_chunk_loaded(ChunkPos::new(0, 0)));
}

#[test]
fn light_level_combines_channels() {
    let mut world = world();
    let pos = BlockPos::new(2, 40, 2);
    world.store_mut().get_or_create(ChunkPos::new(0, 0)).unwrap();
    assert_eq!(world.get_light(LightChannel::Sky, pos), 15);
    assert_eq!(world.get_light(LightChannel::Block, pos), 0);
    assert_eq!(world.get_light(LightChannel::Sky, BlockPos::new(2, 200, 2)), 15);
    assert_eq!(world.get_light(LightChannel::Sky, BlockPos::new(500, 40, 2)), 0);
    assert_eq!(world.get_light_level(pos), 15 - world.sky_subtracted());
}
