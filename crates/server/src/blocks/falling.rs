//! Sand and gravel drop straight down when nothing holds them up.

use voxelcraft_engine::rules::{BlockType, Material};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::BlockId;
use voxelcraft_engine::world::position::BlockPos;

const TICK_RATE: u64 = 3;

pub fn falling(name: &'static str, resistance: f32) -> BlockType {
    BlockType::new(name, Material::Sand)
        .with_resistance(resistance)
        .with_tick_rate(TICK_RATE)
        .placed(schedule_fall)
        .neighbor(neighbor_changed)
        .scheduled_tick(fall)
}

/// A falling block passes through air, fire and fluids.
pub fn can_fall_into(world: &World, pos: BlockPos) -> bool {
    if !pos.is_valid() {
        return false;
    }
    let id = world.get_type(pos);
    if id.is_air() {
        return true;
    }
    let material = world.registry().get(id).material;
    material == Material::Fire || material.is_liquid()
}

fn schedule_fall(world: &mut World, pos: BlockPos) {
    let id = world.get_type(pos);
    world.schedule_tick(pos, id, TICK_RATE);
}

fn neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    schedule_fall(world, pos);
}

fn fall(world: &mut World, pos: BlockPos) {
    if !can_fall_into(world, pos.down()) {
        return;
    }
    let block = world.get_block(pos);
    let mut landing = pos.down();
    while can_fall_into(world, landing.down()) {
        landing = landing.down();
    }
    world.set_type(pos, BlockId::AIR);
    world.set_type_and_data(landing, block.id, block.data);
}
