//! Fire: ages on scheduled ticks, consumes flammable neighbors and spreads
//! to the air around them. Rain puts it out.

use super::{FIRE, is_solid_at};
use rand::Rng;
use voxelcraft_engine::rules::{BlockType, Material};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::hook::{MutationContext, MutationKind};
use voxelcraft_engine::world::position::BlockPos;

const TICK_RATE: u64 = 40;
const MAX_AGE: u8 = 15;

pub fn fire() -> BlockType {
    BlockType::new("fire", Material::Fire)
        .with_emission(15)
        .with_tick_rate(TICK_RATE)
        .placed(placed)
        .neighbor(neighbor_changed)
        .scheduled_tick(burn_tick)
        .placement(can_stay)
}

/// `(encouragement, flammability)` of a block: how much it helps fire
/// spread nearby and how easily it is consumed.
fn burn_odds(world: &World, pos: BlockPos) -> (u32, u32) {
    match super::material_at(world, pos) {
        Material::Wood => (5, 5),
        Material::Leaves => (30, 60),
        Material::Plant => (60, 100),
        _ => (0, 0),
    }
}

pub fn has_flammable_neighbor(world: &World, pos: BlockPos) -> bool {
    pos.neighbors().into_iter().any(|n| burn_odds(world, n).0 > 0)
}

/// Strongest encouragement of the blocks around an empty cell.
fn encouragement(world: &World, pos: BlockPos) -> u32 {
    if !world.get_type(pos).is_air() {
        return 0;
    }
    pos.neighbors()
        .into_iter()
        .map(|n| burn_odds(world, n).0)
        .max()
        .unwrap_or(0)
}

fn can_stay(world: &World, pos: BlockPos) -> bool {
    is_solid_at(world, pos.down()) || has_flammable_neighbor(world, pos)
}

fn rained_on(world: &World, pos: BlockPos) -> bool {
    world.is_raining()
        && (world.can_rain_at(pos) || super::horizontal_neighbors(pos).into_iter().any(|n| world.can_rain_at(n)))
}

fn placed(world: &mut World, pos: BlockPos) {
    if !can_stay(world, pos) {
        world.set_type(pos, BlockId::AIR);
        return;
    }
    world.schedule_tick(pos, FIRE, TICK_RATE);
}

fn neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    if !can_stay(world, pos) {
        world.set_type(pos, BlockId::AIR);
    }
}

fn ignite(world: &mut World, from: BlockPos, pos: BlockPos, age: u8) -> bool {
    let ctx = MutationContext::new(world.get_block(pos))
        .proposing(Block::new(FIRE, age))
        .caused_by(from);
    world.allows(MutationKind::Ignite, pos, &ctx) && world.set_type_and_data(pos, FIRE, age)
}

fn burn_tick(world: &mut World, pos: BlockPos) {
    if !can_stay(world, pos) || rained_on(world, pos) {
        world.set_type(pos, BlockId::AIR);
        return;
    }

    let age = world.get_data(pos);
    if age < MAX_AGE {
        let grown = (age + world.rng().gen_range(0..3) / 2).min(MAX_AGE);
        world.set_data_raw(pos, grown);
    }
    world.schedule_tick(pos, FIRE, TICK_RATE);

    if !has_flammable_neighbor(world, pos) {
        if !is_solid_at(world, pos.down()) || age > 3 {
            world.set_type(pos, BlockId::AIR);
        }
        return;
    }
    if age == MAX_AGE && burn_odds(world, pos.down()).1 == 0 && world.rng().gen_range(0..4) == 0 {
        world.set_type(pos, BlockId::AIR);
        return;
    }

    for n in super::horizontal_neighbors(pos) {
        consume(world, pos, n, 300, age);
    }
    consume(world, pos, pos.down(), 250, age);
    consume(world, pos, pos.up(), 250, age);

    for dx in -1..=1 {
        for dz in -1..=1 {
            for dy in -1..=4 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                let target = pos.add(dx, dy, dz);
                let odds = if dy > 1 { 100 + (dy as u32 - 1) * 100 } else { 100 };
                let encouraged = encouragement(world, target);
                if encouraged == 0 {
                    continue;
                }
                let chance = (encouraged + 40) / (age as u32 + 30);
                if world.rng().gen_range(0..odds) <= chance && !rained_on(world, target) {
                    let spread_age = (age + world.rng().gen_range(0..5) / 4).min(MAX_AGE);
                    ignite(world, pos, target, spread_age);
                }
            }
        }
    }
}

/// Try to burn the block at `pos`: it either catches fire itself or is
/// destroyed.
fn consume(world: &mut World, from: BlockPos, pos: BlockPos, odds: u32, age: u8) {
    let flammability = burn_odds(world, pos).1;
    if world.rng().gen_range(0..odds) >= flammability {
        return;
    }
    let ctx = MutationContext::new(world.get_block(pos)).proposing(Block::AIR).caused_by(from);
    if !world.allows(MutationKind::Burn, pos, &ctx) {
        return;
    }
    if world.rng().gen_range(0..age as u32 + 10) < 5 && !world.can_rain_at(pos) {
        let spread_age = (age + world.rng().gen_range(0..5) / 4).min(MAX_AGE);
        world.set_type_and_data(pos, FIRE, spread_age);
    } else {
        world.set_type(pos, BlockId::AIR);
    }
}
