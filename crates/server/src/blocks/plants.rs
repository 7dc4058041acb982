//! Grass, farmland, crops and leaves.

use super::{CROPS, DIRT, FARMLAND, GRASS, LEAVES, LOG, horizontal_neighbors, is_solid_at, opacity_at};
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use voxelcraft_engine::rules::Material;
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::hook::{MutationContext, MutationKind};
use voxelcraft_engine::world::position::BlockPos;

/// Set when a leaf block must look for a supporting log on its next
/// random tick.
const LEAF_CHECK: u8 = 8;
/// Leaves further than this from a log decay.
const LEAF_REACH: i32 = 4;
const MAX_CROP_STAGE: u8 = 7;
const MOIST: u8 = 7;

fn permitted(world: &World, kind: MutationKind, pos: BlockPos, into: BlockId, data: u8) -> bool {
    let ctx = MutationContext::new(world.get_block(pos)).proposing(Block::new(into, data));
    world.allows(kind, pos, &ctx)
}

// ── Grass ──

/// Grass dies under dark, light-blocking covers and creeps onto lit dirt
/// nearby.
pub fn grass_tick(world: &mut World, pos: BlockPos) {
    let above = pos.up();
    let light = world.get_light_level(above);
    if light < 4 && opacity_at(world, above) > 2 {
        if world.rng().gen_range(0..4) != 0 {
            return;
        }
        if permitted(world, MutationKind::Fade, pos, DIRT, 0) {
            world.set_type(pos, DIRT);
        }
    } else if light >= 9 {
        let target = pos.add(
            world.rng().gen_range(-1..=1),
            world.rng().gen_range(-3..=1),
            world.rng().gen_range(-1..=1),
        );
        let lit = world.get_light_level(target.up()) >= 4 && opacity_at(world, target.up()) <= 2;
        if world.get_type(target) == DIRT && lit && permitted(world, MutationKind::Spread, target, GRASS, 0) {
            world.set_type(target, GRASS);
        }
    }
}

// ── Farmland ──

fn water_nearby(world: &World, pos: BlockPos) -> bool {
    (-4..=4).any(|dx| {
        (0..=1).any(|dy| {
            (-4..=4).any(|dz| world.registry().get(world.get_type(pos.add(dx, dy, dz))).material == Material::Water)
        })
    })
}

/// Farmland stays moist near water or under rain, dries out otherwise and
/// reverts to dirt once dry with nothing planted.
pub fn farmland_tick(world: &mut World, pos: BlockPos) {
    if world.rng().gen_range(0..5) != 0 {
        return;
    }
    if water_nearby(world, pos) || world.can_rain_at(pos.up()) {
        world.set_data(pos, MOIST);
        return;
    }
    let moisture = world.get_data(pos);
    if moisture > 0 {
        world.set_data(pos, moisture - 1);
    } else if world.get_type(pos.up()) != CROPS && permitted(world, MutationKind::Fade, pos, DIRT, 0) {
        world.set_type(pos, DIRT);
    }
}

pub fn farmland_neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    if is_solid_at(world, pos.up()) {
        world.set_type(pos, DIRT);
    }
}

// ── Crops ──

pub fn crops_can_stay(world: &World, pos: BlockPos) -> bool {
    let lit = world.get_light_level(pos) >= 8 || world.can_see_sky(pos);
    lit && world.get_type(pos.down()) == FARMLAND
}

pub fn crops_neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    if !crops_can_stay(world, pos) {
        world.set_type(pos, BlockId::AIR);
    }
}

/// Growth odds from the surrounding farmland: moist soil helps, and crops
/// crowded on both axes grow at half speed.
fn growth_rate(world: &World, pos: BlockPos) -> f32 {
    let mut rate = 1.0f32;
    for dx in -1..=1 {
        for dz in -1..=1 {
            let soil = pos.add(dx, -1, dz);
            if world.get_type(soil) != FARMLAND {
                continue;
            }
            let mut bonus = if world.get_data(soil) > 0 { 3.0 } else { 1.0 };
            if dx != 0 || dz != 0 {
                bonus /= 4.0;
            }
            rate += bonus;
        }
    }

    let [east, west, south, north] = horizontal_neighbors(pos).map(|n| world.get_type(n) == CROPS);
    let diagonal = [(1, 1), (1, -1), (-1, 1), (-1, -1)]
        .into_iter()
        .any(|(dx, dz)| world.get_type(pos.add(dx, 0, dz)) == CROPS);
    let along_x = east || west;
    let along_z = north || south;
    if diagonal || (along_x && along_z) {
        rate /= 2.0;
    }
    rate
}

pub fn crops_tick(world: &mut World, pos: BlockPos) {
    if world.get_light_level(pos.up()) < 9 {
        return;
    }
    let stage = world.get_data(pos);
    if stage >= MAX_CROP_STAGE {
        return;
    }
    let odds = (100.0 / growth_rate(world, pos)) as u32;
    if world.rng().gen_range(0..odds.max(1)) != 0 {
        return;
    }
    if permitted(world, MutationKind::Grow, pos, CROPS, stage + 1) {
        world.set_data(pos, stage + 1);
    }
}

// ── Leaves ──

pub fn leaves_neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    let data = world.get_data(pos);
    if data & LEAF_CHECK == 0 {
        world.set_data_raw(pos, data | LEAF_CHECK);
    }
}

/// Whether a log can be reached from `pos` through connected leaves within
/// [`LEAF_REACH`] steps.
fn log_within_reach(world: &World, pos: BlockPos) -> bool {
    let mut seen = HashSet::from([pos]);
    let mut frontier = VecDeque::from([(pos, 0)]);
    while let Some((at, dist)) = frontier.pop_front() {
        if dist == LEAF_REACH {
            continue;
        }
        for n in at.neighbors() {
            if !seen.insert(n) {
                continue;
            }
            match world.get_type(n) {
                LOG => return true,
                LEAVES => frontier.push_back((n, dist + 1)),
                _ => {}
            }
        }
    }
    false
}

/// Leaves flagged for a check decay unless a log still supports them.
pub fn leaves_tick(world: &mut World, pos: BlockPos) {
    let data = world.get_data(pos);
    if data & LEAF_CHECK == 0 {
        return;
    }
    let radius = LEAF_REACH + 1;
    if !world.is_area_loaded(pos.add(-radius, -radius, -radius), pos.add(radius, radius, radius)) {
        return;
    }
    if log_within_reach(world, pos) {
        world.set_data_raw(pos, data & !LEAF_CHECK);
    } else if permitted(world, MutationKind::Decay, pos, BlockId::AIR, 0) {
        world.set_type(pos, BlockId::AIR);
    }
}
