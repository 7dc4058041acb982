//! Ice, snow layers and snow blocks: all melt under bright block light.

use super::{ICE, STATIONARY_WATER, is_solid_at};
use voxelcraft_engine::light::LightChannel;
use voxelcraft_engine::rules::{BlockType, Material};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::hook::{MutationContext, MutationKind};
use voxelcraft_engine::world::position::BlockPos;

/// Block light above which snow melts.
const SNOW_MELT_LIGHT: u8 = 11;

pub fn ice() -> BlockType {
    BlockType::new("ice", Material::Ice)
        .with_opacity(3)
        .with_resistance(0.5)
        .random_tick(ice_tick)
}

pub fn snow_layer() -> BlockType {
    BlockType::new("snow_layer", Material::SnowLayer)
        .with_resistance(0.1)
        .random_tick(snow_tick)
        .neighbor(snow_layer_neighbor_changed)
        .placement(snow_layer_can_stay)
}

/// Fade `pos` into `into` if the veto hook allows it.
fn fade(world: &mut World, pos: BlockPos, into: BlockId) -> bool {
    let ctx = MutationContext::new(world.get_block(pos)).proposing(Block::from(into));
    if !world.allows(MutationKind::Fade, pos, &ctx) {
        return false;
    }
    world.set_type(pos, into)
}

/// Ice melts into still water once nearby block light outshines what the
/// ice itself absorbs.
pub fn ice_tick(world: &mut World, pos: BlockPos) {
    let threshold = SNOW_MELT_LIGHT - world.registry().get(ICE).opacity;
    if world.get_light(LightChannel::Block, pos) > threshold {
        fade(world, pos, STATIONARY_WATER);
    }
}

fn snow_tick(world: &mut World, pos: BlockPos) {
    if world.get_light(LightChannel::Block, pos) > SNOW_MELT_LIGHT {
        fade(world, pos, BlockId::AIR);
    }
}

pub fn snow_block_tick(world: &mut World, pos: BlockPos) {
    snow_tick(world, pos);
}

/// Snow settles only on top of a solid block other than ice.
fn snow_layer_can_stay(world: &World, pos: BlockPos) -> bool {
    let below = pos.down();
    world.get_type(below) != ICE && is_solid_at(world, below)
}

fn snow_layer_neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    if !snow_layer_can_stay(world, pos) {
        world.set_type(pos, BlockId::AIR);
    }
}
