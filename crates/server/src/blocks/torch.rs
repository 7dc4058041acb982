//! Torches: light sources attached to a wall or the floor.
//!
//! Metadata records the attachment: 1..=4 hang on the block at -X, +X, -Z
//! and +Z respectively, 5 stands on the floor.

use super::is_solid_at;
use voxelcraft_engine::rules::{BlockType, Material};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::BlockId;
use voxelcraft_engine::world::position::BlockPos;

const FLOOR: u8 = 5;

pub fn torch() -> BlockType {
    BlockType::new("torch", Material::Decoration)
        .with_emission(14)
        .placed(attach)
        .neighbor(neighbor_changed)
        .placement(can_place)
}

/// The block a torch with this attachment leans on.
fn support(pos: BlockPos, attachment: u8) -> Option<BlockPos> {
    match attachment {
        1 => Some(pos.add(-1, 0, 0)),
        2 => Some(pos.add(1, 0, 0)),
        3 => Some(pos.add(0, 0, -1)),
        4 => Some(pos.add(0, 0, 1)),
        FLOOR => Some(pos.down()),
        _ => None,
    }
}

fn can_place(world: &World, pos: BlockPos) -> bool {
    (1..=FLOOR).any(|a| support(pos, a).is_some_and(|s| is_solid_at(world, s)))
}

/// Pick an attachment for a torch placed without one.
fn attach(world: &mut World, pos: BlockPos) {
    if world.get_data(pos) == 0 {
        let chosen = (1..=FLOOR).find(|a| support(pos, *a).is_some_and(|s| is_solid_at(world, s)));
        if let Some(attachment) = chosen {
            world.set_data_raw(pos, attachment);
        }
    }
    neighbor_changed(world, pos, BlockId::AIR);
}

fn neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    let held = support(pos, world.get_data(pos)).is_some_and(|s| is_solid_at(world, s));
    if !held {
        world.set_type(pos, BlockId::AIR);
    }
}
