//! The game's block catalog.
//!
//! Ids follow the classic beta numbering so region files written by this
//! server line up with the vanilla tools of that era. [`registry`] builds the
//! capability table the engine consults; the behaviors themselves live in the
//! submodules.

pub mod falling;
pub mod fire;
pub mod fluid;
pub mod frozen;
pub mod plants;
pub mod torch;

use voxelcraft_engine::rules::{BlockRegistry, BlockType, Collision, Material, WeatherBlocks};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::BlockId;
use voxelcraft_engine::world::position::BlockPos;

// ── Block ids (beta 1.7.3 numbering) ──

pub const AIR: BlockId = BlockId(0);
pub const STONE: BlockId = BlockId(1);
pub const GRASS: BlockId = BlockId(2);
pub const DIRT: BlockId = BlockId(3);
pub const COBBLESTONE: BlockId = BlockId(4);
pub const BEDROCK: BlockId = BlockId(7);
pub const WATER: BlockId = BlockId(8);
pub const STATIONARY_WATER: BlockId = BlockId(9);
pub const LAVA: BlockId = BlockId(10);
pub const STATIONARY_LAVA: BlockId = BlockId(11);
pub const SAND: BlockId = BlockId(12);
pub const GRAVEL: BlockId = BlockId(13);
pub const LOG: BlockId = BlockId(17);
pub const LEAVES: BlockId = BlockId(18);
pub const GLASS: BlockId = BlockId(20);
pub const OBSIDIAN: BlockId = BlockId(49);
pub const TORCH: BlockId = BlockId(50);
pub const FIRE: BlockId = BlockId(51);
pub const CROPS: BlockId = BlockId(59);
pub const FARMLAND: BlockId = BlockId(60);
pub const SNOW_LAYER: BlockId = BlockId(78);
pub const ICE: BlockId = BlockId(79);
pub const SNOW_BLOCK: BlockId = BlockId(80);

/// Build the capability table for every block the server knows.
pub fn registry() -> BlockRegistry {
    let mut r = BlockRegistry::new();

    r.register(AIR, BlockType::air());
    r.register(STONE, BlockType::solid("stone").with_resistance(6.0));
    r.register(
        GRASS,
        BlockType::new("grass", Material::Earth)
            .with_resistance(0.6)
            .random_tick(plants::grass_tick),
    );
    r.register(DIRT, BlockType::new("dirt", Material::Earth).with_resistance(0.5));
    r.register(COBBLESTONE, BlockType::solid("cobblestone").with_resistance(6.0));
    r.register(BEDROCK, BlockType::solid("bedrock").with_resistance(3_600_000.0));

    r.register(WATER, fluid::flowing(fluid::FluidKind::Water));
    r.register(STATIONARY_WATER, fluid::stationary(fluid::FluidKind::Water));
    r.register(LAVA, fluid::flowing(fluid::FluidKind::Lava));
    r.register(STATIONARY_LAVA, fluid::stationary(fluid::FluidKind::Lava));

    r.register(SAND, falling::falling("sand", 0.5));
    r.register(GRAVEL, falling::falling("gravel", 0.6));

    r.register(LOG, BlockType::new("log", Material::Wood).with_resistance(2.0));
    r.register(
        LEAVES,
        BlockType::new("leaves", Material::Leaves)
            .with_opacity(1)
            .with_resistance(0.2)
            .random_tick(plants::leaves_tick)
            .neighbor(plants::leaves_neighbor_changed),
    );
    r.register(
        GLASS,
        BlockType::new("glass", Material::Glass)
            .with_opacity(0)
            .with_resistance(0.3),
    );
    r.register(OBSIDIAN, BlockType::solid("obsidian").with_resistance(1200.0));

    r.register(TORCH, torch::torch());
    r.register(FIRE, fire::fire());

    r.register(
        CROPS,
        BlockType::new("crops", Material::Plant)
            .random_tick(plants::crops_tick)
            .neighbor(plants::crops_neighbor_changed)
            .placement(plants::crops_can_stay),
    );
    r.register(
        FARMLAND,
        BlockType::new("farmland", Material::Earth)
            .with_resistance(0.6)
            .with_collision(Collision::Height(0.9375))
            .random_tick(plants::farmland_tick)
            .neighbor(plants::farmland_neighbor_changed),
    );

    r.register(SNOW_LAYER, frozen::snow_layer());
    r.register(ICE, frozen::ice());
    r.register(
        SNOW_BLOCK,
        BlockType::new("snow_block", Material::Snow)
            .with_resistance(0.2)
            .random_tick(frozen::snow_block_tick),
    );

    r.weather = Some(WeatherBlocks {
        snow_layer: SNOW_LAYER,
        ice: ICE,
        freezing_water: STATIONARY_WATER,
        fire: FIRE,
    });
    r
}

// ── Position helpers ──

/// The four horizontal neighbor positions, in the order +X, -X, +Z, -Z.
/// Opposite directions differ only in the lowest index bit.
pub fn horizontal_neighbors(pos: BlockPos) -> [BlockPos; 4] {
    [pos.add(1, 0, 0), pos.add(-1, 0, 0), pos.add(0, 0, 1), pos.add(0, 0, -1)]
}

// ── Property lookups ──

pub fn material_at(world: &World, pos: BlockPos) -> Material {
    world.registry().get(world.get_type(pos)).material
}

/// Is the block at `pos` a full solid block?
pub fn is_solid_at(world: &World, pos: BlockPos) -> bool {
    let id = world.get_type(pos);
    !id.is_air() && world.registry().get(id).is_solid()
}

pub fn opacity_at(world: &World, pos: BlockPos) -> u8 {
    world.registry().get(world.get_type(pos)).opacity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_registers_every_id() {
        let r = registry();
        for id in [
            STONE, GRASS, DIRT, COBBLESTONE, BEDROCK, WATER, STATIONARY_WATER, LAVA,
            STATIONARY_LAVA, SAND, GRAVEL, LOG, LEAVES, GLASS, OBSIDIAN, TORCH, FIRE, CROPS,
            FARMLAND, SNOW_LAYER, ICE, SNOW_BLOCK,
        ] {
            assert!(r.is_registered(id), "{:?} not registered", id);
        }
        assert_eq!(r.by_name("ice"), Some(ICE));
        assert_eq!(r.get(TORCH).emission, 14);
        assert_eq!(r.get(ICE).opacity, 3);
        assert!(r.get(LAVA).material.is_liquid());
    }

    #[test]
    fn horizontal_opposites_pair_up() {
        let pos = BlockPos::new(0, 10, 0);
        let n = horizontal_neighbors(pos);
        for i in 0..4 {
            let (a, b) = (n[i], n[i ^ 1]);
            assert_eq!((a.x + b.x, a.z + b.z), (0, 0));
        }
    }
}
