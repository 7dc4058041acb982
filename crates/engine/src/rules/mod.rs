//! Block capability table.
//!
//! The engine never matches on concrete block ids. Every behavior a block can
//! have (reacting to neighbors, random and scheduled ticks, placement checks)
//! is a plain function pointer stored in the block's [`BlockType`] record,
//! looked up by id in a [`BlockRegistry`].
//!
//! Behaviors take `&mut World` and may mutate freely through the mutation
//! gateway; each mutation fans out to at most six neighbors, so work stays
//! bounded by the region that actually changes.

use crate::world::World;
use crate::world::block::BlockId;
use crate::world::position::BlockPos;

/// Reaction to a face neighbor changing. Receives the id of the block that
/// changed.
pub type NeighborFn = fn(&mut World, BlockPos, BlockId);
/// Random or scheduled tick behavior.
pub type TickFn = fn(&mut World, BlockPos);
/// Placement / removal callback, run after the write.
pub type LifecycleFn = fn(&mut World, BlockPos);
/// Extra placement condition (e.g. "needs solid ground").
pub type CanPlaceFn = fn(&World, BlockPos) -> bool;

/// Physical material class of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Material {
    Air,
    Stone,
    Earth,
    Sand,
    Wood,
    Leaves,
    Glass,
    Ice,
    Snow,
    Water,
    Lava,
    Fire,
    Plant,
    Decoration,
    SnowLayer,
}

impl Material {
    /// Blocks movement and supports other blocks.
    pub const fn is_solid(self) -> bool {
        !matches!(
            self,
            Material::Air
                | Material::Water
                | Material::Lava
                | Material::Fire
                | Material::Plant
                | Material::Decoration
                | Material::SnowLayer
        )
    }

    pub const fn is_liquid(self) -> bool {
        matches!(self, Material::Water | Material::Lava)
    }

    /// Placing a block here replaces the current one instead of failing.
    pub const fn is_buildable_over(self) -> bool {
        matches!(
            self,
            Material::Air | Material::Water | Material::Lava | Material::Fire | Material::SnowLayer
        )
    }

    pub const fn is_flammable(self) -> bool {
        matches!(self, Material::Wood | Material::Leaves | Material::Plant)
    }
}

/// Collision shape used by the placement check against entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collision {
    None,
    Full,
    /// A box covering the full cell footprint up to the given height.
    Height(f64),
}

/// Everything the engine knows about one block id.
#[derive(Debug, Clone, Copy)]
pub struct BlockType {
    pub name: &'static str,
    pub material: Material,
    /// Light removed when passing through (0 transparent, 15 opaque).
    pub opacity: u8,
    /// Block light emitted.
    pub emission: u8,
    /// Blast resistance.
    pub resistance: f32,
    pub collision: Collision,
    /// Whether the ambient updater should call `on_random_tick`.
    pub random_ticks: bool,
    /// Default scheduled tick delay, in ticks.
    pub tick_rate: u64,
    pub on_neighbor_changed: Option<NeighborFn>,
    pub on_random_tick: Option<TickFn>,
    pub on_scheduled_tick: Option<TickFn>,
    pub on_placed: Option<LifecycleFn>,
    pub on_removed: Option<LifecycleFn>,
    pub can_place_at: Option<CanPlaceFn>,
}

impl BlockType {
    pub const fn new(name: &'static str, material: Material) -> Self {
        let solid = material.is_solid();
        Self {
            name,
            material,
            opacity: if solid { 15 } else { 0 },
            emission: 0,
            resistance: 0.0,
            collision: if solid { Collision::Full } else { Collision::None },
            random_ticks: false,
            tick_rate: 10,
            on_neighbor_changed: None,
            on_random_tick: None,
            on_scheduled_tick: None,
            on_placed: None,
            on_removed: None,
            can_place_at: None,
        }
    }

    pub const fn air() -> Self {
        Self::new("air", Material::Air)
    }

    /// An opaque full cube of stone-like material.
    pub const fn solid(name: &'static str) -> Self {
        Self::new(name, Material::Stone)
    }

    pub const fn with_opacity(mut self, opacity: u8) -> Self {
        self.opacity = opacity;
        self
    }

    pub const fn with_emission(mut self, emission: u8) -> Self {
        self.emission = emission;
        self
    }

    pub const fn with_resistance(mut self, resistance: f32) -> Self {
        self.resistance = resistance;
        self
    }

    pub const fn with_collision(mut self, collision: Collision) -> Self {
        self.collision = collision;
        self
    }

    pub const fn with_tick_rate(mut self, ticks: u64) -> Self {
        self.tick_rate = ticks;
        self
    }

    pub const fn neighbor(mut self, f: NeighborFn) -> Self {
        self.on_neighbor_changed = Some(f);
        self
    }

    pub const fn random_tick(mut self, f: TickFn) -> Self {
        self.random_ticks = true;
        self.on_random_tick = Some(f);
        self
    }

    pub const fn scheduled_tick(mut self, f: TickFn) -> Self {
        self.on_scheduled_tick = Some(f);
        self
    }

    pub const fn placed(mut self, f: LifecycleFn) -> Self {
        self.on_placed = Some(f);
        self
    }

    pub const fn removed(mut self, f: LifecycleFn) -> Self {
        self.on_removed = Some(f);
        self
    }

    pub const fn placement(mut self, f: CanPlaceFn) -> Self {
        self.can_place_at = Some(f);
        self
    }

    pub const fn is_solid(&self) -> bool {
        self.material.is_solid()
    }
}

/// Block ids the engine's weather effects place. Supplied by the game layer
/// so the engine stays id-agnostic; without it weather never forms blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherBlocks {
    pub snow_layer: BlockId,
    pub ice: BlockId,
    /// Still water that freezes into `ice`.
    pub freezing_water: BlockId,
    /// Placed at lightning strikes while raining.
    pub fire: BlockId,
}

/// Capability records for all 256 block ids. Unregistered ids behave like
/// air.
pub struct BlockRegistry {
    types: Vec<BlockType>,
    registered: [bool; 256],
    pub weather: Option<WeatherBlocks>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            types: vec![BlockType::air(); 256],
            registered: [false; 256],
            weather: None,
        }
    }

    pub fn register(&mut self, id: BlockId, block: BlockType) {
        self.types[id.0 as usize] = block;
        self.registered[id.0 as usize] = true;
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> &BlockType {
        &self.types[id.0 as usize]
    }

    pub fn is_registered(&self, id: BlockId) -> bool {
        self.registered[id.0 as usize]
    }

    /// Look up an id by its registered name.
    pub fn by_name(&self, name: &str) -> Option<BlockId> {
        (0..=255u8)
            .map(BlockId)
            .find(|id| self.is_registered(*id) && self.get(*id).name == name)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.iter().filter(|r| **r).count()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
