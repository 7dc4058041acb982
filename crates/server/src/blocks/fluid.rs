//! Water and lava.
//!
//! Fluid metadata is the flow distance: 0 is a source, 1..=7 the distance
//! from the nearest source, and 8 or more marks fluid falling from above.
//! Flowing blocks recompute their distance on a scheduled tick and settle
//! into the stationary variant once nothing changes; a stationary block
//! turns back into flowing fluid as soon as a neighbor changes.

use super::{COBBLESTONE, LAVA, OBSIDIAN, STATIONARY_LAVA, STATIONARY_WATER, WATER, horizontal_neighbors};
use rand::Rng;
use voxelcraft_engine::rules::{BlockType, Material};
use voxelcraft_engine::world::World;
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::hook::{MutationContext, MutationKind};
use voxelcraft_engine::world::position::BlockPos;

/// Flow distance at and beyond which a fluid stops spreading.
const MAX_DISTANCE: u8 = 8;
/// Metadata bit set on falling fluid.
const FALLING: u8 = 8;
/// How far the flow search looks for a drop.
const SEARCH_DEPTH: u32 = 4;
const NO_PATH: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidKind {
    Water,
    Lava,
}

impl FluidKind {
    pub fn of(id: BlockId) -> Option<Self> {
        match id {
            WATER | STATIONARY_WATER => Some(FluidKind::Water),
            LAVA | STATIONARY_LAVA => Some(FluidKind::Lava),
            _ => None,
        }
    }

    pub const fn flowing(self) -> BlockId {
        match self {
            FluidKind::Water => WATER,
            FluidKind::Lava => LAVA,
        }
    }

    pub const fn still(self) -> BlockId {
        match self {
            FluidKind::Water => STATIONARY_WATER,
            FluidKind::Lava => STATIONARY_LAVA,
        }
    }

    pub const fn material(self) -> Material {
        match self {
            FluidKind::Water => Material::Water,
            FluidKind::Lava => Material::Lava,
        }
    }

    pub const fn tick_rate(self) -> u64 {
        match self {
            FluidKind::Water => 5,
            FluidKind::Lava => 30,
        }
    }

    /// Distance added per block of horizontal spread.
    pub const fn step(self) -> u8 {
        match self {
            FluidKind::Water => 1,
            FluidKind::Lava => 2,
        }
    }
}

// ── Capability records ──

pub fn flowing(kind: FluidKind) -> BlockType {
    let base = match kind {
        FluidKind::Water => BlockType::new("water", Material::Water)
            .with_opacity(3)
            .with_resistance(60.0),
        FluidKind::Lava => BlockType::new("lava", Material::Lava)
            .with_opacity(15)
            .with_emission(15),
    };
    base.with_tick_rate(kind.tick_rate())
        .scheduled_tick(flow_tick)
        .placed(flowing_placed)
        .neighbor(flowing_neighbor_changed)
}

pub fn stationary(kind: FluidKind) -> BlockType {
    let base = match kind {
        FluidKind::Water => BlockType::new("stationary_water", Material::Water)
            .with_opacity(3)
            .with_resistance(60.0),
        FluidKind::Lava => BlockType::new("stationary_lava", Material::Lava)
            .with_opacity(15)
            .with_emission(15)
            .random_tick(lava_ignite_tick),
    };
    base.with_tick_rate(kind.tick_rate())
        .neighbor(stationary_neighbor_changed)
}

// ── Queries ──

/// Flow distance of `kind` at `pos`, or `None` if another block is there.
fn distance(world: &World, pos: BlockPos, kind: FluidKind) -> Option<u8> {
    let block = world.get_block(pos);
    (FluidKind::of(block.id) == Some(kind)).then_some(block.data)
}

/// Blocks that stop a fluid outright.
fn blocks_flow(world: &World, pos: BlockPos) -> bool {
    let id = world.get_type(pos);
    !id.is_air() && world.registry().get(id).is_solid()
}

/// Whether `kind` may wash into `pos`, replacing what is there.
fn can_displace(world: &World, pos: BlockPos, kind: FluidKind) -> bool {
    let material = super::material_at(world, pos);
    if material == kind.material() || material == Material::Lava {
        return false;
    }
    !blocks_flow(world, pos)
}

fn is_source(world: &World, pos: BlockPos, kind: FluidKind) -> bool {
    distance(world, pos, kind) == Some(0)
}

// ── Behaviors ──

fn flowing_placed(world: &mut World, pos: BlockPos) {
    let Some(kind) = FluidKind::of(world.get_type(pos)) else {
        return;
    };
    harden(world, pos, kind);
    if world.get_type(pos) == kind.flowing() {
        world.schedule_tick(pos, kind.flowing(), kind.tick_rate());
    }
}

fn flowing_neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    if let Some(kind) = FluidKind::of(world.get_type(pos)) {
        harden(world, pos, kind);
    }
}

fn stationary_neighbor_changed(world: &mut World, pos: BlockPos, _changed: BlockId) {
    let Some(kind) = FluidKind::of(world.get_type(pos)) else {
        return;
    };
    harden(world, pos, kind);
    if world.get_type(pos) != kind.still() {
        return;
    }
    let data = world.get_data(pos);
    world.set_type_and_data_raw(pos, kind.flowing(), data);
    world.schedule_tick(pos, kind.flowing(), kind.tick_rate());
}

/// Lava touching water turns into obsidian (sources) or cobblestone (short
/// flows).
fn harden(world: &mut World, pos: BlockPos, kind: FluidKind) {
    if kind != FluidKind::Lava {
        return;
    }
    let touches_water = horizontal_neighbors(pos)
        .into_iter()
        .chain([pos.up()])
        .any(|n| super::material_at(world, n) == Material::Water);
    if !touches_water {
        return;
    }
    let data = world.get_data(pos);
    let product = match data {
        0 => OBSIDIAN,
        1..=4 => COBBLESTONE,
        _ => return,
    };
    let ctx = MutationContext::new(world.get_block(pos)).proposing(product.into());
    if world.allows(MutationKind::Form, pos, &ctx) {
        world.set_type(pos, product);
    }
}

/// Settle into the stationary variant without notifying anyone.
fn settle(world: &mut World, pos: BlockPos, kind: FluidKind) {
    let data = world.get_data(pos);
    world.set_type_and_data_raw(pos, kind.still(), data);
}

/// Scheduled tick of a flowing block: recompute its distance, then spread
/// down or sideways.
fn flow_tick(world: &mut World, pos: BlockPos) {
    let Some(kind) = FluidKind::of(world.get_type(pos)) else {
        return;
    };
    let Some(mut level) = distance(world, pos, kind) else {
        return;
    };
    let step = kind.step();

    if level > 0 {
        let mut sources = 0;
        let mut smallest = None;
        for n in horizontal_neighbors(pos) {
            smallest = smallest_distance(world, n, kind, smallest, &mut sources);
        }

        let mut target = smallest.map(|d| d + step).filter(|d| *d < MAX_DISTANCE);
        if let Some(above) = distance(world, pos.up(), kind) {
            target = Some(if above >= FALLING { above } else { above + FALLING });
        }
        if sources >= 2 && kind == FluidKind::Water {
            let below = world.get_block(pos.down());
            if blocks_flow(world, pos.down()) || (FluidKind::of(below.id) == Some(kind) && below.data == 0) {
                target = Some(0);
            }
        }

        // Lava creeps forward hesitantly.
        let hesitates = kind == FluidKind::Lava
            && level < MAX_DISTANCE
            && target.is_some_and(|t| t < MAX_DISTANCE && t > level)
            && world.rng().gen_range(0..4) != 0;

        if hesitates {
            world.schedule_tick(pos, kind.flowing(), kind.tick_rate());
        } else if target == Some(level) {
            settle(world, pos, kind);
        } else {
            match target {
                None => {
                    world.set_type(pos, BlockId::AIR);
                    return;
                }
                Some(t) => {
                    level = t;
                    world.set_data(pos, t);
                    world.schedule_tick(pos, kind.flowing(), kind.tick_rate());
                }
            }
        }
    } else {
        settle(world, pos, kind);
    }

    let below = pos.down();
    if can_displace(world, below, kind) {
        let falling = if level >= FALLING { level } else { level + FALLING };
        flow_into(world, pos, below, kind, falling);
    } else if level == 0 || blocks_flow(world, below) {
        let next = if level >= FALLING { 1 } else { level + step };
        if next >= MAX_DISTANCE {
            return;
        }
        let directions = flow_directions(world, pos, kind);
        for (n, open) in horizontal_neighbors(pos).into_iter().zip(directions) {
            if open {
                flow_into(world, pos, n, kind, next);
            }
        }
    }
}

fn smallest_distance(
    world: &World,
    pos: BlockPos,
    kind: FluidKind,
    current: Option<u8>,
    sources: &mut u32,
) -> Option<u8> {
    let Some(mut d) = distance(world, pos, kind) else {
        return current;
    };
    if d == 0 {
        *sources += 1;
    }
    if d >= FALLING {
        d = 0;
    }
    match current {
        Some(c) if d >= c => Some(c),
        _ => Some(d),
    }
}

fn flow_into(world: &mut World, from: BlockPos, to: BlockPos, kind: FluidKind, level: u8) {
    if !to.is_valid() || !can_displace(world, to, kind) {
        return;
    }
    let ctx = MutationContext::new(world.get_block(to))
        .proposing(Block::new(kind.flowing(), level))
        .caused_by(from);
    if !world.allows(MutationKind::Flow, to, &ctx) {
        return;
    }
    world.set_type_and_data(to, kind.flowing(), level);
}

/// Horizontal directions (in [`horizontal_neighbors`] order) the fluid
/// should spread in: those with the shortest path to a drop within four
/// blocks, or all open directions when there is no drop nearby.
fn flow_directions(world: &World, pos: BlockPos, kind: FluidKind) -> [bool; 4] {
    let mut cost = [NO_PATH; 4];
    for (i, n) in horizontal_neighbors(pos).into_iter().enumerate() {
        if blocks_flow(world, n) || is_source(world, n, kind) {
            continue;
        }
        cost[i] = if blocks_flow(world, n.down()) {
            path_to_drop(world, n, kind, 1, i)
        } else {
            0
        };
    }
    let best = cost.iter().copied().min().unwrap_or(NO_PATH);
    cost.map(|c| c == best)
}

fn path_to_drop(world: &World, pos: BlockPos, kind: FluidKind, depth: u32, came_from: usize) -> u32 {
    let mut best = NO_PATH;
    for (i, n) in horizontal_neighbors(pos).into_iter().enumerate() {
        if i == came_from ^ 1 {
            continue;
        }
        if blocks_flow(world, n) || is_source(world, n, kind) {
            continue;
        }
        if !blocks_flow(world, n.down()) {
            return depth;
        }
        if depth < SEARCH_DEPTH {
            best = best.min(path_to_drop(world, n, kind, depth + 1, i));
        }
    }
    best
}

/// Still lava sets fire to flammable blocks above it now and then.
fn lava_ignite_tick(world: &mut World, pos: BlockPos) {
    let attempts = world.rng().gen_range(0..3);
    let mut at = pos;
    for _ in 0..attempts {
        let (dx, dz) = (world.rng().gen_range(-1..=1), world.rng().gen_range(-1..=1));
        at = at.add(dx, 1, dz);
        let id = world.get_type(at);
        if id.is_air() {
            if super::fire::has_flammable_neighbor(world, at) {
                let ctx = MutationContext::new(Block::AIR).proposing(super::FIRE.into()).caused_by(pos);
                if world.allows(MutationKind::Ignite, at, &ctx) {
                    world.set_type(at, super::FIRE);
                }
                return;
            }
        } else if world.registry().get(id).is_solid() {
            return;
        }
    }
}
