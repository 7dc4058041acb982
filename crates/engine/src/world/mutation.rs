//! The block grid's read and write entry points.
//!
//! Raw writes change storage only. Notifying writes additionally run block
//! lifecycle callbacks, queue light work for light-relevant changes, inform
//! observers and fan out physics to the six neighbors.

use super::World;
use super::block::{Block, BlockId};
use super::chunk::HeightChange;
use super::hook::{MutationContext, MutationKind};
use super::position::{Aabb, BlockPos, ChunkPos, WORLD_HEIGHT};
use crate::light::LightChannel;
use crate::rules::Collision;
use rand::Rng;
use std::collections::HashSet;

impl World {
    // ── Queries ──

    /// Block id at `pos`; air for unloaded chunks and out-of-range positions.
    pub fn get_type(&self, pos: BlockPos) -> BlockId {
        self.get_block(pos).id
    }

    pub fn get_data(&self, pos: BlockPos) -> u8 {
        self.get_block(pos).data
    }

    pub fn get_block(&self, pos: BlockPos) -> Block {
        if !pos.is_valid() {
            return Block::AIR;
        }
        self.store
            .chunk(pos.chunk())
            .map(|chunk| chunk.block(pos.local()))
            .unwrap_or(Block::AIR)
    }

    /// Stored light of one channel. Above the world the channel's default
    /// applies; below it, and in unloaded chunks, light is zero.
    pub fn get_light(&self, channel: LightChannel, pos: BlockPos) -> u8 {
        if pos.y >= WORLD_HEIGHT {
            return channel.default_value();
        }
        if !pos.is_valid() {
            return 0;
        }
        let Some(chunk) = self.store.chunk(pos.chunk()) else {
            return 0;
        };
        match channel {
            LightChannel::Sky => chunk.sky_light(pos.local()),
            LightChannel::Block => chunk.block_light(pos.local()),
        }
    }

    /// Effective brightness: sky light dimmed by time of day and weather,
    /// or block light, whichever is brighter.
    pub fn get_light_level(&self, pos: BlockPos) -> u8 {
        let sky = self
            .get_light(LightChannel::Sky, pos)
            .saturating_sub(self.sky_subtracted);
        sky.max(self.get_light(LightChannel::Block, pos))
    }

    pub fn set_light_raw(&mut self, channel: LightChannel, pos: BlockPos, value: u8) -> bool {
        if !pos.is_valid() {
            return false;
        }
        let Some(chunk) = self.store.chunk_mut(pos.chunk()) else {
            return false;
        };
        match channel {
            LightChannel::Sky => chunk.set_sky_light(pos.local(), value),
            LightChannel::Block => chunk.set_block_light(pos.local(), value),
        }
        true
    }

    /// Lowest y at which the column `(x, z)` is open to the sky. Zero for
    /// unloaded columns.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let pos = BlockPos::new(x, 0, z);
        self.store
            .chunk(pos.chunk())
            .map(|chunk| {
                let local = pos.local();
                chunk.height(local.x, local.z) as i32
            })
            .unwrap_or(0)
    }

    pub fn can_see_sky(&self, pos: BlockPos) -> bool {
        if pos.y >= WORLD_HEIGHT {
            return true;
        }
        if !pos.is_valid() {
            return false;
        }
        self.store
            .chunk(pos.chunk())
            .is_some_and(|chunk| chunk.can_see_sky(pos.local()))
    }

    /// First y above the topmost solid or liquid block in a column: where
    /// rain lands.
    pub fn precipitation_height(&self, x: i32, z: i32) -> i32 {
        let mut y = WORLD_HEIGHT - 1;
        while y > 0 {
            let material = self.registry.get(self.get_type(BlockPos::new(x, y, z))).material;
            if material.is_solid() || material.is_liquid() {
                return y + 1;
            }
            y -= 1;
        }
        -1
    }

    /// Whether every chunk touched by the box is loaded. Boxes entirely
    /// above or below the world are never loaded.
    pub fn is_area_loaded(&self, min: BlockPos, max: BlockPos) -> bool {
        if max.y < 0 || min.y >= WORLD_HEIGHT {
            return false;
        }
        let (lo, hi) = (min.chunk(), max.chunk());
        (lo.x..=hi.x).all(|cx| (lo.z..=hi.z).all(|cz| self.store.is_chunk_loaded(ChunkPos::new(cx, cz))))
    }

    // ── Raw writes ──

    fn write_raw(&mut self, pos: BlockPos, block: Block) -> Option<(Block, Option<HeightChange>)> {
        if !pos.is_valid() || !self.ensure_chunk(pos.chunk()) {
            return None;
        }
        let chunk = self.store.chunk_mut(pos.chunk())?;
        chunk.set_block(pos.local(), block, &self.registry)
    }

    /// Write a block type (resetting metadata) without any side effects.
    pub fn set_type_raw(&mut self, pos: BlockPos, id: BlockId) -> bool {
        self.write_raw(pos, Block::new(id, 0)).is_some()
    }

    pub fn set_type_and_data_raw(&mut self, pos: BlockPos, id: BlockId, data: u8) -> bool {
        self.write_raw(pos, Block::new(id, data)).is_some()
    }

    /// Write only metadata without side effects. False if unchanged or out
    /// of range.
    pub fn set_data_raw(&mut self, pos: BlockPos, data: u8) -> bool {
        self.write_data_raw(pos, data).is_some()
    }

    fn write_data_raw(&mut self, pos: BlockPos, data: u8) -> Option<u8> {
        if !pos.is_valid() || !self.ensure_chunk(pos.chunk()) {
            return None;
        }
        self.store.chunk_mut(pos.chunk())?.set_data(pos.local(), data)
    }

    // ── Notifying writes ──

    /// Set a block type with metadata 0 and notify.
    pub fn set_type(&mut self, pos: BlockPos, id: BlockId) -> bool {
        self.set_type_and_data(pos, id, 0)
    }

    pub fn set_type_and_data(&mut self, pos: BlockPos, id: BlockId, data: u8) -> bool {
        let new = Block::new(id, data);
        let Some((old, height)) = self.write_raw(pos, new) else {
            return false;
        };
        self.after_write(pos, old, new, height);
        true
    }

    /// Set metadata and notify. False if unchanged or out of range.
    pub fn set_data(&mut self, pos: BlockPos, data: u8) -> bool {
        let Some(old_data) = self.write_data_raw(pos, data) else {
            return false;
        };
        let id = self.get_type(pos);
        self.after_write(pos, Block::new(id, old_data), Block::new(id, data), None);
        true
    }

    fn after_write(&mut self, pos: BlockPos, old: Block, new: Block, height: Option<HeightChange>) {
        let old_type = *self.registry.get(old.id);

        if old.id != new.id {
            let new_type = *self.registry.get(new.id);
            if let Some(removed) = old_type.on_removed {
                removed(self, pos);
            }
            if let Some(placed) = new_type.on_placed {
                placed(self, pos);
            }
        }

        // Lifecycle callbacks may have rewritten the cell (lava hardening,
        // a torch picking its support). Report what is stored now.
        let new = self.get_block(pos);
        let new_type = *self.registry.get(new.id);

        if old_type.opacity != new_type.opacity || old_type.emission != new_type.emission {
            self.request_light_update(LightChannel::Sky, pos, pos);
            self.request_light_update(LightChannel::Block, pos, pos);
        }
        if let Some(change) = height {
            self.request_light_update(
                LightChannel::Sky,
                BlockPos::new(pos.x - 1, change.min_y(), pos.z - 1),
                BlockPos::new(pos.x + 1, change.max_y(), pos.z + 1),
            );
        }

        for observer in &mut self.observers {
            observer.block_changed(pos, old, new);
        }
        self.apply_physics(pos, new.id);
    }

    // ── Build eligibility ──

    /// Whether a block of type `id` may be placed at `pos`: nothing solid
    /// is in the way, no entity overlaps its collision box, the block's own
    /// placement rule agrees and the veto hook allows it.
    pub fn can_place(&self, id: BlockId, pos: BlockPos, ignore_entities: bool) -> bool {
        if id.is_air() || !pos.is_valid() {
            return false;
        }
        let current = self.get_block(pos);
        let ty = self.registry.get(id);

        if !ignore_entities {
            let collision = match ty.collision {
                Collision::None => None,
                Collision::Full => Some(Aabb::block(pos, 1.0)),
                Collision::Height(h) => Some(Aabb::block(pos, h)),
            };
            if let Some(bounds) = collision {
                if self.entities.values().any(|e| e.bounding_box().intersects(&bounds)) {
                    return false;
                }
            }
        }

        if !self.registry.get(current.id).material.is_buildable_over() {
            return false;
        }
        if let Some(rule) = ty.can_place_at {
            if !rule(self, pos) {
                return false;
            }
        }
        let ctx = MutationContext::new(current).proposing(Block::from(id));
        self.allows(MutationKind::Place, pos, &ctx)
    }

    /// Place a block if [`World::can_place`] agrees.
    pub fn place_block(&mut self, pos: BlockPos, id: BlockId, data: u8) -> bool {
        if !self.can_place(id, pos, false) {
            return false;
        }
        self.set_type_and_data(pos, id, data)
    }

    /// Remove a block, subject to the veto hook.
    pub fn break_block(&mut self, pos: BlockPos) -> bool {
        let current = self.get_block(pos);
        if current.id.is_air() {
            return false;
        }
        let ctx = MutationContext::new(current).proposing(Block::AIR);
        if !self.allows(MutationKind::Break, pos, &ctx) {
            return false;
        }
        self.set_type(pos, BlockId::AIR)
    }

    /// Blow up blocks around a point. Rays are cast outward from the center
    /// and lose strength with distance and block resistance; every block a
    /// ray reaches is removed. The veto hook sees the whole set once.
    /// Returns how many blocks were removed.
    pub fn explode(&mut self, x: f64, y: f64, z: f64, power: f32) -> usize {
        const STEPS: i32 = 16;
        const STEP: f32 = 0.3;

        let mut affected = HashSet::new();
        for i in 0..STEPS {
            for j in 0..STEPS {
                for k in 0..STEPS {
                    let on_face = i == 0 || i == STEPS - 1 || j == 0 || j == STEPS - 1 || k == 0 || k == STEPS - 1;
                    if !on_face {
                        continue;
                    }
                    let mut dx = i as f64 / (STEPS - 1) as f64 * 2.0 - 1.0;
                    let mut dy = j as f64 / (STEPS - 1) as f64 * 2.0 - 1.0;
                    let mut dz = k as f64 / (STEPS - 1) as f64 * 2.0 - 1.0;
                    let len = (dx * dx + dy * dy + dz * dz).sqrt();
                    dx /= len;
                    dy /= len;
                    dz /= len;

                    let mut strength = power * (0.7 + self.rng.gen_range(0.0..0.6f32));
                    let (mut px, mut py, mut pz) = (x, y, z);
                    while strength > 0.0 {
                        let pos = BlockPos::new(px.floor() as i32, py.floor() as i32, pz.floor() as i32);
                        let id = self.get_type(pos);
                        if !id.is_air() {
                            strength -= (self.registry.get(id).resistance + 0.3) * STEP;
                        }
                        if strength > 0.0 && pos.is_valid() {
                            affected.insert(pos);
                        }
                        px += dx * STEP as f64;
                        py += dy * STEP as f64;
                        pz += dz * STEP as f64;
                        strength -= STEP * 0.75;
                    }
                }
            }
        }

        let mut targets: Vec<BlockPos> = affected
            .into_iter()
            .filter(|pos| !self.get_type(*pos).is_air())
            .collect();
        targets.sort_by_key(|p| (p.y, p.x, p.z));

        let center = BlockPos::new(x.floor() as i32, y.floor() as i32, z.floor() as i32);
        let ctx = MutationContext {
            current: self.get_block(center),
            proposed: Some(Block::AIR),
            cause: None,
            affected: &targets,
        };
        if !self.allows(MutationKind::Explode, center, &ctx) {
            return 0;
        }
        targets
            .iter()
            .filter(|pos| self.set_type(**pos, BlockId::AIR))
            .count()
    }
}
