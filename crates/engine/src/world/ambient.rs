//! Per-chunk ambient sampling: random block ticks, cave sounds and weather
//! effects.
//!
//! Probe positions come from a linear congruential stepper rather than the
//! world RNG. The probe count per chunk is fixed, so the cost of a tick does
//! not depend on what the chunks contain.

use super::World;
use super::block::BlockId;
use super::hook::{MutationContext, MutationKind};
use super::position::{BlockPos, ChunkPos, LocalBlockPos};
use crate::light::LightChannel;
use rand::Rng;

const LCG_INCREMENT: i32 = 1_013_904_223;
/// Cave sounds need a player within this distance of the probe...
const CAVE_SOUND_RANGE: f64 = 8.0;
/// ...but not closer than this (squared).
const CAVE_SOUND_MIN_DIST_SQ: f64 = 4.0;

impl World {
    fn step_lcg(&mut self) -> i32 {
        self.lcg = self.lcg.wrapping_mul(3).wrapping_add(LCG_INCREMENT);
        self.lcg >> 2
    }

    /// Decode a stepped LCG value into a chunk-local position.
    fn probe_pos(r: i32) -> LocalBlockPos {
        LocalBlockPos::new((r & 15) as u8, ((r >> 16) & 127) as u8, ((r >> 8) & 15) as u8)
    }

    pub(crate) fn next_cave_cooldown(&mut self) -> u32 {
        self.rng.gen_range(0..12_000) + 6_000
    }

    /// One ambient pass over every loaded chunk.
    pub fn tick_random_blocks(&mut self) {
        if self.cave_sound_cooldown > 0 {
            self.cave_sound_cooldown -= 1;
        }
        for pos in self.store.loaded_positions() {
            if !self.store.is_chunk_loaded(pos) {
                continue;
            }
            self.ambient_probe(pos);
            self.weather_effects(pos);
            self.random_ticks(pos);
        }
    }

    fn ambient_probe(&mut self, chunk: ChunkPos) {
        if self.cave_sound_cooldown > 0 {
            return;
        }
        let local = Self::probe_pos(self.step_lcg());
        let pos = local.to_world(chunk);
        if !self.get_type(pos).is_air() {
            return;
        }
        let threshold = self.rng.gen_range(0..8);
        if self.get_light(LightChannel::Block, pos) > threshold || self.get_light(LightChannel::Sky, pos) > 0 {
            return;
        }
        let (x, y, z) = (pos.x as f64 + 0.5, pos.y as f64 + 0.5, pos.z as f64 + 0.5);
        let nearest = self
            .players()
            .map(|(_, p)| {
                let (dx, dy, dz) = (p.x - x, p.y - y, p.z - z);
                dx * dx + dy * dy + dz * dz
            })
            .fold(f64::INFINITY, f64::min);
        if nearest <= CAVE_SOUND_RANGE * CAVE_SOUND_RANGE && nearest > CAVE_SOUND_MIN_DIST_SQ {
            for observer in &mut self.observers {
                observer.ambient_sound(x, y, z);
            }
            self.cave_sound_cooldown = self.next_cave_cooldown();
        }
    }

    fn weather_effects(&mut self, chunk: ChunkPos) {
        let Some(weather) = self.registry.weather else {
            return;
        };

        if self.rng.gen_range(0..100_000) == 0 && self.data.raining && self.data.thundering {
            let local = Self::probe_pos(self.step_lcg());
            let column = local.to_world(chunk);
            let pos = BlockPos::new(column.x, self.precipitation_height(column.x, column.z), column.z);
            if self.can_rain_at(pos) {
                self.strike_lightning(pos, weather.fire);
            }
        }

        if self.rng.gen_range(0..16) != 0 {
            return;
        }
        let local = Self::probe_pos(self.step_lcg());
        let column = local.to_world(chunk);
        let y = self.precipitation_height(column.x, column.z);
        let Some(biome) = self.store.chunk(chunk).map(|c| c.biome()) else {
            return;
        };
        if !biome.can_snow() || y < 1 || y >= 128 {
            return;
        }
        let pos = BlockPos::new(column.x, y, column.z);
        if self.get_light(LightChannel::Block, pos) >= 10 {
            return;
        }
        let below = pos.down();
        let below_block = self.get_block(below);

        let snow_fits = self.data.raining
            && self.get_type(pos).is_air()
            && !below_block.id.is_air()
            && below_block.id != weather.ice
            && self.registry.get(below_block.id).is_solid()
            && self.can_place_ignoring_hook(weather.snow_layer, pos);
        if snow_fits {
            self.form(pos, weather.snow_layer);
        }
        if below_block.id == weather.freezing_water && below_block.data == 0 {
            self.form(below, weather.ice);
        }
    }

    fn can_place_ignoring_hook(&self, id: BlockId, pos: BlockPos) -> bool {
        match self.registry.get(id).can_place_at {
            Some(rule) => rule(self, pos),
            None => true,
        }
    }

    fn form(&mut self, pos: BlockPos, id: BlockId) {
        let ctx = MutationContext::new(self.get_block(pos)).proposing(id.into());
        if self.allows(MutationKind::Form, pos, &ctx) {
            self.set_type(pos, id);
        }
    }

    /// Whether rain reaches this position.
    pub fn can_rain_at(&self, pos: BlockPos) -> bool {
        if !self.data.raining || !self.can_see_sky(pos) {
            return false;
        }
        if self.precipitation_height(pos.x, pos.z) > pos.y {
            return false;
        }
        self.store
            .chunk(pos.chunk())
            .is_some_and(|c| c.biome().can_rain() && !c.biome().can_snow())
    }

    fn strike_lightning(&mut self, pos: BlockPos, fire: BlockId) {
        tracing::debug!("lightning at {}", pos);
        for observer in &mut self.observers {
            observer.lightning(pos);
        }
        if !self.get_type(pos).is_air() || !self.can_place_ignoring_hook(fire, pos) {
            return;
        }
        let ctx = MutationContext::new(self.get_block(pos)).proposing(fire.into());
        if self.allows(MutationKind::Ignite, pos, &ctx) {
            self.set_type(pos, fire);
        }
    }

    fn random_ticks(&mut self, chunk: ChunkPos) {
        for _ in 0..self.config.random_ticks_per_chunk {
            let local = Self::probe_pos(self.step_lcg());
            self.random_tick_at(local.to_world(chunk));
        }
    }

    /// Run the random tick of the block at `pos` if it has one and the veto
    /// hook allows it. Returns whether the behavior ran.
    pub fn random_tick_at(&mut self, pos: BlockPos) -> bool {
        let current = self.get_block(pos);
        let ty = self.registry.get(current.id);
        if !ty.random_ticks {
            return false;
        }
        let Some(behavior) = ty.on_random_tick else {
            return false;
        };
        if !self.allows(MutationKind::RandomTick, pos, &MutationContext::new(current)) {
            return false;
        }
        behavior(self, pos);
        true
    }
}
