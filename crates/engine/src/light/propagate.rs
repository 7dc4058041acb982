use super::{LightChannel, LightUpdate};
use crate::world::World;
use crate::world::position::{BlockPos, HORIZONTAL_LIMIT, WORLD_HEIGHT};

/// Regions larger than this are skipped rather than recomputed.
const MAX_REGION_VOLUME: i64 = 32_768;

fn within_limit(pos: BlockPos) -> bool {
    (-HORIZONTAL_LIMIT..=HORIZONTAL_LIMIT).contains(&pos.x)
        && (-HORIZONTAL_LIMIT..=HORIZONTAL_LIMIT).contains(&pos.z)
}

impl World {
    /// Queue a relight of `channel` over the box spanned by `a` and `b`.
    ///
    /// Dropped when a corner lies past the horizontal world limit, when the
    /// box's center column is not loaded, or when the world has no sky and
    /// `channel` is sky. Requests raised during a drain are queued normally.
    pub fn request_light_update(&mut self, channel: LightChannel, a: BlockPos, b: BlockPos) {
        if channel == LightChannel::Sky && !self.config.has_sky {
            return;
        }
        if !within_limit(a) || !within_limit(b) {
            return;
        }
        let update = LightUpdate::new(channel, a, b);
        let center = BlockPos::new(
            update.min.x + (update.max.x - update.min.x) / 2,
            64,
            update.min.z + (update.max.z - update.min.z) / 2,
        );
        if !self.store.is_chunk_loaded(center.chunk()) {
            return;
        }
        self.light.push(update);
    }

    /// Recompute up to `light_budget` pending regions, newest first. Returns
    /// whether work remains. A drain started from inside another drain
    /// returns false and leaves the queue alone.
    pub fn update_lighting(&mut self) -> bool {
        if self.light.draining {
            return false;
        }
        if self.light.check_overflow() {
            return false;
        }
        self.light.draining = true;
        let mut budget = self.config.light_budget;
        while budget > 0 {
            let Some(update) = self.light.pop() else {
                break;
            };
            self.relight_region(&update);
            budget -= 1;
        }
        self.light.draining = false;
        !self.light.is_empty()
    }

    /// Number of pending light requests.
    pub fn pending_light_updates(&self) -> usize {
        self.light.len()
    }

    fn relight_region(&mut self, update: &LightUpdate) {
        if update.volume() > MAX_REGION_VOLUME {
            tracing::debug!("skipping oversized light region {} .. {}", update.min, update.max);
            return;
        }
        let channel = update.channel;
        for x in update.min.x..=update.max.x {
            for z in update.min.z..=update.max.z {
                if !self.store.is_chunk_loaded(BlockPos::new(x, 0, z).chunk()) {
                    continue;
                }
                for y in update.min.y.max(0)..=update.max.y.min(WORLD_HEIGHT - 1) {
                    self.relight_position(channel, BlockPos::new(x, y, z));
                }
            }
        }
    }

    fn relight_position(&mut self, channel: LightChannel, pos: BlockPos) {
        if !pos.is_valid() {
            return;
        }
        let current = self.get_light(channel, pos);
        let ty = self.registry.get(self.get_type(pos));
        let opacity = ty.opacity.max(1);
        let source = self.light_source(channel, pos);

        let target = if opacity >= 15 && source == 0 {
            0
        } else {
            let brightest = pos
                .neighbors()
                .iter()
                .map(|n| self.get_light(channel, *n))
                .max()
                .unwrap_or(0);
            source.max(brightest.saturating_sub(opacity))
        };
        if target == current {
            return;
        }
        self.set_light_raw(channel, pos, target);

        let spread = target.saturating_sub(1);
        for neighbor in pos.neighbors() {
            if !neighbor.is_valid() || !self.store.is_chunk_loaded(neighbor.chunk()) {
                continue;
            }
            let expected = spread.max(self.light_source(channel, neighbor));
            if self.get_light(channel, neighbor) != expected {
                self.request_light_update(channel, neighbor, neighbor);
            }
        }
    }

    /// Light a position produces by itself: full sky under open sky, or the
    /// block's emission.
    fn light_source(&self, channel: LightChannel, pos: BlockPos) -> u8 {
        match channel {
            LightChannel::Sky => {
                if self.can_see_sky(pos) {
                    15
                } else {
                    0
                }
            }
            LightChannel::Block => self.registry.get(self.get_type(pos)).emission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::BlockRegistry;
    use crate::world::config::WorldConfig;
    use crate::world::data::WorldData;
    use crate::world::position::ChunkPos;
    use crate::world::store::{EmptyGenerator, MemoryStorage};
    use std::sync::Arc;

    fn world() -> World {
        let mut world = World::new(
            WorldConfig::default(),
            WorldData::new("light", 3),
            Arc::new(BlockRegistry::new()),
            Box::new(EmptyGenerator),
            Box::new(MemoryStorage::new()),
        );
        world.preload(ChunkPos::new(0, 0), 0).unwrap();
        world
    }

    #[test]
    fn nested_drain_is_refused() {
        let mut world = world();
        let pos = BlockPos::new(4, 10, 4);
        world.request_light_update(LightChannel::Block, pos, pos);

        world.light.draining = true;
        assert!(!world.update_lighting());
        assert_eq!(world.pending_light_updates(), 1);

        world.light.draining = false;
        assert!(!world.update_lighting());
        assert_eq!(world.pending_light_updates(), 0);
    }
}
