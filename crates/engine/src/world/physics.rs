use super::World;
use super::block::BlockId;
use super::hook::{MutationContext, MutationKind};
use super::position::BlockPos;

impl World {
    /// Tell the six face neighbors of `pos` that the block there changed to
    /// `changed`. Neighbors in unloaded chunks are skipped. Nothing happens
    /// in a static world or while physics is suppressed.
    pub fn apply_physics(&mut self, pos: BlockPos, changed: BlockId) {
        if self.is_static || self.physics_suppressed > 0 {
            return;
        }
        for neighbor in pos.neighbors() {
            if !neighbor.is_valid() || !self.store.is_chunk_loaded(neighbor.chunk()) {
                continue;
            }
            let current = self.get_block(neighbor);
            let Some(react) = self.registry.get(current.id).on_neighbor_changed else {
                continue;
            };
            let ctx = MutationContext::new(current).caused_by(pos);
            if !self.allows(MutationKind::Physics, neighbor, &ctx) {
                continue;
            }
            react(self, neighbor, changed);
        }
    }

    /// Run `edit` with physics propagation switched off, e.g. for bulk
    /// edits that should not cascade.
    pub fn with_physics_suppressed<R>(&mut self, edit: impl FnOnce(&mut World) -> R) -> R {
        self.physics_suppressed += 1;
        let result = edit(self);
        self.physics_suppressed -= 1;
        result
    }
}
