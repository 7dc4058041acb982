//! Plugin-style event plumbing around the engine.
//!
//! [`HookRegistry`] is the world's veto hook: listeners register for one
//! [`MutationKind`] with a priority and any of them can cancel the
//! mutation. [`ChangeBroadcaster`] is a world observer that publishes what
//! happened on a shared `tokio::sync::broadcast` channel so async tasks
//! (console, metrics, future network sessions) can follow along.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use voxelcraft_engine::world::block::Block;
use voxelcraft_engine::world::hook::{MutationContext, MutationHook, MutationKind, WorldObserver};
use voxelcraft_engine::world::position::BlockPos;

/// Recommended capacity for the broadcast channel.
/// 256 events in flight should handle bursty activity without lagging.
pub const BUS_CAPACITY: usize = 256;

// ── Veto listeners ──

/// A veto listener. Returns `false` to cancel.
pub type Listener = Box<dyn Fn(BlockPos, &MutationContext<'_>) -> bool + Send + Sync>;

struct Registered {
    name: String,
    priority: i32,
    listener: Listener,
}

/// Listeners keyed by mutation kind. Lower priorities run first; the first
/// denial short-circuits.
pub struct HookRegistry {
    listeners: DashMap<MutationKind, Vec<Registered>>,
    denied: AtomicU64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            denied: AtomicU64::new(0),
        }
    }

    /// Register `listener` for `kind` under `name`.
    pub fn register(
        &self,
        kind: MutationKind,
        name: impl Into<String>,
        priority: i32,
        listener: impl Fn(BlockPos, &MutationContext<'_>) -> bool + Send + Sync + 'static,
    ) {
        let mut entry = self.listeners.entry(kind).or_default();
        let list = entry.value_mut();
        let at = list.partition_point(|r| r.priority <= priority);
        list.insert(
            at,
            Registered {
                name: name.into(),
                priority,
                listener: Box::new(listener),
            },
        );
    }

    /// Remove every listener registered under `name`. Returns how many were
    /// removed.
    pub fn unregister(&self, name: &str) -> usize {
        let mut removed = 0;
        for mut entry in self.listeners.iter_mut() {
            let list = entry.value_mut();
            let before = list.len();
            list.retain(|r| r.name != name);
            removed += before - list.len();
        }
        removed
    }

    pub fn listener_count(&self, kind: MutationKind) -> usize {
        self.listeners.get(&kind).map(|l| l.len()).unwrap_or(0)
    }

    /// Names of the listeners for `kind`, in the order they run.
    pub fn listener_names(&self, kind: MutationKind) -> Vec<String> {
        self.listeners
            .get(&kind)
            .map(|l| l.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Mutations cancelled so far.
    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }
}

/// Protect the bottom layer: no breaking at y = 0, and no explosion that
/// would remove anything there.
pub fn protect_bedrock_floor(hooks: &HookRegistry) {
    hooks.register(MutationKind::Break, "bedrock-floor", 0, |pos, _| pos.y > 0);
    hooks.register(MutationKind::Explode, "bedrock-floor", 0, |pos, ctx| {
        pos.y > 0 && ctx.affected.iter().all(|p| p.y > 0)
    });
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationHook for HookRegistry {
    fn should_proceed(&self, kind: MutationKind, pos: BlockPos, ctx: &MutationContext<'_>) -> bool {
        let Some(listeners) = self.listeners.get(&kind) else {
            return true;
        };
        for registered in listeners.iter() {
            if !(registered.listener)(pos, ctx) {
                tracing::debug!("{} at {} denied by '{}'", kind.name(), pos, registered.name);
                self.denied.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        true
    }
}

// ── Change broadcast ──

/// A batch of block changes from a single world tick.
///
/// Uses `Arc<[...]>` so cloning per broadcast subscriber is just a refcount bump.
#[derive(Clone, Debug)]
pub struct WorldChangeBatch {
    pub time: u64,
    pub changes: Arc<[(BlockPos, Block)]>,
}

/// Everything the broadcaster publishes.
#[derive(Clone, Debug)]
pub enum WorldEvent {
    Blocks(WorldChangeBatch),
    Lightning(BlockPos),
    AmbientSound { x: f64, y: f64, z: f64 },
    NightSkipped { time: u64 },
}

/// World observer that collects block changes during a tick and publishes
/// them as one batch when the tick finishes. Other notifications go out
/// immediately.
pub struct ChangeBroadcaster {
    tx: broadcast::Sender<WorldEvent>,
    pending: Vec<(BlockPos, Block)>,
}

impl ChangeBroadcaster {
    pub fn new(tx: broadcast::Sender<WorldEvent>) -> Self {
        Self {
            tx,
            pending: Vec::new(),
        }
    }

    fn publish(&self, event: WorldEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl WorldObserver for ChangeBroadcaster {
    fn block_changed(&mut self, pos: BlockPos, _old: Block, new: Block) {
        self.pending.push((pos, new));
    }

    fn ambient_sound(&mut self, x: f64, y: f64, z: f64) {
        self.publish(WorldEvent::AmbientSound { x, y, z });
    }

    fn lightning(&mut self, pos: BlockPos) {
        self.publish(WorldEvent::Lightning(pos));
    }

    fn time_skipped(&mut self, time: u64) {
        self.publish(WorldEvent::NightSkipped { time });
    }

    fn tick_finished(&mut self, time: u64) {
        if self.pending.is_empty() {
            return;
        }
        let changes: Arc<[(BlockPos, Block)]> = std::mem::take(&mut self.pending).into();
        self.publish(WorldEvent::Blocks(WorldChangeBatch { time, changes }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxelcraft_engine::world::block::BlockId;

    fn ctx() -> MutationContext<'static> {
        MutationContext::new(Block::AIR)
    }

    #[test]
    fn listeners_run_in_priority_order() {
        let hooks = HookRegistry::new();
        hooks.register(MutationKind::Place, "late", 10, |_, _| true);
        hooks.register(MutationKind::Place, "early", -5, |_, _| true);
        hooks.register(MutationKind::Place, "middle", 0, |_, _| true);
        assert_eq!(hooks.listener_names(MutationKind::Place), ["early", "middle", "late"]);
    }

    #[test]
    fn any_denial_cancels() {
        let hooks = HookRegistry::new();
        let pos = BlockPos::new(0, 64, 0);
        hooks.register(MutationKind::Break, "allow", 0, |_, _| true);
        assert!(hooks.should_proceed(MutationKind::Break, pos, &ctx()));

        hooks.register(MutationKind::Break, "protect-spawn", 1, |p, _| p.y < 60);
        assert!(!hooks.should_proceed(MutationKind::Break, pos, &ctx()));
        assert!(hooks.should_proceed(MutationKind::Break, BlockPos::new(0, 10, 0), &ctx()));
        assert!(hooks.should_proceed(MutationKind::Place, pos, &ctx()));
        assert_eq!(hooks.denied(), 1);

        assert_eq!(hooks.unregister("protect-spawn"), 1);
        assert!(hooks.should_proceed(MutationKind::Break, pos, &ctx()));
    }

    #[test]
    fn bedrock_floor_survives_high_explosions() {
        let hooks = HookRegistry::new();
        protect_bedrock_floor(&hooks);
        let center = BlockPos::new(0, 3, 0);

        let shallow = [BlockPos::new(0, 2, 0), BlockPos::new(1, 3, 0)];
        let blast = MutationContext {
            affected: &shallow,
            ..MutationContext::new(Block::AIR)
        };
        assert!(hooks.should_proceed(MutationKind::Explode, center, &blast));

        let deep = [BlockPos::new(0, 2, 0), BlockPos::new(0, 0, 0)];
        let blast = MutationContext {
            affected: &deep,
            ..MutationContext::new(Block::AIR)
        };
        assert!(!hooks.should_proceed(MutationKind::Explode, center, &blast));
        assert!(!hooks.should_proceed(MutationKind::Break, BlockPos::new(4, 0, 4), &ctx()));
        assert!(hooks.should_proceed(MutationKind::Break, BlockPos::new(4, 1, 4), &ctx()));
    }

    #[test]
    fn changes_are_batched_per_tick() {
        let (tx, mut rx) = broadcast::channel(BUS_CAPACITY);
        let mut broadcaster = ChangeBroadcaster::new(tx);
        let stone = Block::new(BlockId(1), 0);
        broadcaster.block_changed(BlockPos::new(1, 2, 3), Block::AIR, stone);
        broadcaster.block_changed(BlockPos::new(1, 3, 3), Block::AIR, stone);
        broadcaster.lightning(BlockPos::new(0, 70, 0));
        broadcaster.tick_finished(11);
        broadcaster.tick_finished(12);

        assert!(matches!(rx.try_recv(), Ok(WorldEvent::Lightning(_))));
        match rx.try_recv() {
            Ok(WorldEvent::Blocks(batch)) => {
                assert_eq!(batch.time, 11);
                assert_eq!(batch.changes.len(), 2);
            }
            other => panic!("expected a block batch, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
