//! Delayed block ticks.
//!
//! A block asks to be revisited after a delay; when the time comes the
//! block's `on_scheduled_tick` runs, provided the same block type is still
//! there. Entries live in two collections that must always agree: a
//! `BTreeSet` ordered by due time (FIFO within a tick) and a `HashSet` keyed
//! by position and block id for duplicate suppression.

use crate::world::block::BlockId;
use crate::world::hook::{MutationContext, MutationKind};
use crate::world::position::BlockPos;
use crate::world::World;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

/// Scheduling and draining require the cube of this radius around the
/// position to be loaded.
pub const AREA_RADIUS: i32 = 8;

/// Identity of a scheduled tick: one pending entry per position and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickKey {
    pub pos: BlockPos,
    pub id: BlockId,
}

/// A pending tick. Ordered by due time, then insertion order.
#[derive(Debug, Clone, Copy)]
pub struct TickEntry {
    pub key: TickKey,
    pub due: u64,
    seq: u64,
}

impl PartialEq for TickEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TickEntry {}

impl PartialOrd for TickEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TickEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Default)]
pub struct ScheduledTicks {
    ordered: BTreeSet<TickEntry>,
    members: HashSet<TickKey>,
    next_seq: u64,
}

impl ScheduledTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry unless one with the same key is pending. An existing
    /// entry keeps its original due time.
    pub fn schedule(&mut self, key: TickKey, due: u64) -> bool {
        if !self.members.insert(key) {
            return false;
        }
        let entry = TickEntry {
            key,
            due,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.ordered.insert(entry);
        true
    }

    /// Remove and return the earliest entry if it is due at `now` (or
    /// regardless of time when `force` is set).
    pub fn pop_due(&mut self, now: u64, force: bool) -> Option<TickEntry> {
        let first = self.ordered.first()?;
        if !force && first.due > now {
            return None;
        }
        let entry = self.ordered.pop_first()?;
        self.members.remove(&entry.key);
        Some(entry)
    }

    pub fn contains(&self, key: &TickKey) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Entries in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &TickEntry> {
        self.ordered.iter()
    }

    /// Panics if the two views disagree. Divergence is a bug in this module,
    /// never a recoverable condition.
    pub fn verify(&self) {
        assert_eq!(
            self.ordered.len(),
            self.members.len(),
            "scheduled tick list out of sync"
        );
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&mut self, key: TickKey) {
        self.members.insert(key);
    }
}

impl World {
    /// Ask for `on_scheduled_tick` to run at `pos` after `delay` ticks if the
    /// block there is still `id`. Ignored when the surrounding area is not
    /// loaded or an identical request is already pending.
    pub fn schedule_tick(&mut self, pos: BlockPos, id: BlockId, delay: u64) -> bool {
        if !self.is_tick_area_loaded(pos) {
            return false;
        }
        let due = self.data.time.saturating_add(delay);
        self.ticks.schedule(TickKey { pos, id }, due)
    }

    /// Out-of-range positions never have a loaded area.
    fn is_tick_area_loaded(&self, pos: BlockPos) -> bool {
        pos.is_valid()
            && self.is_area_loaded(
                pos.add(-AREA_RADIUS, -AREA_RADIUS, -AREA_RADIUS),
                pos.add(AREA_RADIUS, AREA_RADIUS, AREA_RADIUS),
            )
    }

    /// Run due scheduled ticks, at most `tick_drain_cap` of them. With
    /// `force`, entries run regardless of due time. Returns whether entries
    /// remain.
    pub fn tick_scheduled(&mut self, force: bool) -> bool {
        self.drain_scheduled(force);
        !self.ticks.is_empty()
    }

    /// Returns how many behaviors actually ran.
    pub(crate) fn drain_scheduled(&mut self, force: bool) -> usize {
        self.ticks.verify();
        let cap = self.ticks.len().min(self.config.tick_drain_cap);
        let now = self.data.time;
        let mut ran = 0;
        for _ in 0..cap {
            let Some(entry) = self.ticks.pop_due(now, force) else {
                break;
            };
            if self.run_scheduled(entry) {
                ran += 1;
            }
        }
        self.ticks.verify();
        ran
    }

    fn run_scheduled(&mut self, entry: TickEntry) -> bool {
        let TickKey { pos, id } = entry.key;
        if !self.is_tick_area_loaded(pos) {
            return false;
        }
        let current = self.get_block(pos);
        if current.id != id || id.is_air() {
            return false;
        }
        let Some(behavior) = self.registry.get(id).on_scheduled_tick else {
            return false;
        };
        if !self.allows(MutationKind::ScheduledTick, pos, &MutationContext::new(current)) {
            return false;
        }
        behavior(self, pos);
        true
    }

    pub fn scheduled_ticks(&self) -> &ScheduledTicks {
        &self.ticks
    }
}
