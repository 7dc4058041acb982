//! Light update batching.
//!
//! Relight requests are queued as boxes per channel, coalesced against the
//! newest few pending boxes and drained newest-first under a per-call budget
//! (see `World::update_lighting`). Requests raised while a drain is running
//! are queued for later; a drain started from inside another one is refused.

mod propagate;

use crate::world::position::BlockPos;

/// One of the two independent light channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightChannel {
    Sky,
    Block,
}

impl LightChannel {
    /// Value assumed above the world.
    pub const fn default_value(self) -> u8 {
        match self {
            LightChannel::Sky => 15,
            LightChannel::Block => 0,
        }
    }
}

/// A request to recompute one channel over an inclusive box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightUpdate {
    pub channel: LightChannel,
    pub min: BlockPos,
    pub max: BlockPos,
}

impl LightUpdate {
    /// Corners may be given in any order.
    pub fn new(channel: LightChannel, a: BlockPos, b: BlockPos) -> Self {
        Self {
            channel,
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn volume(&self) -> i64 {
        let span = |lo: i32, hi: i32| hi as i64 - lo as i64 + 1;
        span(self.min.x, self.max.x)
            .saturating_mul(span(self.min.y, self.max.y))
            .saturating_mul(span(self.min.z, self.max.z))
    }

    pub fn contains(&self, other: &LightUpdate) -> bool {
        self.channel == other.channel
            && other.min.x >= self.min.x
            && other.min.y >= self.min.y
            && other.min.z >= self.min.z
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
            && other.max.z <= self.max.z
    }

    /// Fold `other` into this box if it is already covered, or if it lies
    /// within one block of it and growing to the union adds at most two
    /// positions.
    pub fn absorb(&mut self, other: &LightUpdate) -> bool {
        if self.contains(other) {
            return true;
        }
        if self.channel != other.channel
            || other.min.x < self.min.x.saturating_sub(1)
            || other.min.y < self.min.y.saturating_sub(1)
            || other.min.z < self.min.z.saturating_sub(1)
            || other.max.x > self.max.x.saturating_add(1)
            || other.max.y > self.max.y.saturating_add(1)
            || other.max.z > self.max.z.saturating_add(1)
        {
            return false;
        }
        let union = LightUpdate::new(
            self.channel,
            BlockPos::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            BlockPos::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        );
        if union.volume() - self.volume() > 2 {
            return false;
        }
        *self = union;
        true
    }
}

/// Pending light requests.
#[derive(Debug)]
pub struct LightBatch {
    pending: Vec<LightUpdate>,
    lookback: usize,
    ceiling: usize,
    /// Set while `World::update_lighting` runs.
    pub(crate) draining: bool,
}

impl LightBatch {
    pub fn new(lookback: usize, ceiling: usize) -> Self {
        Self {
            pending: Vec::new(),
            lookback,
            ceiling,
            draining: false,
        }
    }

    /// Queue a request unless one of the newest `lookback` pending entries
    /// absorbs it. Returns whether a new entry was appended.
    pub fn push(&mut self, update: LightUpdate) -> bool {
        let start = self.pending.len().saturating_sub(self.lookback);
        for existing in self.pending[start..].iter_mut().rev() {
            if existing.absorb(&update) {
                return false;
            }
        }
        self.pending.push(update);
        true
    }

    /// Newest pending request.
    pub fn pop(&mut self) -> Option<LightUpdate> {
        self.pending.pop()
    }

    /// Discard the whole backlog if it has grown past the ceiling. Returns
    /// whether it was discarded.
    pub fn check_overflow(&mut self) -> bool {
        if self.pending.len() <= self.ceiling {
            return false;
        }
        tracing::warn!(
            "light update backlog exceeded {} entries ({}), discarding",
            self.ceiling,
            self.pending.len()
        );
        self.pending.clear();
        true
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: i32, y: i32, z: i32) -> LightUpdate {
        LightUpdate::new(LightChannel::Block, BlockPos::new(x, y, z), BlockPos::new(x, y, z))
    }

    #[test]
    fn adjacent_single_blocks_merge() {
        let mut a = at(0, 0, 0);
        assert!(a.absorb(&at(1, 0, 0)));
        assert_eq!(a.volume(), 2);
        assert!(a.absorb(&at(2, 0, 0)));
        assert_eq!(a.max, BlockPos::new(2, 0, 0));
    }

    #[test]
    fn distant_or_bulky_boxes_stay_separate() {
        let mut a = at(0, 0, 0);
        assert!(!a.absorb(&at(2, 0, 0)));
        // Diagonal neighbor grows the box from 1 to 4.
        assert!(!a.absorb(&at(1, 1, 0)));
        let mut sky = LightUpdate::new(LightChannel::Sky, BlockPos::new(0, 0, 0), BlockPos::new(0, 0, 0));
        assert!(!sky.absorb(&at(0, 0, 0)));
    }

    #[test]
    fn only_the_lookback_window_is_checked() {
        let mut batch = LightBatch::new(2, 100);
        assert!(batch.push(at(0, 0, 0)));
        assert!(batch.push(at(10, 0, 0)));
        assert!(batch.push(at(20, 0, 0)));
        // (0,0,0) is three entries back, outside the window.
        assert!(batch.push(at(0, 0, 0)));
        assert_eq!(batch.len(), 4);
        assert!(!batch.push(at(20, 0, 0)));
        assert_eq!(batch.pop(), Some(at(0, 0, 0)));
    }

    #[test]
    fn extreme_boxes_do_not_overflow() {
        let whole = LightUpdate::new(
            LightChannel::Block,
            BlockPos::new(i32::MIN, 0, 0),
            BlockPos::new(i32::MAX, 0, 0),
        );
        assert_eq!(whole.volume(), 1 << 32);

        let mut edge = at(i32::MAX, 0, 0);
        assert!(edge.absorb(&at(i32::MAX, 0, 0)));
        assert!(!edge.absorb(&at(i32::MIN, 0, 0)));
        assert_eq!(edge.volume(), 1);
    }
}
