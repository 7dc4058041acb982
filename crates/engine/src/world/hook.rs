//! Interposition points for code outside the core.
//!
//! A [`MutationHook`] is asked before structural mutations and may deny them;
//! a denied mutation leaves the world exactly as it was. [`WorldObserver`]s
//! are told about changes after the fact and cannot interfere.

use super::block::Block;
use super::position::BlockPos;

/// What kind of structural mutation is about to happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A block is being placed through the build-eligibility check.
    Place,
    Break,
    Explode,
    /// A neighbor-changed reaction is about to run.
    Physics,
    ScheduledTick,
    RandomTick,
    /// A block disappears on its own (ice melting, snow thawing).
    Fade,
    /// A block appears on its own (snow, ice).
    Form,
    Spread,
    Grow,
    Decay,
    Flow,
    Ignite,
    Burn,
    ChunkUnload,
    WeatherChange,
}

impl MutationKind {
    pub fn name(self) -> &'static str {
        match self {
            MutationKind::Place => "place",
            MutationKind::Break => "break",
            MutationKind::Explode => "explode",
            MutationKind::Physics => "physics",
            MutationKind::ScheduledTick => "scheduled-tick",
            MutationKind::RandomTick => "random-tick",
            MutationKind::Fade => "fade",
            MutationKind::Form => "form",
            MutationKind::Spread => "spread",
            MutationKind::Grow => "grow",
            MutationKind::Decay => "decay",
            MutationKind::Flow => "flow",
            MutationKind::Ignite => "ignite",
            MutationKind::Burn => "burn",
            MutationKind::ChunkUnload => "chunk-unload",
            MutationKind::WeatherChange => "weather-change",
        }
    }
}

/// Details handed to the veto hook.
#[derive(Debug, Clone, Default)]
pub struct MutationContext<'a> {
    /// Block currently at the position.
    pub current: Block,
    /// Block that would be there afterwards, when known.
    pub proposed: Option<Block>,
    /// Position of the block that caused this (the source of a flow, the
    /// changed neighbor of a physics update).
    pub cause: Option<BlockPos>,
    /// Every position affected, for multi-block mutations like explosions.
    pub affected: &'a [BlockPos],
}

impl MutationContext<'_> {
    pub fn new(current: Block) -> Self {
        Self {
            current,
            ..Default::default()
        }
    }

    pub fn proposing(mut self, block: Block) -> Self {
        self.proposed = Some(block);
        self
    }

    pub fn caused_by(mut self, pos: BlockPos) -> Self {
        self.cause = Some(pos);
        self
    }
}

/// External veto over structural mutations.
pub trait MutationHook: Send + Sync {
    /// Return `false` to cancel the mutation.
    fn should_proceed(&self, kind: MutationKind, pos: BlockPos, ctx: &MutationContext<'_>) -> bool;
}

/// Post-hoc notifications. Only `block_changed` is required.
pub trait WorldObserver: Send {
    fn block_changed(&mut self, pos: BlockPos, old: Block, new: Block);

    /// A cave sound should play at the given point.
    fn ambient_sound(&mut self, _x: f64, _y: f64, _z: f64) {}

    fn lightning(&mut self, _pos: BlockPos) {}

    /// The night was skipped; `time` is the new world time.
    fn time_skipped(&mut self, _time: u64) {}

    /// Called once at the end of every world tick.
    fn tick_finished(&mut self, _time: u64) {}
}
