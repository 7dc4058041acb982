//! Game-agnostic voxel world core.
//!
//! The engine owns block storage, light propagation, delayed block ticks and
//! the per-tick simulation step. It never interprets block ids itself: every
//! behavior arrives through the [`rules::BlockRegistry`] capability table that
//! a game layer fills in.

pub mod error;
pub mod light;
pub mod rules;
pub mod tick;
pub mod world;

pub use error::WorldError;
pub use world::World;
