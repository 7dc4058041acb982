//! Headless world server built on the voxelcraft engine.
//!
//! The engine simulates; this crate supplies the game: the beta block
//! catalog and its behaviors, terrain, region-file persistence, the plugin
//! hook registry and the operator-facing shell around the tick loop.

pub mod blocks;
pub mod config;
pub mod console;
pub mod event_bus;
pub mod generator;
pub mod metrics;
pub mod persistence;
pub mod player_registry;
