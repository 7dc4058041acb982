use serde::{Deserialize, Serialize};

/// Tunables of the simulation core. Every field has a default so partial
/// configuration files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Random probes per loaded chunk per tick.
    pub random_ticks_per_chunk: u32,
    /// Maximum scheduled ticks run by one drain.
    pub tick_drain_cap: usize,
    /// Maximum light regions recomputed by one drain.
    pub light_budget: usize,
    /// Pending light requests beyond this count are discarded.
    pub light_ceiling: usize,
    /// How many of the newest pending light requests a new one is checked
    /// against.
    pub light_lookback: usize,
    /// Chunk radius kept loaded around each player.
    pub view_radius: i32,
    /// Ticks a chunk must go unseen before it is unloaded.
    pub unload_grace_ticks: u64,
    /// Chunk radius around spawn that never unloads. Negative disables.
    pub spawn_keep_radius: i32,
    /// Ticks between automatic saves. Zero disables.
    pub autosave_interval: u64,
    pub has_sky: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            random_ticks_per_chunk: 80,
            tick_drain_cap: 1000,
            light_budget: 500,
            light_ceiling: 1_000_000,
            light_lookback: 5,
            view_radius: 10,
            unload_grace_ticks: 200,
            spawn_keep_radius: 8,
            autosave_interval: 6000,
            has_sky: true,
        }
    }
}
