use super::position::BlockPos;
use serde::{Deserialize, Serialize};

/// Current on-disk format version of [`WorldData`].
pub const WORLD_DATA_VERSION: i32 = 19132;

/// Persisted world metadata (the contents of `level.dat`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldData {
    pub name: String,
    pub seed: i64,
    /// Ticks since world creation; time of day is `time % 24000`.
    pub time: u64,
    pub spawn: BlockPos,
    pub raining: bool,
    pub rain_time: i32,
    pub thundering: bool,
    pub thunder_time: i32,
    /// Wall-clock milliseconds of the last save.
    pub last_played: i64,
    pub version: i32,
}

impl WorldData {
    pub fn new(name: impl Into<String>, seed: i64) -> Self {
        Self {
            name: name.into(),
            seed,
            time: 0,
            spawn: BlockPos::new(0, 64, 0),
            raining: false,
            rain_time: 0,
            thundering: false,
            thunder_time: 0,
            last_played: 0,
            version: WORLD_DATA_VERSION,
        }
    }

    pub fn time_of_day(&self) -> u64 {
        self.time % 24_000
    }
}
