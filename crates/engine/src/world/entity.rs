use super::position::{Aabb, BlockPos, ChunkPos};
use slotmap::new_key_type;

new_key_type! {
    /// Handle to an entity in the world's entity table.
    pub struct EntityId;
}

/// Ticks a player must have been asleep before the night can be skipped.
pub const SLEEP_TICKS_REQUIRED: u32 = 100;

/// Minimal entity record: enough to answer placement collisions, chunk
/// membership and the sleep vote. Behavior lives outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub width: f64,
    pub height: f64,
    /// Player name, or `None` for non-player entities.
    pub player: Option<String>,
    pub sleeping: bool,
    pub sleep_ticks: u32,
    pub(crate) chunk: ChunkPos,
}

impl Entity {
    pub fn new(x: f64, y: f64, z: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            z,
            width,
            height,
            player: None,
            sleeping: false,
            sleep_ticks: 0,
            chunk: Self::chunk_of(x, z),
        }
    }

    /// A standard-sized player.
    pub fn player(name: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            player: Some(name.into()),
            ..Self::new(x, y, z, 0.6, 1.8)
        }
    }

    pub fn is_player(&self) -> bool {
        self.player.is_some()
    }

    pub fn bounding_box(&self) -> Aabb {
        Aabb::centered(self.x, self.y, self.z, self.width, self.height)
    }

    pub fn block_pos(&self) -> BlockPos {
        BlockPos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }

    pub fn chunk(&self) -> ChunkPos {
        self.chunk
    }

    pub fn is_fully_asleep(&self) -> bool {
        self.sleeping && self.sleep_ticks >= SLEEP_TICKS_REQUIRED
    }

    pub(crate) fn chunk_of(x: f64, z: f64) -> ChunkPos {
        ChunkPos::new((x.floor() as i32) >> 4, (z.floor() as i32) >> 4)
    }
}
