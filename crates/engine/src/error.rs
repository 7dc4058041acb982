use crate::world::position::ChunkPos;

/// Hard failures of the world core. Everything else (out-of-range writes,
/// vetoes, light overflow) is ordinary control flow and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("failed to load chunk {pos}")]
    ChunkLoad {
        pos: ChunkPos,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to save chunk {pos}")]
    ChunkSave {
        pos: ChunkPos,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read or write world data")]
    WorldData(#[source] anyhow::Error),

    #[error("failed to flush chunk storage")]
    Flush(#[source] anyhow::Error),
}

impl WorldError {
    /// The chunk involved, if any.
    pub fn chunk(&self) -> Option<ChunkPos> {
        match self {
            WorldError::ChunkLoad { pos, .. } | WorldError::ChunkSave { pos, .. } => Some(*pos),
            WorldError::WorldData(_) | WorldError::Flush(_) => None,
        }
    }
}
