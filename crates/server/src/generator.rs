//! Superflat terrain.

use crate::blocks::{BEDROCK, DIRT, GRASS, STONE};
use voxelcraft_engine::world::block::{Block, BlockId};
use voxelcraft_engine::world::chunk::{Biome, CHUNK_HEIGHT, CHUNK_WIDTH, Chunk};
use voxelcraft_engine::world::position::{ChunkPos, LocalBlockPos};
use voxelcraft_engine::world::store::ChunkGenerator;

/// Fills every chunk with the same stack of layers, bottom up.
#[derive(Debug, Clone)]
pub struct FlatGenerator {
    layers: Vec<(BlockId, u8)>,
    biome: Biome,
}

impl FlatGenerator {
    /// Bedrock at y = 0, stone up to 58, three layers of dirt and grass on
    /// top at y = 62.
    pub fn classic() -> Self {
        Self::new(vec![(BEDROCK, 1), (STONE, 58), (DIRT, 3), (GRASS, 1)])
    }

    pub fn new(layers: Vec<(BlockId, u8)>) -> Self {
        Self {
            layers,
            biome: Biome::Plains,
        }
    }

    pub fn with_biome(mut self, biome: Biome) -> Self {
        self.biome = biome;
        self
    }

    /// Y of the topmost generated block, or `None` for an empty stack.
    pub fn surface(&self) -> Option<i32> {
        let total: i32 = self.layers.iter().map(|(_, n)| *n as i32).sum();
        (total > 0).then(|| total.min(CHUNK_HEIGHT as i32) - 1)
    }
}

impl Default for FlatGenerator {
    fn default() -> Self {
        Self::classic()
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&self, pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::new(pos);
        chunk.set_biome(self.biome);
        let column: Vec<BlockId> = self
            .layers
            .iter()
            .flat_map(|(id, count)| std::iter::repeat_n(*id, *count as usize))
            .take(CHUNK_HEIGHT)
            .collect();
        for x in 0..CHUNK_WIDTH as u8 {
            for z in 0..CHUNK_WIDTH as u8 {
                for (y, id) in column.iter().enumerate() {
                    chunk.put_block(LocalBlockPos::new(x, y as u8, z), Block::from(*id));
                }
            }
        }
        chunk.populated = true;
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_layers() {
        let generator = FlatGenerator::classic();
        let chunk = generator.generate(ChunkPos::new(3, -2));
        assert_eq!(chunk.block_id(LocalBlockPos::new(0, 0, 0)), BEDROCK);
        assert_eq!(chunk.block_id(LocalBlockPos::new(5, 1, 5)), STONE);
        assert_eq!(chunk.block_id(LocalBlockPos::new(5, 58, 5)), STONE);
        assert_eq!(chunk.block_id(LocalBlockPos::new(5, 59, 5)), DIRT);
        assert_eq!(chunk.block_id(LocalBlockPos::new(15, 62, 15)), GRASS);
        assert!(chunk.block_id(LocalBlockPos::new(15, 63, 15)).is_air());
        assert_eq!(generator.surface(), Some(62));
    }

    #[test]
    fn biome_is_stamped_on_chunks() {
        let chunk = FlatGenerator::classic()
            .with_biome(Biome::Tundra)
            .generate(ChunkPos::new(0, 0));
        assert_eq!(chunk.biome(), Biome::Tundra);
    }
}
