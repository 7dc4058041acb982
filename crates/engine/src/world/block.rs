/// Opaque block type identifier. The engine stores these without interpreting
/// them; game layers assign meaning to specific ids through the block
/// registry.
///
/// The only semantic the engine enforces is that `BlockId::AIR` (0) is the
/// empty block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockId(pub u8);

impl BlockId {
    /// The universal "empty" block.
    pub const AIR: BlockId = BlockId(0);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Block identity at a coordinate: type id plus 4-bit metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Block {
    pub id: BlockId,
    pub data: u8,
}

impl Block {
    pub const AIR: Block = Block {
        id: BlockId::AIR,
        data: 0,
    };

    /// Metadata is masked to its 4 bits.
    pub const fn new(id: BlockId, data: u8) -> Self {
        Self { id, data: data & 0xF }
    }
}

impl From<BlockId> for Block {
    fn from(id: BlockId) -> Self {
        Block::new(id, 0)
    }
}
