use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of blocks along the vertical axis of the world.
pub const WORLD_HEIGHT: i32 = 128;
/// Absolute horizontal coordinate bound (exclusive) for any block write.
pub const HORIZONTAL_LIMIT: i32 = 32_000_000;

/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.x >> 4,
            z: self.z >> 4,
        }
    }

    /// Position within the chunk. `y` is copied as-is; callers must check
    /// [`BlockPos::is_valid`] before indexing with it.
    pub const fn local(&self) -> LocalBlockPos {
        LocalBlockPos {
            x: (self.x & 0xF) as u8,
            y: self.y as u8,
            z: (self.z & 0xF) as u8,
        }
    }

    /// Whether this position lies inside the representable world volume.
    pub const fn is_valid(&self) -> bool {
        self.x >= -HORIZONTAL_LIMIT
            && self.x < HORIZONTAL_LIMIT
            && self.z >= -HORIZONTAL_LIMIT
            && self.z < HORIZONTAL_LIMIT
            && self.y >= 0
            && self.y < WORLD_HEIGHT
    }

    pub const fn add(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub const fn up(&self) -> Self {
        self.add(0, 1, 0)
    }

    pub const fn down(&self) -> Self {
        self.add(0, -1, 0)
    }

    pub const fn offset(&self, face: Face) -> Self {
        let (dx, dy, dz) = face.delta();
        self.add(dx, dy, dz)
    }

    /// The six face neighbors: down, up, north, south, west, east.
    pub const fn neighbors(&self) -> [BlockPos; 6] {
        [
            self.offset(Face::Down),
            self.offset(Face::Up),
            self.offset(Face::North),
            self.offset(Face::South),
            self.offset(Face::West),
            self.offset(Face::East),
        ]
    }

}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the six block faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    pub const fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Down => (0, -1, 0),
            Face::Up => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i32) -> BlockPos {
        BlockPos::new(self.x << 4, y, self.z << 4)
    }

    /// Chebyshev distance in chunks, the metric used for view radii.
    pub fn distance(&self, other: ChunkPos) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// Every chunk position of the square of `radius` around this one.
    pub fn square(self, radius: i32) -> impl Iterator<Item = ChunkPos> {
        (-radius..=radius)
            .flat_map(move |dx| (-radius..=radius).map(move |dz| ChunkPos::new(self.x + dx, self.z + dz)))
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Block position local to a chunk (x, z in 0..16, y in 0..128).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Index into the chunk block arrays (x-major, then z, then y).
    #[inline]
    pub const fn index(&self) -> usize {
        (self.x as usize) << 11 | (self.z as usize) << 7 | (self.y as usize)
    }

    /// Index into per-column arrays such as the height map.
    #[inline]
    pub const fn column(&self) -> usize {
        (self.z as usize) << 4 | (self.x as usize)
    }

    pub const fn to_world(&self, chunk: ChunkPos) -> BlockPos {
        BlockPos::new(
            (chunk.x << 4) + self.x as i32,
            self.y as i32,
            (chunk.z << 4) + self.z as i32,
        )
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Aabb {
    pub const fn new(min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64) -> Self {
        Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }

    /// A box of the given height resting on the floor of a block cell.
    pub fn block(pos: BlockPos, height: f64) -> Self {
        let (x, y, z) = (pos.x as f64, pos.y as f64, pos.z as f64);
        Self::new(x, y, z, x + 1.0, y + height, z + 1.0)
    }

    /// Box centered horizontally on `(x, z)` with feet at `y`.
    pub fn centered(x: f64, y: f64, z: f64, width: f64, height: f64) -> Self {
        let half = width / 2.0;
        Self::new(x - half, y, z - half, x + half, y + height, z + half)
    }

    /// Strict overlap test; touching faces do not intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        other.max_x > self.min_x
            && other.min_x < self.max_x
            && other.max_y > self.min_y
            && other.min_y < self.max_y
            && other.max_z > self.min_z
            && other.min_z < self.max_z
    }
}
