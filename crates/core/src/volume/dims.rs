//! Volume dimensions and the packed addressing contract

use crate::error::{Error, Result};
use crate::volume::Position;

/// Edge length of a storage tile, in voxels
pub const TILE_EDGE: i32 = 4;
/// Bits (voxels) per tile
pub const TILE_BITS: usize = 64;
/// Machine words per tile
pub const WORDS_PER_TILE: usize = 2;
/// Bits per machine word
pub const WORD_BITS: usize = 32;

/// Dimensions of a 3D voxel volume.
///
/// `VolumeDims` owns the two addressing contracts every algorithm relies on:
///
/// - the linear index `z * width * height + y * width + x`, used for pore-map
///   keys and front lists;
/// - the packed word address: the volume is partitioned into 4x4x4-voxel
///   tiles of 64 bits (two u32 words), a voxel's tile comes from `x >> 2`,
///   `y >> 2`, `z >> 2` and its intra-tile bit from the low two bits of each
///   coordinate, so a small search window touches few cache lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeDims {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
}

impl VolumeDims {
    /// Create validated dimensions.
    ///
    /// All axes must be positive and the voxel count must stay below 2^31 so
    /// linear indices fit the persisted `i32` representation.
    pub fn new(width: i32, height: i32, depth: i32) -> Result<Self> {
        if width <= 0 || height <= 0 || depth <= 0 {
            return Err(Error::InvalidDimensions {
                width,
                height,
                depth,
            });
        }
        let voxels = width as i64 * height as i64 * depth as i64;
        if voxels > i32::MAX as i64 {
            return Err(Error::InvalidParameter {
                name: "dimensions",
                value: format!("{}x{}x{}", width, height, depth),
                reason: "volume exceeds 2^31 - 1 voxels".to_string(),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
        })
    }

    /// Total number of voxels
    pub fn voxel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Voxels per z-slice
    pub fn slice_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Tile grid extents per axis
    pub fn tiles(&self) -> (i32, i32, i32) {
        (
            (self.width + TILE_EDGE - 1) / TILE_EDGE,
            (self.height + TILE_EDGE - 1) / TILE_EDGE,
            (self.depth + TILE_EDGE - 1) / TILE_EDGE,
        )
    }

    /// Number of u32 words backing the packed buffer
    pub fn word_count(&self) -> usize {
        let (tx, ty, tz) = self.tiles();
        tx as usize * ty as usize * tz as usize * WORDS_PER_TILE
    }

    /// Whether a position lies inside the volume
    pub fn contains(&self, p: Position) -> bool {
        p.x >= 0
            && p.x < self.width
            && p.y >= 0
            && p.y < self.height
            && p.z >= 0
            && p.z < self.depth
    }

    /// Error-producing bounds check
    pub fn check(&self, p: Position) -> Result<()> {
        if self.contains(p) {
            Ok(())
        } else {
            Err(Error::IndexOutOfBounds {
                x: p.x,
                y: p.y,
                z: p.z,
                width: self.width,
                height: self.height,
                depth: self.depth,
            })
        }
    }

    /// Linear index of an in-bounds position
    pub fn linear_index(&self, p: Position) -> usize {
        (p.z as usize * self.height as usize + p.y as usize) * self.width as usize + p.x as usize
    }

    /// Position of a linear index
    pub fn position_of(&self, index: usize) -> Position {
        let slice = self.slice_len();
        let z = index / slice;
        let rem = index % slice;
        let y = rem / self.width as usize;
        let x = rem % self.width as usize;
        Position::new(x as i32, y as i32, z as i32)
    }

    /// Packed address of an in-bounds position: (word index, bit within word)
    pub fn word_bit(&self, p: Position) -> (usize, u32) {
        let (tx, ty, _) = self.tiles();
        let tile = (p.x >> 2) as usize
            + tx as usize * ((p.y >> 2) as usize + ty as usize * (p.z >> 2) as usize);
        let bit = ((p.z & 3) << 4 | (p.y & 3) << 2 | (p.x & 3)) as usize;
        (tile * WORDS_PER_TILE + (bit >> 5), (bit & 31) as u32)
    }
}
