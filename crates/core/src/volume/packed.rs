//! Bit-packed voxel storage

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::maybe_rayon::*;
use crate::volume::{Position, VolumeDims, TILE_EDGE, WORDS_PER_TILE};

/// One-bit-per-voxel solid mask in tile-packed words.
///
/// Bit 1 marks solid material, bit 0 pore space. Storage follows the
/// addressing contract of [`VolumeDims`]: 4x4x4-voxel tiles of two u32
/// words each.
///
/// Padding bits (slots in edge tiles beyond the volume extents) are kept at
/// zero at all times; `solid_count` relies on this to stay a plain popcount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedVolume {
    dims: VolumeDims,
    words: Vec<u32>,
}

impl PackedVolume {
    /// Create an all-pore volume
    pub fn new(dims: VolumeDims) -> Self {
        Self {
            dims,
            words: vec![0u32; dims.word_count()],
        }
    }

    /// Wrap an existing word buffer, validating its length
    pub fn from_words(dims: VolumeDims, words: Vec<u32>) -> Result<Self> {
        if words.len() != dims.word_count() {
            return Err(Error::SizeMismatch {
                expected: dims.word_count() as u64,
                found: words.len() as u64,
            });
        }
        let mut volume = Self { dims, words };
        volume.clear_padding();
        Ok(volume)
    }

    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    /// Backing words, for the persistence codec and the accelerator upload
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Replace the backing words wholesale, e.g. after accelerator readback
    pub fn set_words(&mut self, words: Vec<u32>) -> Result<()> {
        if words.len() != self.words.len() {
            return Err(Error::SizeMismatch {
                expected: self.words.len() as u64,
                found: words.len() as u64,
            });
        }
        self.words = words;
        self.clear_padding();
        Ok(())
    }

    /// Read the bit at a position
    pub fn get(&self, p: Position) -> Result<bool> {
        self.dims.check(p)?;
        // Safety: bounds were just validated
        Ok(unsafe { self.get_unchecked(p) })
    }

    /// Read the bit at a position without bounds checking
    ///
    /// # Safety
    /// Caller must ensure `self.dims().contains(p)`
    pub unsafe fn get_unchecked(&self, p: Position) -> bool {
        let (word, bit) = self.dims.word_bit(p);
        unsafe { (self.words.get_unchecked(word) >> bit) & 1 == 1 }
    }

    /// Write the bit at a position
    pub fn set(&mut self, p: Position, solid: bool) -> Result<()> {
        self.dims.check(p)?;
        // Safety: bounds were just validated
        unsafe { self.set_unchecked(p, solid) };
        Ok(())
    }

    /// Write the bit at a position without bounds checking
    ///
    /// # Safety
    /// Caller must ensure `self.dims().contains(p)`
    pub unsafe fn set_unchecked(&mut self, p: Position, solid: bool) {
        let (word, bit) = self.dims.word_bit(p);
        let w = unsafe { self.words.get_unchecked_mut(word) };
        if solid {
            *w |= 1 << bit;
        } else {
            *w &= !(1 << bit);
        }
    }

    /// Number of solid voxels, as a parallel popcount over the words
    pub fn solid_count(&self) -> u64 {
        let words = &self.words;
        (0..words.len())
            .into_par_iter()
            .map(|i| words[i].count_ones() as u64)
            .sum()
    }

    /// New volume with every bit complemented
    pub fn complemented(&self) -> PackedVolume {
        let mut out = self.clone();
        for w in &mut out.words {
            *w = !*w;
        }
        out.clear_padding();
        out
    }

    /// Zero the padding bits of edge tiles.
    ///
    /// Needed after whole-word operations (complement, raw word ingestion);
    /// positional writes never touch padding slots.
    fn clear_padding(&mut self) {
        let (tx, ty, tz) = self.dims.tiles();
        let full_x = self.dims.width % TILE_EDGE == 0;
        let full_y = self.dims.height % TILE_EDGE == 0;
        let full_z = self.dims.depth % TILE_EDGE == 0;
        if full_x && full_y && full_z {
            return;
        }
        for iz in 0..tz {
            let ez = Self::tile_extent(iz, tz, self.dims.depth);
            for iy in 0..ty {
                let ey = Self::tile_extent(iy, ty, self.dims.height);
                for ix in 0..tx {
                    let ex = Self::tile_extent(ix, tx, self.dims.width);
                    if ex == TILE_EDGE && ey == TILE_EDGE && ez == TILE_EDGE {
                        continue;
                    }
                    let mut mask: u64 = 0;
                    for lz in 0..ez {
                        for ly in 0..ey {
                            for lx in 0..ex {
                                mask |= 1 << (lz << 4 | ly << 2 | lx);
                            }
                        }
                    }
                    let tile = (ix + tx * (iy + ty * iz)) as usize;
                    self.words[tile * WORDS_PER_TILE] &= mask as u32;
                    self.words[tile * WORDS_PER_TILE + 1] &= (mask >> 32) as u32;
                }
            }
        }
    }

    fn tile_extent(tile: i32, tiles: i32, dim: i32) -> i32 {
        if tile == tiles - 1 && dim % TILE_EDGE != 0 {
            dim % TILE_EDGE
        } else {
            TILE_EDGE
        }
    }

    /// Atomic view over the words for intra-call parallel bit writes.
    ///
    /// The exclusive borrow guarantees no plain-word aliases exist while the
    /// view is alive.
    pub fn atomic(&mut self) -> AtomicView<'_> {
        let dims = self.dims;
        let words: &mut [u32] = &mut self.words;
        // Safety: u32 and AtomicU32 have identical size and alignment, and
        // the exclusive borrow rules out unsynchronized plain accesses for
        // the lifetime of the view.
        let atomics = unsafe { &*(words as *mut [u32] as *const [AtomicU32]) };
        AtomicView {
            dims,
            words: atomics,
        }
    }
}

/// Shared view over a [`PackedVolume`] allowing concurrent bit set/clear.
///
/// All operations use relaxed ordering: bit writes are commutative and the
/// fork/join boundary of the owning scan publishes them before any read.
#[derive(Clone, Copy)]
pub struct AtomicView<'a> {
    dims: VolumeDims,
    words: &'a [AtomicU32],
}

impl AtomicView<'_> {
    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    /// Set the bit at an in-bounds position
    pub fn set_solid(&self, p: Position) {
        debug_assert!(self.dims.contains(p));
        let (word, bit) = self.dims.word_bit(p);
        self.words[word].fetch_or(1 << bit, Ordering::Relaxed);
    }

    /// Clear the bit at an in-bounds position
    pub fn clear_solid(&self, p: Position) {
        debug_assert!(self.dims.contains(p));
        let (word, bit) = self.dims.word_bit(p);
        self.words[word].fetch_and(!(1 << bit), Ordering::Relaxed);
    }

    /// Read the bit at an in-bounds position
    pub fn is_solid(&self, p: Position) -> bool {
        debug_assert!(self.dims.contains(p));
        let (word, bit) = self.dims.word_bit(p);
        (self.words[word].load(Ordering::Relaxed) >> bit) & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(w: i32, h: i32, d: i32) -> VolumeDims {
        VolumeDims::new(w, h, d).unwrap()
    }

    #[test]
    fn test_new_is_all_pore() {
        let v = PackedVolume::new(dims(4, 4, 4));
        assert_eq!(v.solid_count(), 0);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    assert!(!v.get(Position::new(x, y, z)).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut v = PackedVolume::new(dims(9, 6, 5));
        let p = Position::new(7, 5, 3);
        v.set(p, true).unwrap();
        assert!(v.get(p).unwrap());
        assert_eq!(v.solid_count(), 1);
        v.set(p, false).unwrap();
        assert!(!v.get(p).unwrap());
        assert_eq!(v.solid_count(), 0);
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let mut v = PackedVolume::new(dims(4, 4, 4));
        assert!(v.get(Position::new(4, 0, 0)).is_err());
        assert!(v.set(Position::new(0, 0, -1), true).is_err());
    }

    #[test]
    fn test_complement_counts() {
        // Non-multiple-of-4 extents force padding handling
        let mut v = PackedVolume::new(dims(5, 3, 2));
        v.set(Position::new(0, 0, 0), true).unwrap();
        v.set(Position::new(4, 2, 1), true).unwrap();

        let inv = v.complemented();
        assert_eq!(inv.solid_count(), 30 - 2);
        assert!(!inv.get(Position::new(0, 0, 0)).unwrap());
        assert!(inv.get(Position::new(1, 0, 0)).unwrap());
    }

    #[test]
    fn test_complement_involution() {
        let mut v = PackedVolume::new(dims(7, 5, 6));
        for i in 0..(7 * 5 * 6) {
            if i % 3 == 0 {
                let p = v.dims().position_of(i);
                v.set(p, true).unwrap();
            }
        }
        let back = v.complemented().complemented();
        assert_eq!(back, v, "double complement must restore the exact words");
    }

    #[test]
    fn test_from_words_validates_length() {
        let d = dims(4, 4, 4);
        assert!(PackedVolume::from_words(d, vec![0; 2]).is_ok());
        assert!(matches!(
            PackedVolume::from_words(d, vec![0; 3]),
            Err(Error::SizeMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_from_words_scrubs_padding() {
        // 3x3x3 volume in one tile: 27 valid slots out of 64
        let d = dims(3, 3, 3);
        let v = PackedVolume::from_words(d, vec![u32::MAX, u32::MAX]).unwrap();
        assert_eq!(v.solid_count(), 27);
    }

    #[test]
    fn test_atomic_view_bits() {
        let mut v = PackedVolume::new(dims(8, 8, 8));
        {
            let view = v.atomic();
            view.set_solid(Position::new(1, 2, 3));
            view.set_solid(Position::new(7, 7, 7));
            assert!(view.is_solid(Position::new(1, 2, 3)));
            view.clear_solid(Position::new(1, 2, 3));
            assert!(!view.is_solid(Position::new(1, 2, 3)));
        }
        assert_eq!(v.solid_count(), 1);
        assert!(v.get(Position::new(7, 7, 7)).unwrap());
    }
}
