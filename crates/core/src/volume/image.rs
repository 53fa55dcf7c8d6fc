//! The central 3D binary image

use std::cell::Cell;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::maybe_rayon::*;
use crate::volume::{
    LayerImage, PackedVolume, PoreMap, PoreVoxel, Position, Rgba, VolumeDims,
};

/// A bit-packed 3D binary image plus the analysis state derived from it.
///
/// Solid voxels carry bit 1, pore voxels bit 0. Derived state consists of the
/// lazily computed black-voxel (pore) count, the table of processed snapshots
/// produced per diameter by the opener, and the pore map; any raw-buffer
/// mutation invalidates all three, and callers rebuild before querying.
///
/// The count cache lives in a `Cell`, so an `Image` is deliberately not
/// `Sync`: one instance is not meant for concurrent calls from several
/// threads. All intra-call parallelism is private to the algorithms.
#[derive(Debug)]
pub struct Image {
    dims: VolumeDims,
    raw: PackedVolume,
    black: Cell<Option<u64>>,
    processed: BTreeMap<i8, PackedVolume>,
    pore_map: PoreMap,
    opened: bool,
}

impl Image {
    /// Create an all-pore image
    pub fn new(width: i32, height: i32, depth: i32) -> Result<Self> {
        let dims = VolumeDims::new(width, height, depth)?;
        Ok(Self::from_volume(PackedVolume::new(dims)))
    }

    /// Wrap an existing packed volume with fresh derived state
    pub fn from_volume(raw: PackedVolume) -> Self {
        Self {
            dims: raw.dims(),
            raw,
            black: Cell::new(None),
            processed: BTreeMap::new(),
            pore_map: PoreMap::new(),
            opened: false,
        }
    }

    /// Reassemble an image from persisted parts
    pub(crate) fn from_parts(
        raw: PackedVolume,
        black: Option<u64>,
        processed: BTreeMap<i8, PackedVolume>,
        entries: Vec<(u32, PoreVoxel)>,
    ) -> Self {
        let opened = entries.iter().any(|(_, v)| v.diam_max > 0);
        let pore_map = PoreMap::new();
        for (index, voxel) in entries {
            pore_map.insert(index, voxel);
        }
        Self {
            dims: raw.dims(),
            raw,
            black: Cell::new(black),
            processed,
            pore_map,
            opened,
        }
    }

    pub fn dims(&self) -> VolumeDims {
        self.dims
    }

    pub fn width(&self) -> i32 {
        self.dims.width
    }

    pub fn height(&self) -> i32 {
        self.dims.height
    }

    pub fn depth(&self) -> i32 {
        self.dims.depth
    }

    // Raw buffer access

    /// Read the bit at a position (true = solid)
    pub fn get(&self, p: Position) -> Result<bool> {
        self.raw.get(p)
    }

    /// Write the bit at a position. Invalidates derived state.
    pub fn set(&mut self, p: Position, solid: bool) -> Result<()> {
        self.raw.set(p, solid)?;
        self.invalidate_derived();
        Ok(())
    }

    pub fn is_solid(&self, p: Position) -> Result<bool> {
        self.raw.get(p)
    }

    pub fn is_pore(&self, p: Position) -> Result<bool> {
        Ok(!self.raw.get(p)?)
    }

    /// Borrow the packed buffer
    pub fn raw(&self) -> &PackedVolume {
        &self.raw
    }

    /// Mutably borrow the packed buffer. Invalidates derived state first, so
    /// partial external mutation can never be observed through stale caches.
    pub fn raw_mut(&mut self) -> &mut PackedVolume {
        self.invalidate_derived();
        &mut self.raw
    }

    // Counts

    /// Number of pore voxels. Computed by one parallel popcount scan on first
    /// use, then cached until the next raw mutation.
    pub fn black_voxels(&self) -> u64 {
        if let Some(black) = self.black.get() {
            return black;
        }
        let black = self.dims.voxel_count() as u64 - self.raw.solid_count();
        self.black.set(Some(black));
        black
    }

    /// Pore fraction of the volume
    pub fn porosity(&self) -> f64 {
        self.black_voxels() as f64 / self.dims.voxel_count() as f64
    }

    // Layer exchange

    /// Import a 2D slice at depth `z`, thresholding on a non-zero red
    /// channel: red != 0 becomes solid, red == 0 pore.
    pub fn add_layer(&mut self, layer: &LayerImage, z: i32) -> Result<()> {
        self.check_depth(z)?;
        if layer.width() != self.dims.width || layer.height() != self.dims.height {
            return Err(Error::LayerMismatch {
                expected_width: self.dims.width,
                expected_height: self.dims.height,
                width: layer.width(),
                height: layer.height(),
            });
        }
        for y in 0..self.dims.height {
            for x in 0..self.dims.width {
                // Safety: loop bounds match both the layer and the volume
                let solid = unsafe { layer.get_unchecked(x, y) }[0] != 0;
                unsafe { self.raw.set_unchecked(Position::new(x, y, z), solid) };
            }
        }
        self.invalidate_derived();
        Ok(())
    }

    /// Zero (all-pore) the slice at depth `z`
    pub fn clear_layer(&mut self, z: i32) -> Result<()> {
        self.check_depth(z)?;
        for y in 0..self.dims.height {
            for x in 0..self.dims.width {
                // Safety: loop bounds match the volume
                unsafe { self.raw.set_unchecked(Position::new(x, y, z), false) };
            }
        }
        self.invalidate_derived();
        Ok(())
    }

    /// Render the slice at depth `z` with caller-chosen colors
    pub fn layer(&self, z: i32, pore_color: Rgba, solid_color: Rgba) -> Result<LayerImage> {
        self.check_depth(z)?;
        let mut out = LayerImage::new(self.dims.width, self.dims.height)?;
        for y in 0..self.dims.height {
            for x in 0..self.dims.width {
                // Safety: loop bounds match both the layer and the volume
                let solid = unsafe { self.raw.get_unchecked(Position::new(x, y, z)) };
                let color = if solid { solid_color } else { pore_color };
                unsafe { out.set_unchecked(x, y, color) };
            }
        }
        Ok(out)
    }

    // Derived volumes

    /// New image with every bit complemented; derived state starts fresh
    pub fn invert(&self) -> Image {
        Image::from_volume(self.raw.complemented())
    }

    /// Extract an axis-aligned crop as an independent image
    pub fn sub(&self, origin: Position, extent: VolumeDims) -> Result<Image> {
        self.dims.check(origin)?;
        let corner = Position::new(
            origin.x + extent.width - 1,
            origin.y + extent.height - 1,
            origin.z + extent.depth - 1,
        );
        self.dims.check(corner)?;

        let mut out = PackedVolume::new(extent);
        for z in 0..extent.depth {
            for y in 0..extent.height {
                for x in 0..extent.width {
                    let src = Position::new(origin.x + x, origin.y + y, origin.z + z);
                    // Safety: both positions were bounds-checked above
                    let solid = unsafe { self.raw.get_unchecked(src) };
                    if solid {
                        unsafe { out.set_unchecked(Position::new(x, y, z), true) };
                    }
                }
            }
        }
        Ok(Image::from_volume(out))
    }

    // Pore map

    /// Build a fresh pore map entry for every pore voxel. Returns the entry
    /// count (equal to `black_voxels`).
    pub fn build_pore_map(&mut self) -> usize {
        let dims = self.dims;
        let raw = &self.raw;
        let indices: Vec<u32> = (0..dims.depth as usize)
            .into_par_iter()
            .flat_map(|z| {
                let mut slab = Vec::new();
                for y in 0..dims.height {
                    for x in 0..dims.width {
                        let p = Position::new(x, y, z as i32);
                        // Safety: loop bounds match the volume
                        if !unsafe { raw.get_unchecked(p) } {
                            slab.push(dims.linear_index(p) as u32);
                        }
                    }
                }
                slab
            })
            .collect();

        self.pore_map.clear();
        for index in &indices {
            self.pore_map.insert(*index, PoreVoxel::default());
        }
        self.opened = false;
        indices.len()
    }

    pub fn pore_map(&self) -> &PoreMap {
        &self.pore_map
    }

    /// Analysis record for the voxel at `p`. Absence means the voxel is
    /// solid or no map has been built; callers treat it as unclassified.
    pub fn pore_voxel(&self, p: Position) -> Result<Option<PoreVoxel>> {
        self.dims.check(p)?;
        Ok(self.pore_map.get(self.dims.linear_index(p) as u32))
    }

    /// Whether the maximal-ball opener has completed on the current content
    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Record completion of the maximal-ball opener
    pub fn mark_opened(&mut self) {
        self.opened = true;
    }

    // Processed snapshots

    /// Store the dilated snapshot for a diameter
    pub fn insert_processed(&mut self, diameter: i8, volume: PackedVolume) {
        self.processed.insert(diameter, volume);
    }

    /// Snapshot for one diameter, if retained
    pub fn processed_snapshot(&self, diameter: i8) -> Option<&PackedVolume> {
        self.processed.get(&diameter)
    }

    /// All retained snapshots, keyed by diameter
    pub fn processed(&self) -> &BTreeMap<i8, PackedVolume> {
        &self.processed
    }

    fn check_depth(&self, z: i32) -> Result<()> {
        self.dims.check(Position::new(0, 0, z))
    }

    fn invalidate_derived(&mut self) {
        self.black.set(None);
        self.processed.clear();
        self.pore_map.clear();
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_all_pore() {
        let img = Image::new(4, 4, 4).unwrap();
        assert_eq!(img.black_voxels(), 64);
        assert!((img.porosity() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_layer_thresholds_red() {
        let mut img = Image::new(4, 4, 4).unwrap();
        let layer = LayerImage::filled(4, 4, [255, 255, 255, 255]).unwrap();
        img.add_layer(&layer, 0).unwrap();
        assert_eq!(img.black_voxels(), 48);
        assert!(img.is_solid(Position::new(0, 0, 0)).unwrap());
        assert!(img.is_pore(Position::new(0, 0, 1)).unwrap());

        // Zero red imports as pore even with alpha set
        let transparent = LayerImage::filled(4, 4, [0, 9, 9, 255]).unwrap();
        img.add_layer(&transparent, 0).unwrap();
        assert_eq!(img.black_voxels(), 64);
    }

    #[test]
    fn test_add_layer_rejects_mismatched_sizes() {
        let mut img = Image::new(4, 4, 4).unwrap();
        let layer = LayerImage::new(5, 4).unwrap();
        assert!(matches!(
            img.add_layer(&layer, 0),
            Err(Error::LayerMismatch { .. })
        ));
        let ok = LayerImage::new(4, 4).unwrap();
        assert!(img.add_layer(&ok, 4).is_err());
    }

    #[test]
    fn test_clear_layer() {
        let mut img = Image::new(4, 4, 2).unwrap();
        let layer = LayerImage::filled(4, 4, [1, 0, 0, 255]).unwrap();
        img.add_layer(&layer, 1).unwrap();
        assert_eq!(img.black_voxels(), 16);
        img.clear_layer(1).unwrap();
        assert_eq!(img.black_voxels(), 32);
    }

    #[test]
    fn test_layer_render_colors() {
        let mut img = Image::new(3, 3, 1).unwrap();
        img.set(Position::new(1, 1, 0), true).unwrap();
        let out = img
            .layer(0, [0, 0, 255, 255], [255, 255, 255, 255])
            .unwrap();
        assert_eq!(out.get(1, 1).unwrap(), [255, 255, 255, 255]);
        assert_eq!(out.get(0, 0).unwrap(), [0, 0, 255, 255]);
    }

    #[test]
    fn test_invert_properties() {
        let mut img = Image::new(5, 4, 3).unwrap();
        img.set(Position::new(0, 0, 0), true).unwrap();
        img.set(Position::new(4, 3, 2), true).unwrap();
        img.set(Position::new(2, 2, 1), true).unwrap();

        let total = 5 * 4 * 3;
        let inv = img.invert();
        assert_eq!(inv.black_voxels(), total - img.black_voxels());

        let back = inv.invert();
        assert_eq!(back.black_voxels(), img.black_voxels());
        assert_eq!(back.raw(), img.raw(), "double inversion must be bit-exact");
    }

    #[test]
    fn test_sub_extracts_crop() {
        let mut img = Image::new(6, 6, 6).unwrap();
        img.set(Position::new(2, 2, 2), true).unwrap();
        img.set(Position::new(3, 4, 2), true).unwrap();

        let crop = img
            .sub(Position::new(2, 2, 2), VolumeDims::new(3, 3, 3).unwrap())
            .unwrap();
        assert_eq!(crop.width(), 3);
        assert!(crop.is_solid(Position::new(0, 0, 0)).unwrap());
        assert!(crop.is_solid(Position::new(1, 2, 0)).unwrap());
        assert_eq!(crop.black_voxels(), 27 - 2);

        // Crop reaching outside the volume is rejected
        assert!(img
            .sub(Position::new(4, 4, 4), VolumeDims::new(4, 4, 4).unwrap())
            .is_err());
    }

    #[test]
    fn test_build_pore_map_matches_pore_set() {
        let mut img = Image::new(4, 4, 1).unwrap();
        img.set(Position::new(0, 0, 0), true).unwrap();
        img.set(Position::new(3, 3, 0), true).unwrap();

        let count = img.build_pore_map();
        assert_eq!(count, 14);
        assert_eq!(img.pore_map().len(), 14);
        assert!(!img.pore_map().contains(0));
        assert!(img.pore_map().contains(1));

        // Rebuilding on unchanged content yields the identical key set
        let first = img.pore_map().sorted_indices();
        img.build_pore_map();
        assert_eq!(img.pore_map().sorted_indices(), first);
    }

    #[test]
    fn test_pore_voxel_lookup() {
        let mut img = Image::new(4, 4, 1).unwrap();
        img.set(Position::new(0, 0, 0), true).unwrap();

        // Before any map exists every lookup is "unclassified"
        assert!(img.pore_voxel(Position::new(1, 0, 0)).unwrap().is_none());

        img.build_pore_map();
        assert!(img.pore_voxel(Position::new(0, 0, 0)).unwrap().is_none());
        let v = img.pore_voxel(Position::new(1, 0, 0)).unwrap().unwrap();
        assert_eq!(v.diam_max, 0);
        assert!(v.cluster < 0);

        assert!(img.pore_voxel(Position::new(4, 0, 0)).is_err());
    }

    #[test]
    fn test_mutation_invalidates_derived_state() {
        let mut img = Image::new(4, 4, 4).unwrap();
        img.build_pore_map();
        img.insert_processed(1, PackedVolume::new(img.dims()));
        img.mark_opened();
        assert!(img.is_opened());

        img.set(Position::new(0, 0, 0), true).unwrap();
        assert!(img.pore_map().is_empty());
        assert!(img.processed().is_empty());
        assert!(!img.is_opened());
        assert_eq!(img.black_voxels(), 63);
    }
}
