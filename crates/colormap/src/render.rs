//! Slice rendering of pore-analysis fields.
//!
//! Both renderers walk one z-slice of the volume and consult the pore
//! map for per-voxel analysis state. Solid voxels take a caller-chosen
//! color; pore voxels without a record render as [`UNCLASSIFIED`], so a
//! volume can be previewed before the opener has run.

use porovox_core::volume::{LayerImage, Position, Rgba};
use porovox_core::{Image, Result};

use crate::scheme::{cluster_color, evaluate, ColorScheme};

// ─── parameters ──────────────────────────────────────────────────────────────

/// Default pixel for solid voxels.
pub const SOLID: Rgba = [38, 34, 32, 255];

/// Pixel for pore voxels with no analysis record.
pub const UNCLASSIFIED: Rgba = [16, 16, 20, 255];

/// Parameters for diameter-field rendering.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    pub scheme: ColorScheme,
    /// Diameter mapped to the low end of the ramp.
    pub min: f64,
    /// Diameter mapped to the high end of the ramp.
    pub max: f64,
    /// Pixel used for solid voxels.
    pub solid_color: Rgba,
}

impl ColormapParams {
    /// Parameters spanning the full representable diameter range.
    pub fn new(scheme: ColorScheme) -> Self {
        Self {
            scheme,
            min: 1.0,
            max: f64::from(i8::MAX),
            solid_color: SOLID,
        }
    }

    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            solid_color: SOLID,
        }
    }
}

/// Derives render parameters from the diameters actually present.
///
/// An image with no recorded diameters falls back to the full range and
/// a constant field widens `max` by one, so the ramp stays well defined
/// either way.
pub fn auto_params(image: &Image, scheme: ColorScheme) -> ColormapParams {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    image.pore_map().for_each(|_, voxel| {
        if voxel.diam_max > 0 {
            let d = f64::from(voxel.diam_max);
            if d < min {
                min = d;
            }
            if d > max {
                max = d;
            }
        }
    });
    if !min.is_finite() {
        return ColormapParams::new(scheme);
    }
    if max <= min {
        max = min + 1.0;
    }
    ColormapParams::with_range(scheme, min, max)
}

// ─── slice rendering ─────────────────────────────────────────────────────────

/// Render the slice at depth `z`, coloring each pore voxel by its
/// maximal inscribed-ball diameter.
pub fn diameter_layer(image: &Image, z: i32, params: &ColormapParams) -> Result<LayerImage> {
    let dims = image.dims();
    dims.check(Position::new(0, 0, z))?;
    let map = image.pore_map();
    let range = params.max - params.min;
    let inv_range = if range.abs() > f64::EPSILON {
        1.0 / range
    } else {
        1.0
    };
    let mut out = LayerImage::new(dims.width, dims.height)?;
    for y in 0..dims.height {
        for x in 0..dims.width {
            let p = Position::new(x, y, z);
            // Safety: loop bounds match both the layer and the volume
            let solid = unsafe { image.raw().get_unchecked(p) };
            let pixel = if solid {
                params.solid_color
            } else {
                match map.get(dims.linear_index(p) as u32) {
                    Some(voxel) if voxel.diam_max > 0 => {
                        let t = (f64::from(voxel.diam_max) - params.min) * inv_range;
                        let c = evaluate(params.scheme, t);
                        [c.r, c.g, c.b, 255]
                    }
                    _ => UNCLASSIFIED,
                }
            };
            unsafe { out.set_unchecked(x, y, pixel) };
        }
    }
    Ok(out)
}

/// Render the slice at depth `z`, coloring each pore voxel by cluster.
///
/// Cluster ids map through the golden-angle palette, so the same body
/// keeps its color across slices and across runs.
pub fn segmentation_layer(image: &Image, z: i32, solid_color: Rgba) -> Result<LayerImage> {
    let dims = image.dims();
    dims.check(Position::new(0, 0, z))?;
    let map = image.pore_map();
    let mut out = LayerImage::new(dims.width, dims.height)?;
    for y in 0..dims.height {
        for x in 0..dims.width {
            let p = Position::new(x, y, z);
            // Safety: loop bounds match both the layer and the volume
            let solid = unsafe { image.raw().get_unchecked(p) };
            let pixel = if solid {
                solid_color
            } else {
                match map.get(dims.linear_index(p) as u32) {
                    Some(voxel) => {
                        let c = cluster_color(voxel.cluster);
                        [c.r, c.g, c.b, 255]
                    }
                    None => UNCLASSIFIED,
                }
            };
            unsafe { out.set_unchecked(x, y, pixel) };
        }
    }
    Ok(out)
}

// ─── tests ───────────────────────────────────────────────────────────────────
