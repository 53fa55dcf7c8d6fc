//! # PoroVox Colormap
//!
//! Color mapping and slice rendering for pore-analysis fields.
//!
//! Two rendering families are provided. Continuous ramps turn the
//! inscribed-ball diameter field into heat-map style slices, and a
//! golden-angle categorical palette gives every pore body a stable,
//! well-separated color. The entry points are [`diameter_layer`] and
//! [`segmentation_layer`], both producing a
//! [`LayerImage`](porovox_core::volume::LayerImage) ready for texture
//! upload or TIFF export.
//!
//! ```ignore
//! use porovox_colormap::{auto_params, diameter_layer, ColorScheme};
//!
//! let params = auto_params(&image, ColorScheme::BlueRed);
//! let slice = diameter_layer(&image, 12, &params)?;
//! std::fs::write("slice.raw", slice.as_rgba_bytes())?;
//! ```

mod render;
mod scheme;

pub use render::{
    auto_params, diameter_layer, segmentation_layer, ColormapParams, SOLID, UNCLASSIFIED,
};
pub use scheme::{cluster_color, evaluate, ColorScheme, ColorStop, Rgb};
