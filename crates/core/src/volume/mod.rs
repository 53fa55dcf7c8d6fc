//! Voxel volume types
//!
//! The data model: [`VolumeDims`] owns the addressing contracts,
//! [`PackedVolume`] is the 1-bit tiled buffer, [`PoreMap`] holds sparse
//! per-pore-voxel records, [`LayerImage`] is the 2D RGBA exchange format,
//! and [`Image`] ties buffer and derived state together.

mod dims;
mod fronts;
mod image;
mod layer;
mod packed;
mod pore_map;
mod position;

pub use dims::{VolumeDims, TILE_BITS, TILE_EDGE, WORDS_PER_TILE, WORD_BITS};
pub use fronts::FrontSets;
pub use image::Image;
pub use layer::{LayerImage, Rgba};
pub use packed::{AtomicView, PackedVolume};
pub use pore_map::{PoreMap, PoreVoxel, UNASSIGNED};
pub use position::{BoundingBox, Offset3, Position};
