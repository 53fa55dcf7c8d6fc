//! # PoroVox Core
//!
//! Core types, traits and persistence for the PoroVox pore-analysis engine.
//!
//! This crate provides:
//! - `Image`: bit-packed 3D binary image plus derived analysis state
//! - `PackedVolume`: the tiled one-bit-per-voxel buffer
//! - `PoreMap`: sharded sparse records for pore voxels
//! - `LayerImage`: the 2D RGBA slice exchange format
//! - Algorithm traits for consistent API
//! - The native volume persistence format

pub mod error;
pub mod io;
pub mod progress;
pub mod volume;

mod maybe_rayon;

pub use error::{Error, Result};
pub use progress::{NullProgress, ProgressAdapter};
pub use volume::{
    FrontSets, Image, LayerImage, PackedVolume, PoreMap, PoreVoxel, Position, VolumeDims,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::progress::{NullProgress, ProgressAdapter};
    pub use crate::volume::{
        FrontSets, Image, LayerImage, PackedVolume, PoreMap, PoreVoxel, Position, VolumeDims,
    };
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in PoroVox.
///
/// Algorithms transform input data according to parameters; the free-function
/// forms additionally accept a progress adapter and, where relevant, an
/// injected execution backend.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

/// Marker trait for algorithms that can be parallelized
pub trait ParallelAlgorithm: Algorithm {
    /// Execute in parallel using available cores
    fn execute_parallel(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;
}
