//! # PoroVox Algorithms
//!
//! Pore-scale analysis algorithms for bit-packed core-sample volumes.
//!
//! ## Available Algorithm Categories
//!
//! - **morphology**: border classification, maximal-ball opening, denoising
//! - **clustering**: pore-body segmentation by ball grouping or watershed
//!
//! The heavy dilate/erode inner loops run through an injected
//! [`MorphologyBackend`](porovox_backend::MorphologyBackend), so every
//! algorithm here works unchanged on the CPU worker pool or on a compute
//! device.

pub mod clustering;
pub mod morphology;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clustering::{
        cluster_pores, cluster_sizes, size_distribution, ClusterParams, ClusterPores,
        ClusterReport, ClusteringStrategy,
    };
    pub use crate::morphology::{
        classify_fronts, denoise, open, Denoise, DenoiseParams, ElementCache, Open, OpenParams,
        OpenReport, Phase, SphereElement,
    };
    pub use porovox_backend::{CpuBackend, MorphologyBackend, ProcessingMode};
    pub use porovox_core::prelude::*;
}
