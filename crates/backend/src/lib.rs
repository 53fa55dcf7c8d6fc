//! Execution backends for the PoroVox morphology primitives.
//!
//! Every heavy pass in the toolkit (opening, denoising, clustering probes)
//! reduces to the same two operations: dilate a phase outward from its front
//! voxels, or erode it inward from them. This crate owns those primitives and
//! hides where they run. [`CpuBackend`] executes them on a worker pool with
//! atomic bit writes; `WgpuBackend` (behind the `accel` feature) offloads the
//! same kernels to a compute device and reads the packed words back.
//!
//! Both backends consume pre-classified front lists rather than rescanning
//! the volume, so the cost of a pass is proportional to the phase boundary,
//! not to the volume.

use porovox_core::volume::{FrontSets, Offset3, PackedVolume};
use porovox_core::Result;

pub mod cpu;
pub mod strategy;

#[cfg(feature = "accel")]
pub mod accel;

pub use cpu::CpuBackend;
pub use strategy::{num_cpus, set_num_threads, ParallelStrategy, ProcessingMode};

#[cfg(feature = "accel")]
pub use accel::{WgpuBackend, WgpuContext};

/// A device that can run one round of morphological expansion or shrinkage.
///
/// The caller classifies the moving phase into surface and corner fronts and
/// supplies one offset list per class. `dilate` marks every in-bounds
/// `front + offset` voxel solid; `erode` clears it. Offsets that land outside
/// the volume are dropped. Both operations leave the rest of the volume
/// untouched, and both must tolerate empty front or offset lists.
pub trait MorphologyBackend {
    fn dilate(
        &self,
        volume: &mut PackedVolume,
        fronts: &FrontSets,
        surface: &[Offset3],
        corner: &[Offset3],
    ) -> Result<()>;

    fn erode(
        &self,
        volume: &mut PackedVolume,
        fronts: &FrontSets,
        surface: &[Offset3],
        corner: &[Offset3],
    ) -> Result<()>;
}
