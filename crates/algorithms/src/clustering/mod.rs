//! Pore-body segmentation
//!
//! Both clusterers consume the fields the opener leaves behind: `diam_max`
//! names the largest ball covering each voxel, `dist_min` the largest ball
//! centered on it, and `cluster` a provisional center id. They rewrite
//! `cluster` so that equal ids mean "same discrete pore body".
//!
//! - **Ball grouping** walks diameters downward, attaching each voxel to
//!   the biggest overlapping ball and fusing centers that sit closer than
//!   their diameters allow.
//! - **Watershed** climbs the smoothed radius field from every voxel to a
//!   local maximum, splitting bodies along saddle surfaces. Costlier, but
//!   better at separating chambers joined by wide throats.

mod ball_grouping;
mod fusion;
mod stats;
mod watershed;

pub use fusion::FusionMap;
pub use stats::{cluster_sizes, size_distribution};

use porovox_backend::ProcessingMode;
use porovox_core::{
    Algorithm, Error, Image, NullProgress, ParallelAlgorithm, ProgressAdapter, Result,
};

/// Which clusterer to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusteringStrategy {
    #[default]
    BallGrouping,
    Watershed,
}

/// Parameters for pore clustering
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    pub strategy: ClusteringStrategy,
    /// Execution mode for the per-level scans
    pub mode: ProcessingMode,
    /// Largest search radius the watershed flood may reach
    pub watershed_radius_cap: i32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            strategy: ClusteringStrategy::default(),
            mode: ProcessingMode::default(),
            watershed_radius_cap: 4,
        }
    }
}

/// Summary of one clustering run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterReport {
    pub strategy: ClusteringStrategy,
    /// Distinct cluster ids after finalization
    pub clusters: usize,
    /// Center fusions (ball grouping) or voxel adoptions (watershed)
    pub merges: usize,
    /// Diameter levels or flood rounds processed
    pub passes: usize,
}

/// Partition the pore space of an opened image into discrete pore bodies.
///
/// Requires a completed opener run; fails with [`Error::NotOpened`]
/// otherwise. Ball grouping mutates only the `cluster` field and reproduces
/// the same partition when rerun on an unmodified image. The watershed also
/// rewrites `dist_min` with its smoothed radius field, so a second run
/// starts from a twice-smoothed field.
pub fn cluster_pores(
    image: &mut Image,
    params: &ClusterParams,
    progress: &mut dyn ProgressAdapter,
) -> Result<ClusterReport> {
    if !image.is_opened() {
        return Err(Error::NotOpened);
    }
    match params.strategy {
        ClusteringStrategy::BallGrouping => ball_grouping::run(image, params, progress),
        ClusteringStrategy::Watershed => watershed::run(image, params, progress),
    }
}

/// Pore-body segmentation algorithm
pub struct ClusterPores;

impl Algorithm for ClusterPores {
    type Input = Image;
    type Output = (Image, ClusterReport);
    type Params = ClusterParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "cluster_pores"
    }

    fn description(&self) -> &'static str {
        "Groups maximal-ball voxels into discrete pore bodies"
    }

    fn execute(&self, mut input: Image, params: ClusterParams) -> Result<(Image, ClusterReport)> {
        let report = cluster_pores(&mut input, &params, &mut NullProgress)?;
        Ok((input, report))
    }
}

impl ParallelAlgorithm for ClusterPores {
    fn execute_parallel(
        &self,
        input: Image,
        mut params: ClusterParams,
    ) -> Result<(Image, ClusterReport)> {
        params.mode = ProcessingMode::Parallel;
        self.execute(input, params)
    }
}
