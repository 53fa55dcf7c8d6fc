//! Maximal-ball opening
//!
//! Assigns every pore voxel the diameter of the largest inscribed sphere
//! that covers it. The opener walks odd diameters upward; at each diameter
//! it dilates the solid boundary into a snapshot, takes the pore voxels the
//! dilation could not reach (and around which the ball still fits inside
//! the volume) as ball centers, and stamps the diameter over each center's
//! ball. A voxel's final `diam_max` is the diameter of the largest ball
//! that reached it; `dist_min` is the diameter of the largest ball centered
//! on it. Both fields drive the downstream clusterers.

use porovox_backend::{CpuBackend, MorphologyBackend, ParallelStrategy, ProcessingMode};
use porovox_core::volume::{PackedVolume, PoreMap, VolumeDims};
use porovox_core::{
    Algorithm, Error, Image, NullProgress, ParallelAlgorithm, ProgressAdapter, Result,
};

use super::border::{classify_fronts, Phase};
use super::element::{ElementCache, SphereElement};

/// Parameters for the opener
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenParams {
    /// Execution mode for the scan and paint passes
    pub mode: ProcessingMode,
    /// Stop after this diameter; defaults to the largest odd diameter
    /// whose ball fits the volume
    pub max_diameter: Option<i8>,
}

/// Summary of one opener run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenReport {
    /// Number of diameters processed, including the terminating one
    pub rounds: usize,
    /// Largest diameter that still found a ball center
    pub max_diameter: i8,
    /// Pore voxels enumerated by the rebuilt pore map
    pub pore_voxels: usize,
    /// Dilation snapshots kept on the image
    pub retained_snapshots: usize,
}

/// Run the maximal-ball opener on `image`.
///
/// Rebuilds the pore map from the current voxel content, then processes
/// diameters 1, 3, 5, ... until no ball center remains or the cap is hit.
/// Diameter 1 always runs so that every pore voxel is seeded with
/// `diam_max = 1` and a provisional cluster id. On return the image is
/// marked opened and holds one processed snapshot per retained diameter.
pub fn open(
    image: &mut Image,
    backend: &dyn MorphologyBackend,
    params: &OpenParams,
    progress: &mut dyn ProgressAdapter,
) -> Result<OpenReport> {
    let dims = image.dims();
    let cap = diameter_cap(dims, params.max_diameter)?;

    let pore_voxels = image.build_pore_map();
    let keys = image.pore_map().sorted_indices();
    let fronts = classify_fronts(image.raw(), Phase::Solid, params.mode);
    let mut cache = ElementCache::new();

    progress.set_range((cap as usize + 1) / 2);
    let mut report = OpenReport {
        rounds: 0,
        max_diameter: 0,
        pore_voxels,
        retained_snapshots: 0,
    };

    let mut d = 1i32;
    while d <= cap {
        let element = cache.get(d)?;
        let mut snapshot = image.raw().clone();
        backend.dilate(&mut snapshot, &fronts, element.surface(), element.corner())?;

        let centers = ball_centers(&snapshot, &keys, element.radius(), params.mode);
        report.rounds += 1;
        progress.update(report.rounds, &format!("dilating at diameter {d}"));
        if centers.is_empty() {
            break;
        }

        paint_centers(image.pore_map(), dims, &centers, &element, d as i8, params.mode);
        image.insert_processed(d as i8, snapshot);
        report.retained_snapshots += 1;
        report.max_diameter = d as i8;
        d += 2;
    }

    image.mark_opened();
    Ok(report)
}

/// Largest diameter worth probing: caller's cap, clamped to the ball that
/// still fits the volume and to the `i8` diameter range.
fn diameter_cap(dims: VolumeDims, max_diameter: Option<i8>) -> Result<i32> {
    let min_dim = dims.width.min(dims.height).min(dims.depth);
    let natural = if min_dim % 2 == 0 { min_dim - 1 } else { min_dim };
    let cap = match max_diameter {
        Some(d) if d >= 1 => natural.min(i32::from(d)),
        Some(d) => {
            return Err(Error::InvalidParameter {
                name: "max_diameter",
                value: d.to_string(),
                reason: "opening diameter must be at least 1".to_string(),
            })
        }
        None => natural,
    };
    Ok(cap.min(i8::MAX as i32))
}

/// Pore voxels the dilation did not reach and whose diameter-`d` ball fits
/// inside the volume. These are the maximal-ball centers for this round.
fn ball_centers(
    snapshot: &PackedVolume,
    keys: &[u32],
    radius: i32,
    mode: ProcessingMode,
) -> Vec<u32> {
    const CHUNK: usize = 4096;
    if keys.is_empty() {
        return Vec::new();
    }
    let dims = snapshot.dims();
    let chunks = keys.len().div_ceil(CHUNK);
    let lists = mode.par_map(0..chunks, |c| {
        let start = c * CHUNK;
        let end = keys.len().min(start + CHUNK);
        let mut found = Vec::new();
        for &k in &keys[start..end] {
            let p = dims.position_of(k as usize);
            let fits = p.x >= radius
                && p.y >= radius
                && p.z >= radius
                && p.x + radius < dims.width
                && p.y + radius < dims.height
                && p.z + radius < dims.depth;
            // Safety: keys index the pore map built over these dimensions.
            if fits && !unsafe { snapshot.get_unchecked(p) } {
                found.push(k);
            }
        }
        found
    });
    lists.into_iter().flatten().collect()
}

/// Stamp `diameter` over each center's ball and record the centered ball
/// size. Claims are commutative, so the pass parallelizes freely.
fn paint_centers(
    map: &PoreMap,
    dims: VolumeDims,
    centers: &[u32],
    element: &SphereElement,
    diameter: i8,
    mode: ProcessingMode,
) {
    mode.par_for_each(0..centers.len(), |i| {
        let k = centers[i];
        let p = dims.position_of(k as usize);
        map.set_distance(k, diameter);
        for &o in element.corner() {
            let q = p.offset(o);
            debug_assert!(dims.contains(q), "ball centers are box-fitted");
            map.raise_diameter(dims.linear_index(q) as u32, diameter, k as i32);
        }
    });
}

/// Maximal-ball opening algorithm
pub struct Open;

impl Algorithm for Open {
    type Input = Image;
    type Output = (Image, OpenReport);
    type Params = OpenParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "maximal_ball_opening"
    }

    fn description(&self) -> &'static str {
        "Assigns each pore voxel the diameter of the largest inscribed sphere covering it"
    }

    fn execute(&self, mut input: Image, params: OpenParams) -> Result<(Image, OpenReport)> {
        let backend = CpuBackend::new(params.mode);
        let report = open(&mut input, &backend, &params, &mut NullProgress)?;
        Ok((input, report))
    }
}

impl ParallelAlgorithm for Open {
    fn execute_parallel(&self, input: Image, mut params: OpenParams) -> Result<(Image, OpenReport)> {
        params.mode = ProcessingMode::Parallel;
        self.execute(input, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use porovox_core::progress::RecordingProgress;
    use porovox_core::volume::Position;

    fn sequential() -> OpenParams {
        OpenParams {
            mode: ProcessingMode::Sequential,
            max_diameter: None,
        }
    }

    #[test]
    fn test_all_pore_cube_seeds_center() {
        let mut image = Image::new(16, 16, 16).unwrap();
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        let report = open(&mut image, &backend, &sequential(), &mut NullProgress).unwrap();

        assert_eq!(report.rounds, 8, "odd diameters 1 through 15");
        assert_eq!(report.max_diameter, 15);
        assert_eq!(report.pore_voxels, 4096);
        assert_eq!(report.retained_snapshots, 8);
        assert!(image.is_opened());

        let dims = image.dims();
        let center = dims.linear_index(Position::new(8, 8, 8)) as u32;
        let v = image.pore_map().get(center).unwrap();
        assert_eq!(v.diam_max, 15);
        assert_eq!(v.dist_min, 15);
        image.pore_map().for_each(|_, v| {
            assert!(v.diam_max >= 1, "every pore voxel must be seeded");
            assert!(v.cluster >= 0, "every pore voxel gets a provisional center");
        });
        let diameters: Vec<i8> = image.processed().keys().copied().collect();
        assert_eq!(diameters, vec![1, 3, 5, 7, 9, 11, 13, 15]);
    }

    #[test]
    fn test_solid_corner_limits_diameters() {
        let mut image = Image::new(8, 8, 8).unwrap();
        image.set(Position::new(0, 0, 0), true).unwrap();
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        let report = open(&mut image, &backend, &sequential(), &mut NullProgress).unwrap();

        assert_eq!(report.rounds, 4);
        assert_eq!(report.pore_voxels, 511);
        let dims = image.dims();
        assert!(
            image
                .pore_map()
                .get(dims.linear_index(Position::new(0, 0, 0)) as u32)
                .is_none(),
            "solid voxels stay out of the pore map"
        );
        let deep = image
            .pore_map()
            .get(dims.linear_index(Position::new(3, 3, 3)) as u32)
            .unwrap();
        assert_eq!(deep.diam_max, 7);
        assert_eq!(deep.dist_min, 7);
        // An edge voxel cannot host or be reached by any larger centered ball
        let edge = image
            .pore_map()
            .get(dims.linear_index(Position::new(1, 0, 0)) as u32)
            .unwrap();
        assert_eq!(edge.diam_max, 1);
        assert_eq!(edge.dist_min, 1);
    }

    #[test]
    fn test_diameter_cap_parameter() {
        let mut image = Image::new(16, 16, 16).unwrap();
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        let params = OpenParams {
            mode: ProcessingMode::Sequential,
            max_diameter: Some(3),
        };
        let report = open(&mut image, &backend, &params, &mut NullProgress).unwrap();
        assert_eq!(report.rounds, 2);
        assert_eq!(report.max_diameter, 3);
        image
            .pore_map()
            .for_each(|_, v| assert!((1..=3).contains(&v.diam_max)));
    }

    #[test]
    fn test_invalid_cap_rejected() {
        let mut image = Image::new(4, 4, 4).unwrap();
        let backend = CpuBackend::default();
        let params = OpenParams {
            mode: ProcessingMode::Sequential,
            max_diameter: Some(0),
        };
        let result = open(&mut image, &backend, &params, &mut NullProgress);
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_all_solid_runs_diameter_one_only() {
        let mut image = Image::new(6, 6, 6).unwrap();
        for i in 0..image.dims().voxel_count() {
            let p = image.dims().position_of(i);
            image.set(p, true).unwrap();
        }
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        let report = open(&mut image, &backend, &sequential(), &mut NullProgress).unwrap();
        assert_eq!(report.rounds, 1, "diameter 1 still executes once");
        assert_eq!(report.max_diameter, 0);
        assert_eq!(report.retained_snapshots, 0);
        assert!(image.is_opened());
        assert!(image.pore_map().is_empty());
    }

    #[test]
    fn test_progress_reports_each_round() {
        let mut image = Image::new(16, 16, 16).unwrap();
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        let mut progress = RecordingProgress::default();
        open(&mut image, &backend, &sequential(), &mut progress).unwrap();
        assert_eq!(progress.ranges, vec![8]);
        assert_eq!(progress.updates.len(), 8);
        assert_eq!(progress.updates[0].0, 1);
        assert_eq!(progress.updates[7].0, 8);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let build = || {
            let mut image = Image::new(12, 12, 12).unwrap();
            for i in (0..image.dims().voxel_count()).step_by(61) {
                let p = image.dims().position_of(i);
                image.set(p, true).unwrap();
            }
            image
        };
        let mut seq = build();
        let mut par = build();
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        open(&mut seq, &backend, &sequential(), &mut NullProgress).unwrap();
        let backend = CpuBackend::new(ProcessingMode::Parallel);
        let params = OpenParams {
            mode: ProcessingMode::Parallel,
            max_diameter: None,
        };
        open(&mut par, &backend, &params, &mut NullProgress).unwrap();
        assert_eq!(
            seq.pore_map().sorted_entries(),
            par.pore_map().sorted_entries(),
            "claim tie-breaks make the opener schedule independent"
        );
    }

    #[test]
    fn test_algorithm_wrapper() {
        let image = Image::new(8, 8, 8).unwrap();
        let (opened, report) = Open
            .execute(
                image,
                OpenParams {
                    mode: ProcessingMode::Sequential,
                    max_diameter: None,
                },
            )
            .unwrap();
        assert_eq!(Open.name(), "maximal_ball_opening");
        assert!(opened.is_opened());
        assert_eq!(report.max_diameter, 7);
    }
}
