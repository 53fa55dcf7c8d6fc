//! Ball-size grouping clusterer
//!
//! Processes inscribed-ball diameters from largest to smallest. At each
//! diameter the Extend step hands every ball-boundary voxel the cluster of
//! the biggest neighboring ball, the Group step fuses centers whose balls
//! overlap, and a final Recluster pass applies the accumulated fusions so
//! that one canonical center names each discrete pore body.

use std::collections::BTreeSet;

use porovox_backend::{ParallelStrategy, ProcessingMode};
use porovox_core::volume::{BoundingBox, Offset3, PoreMap, Position, VolumeDims};
use porovox_core::{Image, ProgressAdapter, Result};

use super::fusion::FusionMap;
use super::{ClusterParams, ClusterReport, ClusteringStrategy};
use crate::morphology::ElementCache;

pub(super) fn run(
    image: &mut Image,
    params: &ClusterParams,
    progress: &mut dyn ProgressAdapter,
) -> Result<ClusterReport> {
    let dims = image.dims();
    let map = image.pore_map();
    let mut cache = ElementCache::new();
    let mut fusion = FusionMap::new();

    let entries = map.sorted_entries();
    let mut level_set = BTreeSet::new();
    for &(_, v) in &entries {
        if v.diam_max > 0 {
            level_set.insert(v.diam_max);
        }
    }
    let levels: Vec<i8> = level_set.into_iter().rev().collect();

    progress.set_range(levels.len() + 1);
    let mut merges = 0usize;

    for (pass, &d) in levels.iter().enumerate() {
        let level: Vec<u32> = entries
            .iter()
            .filter(|&&(_, v)| v.diam_max == d)
            .map(|&(k, _)| k)
            .collect();

        // The widened mask lets diameter-1 voxels reach their six
        // neighbors; without it the smallest level could never adopt.
        let element = cache.get(i32::from(d) + 2)?;

        set_level_marker(map, &level, -d, params.mode);
        extend_level(map, dims, &level, d, element.corner(), params.mode);
        set_level_marker(map, &level, d, params.mode);

        merges += group_level(map, dims, &level, d, &mut fusion);
        progress.update(pass + 1, &format!("grouping at diameter {d}"));
    }

    let clusters = recluster(map, &mut fusion);
    progress.update(levels.len() + 1, "resolving fusions");

    Ok(ClusterReport {
        strategy: ClusteringStrategy::BallGrouping,
        clusters,
        merges,
        passes: levels.len(),
    })
}

/// Flip `diam_max` for every voxel of the current level. Negative values
/// are the in-progress marker the Extend scan uses to tell same-level
/// voxels from already-processed larger balls.
fn set_level_marker(map: &PoreMap, level: &[u32], value: i8, mode: ProcessingMode) {
    mode.par_for_each(0..level.len(), |i| {
        map.update(level[i], |v| v.diam_max = value);
    });
}

/// Extend step: each level voxel adopts the cluster of the largest-ball
/// neighbor under the mask, ties broken by nearer neighbor then smaller
/// index. Same-level voxels carry a negated diameter, so the magnitude
/// filter skips them; the scan writes only level voxels and reads only
/// finished levels, making it order-independent.
fn extend_level(
    map: &PoreMap,
    dims: VolumeDims,
    level: &[u32],
    diameter: i8,
    mask: &[Offset3],
    mode: ProcessingMode,
) {
    let floor = diameter.unsigned_abs();
    mode.par_for_each(0..level.len(), |i| {
        let k = level[i];
        let p = dims.position_of(k as usize);
        let mut best: Option<(u8, i64, u32, i32)> = None;
        for &o in mask {
            let q = p.offset(o);
            if !dims.contains(q) {
                continue;
            }
            let qi = dims.linear_index(q) as u32;
            let Some(n) = map.get(qi) else { continue };
            let mag = n.diam_max.unsigned_abs();
            if mag <= floor || n.cluster < 0 {
                continue;
            }
            let n2 = o.norm2();
            let better = match best {
                None => true,
                Some((bm, bn, bi, _)) => {
                    mag > bm || (mag == bm && (n2 < bn || (n2 == bn && qi < bi)))
                }
            };
            if better {
                best = Some((mag, n2, qi, n.cluster));
            }
        }
        if let Some((_, _, _, cluster)) = best {
            map.update(k, |v| v.cluster = cluster);
        }
    });
}

/// Group step: fuse the centers named by this level whose diameter-`d`
/// balls overlap. Bounding boxes give a cheap reject before the exact
/// squared-distance test; the distance bound is strict, so centers exactly
/// one ball apart stay separate.
fn group_level(
    map: &PoreMap,
    dims: VolumeDims,
    level: &[u32],
    diameter: i8,
    fusion: &mut FusionMap,
) -> usize {
    let mut ids = BTreeSet::new();
    for &k in level {
        if let Some(v) = map.get(k) {
            if v.cluster >= 0 {
                ids.insert(v.cluster);
            }
        }
    }

    let half = (f64::from(diameter) * 1.41).ceil() as i32;
    let limit = 4 * i64::from(diameter) * i64::from(diameter);
    let centers: Vec<(i32, Position, BoundingBox)> = ids
        .into_iter()
        .map(|id| {
            let p = dims.position_of(id as usize);
            (id, p, BoundingBox::around(p, half))
        })
        .collect();

    let mut merges = 0;
    for i in 0..centers.len() {
        let (a, pa, ba) = centers[i];
        for &(b, pb, bb) in &centers[i + 1..] {
            if ba.overlaps(&bb) && pa.dist2(&pb) < limit && fusion.fuse(a, b) {
                merges += 1;
            }
        }
    }
    merges
}

/// Recluster step: rewrite every voxel to its canonical cluster and give
/// voxels no pass claimed a singleton id. Serial so the fusion map can
/// compress paths while resolving.
fn recluster(map: &PoreMap, fusion: &mut FusionMap) -> usize {
    let mut distinct = BTreeSet::new();
    for k in map.sorted_indices() {
        let Some(v) = map.get(k) else { continue };
        let id = if v.cluster < 0 {
            k as i32
        } else {
            fusion.resolve(v.cluster)
        };
        distinct.insert(id);
        if id != v.cluster {
            map.update(k, |e| e.cluster = id);
        }
    }
    distinct.len()
}

#[cfg(test)]
mod tests {
    use super::super::cluster_pores;
    use super::*;
    use crate::morphology::{open, OpenParams};
    use porovox_backend::CpuBackend;
    use porovox_core::NullProgress;
    use std::collections::HashMap;

    fn sequential_params() -> ClusterParams {
        ClusterParams {
            strategy: ClusteringStrategy::BallGrouping,
            mode: ProcessingMode::Sequential,
            watershed_radius_cap: 4,
        }
    }

    fn open_sequential(image: &mut Image) {
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        let params = OpenParams {
            mode: ProcessingMode::Sequential,
            max_diameter: None,
        };
        open(image, &backend, &params, &mut NullProgress).unwrap();
    }

    /// Two 3-cube pockets joined by a five-voxel channel along y = z = 2.
    /// Long enough that the pocket centers sit past the fusion distance.
    fn two_pocket_image() -> Image {
        let mut image = Image::new(13, 5, 5).unwrap();
        for i in 0..image.dims().voxel_count() {
            let p = image.dims().position_of(i);
            image.set(p, true).unwrap();
        }
        for z in 1..4 {
            for y in 1..4 {
                for x in 1..4 {
                    image.set(Position::new(x, y, z), false).unwrap();
                }
                for x in 9..12 {
                    image.set(Position::new(x, y, z), false).unwrap();
                }
            }
        }
        for x in 4..9 {
            image.set(Position::new(x, 2, 2), false).unwrap();
        }
        image
    }

    fn cluster_of(image: &Image, x: i32, y: i32, z: i32) -> i32 {
        let index = image.dims().linear_index(Position::new(x, y, z)) as u32;
        image.pore_map().get(index).unwrap().cluster
    }

    #[test]
    fn test_two_pockets_stay_separate() {
        let mut image = two_pocket_image();
        open_sequential(&mut image);
        let report =
            cluster_pores(&mut image, &sequential_params(), &mut NullProgress).unwrap();

        assert_eq!(report.passes, 2, "diameters 3 and 1");
        assert_eq!(report.clusters, 3);

        // Each pocket plus its two nearest channel voxels forms one body;
        // the middle channel voxel is too far from either to join.
        let left = cluster_of(&image, 2, 2, 2);
        assert_eq!(cluster_of(&image, 1, 1, 1), left);
        assert_eq!(cluster_of(&image, 4, 2, 2), left);
        assert_eq!(cluster_of(&image, 5, 2, 2), left);
        let right = cluster_of(&image, 10, 2, 2);
        assert_ne!(left, right);
        assert_eq!(cluster_of(&image, 7, 2, 2), right);
        let middle = image.dims().linear_index(Position::new(6, 2, 2));
        assert_eq!(cluster_of(&image, 6, 2, 2), middle as i32);

        let mut sizes: HashMap<i32, u64> = HashMap::new();
        image.pore_map().for_each(|_, v| {
            assert!(v.cluster >= 0, "every voxel ends with a finalized id");
            assert!(v.diam_max > 0, "in-progress markers must be restored");
            *sizes.entry(v.cluster).or_insert(0) += 1;
        });
        let mut counts: Vec<u64> = sizes.values().copied().collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(counts, vec![29, 29, 1]);
    }

    #[test]
    fn test_fusion_distance_is_strict() {
        // Open pore space with three hand-planted diameter-3 balls: the
        // first pair sits exactly one ball apart and must stay separate,
        // the second pair overlaps and must fuse.
        let mut image = Image::new(20, 5, 5).unwrap();
        image.build_pore_map();
        image.mark_opened();
        let dims = image.dims();
        let plant = |image: &Image, x: i32| {
            let index = dims.linear_index(Position::new(x, 2, 2)) as u32;
            image.pore_map().update(index, |v| {
                v.diam_max = 3;
                v.cluster = index as i32;
            });
            index
        };
        let a = plant(&image, 2);
        let b = plant(&image, 8);
        let c = plant(&image, 10);

        let report =
            cluster_pores(&mut image, &sequential_params(), &mut NullProgress).unwrap();
        assert_eq!(report.merges, 1, "only the overlapping pair fuses");

        let get = |k: u32| image.pore_map().get(k).unwrap();
        assert_ne!(get(a).cluster, get(b).cluster, "distance 2d is not a fusion");
        assert_eq!(get(b).cluster, get(c).cluster);
        assert_eq!(get(b).cluster, b as i32, "smaller id is canonical");
        assert_eq!(get(a).diam_max, 3, "marker restored after the level");
    }

    #[test]
    fn test_repeat_run_keeps_partition() {
        let mut image = two_pocket_image();
        open_sequential(&mut image);
        cluster_pores(&mut image, &sequential_params(), &mut NullProgress).unwrap();
        let first = image.pore_map().sorted_entries();
        cluster_pores(&mut image, &sequential_params(), &mut NullProgress).unwrap();
        let second = image.pore_map().sorted_entries();

        let mut fwd: HashMap<i32, i32> = HashMap::new();
        let mut rev: HashMap<i32, i32> = HashMap::new();
        for (&(k1, v1), &(k2, v2)) in first.iter().zip(&second) {
            assert_eq!(k1, k2);
            assert_eq!(
                *fwd.entry(v1.cluster).or_insert(v2.cluster),
                v2.cluster,
                "rerun split a cluster"
            );
            assert_eq!(
                *rev.entry(v2.cluster).or_insert(v1.cluster),
                v1.cluster,
                "rerun merged two clusters"
            );
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut seq = two_pocket_image();
        let mut par = two_pocket_image();
        open_sequential(&mut seq);
        open_sequential(&mut par);
        cluster_pores(&mut seq, &sequential_params(), &mut NullProgress).unwrap();
        let params = ClusterParams {
            strategy: ClusteringStrategy::BallGrouping,
            mode: ProcessingMode::Parallel,
            watershed_radius_cap: 4,
        };
        cluster_pores(&mut par, &params, &mut NullProgress).unwrap();
        assert_eq!(
            seq.pore_map().sorted_entries(),
            par.pore_map().sorted_entries(),
            "extend writes only level voxels, so scheduling cannot show"
        );
    }

    #[test]
    fn test_progress_reports_levels_and_resolution() {
        let mut image = Image::new(8, 8, 8).unwrap();
        open_sequential(&mut image);
        let mut progress = porovox_core::progress::RecordingProgress::default();
        cluster_pores(&mut image, &sequential_params(), &mut progress).unwrap();
        // Levels 7, 5, 3, 1 plus the fusion-resolution step
        assert_eq!(progress.ranges, vec![5]);
        assert_eq!(progress.updates.len(), 5);
        assert_eq!(progress.updates[4].0, 5);
    }

    #[test]
    fn test_empty_pore_map_yields_no_clusters() {
        let mut image = Image::new(6, 6, 6).unwrap();
        for i in 0..image.dims().voxel_count() {
            let p = image.dims().position_of(i);
            image.set(p, true).unwrap();
        }
        open_sequential(&mut image);
        let report =
            cluster_pores(&mut image, &sequential_params(), &mut NullProgress).unwrap();
        assert_eq!(report.clusters, 0);
        assert_eq!(report.merges, 0);
        assert_eq!(report.passes, 0);
    }
}
