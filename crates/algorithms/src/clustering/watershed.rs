//! Watershed clusterer
//!
//! Smooths the centered-ball distance field, seeds one cluster per local
//! maximum, then floods every remaining voxel uphill until it reaches a
//! seeded basin. Voxels adopted within a round carry an encoded negative
//! id until the round ends, so a round only ever ascends into voxels that
//! were already resolved when it started. When no voxel can ascend, the
//! search radius widens, up to the configured cap; anything still
//! unresolved past the cap becomes its own singleton.
//!
//! Smoothing rewrites `dist_min` in place, so running the watershed again
//! on the same image smooths the field a second time.

use std::collections::BTreeSet;

use porovox_backend::ParallelStrategy;
use porovox_core::volume::{Offset3, UNASSIGNED};
use porovox_core::{Image, ProgressAdapter, Result};

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
    let range = map.len() + 2;
    progress.set_range(range);

    // Median pass: replace each centered-ball diameter with the rounded
    // mean over the 3x3x3 pore neighborhood. The snapshot keeps every
    // read at the pre-pass value.
    let entries = map.sorted_entries();
    let smoothed: Vec<(u32, i8)> = params.mode.par_map(0..entries.len(), |i| {
        let (k, _) = entries[i];
        let p = dims.position_of(k as usize);
        let mut sum = 0i64;
        let mut count = 0i64;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let q = p.offset(Offset3::new(dx, dy, dz));
                    if !dims.contains(q) {
                        continue;
                    }
                    let qi = dims.linear_index(q) as u32;
                    if let Ok(slot) = entries.binary_search_by_key(&qi, |&(key, _)| key) {
                        sum += i64::from(entries[slot].1.dist_min);
                        count += 1;
                    }
                }
            }
        }
        // count >= 1 since the voxel itself is an entry
        (k, ((2 * sum + count) / (2 * count)) as i8)
    });
    params.mode.par_for_each(0..smoothed.len(), |i| {
        let (k, value) = smoothed[i];
        map.set_distance(k, value);
    });
    progress.update(1, "smoothed radius field");

    // Init pass: local maxima of the smoothed field seed their own
    // cluster, everything else is queued unresolved.
    let entries = map.sorted_entries();
    let mut queue: Vec<u32> = params
        .mode
        .par_map(0..entries.len(), |i| {
            let (k, v) = entries[i];
            if v.diam_max > 0 && v.diam_max == v.dist_min {
                map.update(k, |e| e.cluster = k as i32);
                None
            } else {
                map.update(k, |e| e.cluster = UNASSIGNED);
                Some(k)
            }
        })
        .into_iter()
        .flatten()
        .collect();
    progress.update(2, "seeded local maxima");

    let mut passes = 0usize;
    let mut adoptions = 0usize;
    let mut radius = 1i32;
    while !queue.is_empty() && radius <= params.watershed_radius_cap {
        let element = cache.get(2 * radius + 1)?;
        let mask = element.corner();
        passes += 1;

        let resolved: Vec<bool> = params.mode.par_map(0..queue.len(), |i| {
            let k = queue[i];
            let Some(v) = map.get(k) else { return false };
            let p = dims.position_of(k as usize);
            let mut best: Option<(i8, i64, u32, i32)> = None;
            for &o in mask {
                let q = p.offset(o);
                if !dims.contains(q) {
                    continue;
                }
                let qi = dims.linear_index(q) as u32;
                let Some(n) = map.get(qi) else { continue };
                if n.dist_min <= v.dist_min {
                    continue;
                }
                let n2 = o.norm2();
                let better = match best {
                    None => true,
                    Some((bd, bn, bi, _)) => {
                        n.dist_min > bd || (n.dist_min == bd && (n2 < bn || (n2 == bn && qi < bi)))
                    }
                };
                if better {
                    best = Some((n.dist_min, n2, qi, n.cluster));
                }
            }
            // Adopt only from a resolved basin; in-round adoptions sit at
            // an encoded negative value until the round closes, so they
            // are never ascended into early.
            match best {
                Some((_, _, _, id)) if id >= 0 => {
                    let marked = (-(i64::from(id) + 2)) as i32;
                    map.update(k, |e| e.cluster = marked);
                    true
                }
                _ => false,
            }
        });

        let mut advanced = 0usize;
        let mut remaining = Vec::with_capacity(queue.len());
        for (i, &k) in queue.iter().enumerate() {
            if resolved[i] {
                map.update(k, |e| e.cluster = (-i64::from(e.cluster) - 2) as i32);
                advanced += 1;
            } else {
                remaining.push(k);
            }
        }
        queue = remaining;
        adoptions += advanced;
        progress.update(2 + adoptions, &format!("flood round {passes}"));
        if advanced == 0 {
            radius += 1;
        }
    }

    // Past the radius cap every stranded voxel is its own pore body.
    for &k in &queue {
        map.update(k, |e| e.cluster = k as i32);
    }
    progress.update(range, "finalized clusters");

    let mut distinct = BTreeSet::new();
    map.for_each(|_, v| {
        distinct.insert(v.cluster);
    });

    Ok(ClusterReport {
        strategy: ClusteringStrategy::Watershed,
        clusters: distinct.len(),
        merges: adoptions,
        passes,
    })
}
