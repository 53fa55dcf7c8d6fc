//! Summary statistics over an opened pore map

use std::collections::{BTreeMap, HashMap};

use porovox_core::{Error, Image, Result};

/// Voxel count per inscribed-ball diameter.
///
/// The map orders ascending by diameter, matching how the distribution is
/// usually plotted.
pub fn size_distribution(image: &Image) -> Result<BTreeMap<i8, u64>> {
    if !image.is_opened() {
        return Err(Error::NotOpened);
    }
    let mut distribution = BTreeMap::new();
    image.pore_map().for_each(|_, v| {
        *distribution.entry(v.diam_max).or_insert(0u64) += 1;
    });
    Ok(distribution)
}

/// Voxel count per cluster id, largest body first (ties by id).
pub fn cluster_sizes(image: &Image) -> Result<Vec<(i32, u64)>> {
    if !image.is_opened() {
        return Err(Error::NotOpened);
    }
    let mut counts: HashMap<i32, u64> = HashMap::new();
    image.pore_map().for_each(|_, v| {
        *counts.entry(v.cluster).or_insert(0) += 1;
    });
    let mut sizes: Vec<(i32, u64)> = counts.into_iter().collect();
    sizes.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(sizes)
}
