//! Sparse per-pore-voxel analysis records

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

/// Cluster value of a voxel no pass has claimed yet
pub const UNASSIGNED: i32 = -1;

/// Analysis state attached to one pore voxel.
///
/// `cluster` holds a representative center's linear index once assigned;
/// negative values other than [`UNASSIGNED`] are transient in-pass markers
/// used by the clustering algorithms. `diam_max` is the diameter of the
/// largest inscribed ball covering the voxel; `dist_min` the diameter of the
/// largest ball centered on it, reused as a smoothed radius field by the
/// watershed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoreVoxel {
    pub cluster: i32,
    pub diam_max: i8,
    pub dist_min: i8,
}

impl Default for PoreVoxel {
    fn default() -> Self {
        Self {
            cluster: UNASSIGNED,
            diam_max: 0,
            dist_min: 0,
        }
    }
}

const SHARD_COUNT: usize = 16;

/// Map from voxel linear index to its [`PoreVoxel`] record.
///
/// Entries exist exactly for pore voxels. The map is split into sixteen lock
/// shards keyed by the low index bits, so the parallel painting scans of the
/// opener update disjoint entries without serializing on one mutex. Per-entry
/// updates are commutative (largest diameter wins, then smallest center id),
/// making the outcome independent of scan completion order.
pub struct PoreMap {
    shards: [Mutex<HashMap<u32, PoreVoxel>>; SHARD_COUNT],
}

fn shard_of(index: u32) -> usize {
    index as usize & (SHARD_COUNT - 1)
}

impl PoreMap {
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }

    /// Remove all entries
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }

    /// Insert or replace the record for a voxel
    pub fn insert(&self, index: u32, voxel: PoreVoxel) {
        self.shards[shard_of(index)].lock().insert(index, voxel);
    }

    /// Copy out the record for a voxel
    pub fn get(&self, index: u32) -> Option<PoreVoxel> {
        self.shards[shard_of(index)].lock().get(&index).copied()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.shards[shard_of(index)].lock().contains_key(&index)
    }

    /// Raise a voxel's `diam_max` to `diameter`, adopting `cluster` as its
    /// provisional id. The larger diameter always wins; on equal diameters
    /// the smaller center id does, so concurrent claims resolve identically
    /// regardless of ordering. Indices without an entry (solid voxels) are
    /// ignored, keeping the entry set equal to the pore set.
    pub fn raise_diameter(&self, index: u32, diameter: i8, cluster: i32) {
        let mut shard = self.shards[shard_of(index)].lock();
        if let Some(v) = shard.get_mut(&index) {
            if diameter > v.diam_max
                || (diameter == v.diam_max && (v.cluster < 0 || cluster < v.cluster))
            {
                v.diam_max = diameter;
                v.cluster = cluster;
            }
        }
    }

    /// Record the centered-ball diameter for a voxel; ignored if absent
    pub fn set_distance(&self, index: u32, diameter: i8) {
        let mut shard = self.shards[shard_of(index)].lock();
        if let Some(v) = shard.get_mut(&index) {
            v.dist_min = diameter;
        }
    }

    /// Apply a closure to an existing entry; returns whether it existed
    pub fn update<F>(&self, index: u32, f: F) -> bool
    where
        F: FnOnce(&mut PoreVoxel),
    {
        match self.shards[shard_of(index)].lock().get_mut(&index) {
            Some(v) => {
                f(v);
                true
            }
            None => false,
        }
    }

    /// Visit every entry in unspecified order
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(u32, &PoreVoxel),
    {
        for shard in &self.shards {
            for (&index, voxel) in shard.lock().iter() {
                f(index, voxel);
            }
        }
    }

    /// Entry keys sorted ascending, for deterministic passes
    pub fn sorted_indices(&self) -> Vec<u32> {
        let mut keys = Vec::with_capacity(self.len());
        for shard in &self.shards {
            keys.extend(shard.lock().keys().copied());
        }
        keys.sort_unstable();
        keys
    }

    /// Entries sorted by key, for deterministic passes and the codec
    pub fn sorted_entries(&self) -> Vec<(u32, PoreVoxel)> {
        let mut entries = Vec::with_capacity(self.len());
        for shard in &self.shards {
            entries.extend(shard.lock().iter().map(|(&k, &v)| (k, v)));
        }
        entries.sort_unstable_by_key(|&(k, _)| k);
        entries
    }

    /// Largest `diam_max` present, 0 when empty
    pub fn max_diameter(&self) -> i8 {
        let mut max = 0i8;
        self.for_each(|_, v| {
            if v.diam_max > max {
                max = v.diam_max;
            }
        });
        max
    }
}

impl Default for PoreMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PoreMap {
    fn clone(&self) -> Self {
        Self {
            shards: std::array::from_fn(|i| Mutex::new(self.shards[i].lock().clone())),
        }
    }
}

impl fmt::Debug for PoreMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoreMap").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let map = PoreMap::new();
        assert!(map.is_empty());
        map.insert(42, PoreVoxel::default());
        assert_eq!(map.len(), 1);
        let v = map.get(42).unwrap();
        assert_eq!(v.cluster, UNASSIGNED);
        assert_eq!(v.diam_max, 0);
        assert!(map.get(43).is_none());
    }

    #[test]
    fn test_raise_diameter_keeps_largest() {
        let map = PoreMap::new();
        map.insert(7, PoreVoxel::default());
        map.raise_diameter(7, 3, 100);
        map.raise_diameter(7, 1, 200);
        let v = map.get(7).unwrap();
        assert_eq!(v.diam_max, 3);
        assert_eq!(v.cluster, 100);
    }

    #[test]
    fn test_raise_diameter_tie_prefers_smaller_center() {
        let map = PoreMap::new();
        map.insert(7, PoreVoxel::default());
        map.raise_diameter(7, 5, 900);
        map.raise_diameter(7, 5, 300);
        map.raise_diameter(7, 5, 500);
        let v = map.get(7).unwrap();
        assert_eq!(v.cluster, 300, "equal-diameter claims must resolve to the smallest id");
    }

    #[test]
    fn test_raise_diameter_ignores_missing_entry() {
        let map = PoreMap::new();
        map.raise_diameter(9, 5, 1);
        map.set_distance(9, 5);
        assert!(map.is_empty(), "writes to absent indices must not create entries");
    }

    #[test]
    fn test_sorted_entries_order() {
        let map = PoreMap::new();
        for i in [17u32, 2, 33, 16, 1] {
            map.insert(i, PoreVoxel::default());
        }
        let keys: Vec<u32> = map.sorted_entries().iter().map(|e| e.0).collect();
        assert_eq!(keys, vec![1, 2, 16, 17, 33]);
        assert_eq!(map.sorted_indices(), vec![1, 2, 16, 17, 33]);
    }

    #[test]
    fn test_max_diameter() {
        let map = PoreMap::new();
        assert_eq!(map.max_diameter(), 0);
        for (i, d) in [(1u32, 3i8), (2, 9), (3, 5)] {
            map.insert(i, PoreVoxel::default());
            map.raise_diameter(i, d, i as i32);
        }
        assert_eq!(map.max_diameter(), 9);
    }

    #[test]
    fn test_update_missing_entry() {
        let map = PoreMap::new();
        assert!(!map.update(5, |v| v.cluster = 1));
        map.insert(5, PoreVoxel::default());
        assert!(map.update(5, |v| v.cluster = 1));
        assert_eq!(map.get(5).unwrap().cluster, 1);
    }
}
