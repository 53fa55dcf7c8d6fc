//! Border classification of a phase's boundary voxels
//!
//! The classifier partitions the boundary of one phase (solid or pore) into
//! two front lists. A boundary voxel whose two immediate neighbors along
//! some axis both belong to the opposite phase sits on a locally thin or
//! flat feature and is classed **surface**; every other boundary voxel is
//! **corner**. Surface fronts can be dilated with the cheap axis-arm
//! element, corner fronts need the full ball.

use porovox_backend::{ParallelStrategy, ProcessingMode};
use porovox_core::volume::{FrontSets, PackedVolume, Position};

/// Which phase the classifier walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Solid,
    Pore,
}

impl Phase {
    fn as_bit(self) -> bool {
        matches!(self, Phase::Solid)
    }
}

/// Classify the boundary voxels of `phase` into surface and corner fronts.
///
/// A voxel belongs to a front when at least one of its 26 neighbors is the
/// opposite phase; neighbors outside the volume count as neither phase.
/// Output order is slab-major and deterministic for a given volume.
pub fn classify_fronts(volume: &PackedVolume, phase: Phase, mode: ProcessingMode) -> FrontSets {
    let dims = volume.dims();
    let target = phase.as_bit();

    let slabs: Vec<(Vec<u32>, Vec<u32>)> = mode.par_map(0..dims.depth as usize, |z| {
        let z = z as i32;
        let mut surface = Vec::new();
        let mut corner = Vec::new();
        for y in 0..dims.height {
            for x in 0..dims.width {
                let p = Position::new(x, y, z);
                // Safety: p is generated inside the volume bounds.
                if unsafe { volume.get_unchecked(p) } != target {
                    continue;
                }
                match classify_voxel(volume, p, target) {
                    Some(true) => surface.push(dims.linear_index(p) as u32),
                    Some(false) => corner.push(dims.linear_index(p) as u32),
                    None => {}
                }
            }
        }
        (surface, corner)
    });

    let mut fronts = FrontSets::new();
    for (surface, corner) in slabs {
        fronts.surface.extend(surface);
        fronts.corner.extend(corner);
    }
    fronts
}

/// `Some(true)` surface, `Some(false)` corner, `None` interior.
fn classify_voxel(volume: &PackedVolume, p: Position, target: bool) -> Option<bool> {
    let dims = volume.dims();
    let opposite = |x: i32, y: i32, z: i32| {
        let q = Position::new(x, y, z);
        // Safety: the contains() check short-circuits out-of-bounds reads.
        dims.contains(q) && unsafe { volume.get_unchecked(q) } != target
    };

    let mut front = false;
    for axis in 0..3 {
        let (dx, dy, dz) = match axis {
            0 => (1, 0, 0),
            1 => (0, 1, 0),
            _ => (0, 0, 1),
        };
        let forward = opposite(p.x + dx, p.y + dy, p.z + dz);
        let backward = opposite(p.x - dx, p.y - dy, p.z - dz);
        if forward && backward {
            return Some(true);
        }
        front |= forward || backward;
    }
    if front {
        return Some(false);
    }

    // No axis neighbor differs; only a diagonal can still make this a front
    for dz in -1i32..=1 {
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if dx.abs() + dy.abs() + dz.abs() < 2 {
                    continue;
                }
                if opposite(p.x + dx, p.y + dy, p.z + dz) {
                    return Some(false);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use porovox_core::volume::VolumeDims;

    fn volume_with(dims: (i32, i32, i32), solids: &[(i32, i32, i32)]) -> PackedVolume {
        let dims = VolumeDims::new(dims.0, dims.1, dims.2).unwrap();
        let mut volume = PackedVolume::new(dims);
        for &(x, y, z) in solids {
            volume.set(Position::new(x, y, z), true).unwrap();
        }
        volume
    }

    #[test]
    fn test_isolated_voxel_is_surface() {
        let volume = volume_with((5, 5, 5), &[(2, 2, 2)]);
        let fronts = classify_fronts(&volume, Phase::Solid, ProcessingMode::Sequential);
        let dims = volume.dims();
        assert_eq!(
            fronts.surface,
            vec![dims.linear_index(Position::new(2, 2, 2)) as u32]
        );
        assert!(fronts.corner.is_empty());
    }

    #[test]
    fn test_half_space_wall_is_corner() {
        // Solid fills z = 0 and z = 1; only the z = 1 face is a front
        let dims = VolumeDims::new(4, 4, 4).unwrap();
        let mut volume = PackedVolume::new(dims);
        for z in 0..2 {
            for y in 0..4 {
                for x in 0..4 {
                    volume.set(Position::new(x, y, z), true).unwrap();
                }
            }
        }
        let fronts = classify_fronts(&volume, Phase::Solid, ProcessingMode::Sequential);
        assert!(fronts.surface.is_empty(), "one-sided exposure is not flat");
        assert_eq!(fronts.corner.len(), 16);
        for &i in &fronts.corner {
            assert_eq!(dims.position_of(i as usize).z, 1);
        }
    }

    #[test]
    fn test_thin_plate_is_surface() {
        let dims = VolumeDims::new(5, 5, 5).unwrap();
        let mut volume = PackedVolume::new(dims);
        for y in 0..5 {
            for x in 0..5 {
                volume.set(Position::new(x, y, 2), true).unwrap();
            }
        }
        let fronts = classify_fronts(&volume, Phase::Solid, ProcessingMode::Sequential);
        assert_eq!(fronts.surface.len(), 25, "both z neighbors of a plate are pore");
        assert!(fronts.corner.is_empty());
    }

    #[test]
    fn test_pore_phase_around_single_solid() {
        let volume = volume_with((5, 5, 5), &[(2, 2, 2)]);
        let fronts = classify_fronts(&volume, Phase::Pore, ProcessingMode::Sequential);
        // Each of the 26 touching pore voxels sees exactly one solid
        // neighbor, so no axis pair qualifies as flat
        assert!(fronts.surface.is_empty());
        assert_eq!(fronts.corner.len(), 26);
    }

    #[test]
    fn test_interior_voxels_are_not_fronts() {
        let dims = VolumeDims::new(6, 6, 6).unwrap();
        let mut volume = PackedVolume::new(dims);
        for z in 0..6 {
            for y in 0..6 {
                for x in 0..6 {
                    if x < 3 {
                        volume.set(Position::new(x, y, z), true).unwrap();
                    }
                }
            }
        }
        let fronts = classify_fronts(&volume, Phase::Solid, ProcessingMode::Sequential);
        let total = fronts.surface.len() + fronts.corner.len();
        assert_eq!(total, 36, "only the x = 2 face borders pore space");
        for &i in fronts.surface.iter().chain(&fronts.corner) {
            assert_eq!(dims.position_of(i as usize).x, 2);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dims = VolumeDims::new(12, 9, 7).unwrap();
        let mut volume = PackedVolume::new(dims);
        for i in (0..dims.voxel_count()).step_by(5) {
            volume.set(dims.position_of(i), true).unwrap();
        }
        let seq = classify_fronts(&volume, Phase::Solid, ProcessingMode::Sequential);
        let par = classify_fronts(&volume, Phase::Solid, ProcessingMode::Parallel);
        assert_eq!(seq.surface, par.surface);
        assert_eq!(seq.corner, par.corner);
    }
}
