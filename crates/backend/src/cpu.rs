//! CPU execution of the morphology primitives

use porovox_core::volume::{AtomicView, FrontSets, Offset3, PackedVolume};
use porovox_core::Result;

use crate::strategy::{ParallelStrategy, ProcessingMode};
use crate::MorphologyBackend;

/// Worker-pool backend: blocked scans over the front lists with atomic bit
/// writes into the shared packed buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend {
    pub mode: ProcessingMode,
}

impl CpuBackend {
    pub fn new(mode: ProcessingMode) -> Self {
        Self { mode }
    }

    fn apply(&self, view: AtomicView<'_>, list: &[u32], offsets: &[Offset3], solid: bool) {
        let dims = view.dims();
        self.mode.par_for_each(0..list.len(), |i| {
            let p = dims.position_of(list[i] as usize);
            for &o in offsets {
                let q = p.offset(o);
                if dims.contains(q) {
                    if solid {
                        view.set_solid(q);
                    } else {
                        view.clear_solid(q);
                    }
                }
            }
        });
    }
}

impl MorphologyBackend for CpuBackend {
    fn dilate(
        &self,
        volume: &mut PackedVolume,
        fronts: &FrontSets,
        surface: &[Offset3],
        corner: &[Offset3],
    ) -> Result<()> {
        let view = volume.atomic();
        self.apply(view, &fronts.surface, surface, true);
        self.apply(view, &fronts.corner, corner, true);
        Ok(())
    }

    fn erode(
        &self,
        volume: &mut PackedVolume,
        fronts: &FrontSets,
        surface: &[Offset3],
        corner: &[Offset3],
    ) -> Result<()> {
        let view = volume.atomic();
        self.apply(view, &fronts.surface, surface, false);
        self.apply(view, &fronts.corner, corner, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use porovox_core::volume::{Position, VolumeDims};

    fn center_cross() -> (PackedVolume, FrontSets, Vec<Offset3>) {
        let dims = VolumeDims::new(7, 7, 7).unwrap();
        let mut volume = PackedVolume::new(dims);
        let center = Position::new(3, 3, 3);
        volume.set(center, true).unwrap();
        let fronts = FrontSets {
            surface: vec![],
            corner: vec![dims.linear_index(center) as u32],
        };
        let offsets = vec![
            Offset3::new(0, 0, 0),
            Offset3::new(1, 0, 0),
            Offset3::new(-1, 0, 0),
            Offset3::new(0, 1, 0),
            Offset3::new(0, -1, 0),
            Offset3::new(0, 0, 1),
            Offset3::new(0, 0, -1),
        ];
        (volume, fronts, offsets)
    }

    #[test]
    fn test_dilate_paints_offsets() {
        let (mut volume, fronts, offsets) = center_cross();
        let backend = CpuBackend::new(ProcessingMode::Sequential);
        backend.dilate(&mut volume, &fronts, &[], &offsets).unwrap();
        assert_eq!(volume.solid_count(), 7);
        assert!(volume.get(Position::new(4, 3, 3)).unwrap());
        assert!(volume.get(Position::new(3, 3, 2)).unwrap());
        assert!(!volume.get(Position::new(4, 4, 3)).unwrap());
    }

    #[test]
    fn test_dilate_clips_at_boundary() {
        let dims = VolumeDims::new(3, 3, 3).unwrap();
        let mut volume = PackedVolume::new(dims);
        let corner = Position::new(0, 0, 0);
        volume.set(corner, true).unwrap();
        let fronts = FrontSets {
            surface: vec![dims.linear_index(corner) as u32],
            corner: vec![],
        };
        let offsets = vec![Offset3::new(-1, 0, 0), Offset3::new(1, 0, 0)];
        let backend = CpuBackend::default();
        backend.dilate(&mut volume, &fronts, &offsets, &[]).unwrap();
        // The out-of-bounds arm is dropped, the in-bounds one lands
        assert_eq!(volume.solid_count(), 2);
        assert!(volume.get(Position::new(1, 0, 0)).unwrap());
    }

    #[test]
    fn test_erode_clears_offsets() {
        let (volume, fronts, offsets) = center_cross();
        // Everything solid except the original center voxel
        let mut all = volume.complemented();
        let backend = CpuBackend::new(ProcessingMode::Parallel);
        backend.erode(&mut all, &fronts, &[], &offsets).unwrap();
        assert_eq!(all.solid_count(), 7 * 7 * 7 - 1 - 6);
        assert!(!all.get(Position::new(3, 3, 3)).unwrap());
        assert!(!all.get(Position::new(2, 3, 3)).unwrap());
        assert!(all.get(Position::new(2, 2, 3)).unwrap());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dims = VolumeDims::new(16, 16, 16).unwrap();
        let mut seq = PackedVolume::new(dims);
        let mut indices = Vec::new();
        for i in (0..dims.voxel_count()).step_by(37) {
            seq.set(dims.position_of(i), true).unwrap();
            indices.push(i as u32);
        }
        let mut par = seq.clone();
        let fronts = FrontSets {
            surface: indices.clone(),
            corner: indices,
        };
        let offsets: Vec<Offset3> = (-1..=1)
            .flat_map(|dz| {
                (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| Offset3::new(dx, dy, dz)))
            })
            .collect();

        CpuBackend::new(ProcessingMode::Sequential)
            .dilate(&mut seq, &fronts, &offsets, &offsets)
            .unwrap();
        CpuBackend::new(ProcessingMode::Parallel)
            .dilate(&mut par, &fronts, &offsets, &offsets)
            .unwrap();
        assert_eq!(seq, par, "bit writes are commutative, scans must agree");
    }
}
