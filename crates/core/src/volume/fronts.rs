//! Border voxel index lists

/// Output of the front classifier: linear indices of front voxels, split by
/// local geometry.
///
/// `surface` voxels sit on a locally flat boundary (some axis has both
/// immediate neighbors in the opposite phase) and are safe to process with
/// the reduced axis mask; `corner` voxels need the full ball mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontSets {
    pub surface: Vec<u32>,
    pub corner: Vec<u32>,
}

impl FrontSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size both lists for an expected front population
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            surface: Vec::with_capacity(capacity),
            corner: Vec::with_capacity(capacity),
        }
    }

    /// Total front voxels across both sets
    pub fn len(&self) -> usize {
        self.surface.len() + self.corner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surface.is_empty() && self.corner.is_empty()
    }

    /// Drop the indices but keep the allocations
    pub fn clear(&mut self) {
        self.surface.clear();
        self.corner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len_and_clear() {
        let mut fronts = FrontSets::with_capacity(8);
        fronts.surface.extend([1, 2, 3]);
        fronts.corner.push(9);
        assert_eq!(fronts.len(), 4);
        assert!(!fronts.is_empty());

        fronts.clear();
        assert!(fronts.is_empty());
        assert!(fronts.surface.capacity() >= 3);
    }
}
