//! Spherical structuring elements for volumetric morphology
//!
//! A structuring element is the offset neighborhood stamped around each
//! front voxel during dilation and erosion. Elements are discrete balls
//! parameterized by diameter, cached so repeated passes share one build.

use std::collections::BTreeMap;
use std::sync::Arc;

use porovox_core::volume::Offset3;
use porovox_core::{Error, Result};

/// Discrete sphere of a given diameter, in two offset variants.
///
/// The `corner` variant is the full ball: every integer offset whose doubled
/// squared norm stays within `(diameter - 1)^2`. Doubling gives even
/// diameters a half-integer bound so the ball stays symmetric around the
/// center voxel. The `surface` variant keeps only the six axis arms plus the
/// origin; it is sufficient where the local boundary is flat, and much
/// cheaper to stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SphereElement {
    diameter: i32,
    corner: Vec<Offset3>,
    surface: Vec<Offset3>,
}

impl SphereElement {
    /// Build both offset variants for `diameter` voxels.
    pub fn build(diameter: i32) -> Result<Self> {
        if diameter < 1 {
            return Err(Error::InvalidParameter {
                name: "diameter",
                value: diameter.to_string(),
                reason: "structuring element diameter must be at least 1".to_string(),
            });
        }
        let radius = (diameter - 1) / 2;
        let bound = (diameter - 1) * (diameter - 1);

        let mut corner = Vec::new();
        for dz in -radius..=radius {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if 4 * (dx * dx + dy * dy + dz * dz) <= bound {
                        corner.push(Offset3::new(dx, dy, dz));
                    }
                }
            }
        }

        let mut surface = Vec::with_capacity(6 * radius as usize + 1);
        surface.push(Offset3::new(0, 0, 0));
        for i in 1..=radius {
            surface.push(Offset3::new(i, 0, 0));
            surface.push(Offset3::new(-i, 0, 0));
            surface.push(Offset3::new(0, i, 0));
            surface.push(Offset3::new(0, -i, 0));
            surface.push(Offset3::new(0, 0, i));
            surface.push(Offset3::new(0, 0, -i));
        }

        Ok(Self {
            diameter,
            corner,
            surface,
        })
    }

    pub fn diameter(&self) -> i32 {
        self.diameter
    }

    /// Half-extent of the element in voxels
    pub fn radius(&self) -> i32 {
        (self.diameter - 1) / 2
    }

    /// Full-ball offsets, origin included
    pub fn corner(&self) -> &[Offset3] {
        &self.corner
    }

    /// Axis-arm offsets, origin included
    pub fn surface(&self) -> &[Offset3] {
        &self.surface
    }

    /// Number of voxels in the full ball
    pub fn volume(&self) -> usize {
        self.corner.len()
    }
}

/// Cache of built elements keyed by diameter.
///
/// Rebuilding an already-known diameter hands back the cached element, so
/// the opener's growing-diameter loop and the clusterers' per-level passes
/// share one offset list per diameter.
#[derive(Debug, Default)]
pub struct ElementCache {
    built: BTreeMap<i32, Arc<SphereElement>>,
}

impl ElementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the element for `diameter`, building it on first use.
    pub fn get(&mut self, diameter: i32) -> Result<Arc<SphereElement>> {
        if let Some(element) = self.built.get(&diameter) {
            return Ok(Arc::clone(element));
        }
        let element = Arc::new(SphereElement::build(diameter)?);
        self.built.insert(diameter, Arc::clone(&element));
        Ok(element)
    }

    pub fn len(&self) -> usize {
        self.built.len()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }
}
