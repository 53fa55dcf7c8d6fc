//! Morphological denoising of the solid phase
//!
//! One erosion followed by one dilation at a fixed diameter. Solid features
//! thinner than the diameter disappear in the erosion and leave no boundary
//! to regrow from; thicker structures lose their skin and get it back.

use porovox_backend::{CpuBackend, MorphologyBackend, ProcessingMode};
use porovox_core::{
    Algorithm, Error, Image, NullProgress, ParallelAlgorithm, ProgressAdapter, Result,
};

use super::border::{classify_fronts, Phase};
use super::element::SphereElement;

/// Parameters for denoising
#[derive(Debug, Clone, Copy)]
pub struct DenoiseParams {
    /// Structuring element diameter; 1 is the identity
    pub diameter: i32,
    /// Execution mode for the classification scans
    pub mode: ProcessingMode,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            diameter: 3,
            mode: ProcessingMode::default(),
        }
    }
}

/// Erode then re-dilate the solid phase at `params.diameter`.
///
/// Mutates only the raw voxel buffer. Derived state (pore map, processed
/// snapshots, cached counts) is invalidated; rerun the opener afterwards if
/// morphology queries are needed.
pub fn denoise(
    image: &mut Image,
    backend: &dyn MorphologyBackend,
    params: &DenoiseParams,
    progress: &mut dyn ProgressAdapter,
) -> Result<()> {
    if params.diameter < 1 {
        return Err(Error::InvalidParameter {
            name: "diameter",
            value: params.diameter.to_string(),
            reason: "denoise diameter must be at least 1".to_string(),
        });
    }
    let element = SphereElement::build(params.diameter)?;
    progress.set_range(2);

    let volume = image.raw_mut();
    let pore_fronts = classify_fronts(volume, Phase::Pore, params.mode);
    backend.erode(volume, &pore_fronts, element.surface(), element.corner())?;
    progress.update(1, "eroded thin solids");

    let solid_fronts = classify_fronts(volume, Phase::Solid, params.mode);
    backend.dilate(volume, &solid_fronts, element.surface(), element.corner())?;
    progress.update(2, "restored solid boundary");
    Ok(())
}

/// Thin-feature removal algorithm
pub struct Denoise;

impl Algorithm for Denoise {
    type Input = Image;
    type Output = Image;
    type Params = DenoiseParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "denoise"
    }

    fn description(&self) -> &'static str {
        "Removes solid features thinner than the chosen diameter"
    }

    fn execute(&self, mut input: Image, params: DenoiseParams) -> Result<Image> {
        let backend = CpuBackend::new(params.mode);
        denoise(&mut input, &backend, &params, &mut NullProgress)?;
        Ok(input)
    }
}

impl ParallelAlgorithm for Denoise {
    fn execute_parallel(&self, input: Image, mut params: DenoiseParams) -> Result<Image> {
        params.mode = ProcessingMode::Parallel;
        self.execute(input, params)
    }
}
