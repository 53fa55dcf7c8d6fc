//! Mathematical morphology on the packed voxel phases
//!
//! Everything here operates on the solid/pore partition of an
//! [`Image`](porovox_core::Image):
//! - **Border classification**: split a phase's boundary voxels into flat
//!   ("surface") and curved ("corner") fronts
//! - **Maximal-ball opening**: assign every pore voxel the diameter of the
//!   largest inscribed sphere that covers it
//! - **Denoising**: one erosion plus one dilation at a fixed diameter to
//!   strip thin spurious solids

mod border;
mod denoise;
mod element;
mod opening;

pub use border::{classify_fronts, Phase};
pub use denoise::{denoise, Denoise, DenoiseParams};
pub use element::{ElementCache, SphereElement};
pub use opening::{open, Open, OpenParams, OpenReport};
