//! refract: phase-coherence processing for radar refractivity
//!
//! This library derives, from a window of radar scans, how reliable each
//! ground echo is as a refractivity target (its normalized coherent power),
//! the expected phase error of each target, and the phase-difference fields
//! from which refractivity is retrieved.

pub mod types;
pub mod params;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{IqSample, RealGrid, ScanGeometry, RefractError, RefractResult};
pub use params::{CalibParams, SmoothingParams, SidelobeParams, Sentinels};
pub use core::{
    IqField, ScalarField, PixelCount, PhaseError, PhaseErrorField,
    Scan, TargetAccumulator, CalibrationProducts, ReferenceAccumulator,
};
