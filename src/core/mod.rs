//! Core phase-coherence processing modules

pub mod iq_field;
pub mod scalar_field;
pub mod ncp;
pub mod sidelobe;
pub mod phase_error;
pub mod smoothing;
pub mod refractivity;
pub mod scan;
pub mod targets;
pub mod reference;

// Re-export main types
pub use iq_field::IqField;
pub use scalar_field::{ScalarField, PixelCount};
pub use ncp::{NEAR_RANGE_NCP, strength_attenuation, fluctuation_correction, bias_corrected_coherence};
pub use sidelobe::{MIN_SIDE_CORRECTION, sidelobe_derating};
pub use phase_error::{PhaseError, PhaseErrorField};
pub use refractivity::phase_slope_to_n;
pub use scan::Scan;
pub use targets::{TargetAccumulator, CalibrationProducts, MIN_TARGET_SCANS};
pub use reference::ReferenceAccumulator;
