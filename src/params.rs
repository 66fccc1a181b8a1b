//! Calibration parameters
//!
//! Every threshold used by the smoothing and sidelobe passes lives here and is
//! handed to the individual operations explicitly.

use crate::types::{RefractError, RefractResult, ScanGeometry};
use serde::{Deserialize, Serialize};

/// Sentinel values used when exchanging flat `f32` arrays with callers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentinels {
    /// "Not computed / not usable" marker for scalar fields
    pub invalid: f32,
    /// Bad-data marker on raw I, Q and SNR input
    pub bad: f32,
    /// Missing-data marker on raw I, Q and SNR input
    pub missing: f32,
    /// Exported in place of an unusable phase error
    pub very_large: f32,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            invalid: -999999.0,
            bad: -999999.0,
            missing: -999999.0,
            very_large: 2147483647.0,
        }
    }
}

impl Sentinels {
    /// True if `value` is flagged as bad or missing
    pub fn is_flagged(&self, value: f32) -> bool {
        value == self.bad || value == self.missing
    }
}

/// Kernel sizes for the close/far smoothing of the phase-difference field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// First gate handled by the far smoother (default `r_min + num_gates / 10`)
    pub max_close_range: Option<usize>,
    /// Half-width in gates of the far kernel (default `num_gates / 10`)
    pub half_range: Option<usize>,
    /// Half-width in beams of the far kernel (default `num_azimuth / 16`)
    pub half_azimuth: Option<usize>,
    /// Gate lag used by the double-difference operator (0 means 1)
    pub double_diff_lag: usize,
}

impl SmoothingParams {
    /// Gate at which close-range smoothing stops and far smoothing begins
    pub fn max_close_range(&self, geometry: &ScanGeometry, r_min: usize) -> usize {
        let max_r = self
            .max_close_range
            .unwrap_or(r_min + geometry.num_gates / 10);
        max_r.min(geometry.num_gates.saturating_sub(1))
    }

    pub fn half_range(&self, geometry: &ScanGeometry) -> usize {
        self.half_range.unwrap_or(geometry.num_gates / 10)
    }

    pub fn half_azimuth(&self, geometry: &ScanGeometry) -> usize {
        self.half_azimuth.unwrap_or(geometry.num_azimuth / 16)
    }

    pub fn lag(&self) -> usize {
        self.double_diff_lag.max(1)
    }
}

/// Sidelobe contamination thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidelobeParams {
    /// Antenna beam width in degrees
    pub beam_width_deg: f32,
    /// Contamination power used by the range-neighbour filter.
    /// Assumes pulse length equals gate spacing with a matched filter.
    pub range_contamination_power: f32,
    /// Integrated 360 degree sidelobe level in dB
    pub side_lobe_power_db: f32,
}

impl Default for SidelobeParams {
    fn default() -> Self {
        Self {
            beam_width_deg: 1.0,
            range_contamination_power: 4.0,
            side_lobe_power_db: -25.0,
        }
    }
}

impl SidelobeParams {
    /// Contamination power for the azimuth-neighbour filter, from the
    /// azimuth sampling relative to the beam width
    pub fn azimuth_contamination_power(&self, num_azimuth: usize) -> f32 {
        let beams_per_width = 360.0 / num_azimuth as f32 / self.beam_width_deg;
        (4f32.ln() * beams_per_width * beams_per_width).exp()
    }
}

/// Full parameter set for one calibration window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibParams {
    /// Minimum usable gate index
    pub r_min: usize,
    pub smoothing: SmoothingParams,
    pub sidelobe: SidelobeParams,
    pub sentinels: Sentinels,
}

impl Default for CalibParams {
    fn default() -> Self {
        Self {
            r_min: 1,
            smoothing: SmoothingParams::default(),
            sidelobe: SidelobeParams::default(),
            sentinels: Sentinels::default(),
        }
    }
}

impl CalibParams {
    /// Check the parameters against the scan geometry they will be used with
    pub fn validate(&self, geometry: &ScanGeometry) -> RefractResult<()> {
        if geometry.num_azimuth == 0 || geometry.num_gates == 0 {
            return Err(RefractError::InvalidParameter(format!(
                "Empty scan geometry {}",
                geometry
            )));
        }
        if self.r_min >= geometry.num_gates {
            return Err(RefractError::InvalidParameter(format!(
                "r_min {} is beyond the last gate ({} gates)",
                self.r_min, geometry.num_gates
            )));
        }
        if !(self.sidelobe.beam_width_deg > 0.0) {
            return Err(RefractError::InvalidParameter(format!(
                "Beam width must be positive, got {}",
                self.sidelobe.beam_width_deg
            )));
        }
        if !(self.sidelobe.range_contamination_power > 0.0) {
            return Err(RefractError::InvalidParameter(format!(
                "Range contamination power must be positive, got {}",
                self.sidelobe.range_contamination_power
            )));
        }
        Ok(())
    }
}
