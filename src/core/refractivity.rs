//! Phase slope and refractivity extraction
//!
//! A refractivity change between two scans shows up as a phase difference
//! that grows linearly with range. The slope of that phase along the beam is
//! what converts to N units.

use crate::core::iq_field::IqField;
use crate::core::scalar_field::ScalarField;
use crate::params::SmoothingParams;
use crate::types::{IqSample, ScanGeometry};
use num_traits::Zero;

/// N units per radian of phase change per gate.
///
/// Two-way propagation: a change `dN` over one gate of `gate_spacing_m` shifts
/// the phase by `720 * gate_spacing * 1e-6 * dN / wavelength` degrees.
pub fn phase_slope_to_n(gate_spacing_m: f32, wavelength_m: f32) -> f32 {
    1.0e6 / gate_spacing_m * wavelength_m / 720.0 / 1f32.to_radians()
}

impl IqField {
    /// Table of unit phasors `exp(j (smooth_range - dr) * slope)` used to
    /// phase-ramp a range window, one row per slope step of `360 / num_beams`
    /// degrees per gate and one column per window offset `dr`.
    pub fn slopes(num_beams: usize, smooth_range: usize) -> Self {
        let width = 2 * smooth_range + 1;
        let mut table = IqField::zeros(ScanGeometry::new(num_beams, width));
        let step_deg = 360.0 / num_beams.max(1) as f32;

        for beam in 0..num_beams {
            let slope_rad = (beam as f32 * step_deg).to_radians();
            for dr in 0..width {
                let offset = smooth_range as f32 - dr as f32;
                *table.at_mut(beam, dr) = IqSample::from_polar(1.0, offset * slope_rad);
            }
        }
        table
    }

    /// Weighted sum of the range window centred on `(azimuth, gate)` after
    /// removing a phase slope of `slope_deg` degrees per gate.
    ///
    /// `slopes` must come from [`IqField::slopes`] with the same
    /// `smooth_range`. Weights follow `sqrt(2) (1 - (d / (smooth_range + 0.5))^2)`.
    pub fn slope_corrected_sum(
        &self,
        slopes: &IqField,
        azimuth: usize,
        gate: usize,
        slope_deg: f32,
        smooth_range: usize,
    ) -> IqSample {
        let num_beams = slopes.geometry().num_azimuth;
        if num_beams == 0 {
            return IqSample::zero();
        }
        let row = (slope_deg * num_beams as f32 / 360.0).round() as i64;
        let row = row.rem_euclid(num_beams as i64) as usize;

        let num_gates = self.geometry().num_gates as isize;
        let mut sum = IqSample::zero();
        for dr in 0..=(2 * smooth_range) {
            let g = gate as isize + dr as isize - smooth_range as isize;
            if g < 0 || g >= num_gates {
                continue;
            }
            let d = (smooth_range as f32 - dr as f32) / (smooth_range as f32 + 0.5);
            let weight = std::f32::consts::SQRT_2 * (1.0 - d * d);
            sum += self.at(azimuth, g as usize) * slopes.at(row, dr) * weight;
        }
        sum
    }

    /// Average phase slope along range in degrees per gate, by pulse-pair
    /// products of consecutive `smear_azimuth x smear_range` blocks from gate
    /// `range0` up to `max_gate`. `None` if there is no signal.
    pub fn mean_phase_slope(
        &self,
        range0: usize,
        max_gate: usize,
        smear_azimuth: usize,
        smear_range: usize,
    ) -> Option<f32> {
        if smear_azimuth == 0 || smear_range == 0 {
            return None;
        }
        let geometry = self.geometry();
        let max_gate = max_gate.min(geometry.num_gates);

        let mut lag_sum = IqSample::zero();
        for azimuth in (0..geometry.num_azimuth).step_by(smear_azimuth) {
            let mut block = IqSample::zero();
            let mut gate = range0;
            while gate < max_gate {
                let previous = block;
                block = IqSample::zero();
                for j in 0..smear_azimuth {
                    let az = geometry.wrap_azimuth(azimuth, j as isize);
                    for k in 1..=smear_range {
                        if gate + k < geometry.num_gates {
                            block += self.at(az, gate + k);
                        }
                    }
                }
                lag_sum += block * previous.conj();
                gate += smear_range;
            }
        }

        if lag_sum.is_zero() {
            None
        } else {
            Some(lag_sum.arg().to_degrees() / smear_range as f32)
        }
    }

    /// Refractivity change for every cell: the double difference along range
    /// at the configured gate lag, azimuth-smoothed and scaled by `slope`
    pub fn refractivity_field(&self, smoothing: &SmoothingParams, slope: f32) -> ScalarField {
        let mut double_diff = self.clone();
        double_diff.phase_diff2(smoothing.lag());

        let geometry = self.geometry();
        let mut n_change = ScalarField::new(geometry);
        for index in 0..geometry.scan_size() {
            n_change.set(index, double_diff.refractivity(index, slope));
        }
        n_change
    }
}
