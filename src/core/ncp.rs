//! Normalized coherent power (NCP)
//!
//! The reliability of a ground target is measured by how coherently its
//! scan-to-scan phase differences add up, much like the lag-1 NCP of
//! pulse-pair processing. A finite-sample bias correction removes the
//! `1/sqrt(N)` floor of incoherent sums, then the estimate is derated for weak
//! echoes and for echoes whose SNR fluctuates between scans.

use crate::core::iq_field::IqField;
use crate::core::scalar_field::{PixelCount, ScalarField};

/// NCP assigned to gates inside `r_min`
pub const NEAR_RANGE_NCP: f32 = 0.5;

const MIN_CORRECTED_NCP: f32 = 0.001;
const MAX_CORRECTED_NCP: f32 = 0.999;

/// `1 / (1 + 10^(-strength/10))`; no strength means no confidence
pub fn strength_attenuation(strength_db: Option<f32>) -> f32 {
    match strength_db {
        Some(db) => 1.0 / (1.0 + 10f32.powf(-0.1 * db)),
        None => 0.0,
    }
}

/// `exp(-0.001 f^4) / exp(-0.002)` clamped to `[0.1, 1.0]`
pub fn fluctuation_correction(fluctuation: Option<f32>) -> f32 {
    let f = fluctuation.unwrap_or(0.0) as f64;
    let correction = (-0.001 * f.powi(4)).exp() / (-0.002f64).exp();
    correction.clamp(0.1, 1.0) as f32
}

/// Coherence `|sumAB|^2 / (sumP count)` of `count` summed phasors. With more
/// than one sample the `1/sqrt(count)` floor of incoherent sums is removed.
pub fn bias_corrected_coherence(sum_ab_power: f32, sum_p: f32, count: u32) -> f32 {
    let mut coherence = sum_ab_power / sum_p / count as f32;
    if count > 1 {
        let s = (count as f32).sqrt();
        coherence = (coherence - 1.0 / s) / (1.0 - 1.0 / s);
    }
    coherence.clamp(MIN_CORRECTED_NCP, MAX_CORRECTED_NCP)
}

impl ScalarField {
    /// Compute NCP into this field.
    ///
    /// Cells with no summed power or no samples are left untouched. Gates below
    /// `r_min` start from [`NEAR_RANGE_NCP`] instead of the coherence estimate;
    /// all computed cells are then attenuated by strength and fluctuation.
    pub fn set_ncp(
        &mut self,
        strength: &ScalarField,
        sum_ab: &IqField,
        sum_p: &ScalarField,
        fluctuation: &ScalarField,
        counts: &PixelCount,
        r_min: usize,
    ) {
        log::debug!("Computing NCP with r_min = {}", r_min);

        let geometry = self.geometry();
        for azimuth in 0..geometry.num_azimuth {
            for gate in 0..geometry.num_gates {
                let count = counts.at(azimuth, gate);
                let p = match sum_p.at(azimuth, gate) {
                    Some(p) if p != 0.0 => p,
                    _ => continue,
                };
                if count == 0 {
                    continue;
                }

                let mut ncp = if gate < r_min {
                    NEAR_RANGE_NCP
                } else {
                    bias_corrected_coherence(sum_ab.at(azimuth, gate).norm_sqr(), p, count)
                };

                ncp *= strength_attenuation(strength.at(azimuth, gate));
                ncp *= fluctuation_correction(fluctuation.at(azimuth, gate));

                *self.at_mut(azimuth, gate) = Some(ncp.max(0.0));
            }
        }
    }
}
