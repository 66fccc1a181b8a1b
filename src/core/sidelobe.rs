//! Sidelobe contamination filters
//!
//! Echoes that are only around the integrated sidelobe level of the whole
//! ring, or that sit right next to much stronger targets, are probably seen
//! through the antenna sidelobes (or the range sidelobes of the pulse) and
//! their NCP is damped accordingly. Each pass reads an already-finalized
//! strength (or SNR) field and writes only the field being filtered.

use crate::core::scalar_field::ScalarField;
use crate::params::SidelobeParams;
use crate::types::linear_power;

/// Smallest factor a neighbour-contamination pass may apply
pub const MIN_SIDE_CORRECTION: f32 = 0.1;

/// Ratio of neighbour power to local power. A cell with no power of its own is
/// fully contaminated by any neighbour.
fn neighbour_ratio(near_pow: f32, local_pow: f32) -> f32 {
    if local_pow > 0.0 {
        near_pow / local_pow
    } else if near_pow > 0.0 {
        f32::INFINITY
    } else {
        0.0
    }
}

/// Derating factor for a neighbour-to-local power ratio: 1 up to
/// `2.5 * contamination_power`, then a Gaussian roll-off floored at
/// [`MIN_SIDE_CORRECTION`]
pub fn sidelobe_derating(ratio: f32, contamination_power: f32) -> f32 {
    let threshold = 2.5 * contamination_power;
    if ratio > threshold {
        let excess = (ratio - threshold) / threshold;
        (-0.5 * excess * excess).exp().max(MIN_SIDE_CORRECTION)
    } else {
        1.0
    }
}

impl ScalarField {
    /// Damp cells whose adjacent beams at the same gate are much stronger.
    /// Returns the number of cells derated.
    pub fn azimuth_sidelobe_filter(
        &mut self,
        strength: &ScalarField,
        r_min: usize,
        contamination_power: f32,
    ) -> usize {
        let geometry = self.geometry();
        let mut derated = 0;

        for azimuth in 0..geometry.num_azimuth {
            let prev_az = geometry.wrap_azimuth(azimuth, -1);
            let next_az = geometry.wrap_azimuth(azimuth, 1);

            for gate in r_min..geometry.num_gates {
                let value = match self.at(azimuth, gate) {
                    Some(v) if v > 0.0 => v,
                    _ => continue,
                };

                let local_pow = linear_power(strength.at(azimuth, gate));
                let near_pow = linear_power(strength.at(prev_az, gate))
                    + linear_power(strength.at(next_az, gate));

                let correction =
                    sidelobe_derating(neighbour_ratio(near_pow, local_pow), contamination_power);
                if correction < 1.0 {
                    *self.at_mut(azimuth, gate) = Some(value * correction);
                    derated += 1;
                }
            }
        }

        log::debug!("Azimuth sidelobe filter derated {} cells", derated);
        derated
    }

    /// Damp cells whose inward/outward gates on the same beam are much
    /// stronger. Gates past either end of the beam contribute no power.
    /// Returns the number of cells derated.
    pub fn range_sidelobe_filter(
        &mut self,
        strength: &ScalarField,
        r_min: usize,
        contamination_power: f32,
    ) -> usize {
        let geometry = self.geometry();
        let mut derated = 0;

        for azimuth in 0..geometry.num_azimuth {
            for gate in r_min..geometry.num_gates {
                let value = match self.at(azimuth, gate) {
                    Some(v) if v > 0.0 => v,
                    _ => continue,
                };

                let local_pow = linear_power(strength.at(azimuth, gate));
                let mut near_pow = 0.0;
                if gate > 0 {
                    near_pow += linear_power(strength.at(azimuth, gate - 1));
                }
                if gate + 1 < geometry.num_gates {
                    near_pow += linear_power(strength.at(azimuth, gate + 1));
                }

                let correction =
                    sidelobe_derating(neighbour_ratio(near_pow, local_pow), contamination_power);
                if correction < 1.0 {
                    *self.at_mut(azimuth, gate) = Some(value * correction);
                    derated += 1;
                }
            }
        }

        log::debug!("Range sidelobe filter derated {} cells", derated);
        derated
    }

    /// Damp cells that are weak compared with the power integrated over the
    /// whole ring at their range, scaled by the antenna sidelobe level.
    /// Returns the number of cells changed.
    pub fn ring_sidelobe_filter(
        &mut self,
        strength: &ScalarField,
        snr: &ScalarField,
        r_min: usize,
        side_lobe_power_db: f32,
    ) -> usize {
        let geometry = self.geometry();
        let side_lobe_scale = 10f32.powf(0.1 * side_lobe_power_db);
        let mut derated = 0;

        for gate in r_min..geometry.num_gates {
            let ring_pow: f32 = (0..geometry.num_azimuth)
                .map(|azimuth| linear_power(snr.at(azimuth, gate)))
                .sum();
            let side_pow = ring_pow * side_lobe_scale;

            for azimuth in 0..geometry.num_azimuth {
                let value = match self.at(azimuth, gate) {
                    Some(v) if v > 0.0 => v,
                    _ => continue,
                };
                let local_db = match strength.at(azimuth, gate) {
                    Some(db) => db,
                    None => continue,
                };

                let correction = (-side_pow * 10f32.powf(-0.1 * local_db)).exp();
                if correction < 1.0 {
                    *self.at_mut(azimuth, gate) = Some(value * correction);
                    derated += 1;
                }
            }
        }

        log::debug!("360 degree sidelobe filter derated {} cells", derated);
        derated
    }

    /// Run the azimuth, range and 360 degree passes in that order, all against
    /// the same strength snapshot
    pub fn apply_sidelobe_filters(
        &mut self,
        strength: &ScalarField,
        snr: &ScalarField,
        r_min: usize,
        params: &SidelobeParams,
    ) {
        let azimuth_power = params.azimuth_contamination_power(self.geometry().num_azimuth);
        log::info!(
            "Applying sidelobe filters (azimuth contamination {:.3}, range contamination {:.3}, sidelobe level {:.1} dB)",
            azimuth_power,
            params.range_contamination_power,
            params.side_lobe_power_db
        );

        let azimuth = self.azimuth_sidelobe_filter(strength, r_min, azimuth_power);
        let range = self.range_sidelobe_filter(strength, r_min, params.range_contamination_power);
        let ring = self.ring_sidelobe_filter(strength, snr, r_min, params.side_lobe_power_db);

        log::info!(
            "Sidelobe filtering completed: {} azimuth, {} range, {} ring corrections",
            azimuth,
            range,
            ring
        );
    }
}
