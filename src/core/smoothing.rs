//! Heavy smoothing of the scan-to-scan phase difference field
//!
//! The smoothed field tracks the large-scale phase change caused by the
//! weather between scans, so it can be removed from the raw differences.
//! Near the radar, gates are narrow in ground distance and every azimuth is
//! averaged together over a few gates. Further out, beam broadening calls for a
//! wider sector kernel in both range and azimuth.

use crate::core::iq_field::IqField;
use crate::types::IqSample;
use num_complex::Complex;
use num_traits::Zero;

fn unit_or_zero(sum: Complex<f64>) -> IqSample {
    let norm = sum.norm();
    if norm == 0.0 {
        IqSample::zero()
    } else {
        let unit = sum.unscale(norm);
        IqSample::new(unit.re as f32, unit.im as f32)
    }
}

impl IqField {
    /// Close-range smoothing for gates `r_min..max_r`.
    ///
    /// Each gate gets the unit phasor of the all-azimuth ring sums of the gate
    /// and its two range neighbours, assigned to every azimuth. Other gates of
    /// the receiver are left as they were.
    pub fn smooth_close(&mut self, dif_prev: &IqField, r_min: usize, max_r: usize) {
        let geometry = self.geometry();
        if geometry.num_gates == 0 || r_min >= max_r {
            return;
        }
        let max_r = max_r.min(geometry.num_gates - 1);

        log::debug!("Close-range smoothing over gates {}..{}", r_min, max_r);

        let ring_sum = |gate: usize| -> Complex<f64> {
            (0..geometry.num_azimuth)
                .map(|azimuth| {
                    let v = dif_prev.at(azimuth, gate);
                    Complex::new(v.re as f64, v.im as f64)
                })
                .sum()
        };

        #[cfg(feature = "parallel")]
        let rings: Vec<Complex<f64>> = {
            use rayon::prelude::*;
            (0..=max_r).into_par_iter().map(ring_sum).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let rings: Vec<Complex<f64>> = (0..=max_r).map(ring_sum).collect();

        for gate in r_min..max_r {
            let mut sum = rings[gate] + rings[gate + 1];
            if gate > 0 {
                sum += rings[gate - 1];
            }
            let unit = unit_or_zero(sum);

            for azimuth in 0..geometry.num_azimuth {
                *self.at_mut(azimuth, gate) = unit;
            }
        }
    }

    /// Far-range smoothing for gates `max_r..num_gates`.
    ///
    /// Each cell gets the unit phasor of the sector sum over
    /// `±half_range` gates and `±half_azimuth` beams (azimuth wraps, gates past
    /// the end are skipped). Gates below `max_r` are left as they were.
    pub fn smooth_far(
        &mut self,
        dif_prev: &IqField,
        max_r: usize,
        half_range: usize,
        half_azimuth: usize,
    ) {
        let geometry = self.geometry();
        if max_r >= geometry.num_gates {
            return;
        }

        log::debug!(
            "Far-range smoothing from gate {} with a {}x{} kernel",
            max_r,
            2 * half_azimuth + 1,
            2 * half_range + 1
        );

        let sector_sum = |azimuth: usize, gate: usize| -> IqSample {
            let mut sum = Complex::<f64>::zero();
            for dr in -(half_range as isize)..=(half_range as isize) {
                let g = gate as isize + dr;
                if g < 0 || g >= geometry.num_gates as isize {
                    continue;
                }
                for daz in -(half_azimuth as isize)..=(half_azimuth as isize) {
                    let v = dif_prev.at(geometry.wrap_azimuth(azimuth, daz), g as usize);
                    sum += Complex::new(v.re as f64, v.im as f64);
                }
            }
            unit_or_zero(sum)
        };

        let mut far = IqField::zeros(geometry);

        #[cfg(feature = "parallel")]
        {
            use ndarray::Zip;
            Zip::indexed(far.data_mut()).par_for_each(|(azimuth, gate), out| {
                if gate >= max_r {
                    *out = sector_sum(azimuth, gate);
                }
            });
        }

        #[cfg(not(feature = "parallel"))]
        for azimuth in 0..geometry.num_azimuth {
            for gate in max_r..geometry.num_gates {
                *far.at_mut(azimuth, gate) = sector_sum(azimuth, gate);
            }
        }

        self.copy_beyond_range(&far, max_r);
    }
}
