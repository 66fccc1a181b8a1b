//! Reliable ground-target detection
//!
//! Good refractivity targets are ground echoes whose phase stays consistent
//! from scan to scan. Over an accumulation window the scan-to-scan phase
//! differences are summed after removing the large-scale change due to the
//! weather; how coherently they add up (NCP) is the target's reliability.

use crate::core::iq_field::IqField;
use crate::core::phase_error::PhaseErrorField;
use crate::core::scalar_field::{PixelCount, ScalarField};
use crate::core::scan::Scan;
use crate::params::CalibParams;
use crate::types::{RefractError, RefractResult, ScanGeometry};
use ndarray::Zip;
use num_traits::Zero;

/// Minimum number of scans needed to form one phase difference
pub const MIN_TARGET_SCANS: usize = 2;

/// Derived fields of one accumulation window
#[derive(Debug, Clone)]
pub struct CalibrationProducts {
    /// Mean SNR of the target in dB
    pub strength: ScalarField,
    pub ncp: ScalarField,
    pub quality: ScalarField,
    pub phase_error: PhaseErrorField,
    /// Phase of the averaged I/Q in degrees, for diagnostics
    pub target_phase: ScalarField,
    pub pixel_count: PixelCount,
}

/// Accumulates scans and derives target reliability
#[derive(Debug, Clone)]
pub struct TargetAccumulator {
    params: CalibParams,
    geometry: ScanGeometry,
    num_scans: usize,
    average: IqField,
    previous: IqField,
    previous_snr: ScalarField,
    sum_ab: IqField,
    sum_p: ScalarField,
    mean_snr: ScalarField,
    fluctuation: ScalarField,
    pixel_count: PixelCount,
}

impl TargetAccumulator {
    pub fn new(geometry: ScanGeometry, params: CalibParams) -> RefractResult<Self> {
        params.validate(&geometry)?;
        log::debug!("Target accumulator for {} scan, parameters: {:?}", geometry, params);

        Ok(Self {
            params,
            geometry,
            num_scans: 0,
            average: IqField::zeros(geometry),
            previous: IqField::zeros(geometry),
            previous_snr: ScalarField::new(geometry),
            sum_ab: IqField::zeros(geometry),
            sum_p: ScalarField::zeros(geometry),
            mean_snr: ScalarField::zeros(geometry),
            fluctuation: ScalarField::zeros(geometry),
            pixel_count: PixelCount::new(geometry),
        })
    }

    pub fn num_scans(&self) -> usize {
        self.num_scans
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.geometry
    }

    /// Add the next scan of the window
    pub fn add_scan(&mut self, scan: &Scan) -> RefractResult<()> {
        if let Err(e) = self.geometry.ensure_same(&scan.geometry()) {
            log::warn!("Rejecting scan {}: {}", self.num_scans + 1, e);
            return Err(e);
        }

        if self.num_scans == 0 {
            log::info!("Initializing target accumulation with first scan");
            self.average = scan.iq.clone();
        } else {
            log::info!("Adding scan {} to target accumulation", self.num_scans + 1);
            self.accumulate_difference(scan);
        }

        self.previous = scan.iq.clone();
        self.previous_snr = scan.snr.clone();
        self.num_scans += 1;
        Ok(())
    }

    /// Add a scan given as flat I, Q and SNR arrays, using the configured
    /// sentinels to mask flagged samples
    pub fn add_raw_scan(&mut self, i: &[f32], q: &[f32], snr: &[f32]) -> RefractResult<()> {
        let scan = Scan::from_raw(self.geometry, i, q, snr, &self.params.sentinels)?;
        self.add_scan(&scan)
    }

    fn accumulate_difference(&mut self, scan: &Scan) {
        self.average += &scan.iq;

        // Phase change since the previous scan, weighted by SNR
        let mut dif = scan.iq.clone();
        dif.phase_diff(&self.previous);
        dif.normalize_by_snr(&scan.snr);

        // Remove the weather-driven part of the change
        let smoothed = self.smoothed_difference(&dif);
        Zip::from(dif.data_mut())
            .and(smoothed.as_array())
            .for_each(|d, s| {
                if !s.is_zero() {
                    *d *= s.conj();
                }
            });

        self.sum_ab += &dif;
        self.sum_p.increment_norm_sqr(&dif);

        for azimuth in 0..self.geometry.num_azimuth {
            for gate in 0..self.geometry.num_gates {
                let pair = (scan.snr.at(azimuth, gate), self.previous_snr.at(azimuth, gate));
                let (snr, old) = match pair {
                    (Some(snr), Some(old)) => (snr, old),
                    _ => continue,
                };
                add_to(self.fluctuation.at_mut(azimuth, gate), (snr - old).abs());
                add_to(self.mean_snr.at_mut(azimuth, gate), snr);
                self.pixel_count.increment(azimuth, gate);
            }
        }
    }

    /// Close and far smoothing of `dif`, merged at the close-range limit
    fn smoothed_difference(&self, dif: &IqField) -> IqField {
        let smoothing = &self.params.smoothing;
        let r_min = self.params.r_min;
        let max_r = smoothing.max_close_range(&self.geometry, r_min);

        let mut close = IqField::zeros(self.geometry);
        close.smooth_close(dif, r_min, max_r);

        let mut far = IqField::zeros(self.geometry);
        far.smooth_far(
            dif,
            max_r,
            smoothing.half_range(&self.geometry),
            smoothing.half_azimuth(&self.geometry),
        );

        close.copy_beyond_range(&far, max_r);
        close
    }

    /// Complete the reliability computation for the window
    pub fn finish(self) -> RefractResult<CalibrationProducts> {
        if self.num_scans < MIN_TARGET_SCANS {
            return Err(RefractError::Processing(format!(
                "Not enough scans for finding targets: have {}, need {}",
                self.num_scans, MIN_TARGET_SCANS
            )));
        }

        log::info!("Completing reliability computation over {} scans", self.num_scans);
        let geometry = self.geometry;
        let r_min = self.params.r_min;

        let mut strength = ScalarField::new(geometry);
        strength.set_strength(&self.mean_snr, &self.pixel_count);

        let mut fluctuation = ScalarField::new(geometry);
        fluctuation.set_strength(&self.fluctuation, &self.pixel_count);

        let mut ncp = ScalarField::new(geometry);
        ncp.set_ncp(
            &strength,
            &self.sum_ab,
            &self.sum_p,
            &fluctuation,
            &self.pixel_count,
            r_min,
        );
        log::debug!("NCP computed for {} of {} cells", ncp.valid_count(), ncp.len());

        // The 360 degree pass integrates the SNR of the last scan read
        ncp.apply_sidelobe_filters(&strength, &self.previous_snr, r_min, &self.params.sidelobe);

        let mut quality = ScalarField::new(geometry);
        quality.set_quality(&ncp);

        let mut phase_error = PhaseErrorField::new(geometry);
        phase_error.set_from_ncp(&ncp);

        let target_phase = ScalarField::from_values(
            self.average.phase().values().map(|&p| p.map(f32::to_degrees)),
        );

        log::info!("Target reliability computation completed");
        Ok(CalibrationProducts {
            strength,
            ncp,
            quality,
            phase_error,
            target_phase,
            pixel_count: self.pixel_count,
        })
    }
}

fn add_to(cell: &mut Option<f32>, value: f32) {
    *cell = Some(cell.unwrap_or(0.0) + value);
}
