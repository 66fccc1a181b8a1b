use crate::core::iq_field::IqField;
use crate::core::scalar_field::ScalarField;
use crate::params::Sentinels;
use crate::types::{RefractResult, ScanGeometry};

/// One radar scan of ground-echo phase data
#[derive(Debug, Clone)]
pub struct Scan {
    pub iq: IqField,
    /// Signal-to-noise ratio in dB
    pub snr: ScalarField,
}

impl Scan {
    pub fn new(iq: IqField, snr: ScalarField) -> RefractResult<Self> {
        iq.geometry().ensure_same(&snr.geometry())?;
        Ok(Self { iq, snr })
    }

    /// Build a scan from raw flat arrays. I/Q samples flagged bad or missing
    /// become (0, 0); flagged SNR values become invalid.
    pub fn from_raw(
        geometry: ScanGeometry,
        i: &[f32],
        q: &[f32],
        snr: &[f32],
        sentinels: &Sentinels,
    ) -> RefractResult<Self> {
        let raw = IqField::from_iq(geometry, i, q)?;
        let mut iq = IqField::zeros(geometry);
        iq.masked_copy(&raw, sentinels);

        let snr = ScalarField::from_sentinel_slice(
            geometry,
            snr,
            &[sentinels.bad, sentinels.missing, sentinels.invalid],
        )?;

        Ok(Self { iq, snr })
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.iq.geometry()
    }
}
