use crate::core::iq_field::IqField;
use crate::core::scalar_field::ScalarField;
use crate::types::{IqSample, RefractError, RefractResult, ScanGeometry};
use ndarray::Zip;
use num_traits::Zero;

/// Builds the reference phase of each target from the scans of a reference
/// window
#[derive(Debug, Clone)]
pub struct ReferenceAccumulator {
    sum: IqField,
    num_scans: usize,
}

impl ReferenceAccumulator {
    pub fn new(geometry: ScanGeometry) -> Self {
        Self {
            sum: IqField::zeros(geometry),
            num_scans: 0,
        }
    }

    pub fn num_scans(&self) -> usize {
        self.num_scans
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.sum.geometry()
    }

    /// Add the unit phasors of one scan
    pub fn add_scan(&mut self, iq: &IqField) -> RefractResult<()> {
        self.geometry().ensure_same(&iq.geometry())?;

        let mut unit = iq.clone();
        unit.normalize();
        self.sum += &unit;
        self.num_scans += 1;

        log::debug!("Reference scan {} added", self.num_scans);
        Ok(())
    }

    /// Reference phasors: the phase of the summed unit vectors with the
    /// target's NCP as magnitude. Cells without a usable NCP are zeroed.
    pub fn finish(self, ncp: &ScalarField) -> RefractResult<IqField> {
        if self.num_scans == 0 {
            return Err(RefractError::Processing(
                "No scans in reference window".to_string(),
            ));
        }
        self.geometry().ensure_same(&ncp.geometry())?;

        log::info!("Building reference phasors from {} scans", self.num_scans);
        let mut reference = self.sum;
        reference.normalize_with_quality(ncp);

        Zip::from(reference.data_mut())
            .and(ncp.values())
            .for_each(|v, &n| {
                if !matches!(n, Some(n) if n != 0.0) {
                    *v = IqSample::zero();
                }
            });

        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_reference_phase_and_magnitude() {
        let g = ScanGeometry::new(2, 3);
        let mut acc = ReferenceAccumulator::new(g);

        // Same phase at different amplitudes: amplitude must not matter
        for amplitude in [0.5, 3.0, 10.0] {
            let mut iq = IqField::zeros(g);
            for index in 0..g.scan_size() {
                iq[index] = IqSample::from_polar(amplitude, 0.2 * index as f32);
            }
            acc.add_scan(&iq).unwrap();
        }
        assert_eq!(acc.num_scans(), 3);

        let mut ncp = ScalarField::filled(g, 0.8);
        ncp.set(4, None);
        ncp.set(5, Some(0.0));
        let reference = acc.finish(&ncp).unwrap();

        for index in 0..4 {
            assert_abs_diff_eq!(reference[index].norm(), 0.8, epsilon = 1e-5);
            assert_abs_diff_eq!(reference[index].arg(), 0.2 * index as f32, epsilon = 1e-5);
        }
        assert!(reference[4].is_zero());
        assert!(reference[5].is_zero());
    }

    #[test]
    fn test_reference_errors() {
        let g = ScanGeometry::new(2, 3);
        let empty = ReferenceAccumulator::new(g);
        assert!(matches!(
            empty.finish(&ScalarField::filled(g, 1.0)),
            Err(RefractError::Processing(_))
        ));

        let mut acc = ReferenceAccumulator::new(g);
        assert!(acc.add_scan(&IqField::zeros(ScanGeometry::new(3, 2))).is_err());
        acc.add_scan(&IqField::filled(g, 1.0)).unwrap();
        assert!(matches!(
            acc.finish(&ScalarField::new(ScanGeometry::new(1, 1))),
            Err(RefractError::GeometryMismatch { .. })
        ));
    }
}
