use crate::core::scalar_field::ScalarField;
use crate::params::Sentinels;
use crate::types::{IqSample, RealGrid, RefractError, RefractResult, ScanGeometry};
use ndarray::{Array2, Zip};
use num_traits::Zero;
use std::ops::{AddAssign, Index, IndexMut};

/// Complex (I/Q) samples over a polar scan grid, azimuth-major
#[derive(Debug, Clone, PartialEq)]
pub struct IqField {
    geometry: ScanGeometry,
    data: Array2<IqSample>,
}

impl IqField {
    /// Field with no cells
    pub fn empty() -> Self {
        Self::zeros(ScanGeometry::default())
    }

    /// Every cell set to (0, 0)
    pub fn zeros(geometry: ScanGeometry) -> Self {
        Self {
            geometry,
            data: Array2::zeros(geometry.shape()),
        }
    }

    /// Every cell set to (c, c)
    pub fn filled(geometry: ScanGeometry, c: f32) -> Self {
        Self {
            geometry,
            data: Array2::from_elem(geometry.shape(), IqSample::new(c, c)),
        }
    }

    /// Build from parallel I and Q arrays laid out azimuth-major
    pub fn from_iq(geometry: ScanGeometry, i: &[f32], q: &[f32]) -> RefractResult<Self> {
        let expected = geometry.scan_size();
        for len in [i.len(), q.len()] {
            if len != expected {
                return Err(RefractError::LengthMismatch { expected, actual: len });
            }
        }

        let samples: Vec<IqSample> = i
            .iter()
            .zip(q)
            .map(|(&re, &im)| IqSample::new(re, im))
            .collect();
        let data = Array2::from_shape_vec(geometry.shape(), samples)
            .map_err(|e| RefractError::Processing(e.to_string()))?;

        Ok(Self { geometry, data })
    }

    /// Wrap an existing `(azimuth, gate)` array
    pub fn from_array(data: Array2<IqSample>) -> Self {
        let (num_azimuth, num_gates) = data.dim();
        Self {
            geometry: ScanGeometry::new(num_azimuth, num_gates),
            data,
        }
    }

    /// Write I and Q into caller buffers. Nothing is copied on a length mismatch.
    pub fn copy_to(&self, i: &mut [f32], q: &mut [f32]) -> RefractResult<()> {
        let expected = self.len();
        for len in [i.len(), q.len()] {
            if len != expected {
                return Err(RefractError::LengthMismatch { expected, actual: len });
            }
        }

        for ((sample, re), im) in self.data.iter().zip(i.iter_mut()).zip(q.iter_mut()) {
            *re = sample.re;
            *im = sample.im;
        }
        Ok(())
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_array(&self) -> &Array2<IqSample> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Array2<IqSample> {
        &mut self.data
    }

    pub fn at(&self, azimuth: usize, gate: usize) -> IqSample {
        self.data[(azimuth, gate)]
    }

    pub fn at_mut(&mut self, azimuth: usize, gate: usize) -> &mut IqSample {
        &mut self.data[(azimuth, gate)]
    }

    /// Phase in radians; (0, 0) cells carry no phase
    pub fn phase(&self) -> ScalarField {
        let values = self
            .data
            .map(|v| if v.is_zero() { None } else { Some(v.arg()) });
        ScalarField::from_values(values)
    }

    pub fn norm_sqr(&self) -> RealGrid {
        self.data.map(|v| v.norm_sqr())
    }

    pub fn norm(&self) -> RealGrid {
        self.data.map(|v| v.norm())
    }

    pub fn zero(&mut self) {
        self.data.fill(IqSample::zero());
    }

    /// Zero the inclusive linear index range `[i0, i1]`
    pub fn zero_range(&mut self, i0: usize, i1: usize) {
        if self.is_empty() {
            return;
        }
        let last = i1.min(self.len() - 1);
        for index in i0..=last {
            self[index] = IqSample::zero();
        }
    }

    /// Take `other`'s cells at gates `>= min_gate`, keep ours below it
    pub fn copy_beyond_range(&mut self, other: &IqField, min_gate: usize) {
        Zip::indexed(&mut self.data)
            .and(&other.data)
            .for_each(|(_, gate), out, &v| {
                if gate >= min_gate {
                    *out = v;
                }
            });
    }

    /// Scale every nonzero cell to unit magnitude, keeping its phase
    pub fn normalize(&mut self) {
        let to_unit = |v: &mut IqSample| {
            let norm = v.norm();
            if norm != 0.0 {
                *v = v.unscale(norm);
            }
        };

        #[cfg(feature = "parallel")]
        self.data.par_map_inplace(to_unit);

        #[cfg(not(feature = "parallel"))]
        self.data.map_inplace(to_unit);
    }

    /// Unit phasor of the cell plus its two azimuth neighbours
    pub fn normalized_average(&self, index: usize) -> IqSample {
        let (azimuth, gate) = self.geometry.split(index);
        let prev_az = self.geometry.wrap_azimuth(azimuth, -1);
        let next_az = self.geometry.wrap_azimuth(azimuth, 1);

        let sum = self.at(prev_az, gate) + self.at(azimuth, gate) + self.at(next_az, gate);
        let norm = sum.norm();
        if norm == 0.0 {
            IqSample::zero()
        } else {
            sum.unscale(norm)
        }
    }

    /// Refractivity change at `index` from the smoothed local phase.
    /// `slope` converts radians of phase into N units.
    pub fn refractivity(&self, index: usize, slope: f32) -> Option<f32> {
        let phasor = self.normalized_average(index);
        if phasor.is_zero() {
            None
        } else {
            Some(phasor.arg() * slope)
        }
    }

    /// Copy `other`, writing (0, 0) wherever its I or Q is flagged bad or missing
    pub fn masked_copy(&mut self, other: &IqField, sentinels: &Sentinels) {
        Zip::from(&mut self.data).and(&other.data).for_each(|out, &v| {
            *out = if sentinels.is_flagged(v.re) || sentinels.is_flagged(v.im) {
                IqSample::zero()
            } else {
                v
            };
        });
    }

    /// `self = self * conj(other)`: phase difference, magnitude as coherence
    pub fn phase_diff(&mut self, other: &IqField) {
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|out, &v| *out *= v.conj());
    }

    /// `self = b * conj(c)`, ignoring the previous contents
    pub fn phase_diff_of(&mut self, b: &IqField, c: &IqField) {
        let zip = Zip::from(&mut self.data).and(&b.data).and(&c.data);

        #[cfg(feature = "parallel")]
        zip.par_for_each(|out, &x, &y| *out = x * y.conj());

        #[cfg(not(feature = "parallel"))]
        zip.for_each(|out, &x, &y| *out = x * y.conj());
    }

    /// Phase difference of each cell against the cell `lag` gates inward on
    /// the same beam. Gates closer than `lag` have no partner and become (0, 0).
    pub fn phase_diff2(&mut self, lag: usize) {
        let snapshot = self.data.clone();
        Zip::indexed(&mut self.data).for_each(|(azimuth, gate), out| {
            *out = if gate >= lag && lag > 0 {
                snapshot[(azimuth, gate)] * snapshot[(azimuth, gate - lag)].conj()
            } else {
                IqSample::zero()
            };
        });
    }

    /// Rescale every cell to its SNR weight `1 / (1 + 10^(-snr/10))`.
    /// Cells with no SNR are brought to unit magnitude.
    pub fn normalize_by_snr(&mut self, snr: &ScalarField) {
        Zip::from(&mut self.data)
            .and(snr.values())
            .for_each(|v, &snr_db| {
                let norm = v.norm();
                if norm == 0.0 {
                    return;
                }
                let unit = v.unscale(norm);
                *v = match snr_db {
                    Some(db) => {
                        let weight = 1.0 / (1.0 + 10f32.powf(-0.1 * db));
                        if weight > 0.001 {
                            unit.scale(weight)
                        } else {
                            IqSample::zero()
                        }
                    }
                    None => unit,
                };
            });
    }

    /// Divide each cell by a per-cell norm; cells with no or zero norm are kept
    pub fn normalize_by(&mut self, norm: &ScalarField) {
        Zip::from(&mut self.data)
            .and(norm.values())
            .for_each(|v, &n| {
                if let Some(n) = n {
                    if n != 0.0 {
                        *v = v.unscale(n);
                    }
                }
            });
    }

    /// Multiply each cell by `|quality| / |cell|`, so the result keeps the
    /// cell's phase with the quality as magnitude
    pub fn normalize_with_quality(&mut self, quality: &ScalarField) {
        Zip::from(&mut self.data)
            .and(quality.values())
            .for_each(|v, &q| {
                let q = match q {
                    Some(q) if q != 0.0 => q.abs(),
                    _ => return,
                };
                let norm = v.norm() / q;
                *v = if norm == 0.0 {
                    IqSample::zero()
                } else {
                    v.unscale(norm)
                };
            });
    }

    /// Move contents `step` cells down over the inclusive range `[i0, i1]`:
    /// `self[i] = self[i + step]`. Sources past the end are skipped.
    pub fn shift(&mut self, i0: usize, i1: usize, step: usize) {
        let len = self.len();
        for index in i0..=i1 {
            let source = match index.checked_add(step) {
                Some(source) if source < len => source,
                _ => break,
            };
            self[index] = self[source];
        }
    }
}

impl Default for IqField {
    fn default() -> Self {
        Self::empty()
    }
}

impl Index<usize> for IqField {
    type Output = IqSample;

    fn index(&self, index: usize) -> &IqSample {
        &self.data[self.geometry.split(index)]
    }
}

impl IndexMut<usize> for IqField {
    fn index_mut(&mut self, index: usize) -> &mut IqSample {
        let cell = self.geometry.split(index);
        &mut self.data[cell]
    }
}

impl AddAssign<&IqField> for IqField {
    fn add_assign(&mut self, other: &IqField) {
        self.data += &other.data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn geometry() -> ScanGeometry {
        ScanGeometry::new(4, 3)
    }

    fn ramp() -> IqField {
        let g = geometry();
        let i: Vec<f32> = (0..g.scan_size()).map(|k| 1.0 + k as f32).collect();
        let q: Vec<f32> = (0..g.scan_size()).map(|k| 0.5 * k as f32 - 2.0).collect();
        IqField::from_iq(g, &i, &q).unwrap()
    }

    #[test]
    fn test_construction() {
        assert!(IqField::empty().is_empty());

        let field = IqField::filled(geometry(), 2.0);
        assert_eq!(field.len(), 12);
        assert_eq!(field[5], IqSample::new(2.0, 2.0));

        let field = ramp();
        assert_eq!(field[4], IqSample::new(5.0, 0.0));
        assert_eq!(field.at(1, 1), field[4]);
    }

    #[test]
    fn test_from_iq_rejects_wrong_length() {
        let result = IqField::from_iq(geometry(), &[0.0; 12], &[0.0; 11]);
        assert!(matches!(
            result,
            Err(RefractError::LengthMismatch { expected: 12, actual: 11 })
        ));
    }

    #[test]
    fn test_copy_to() {
        let field = ramp();
        let mut i = vec![0.0; 12];
        let mut q = vec![0.0; 12];
        field.copy_to(&mut i, &mut q).unwrap();
        assert_eq!(i[3], 4.0);
        assert_eq!(q[3], -0.5);

        let mut short = vec![7.0; 5];
        assert!(field.copy_to(&mut short, &mut q).is_err());
        assert!(short.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_add_assign() {
        let mut field = IqField::filled(geometry(), 1.0);
        field += &ramp();
        assert_eq!(field[0], IqSample::new(2.0, -1.0));
    }

    #[test]
    fn test_derived_sequences() {
        let mut field = IqField::zeros(geometry());
        field[1] = IqSample::new(3.0, 4.0);
        field[2] = IqSample::new(0.0, -1.0);

        assert_eq!(field.norm()[(0, 1)], 5.0);
        assert_eq!(field.norm_sqr()[(0, 1)], 25.0);

        let phase = field.phase();
        assert_eq!(phase.get(0), None);
        assert_abs_diff_eq!(phase.get(2).unwrap(), -PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_range() {
        let mut field = ramp();
        field.zero_range(3, 5);
        assert!(field[3].is_zero() && field[4].is_zero() && field[5].is_zero());
        assert!(!field[2].is_zero() && !field[6].is_zero());

        // Upper bound past the end is clamped
        field.zero_range(10, 100);
        assert!(field[11].is_zero());

        field.zero();
        assert!(field.as_array().iter().all(|v| v.is_zero()));
    }

    #[test]
    fn test_copy_beyond_range() {
        let mut field = IqField::filled(geometry(), 1.0);
        field.copy_beyond_range(&IqField::filled(geometry(), 9.0), 2);
        for azimuth in 0..4 {
            assert_eq!(field.at(azimuth, 1), IqSample::new(1.0, 1.0));
            assert_eq!(field.at(azimuth, 2), IqSample::new(9.0, 9.0));
        }
    }

    #[test]
    fn test_normalize_idempotent() {
        let mut field = ramp();
        field[0] = IqSample::zero();
        field.normalize();
        let once = field.clone();
        field.normalize();

        assert!(field[0].is_zero());
        for (a, b) in once.as_array().iter().zip(field.as_array()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-6);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-6);
        }
        for v in field.as_array().iter().filter(|v| !v.is_zero()) {
            assert_abs_diff_eq!(v.norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_normalized_average_wraps_azimuth() {
        let mut field = IqField::zeros(geometry());
        field.at_mut(3, 0).re = 2.0;
        field.at_mut(1, 0).im = 2.0;

        // Beam 0 sees beams 3 and 1
        let phasor = field.normalized_average(0);
        assert_abs_diff_eq!(phasor.arg(), PI / 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(phasor.norm(), 1.0, epsilon = 1e-6);

        assert!(field.normalized_average(geometry().linear(2, 2)).is_zero());
        assert_eq!(field.refractivity(geometry().linear(2, 2), 10.0), None);
        assert_abs_diff_eq!(field.refractivity(0, 4.0).unwrap(), PI, epsilon = 1e-5);
    }

    #[test]
    fn test_masked_copy() {
        let g = geometry();
        let mut i = vec![1.0; 12];
        let mut q = vec![1.0; 12];
        i[2] = -9999.0;
        q[7] = -8888.0;
        let source = IqField::from_iq(g, &i, &q).unwrap();

        let sentinels = Sentinels { bad: -9999.0, missing: -8888.0, ..Sentinels::default() };
        let mut field = IqField::filled(g, 5.0);
        field.masked_copy(&source, &sentinels);
        assert!(field[2].is_zero());
        assert!(field[7].is_zero());
        assert_eq!(field[0], IqSample::new(1.0, 1.0));
    }

    #[test]
    fn test_phase_diff_of_ignores_receiver() {
        let b = ramp();
        let c = IqField::filled(geometry(), 1.0);
        let mut a = IqField::filled(geometry(), 100.0);
        a.phase_diff_of(&b, &c);

        let mut expected = b.clone();
        expected.phase_diff(&c);
        assert_eq!(a, expected);
    }

    #[test]
    fn test_phase_diff2() {
        let g = geometry();
        let mut field = IqField::zeros(g);
        for azimuth in 0..g.num_azimuth {
            for gate in 0..g.num_gates {
                *field.at_mut(azimuth, gate) = IqSample::from_polar(1.0, 0.3 * gate as f32);
            }
        }
        field.phase_diff2(1);

        for azimuth in 0..g.num_azimuth {
            assert!(field.at(azimuth, 0).is_zero());
            for gate in 1..g.num_gates {
                assert_abs_diff_eq!(field.at(azimuth, gate).arg(), 0.3, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_normalize_by_snr() {
        let g = geometry();
        let mut field = IqField::filled(g, 3.0);
        let mut snr = ScalarField::filled(g, 0.0);
        snr.set(1, None);
        snr.set(2, Some(-40.0));
        field.normalize_by_snr(&snr);

        // 0 dB gives a weight of one half
        assert_abs_diff_eq!(field[0].norm(), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(field[0].arg(), PI / 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(field[1].norm(), 1.0, epsilon = 1e-6);
        assert!(field[2].is_zero());
    }

    #[test]
    fn test_normalize_by() {
        let g = geometry();
        let mut field = IqField::filled(g, 4.0);
        let mut norm = ScalarField::filled(g, 2.0);
        norm.set(1, Some(0.0));
        norm.set(2, None);
        field.normalize_by(&norm);

        assert_eq!(field[0], IqSample::new(2.0, 2.0));
        assert_eq!(field[1], IqSample::new(4.0, 4.0));
        assert_eq!(field[2], IqSample::new(4.0, 4.0));
    }

    #[test]
    fn test_normalize_with_quality() {
        let g = geometry();
        let mut field = IqField::filled(g, 3.0);
        field[3] = IqSample::zero();
        let mut quality = ScalarField::filled(g, 0.25);
        quality.set(1, None);
        quality.set(2, Some(-0.5));
        field.normalize_with_quality(&quality);

        assert_abs_diff_eq!(field[0].norm(), 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(field[0].arg(), PI / 4.0, epsilon = 1e-6);
        assert_eq!(field[1], IqSample::new(3.0, 3.0));
        assert_abs_diff_eq!(field[2].norm(), 0.5, epsilon = 1e-6);
        assert!(field[3].is_zero());
    }

    #[test]
    fn test_shift() {
        let mut field = ramp();
        let original = field.clone();
        field.shift(0, 2, 3);
        for index in 0..3 {
            assert_eq!(field[index], original[index + 3]);
        }
        assert_eq!(field[3], original[3]);

        // Sources beyond the end stop the shift
        field.shift(10, 11, 1);
        assert_eq!(field[10], original[11]);
        assert_eq!(field[11], original[11]);

        // A step too large to add to an index leaves the field alone
        let before = field.clone();
        field.shift(1, 4, usize::MAX);
        assert_eq!(field, before);
    }
}
