use crate::core::iq_field::IqField;
use crate::types::{RealGrid, RefractError, RefractResult, ScanGeometry};
use ndarray::{Array2, Zip};

/// One optional real value per scan cell. `None` marks a cell that was not
/// computed or is not usable.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    geometry: ScanGeometry,
    values: Array2<Option<f32>>,
}

impl ScalarField {
    /// Every cell invalid
    pub fn new(geometry: ScanGeometry) -> Self {
        Self {
            geometry,
            values: Array2::from_elem(geometry.shape(), None),
        }
    }

    pub fn filled(geometry: ScanGeometry, value: f32) -> Self {
        Self {
            geometry,
            values: Array2::from_elem(geometry.shape(), Some(value)),
        }
    }

    /// Every cell valid and zero; the starting point for accumulators
    pub fn zeros(geometry: ScanGeometry) -> Self {
        Self::filled(geometry, 0.0)
    }

    pub fn from_values(values: Array2<Option<f32>>) -> Self {
        let (num_azimuth, num_gates) = values.dim();
        Self {
            geometry: ScanGeometry::new(num_azimuth, num_gates),
            values,
        }
    }

    /// Import a flat array, treating any of `sentinels` as invalid
    pub fn from_sentinel_slice(
        geometry: ScanGeometry,
        data: &[f32],
        sentinels: &[f32],
    ) -> RefractResult<Self> {
        if data.len() != geometry.scan_size() {
            return Err(RefractError::LengthMismatch {
                expected: geometry.scan_size(),
                actual: data.len(),
            });
        }

        let values: Vec<Option<f32>> = data
            .iter()
            .map(|&v| if sentinels.contains(&v) { None } else { Some(v) })
            .collect();
        let values = Array2::from_shape_vec(geometry.shape(), values)
            .map_err(|e| RefractError::Processing(e.to_string()))?;

        Ok(Self { geometry, values })
    }

    /// Export as a flat array with `invalid` in place of missing cells
    pub fn to_sentinel_vec(&self, invalid: f32) -> Vec<f32> {
        self.values.iter().map(|v| v.unwrap_or(invalid)).collect()
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.geometry
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array2<Option<f32>> {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values[self.geometry.split(index)]
    }

    pub fn set(&mut self, index: usize, value: Option<f32>) {
        let cell = self.geometry.split(index);
        self.values[cell] = value;
    }

    pub fn at(&self, azimuth: usize, gate: usize) -> Option<f32> {
        self.values[(azimuth, gate)]
    }

    pub(crate) fn at_mut(&mut self, azimuth: usize, gate: usize) -> &mut Option<f32> {
        &mut self.values[(azimuth, gate)]
    }

    /// Number of valid cells
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// `strength = sum / count` where the count is positive, invalid elsewhere
    pub fn set_strength(&mut self, sum: &ScalarField, counts: &PixelCount) {
        Zip::from(&mut self.values)
            .and(&sum.values)
            .and(&counts.counts)
            .for_each(|out, &s, &count| {
                *out = match s {
                    Some(s) if count > 0 => Some(s / count as f32),
                    _ => None,
                };
            });
    }

    /// `strength = sum / normalizer`; cells with a zero normalizer or no sum
    /// are left as they were
    pub fn set_strength_normalized(&mut self, sum: &ScalarField, normalizer: &RealGrid) {
        Zip::from(&mut self.values)
            .and(&sum.values)
            .and(normalizer)
            .for_each(|out, &s, &n| {
                if let (Some(s), true) = (s, n != 0.0) {
                    *out = Some(s / n);
                }
            });
    }

    /// Add the magnitude of every I/Q cell into this field
    pub fn increment_norm(&mut self, iq: &IqField) {
        Zip::from(&mut self.values)
            .and(iq.as_array())
            .for_each(|out, v| *out = Some(out.unwrap_or(0.0) + v.norm()));
    }

    /// Add the power (squared magnitude) of every I/Q cell into this field
    pub fn increment_norm_sqr(&mut self, iq: &IqField) {
        Zip::from(&mut self.values)
            .and(iq.as_array())
            .for_each(|out, v| *out = Some(out.unwrap_or(0.0) + v.norm_sqr()));
    }

    /// `quality = |ncp|` wherever NCP was computed
    pub fn set_quality(&mut self, ncp: &ScalarField) {
        Zip::from(&mut self.values)
            .and(&ncp.values)
            .for_each(|out, &n| {
                if let Some(n) = n {
                    *out = Some((n * n).sqrt());
                }
            });
    }
}

/// Number of independent samples behind each cell of an accumulated field
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCount {
    geometry: ScanGeometry,
    counts: Array2<u32>,
}

impl PixelCount {
    pub fn new(geometry: ScanGeometry) -> Self {
        Self {
            geometry,
            counts: Array2::zeros(geometry.shape()),
        }
    }

    pub fn from_counts(geometry: ScanGeometry, counts: &[u32]) -> RefractResult<Self> {
        let counts = Array2::from_shape_vec(geometry.shape(), counts.to_vec()).map_err(|_| {
            RefractError::LengthMismatch {
                expected: geometry.scan_size(),
                actual: counts.len(),
            }
        })?;
        Ok(Self { geometry, counts })
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.geometry
    }

    pub fn counts(&self) -> &Array2<u32> {
        &self.counts
    }

    pub fn get(&self, index: usize) -> u32 {
        self.counts[self.geometry.split(index)]
    }

    pub fn at(&self, azimuth: usize, gate: usize) -> u32 {
        self.counts[(azimuth, gate)]
    }

    pub fn increment(&mut self, azimuth: usize, gate: usize) {
        self.counts[(azimuth, gate)] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IqSample;

    fn geometry() -> ScanGeometry {
        ScanGeometry::new(4, 3)
    }

    #[test]
    fn test_sentinel_round_trip() {
        let g = geometry();
        let mut data = vec![1.5; 12];
        data[4] = -999999.0;
        data[5] = -9999.0;

        let field = ScalarField::from_sentinel_slice(g, &data, &[-999999.0, -9999.0]).unwrap();
        assert_eq!(field.get(4), None);
        assert_eq!(field.get(5), None);
        assert_eq!(field.get(6), Some(1.5));
        assert_eq!(field.valid_count(), 10);

        let exported = field.to_sentinel_vec(-1.0);
        assert_eq!(exported[4], -1.0);
        assert_eq!(exported[5], -1.0);
        assert_eq!(exported[0], 1.5);

        assert!(ScalarField::from_sentinel_slice(g, &data[..3], &[]).is_err());
    }

    #[test]
    fn test_set_strength() {
        let g = geometry();
        let sum = ScalarField::filled(g, 12.0);
        let mut raw = vec![3u32; 12];
        raw[2] = 0;
        let counts = PixelCount::from_counts(g, &raw).unwrap();

        let mut strength = ScalarField::new(g);
        strength.set_strength(&sum, &counts);
        assert_eq!(strength.get(0), Some(4.0));
        assert_eq!(strength.get(2), None);
    }

    #[test]
    fn test_set_strength_normalized_skips_zero() {
        let g = geometry();
        let sum = ScalarField::filled(g, 10.0);
        let mut normalizer = RealGrid::from_elem(g.shape(), 4.0);
        normalizer[(0, 1)] = 0.0;

        let mut strength = ScalarField::filled(g, -1.0);
        strength.set_strength_normalized(&sum, &normalizer);
        assert_eq!(strength.get(0), Some(2.5));
        assert_eq!(strength.get(1), Some(-1.0));
    }

    #[test]
    fn test_increment_norm() {
        let g = geometry();
        let mut iq = IqField::zeros(g);
        iq[0] = IqSample::new(3.0, 4.0);

        let mut total = ScalarField::new(g);
        total.increment_norm(&iq);
        total.increment_norm(&iq);
        assert_eq!(total.get(0), Some(10.0));
        assert_eq!(total.get(1), Some(0.0));

        let mut power = ScalarField::zeros(g);
        power.increment_norm_sqr(&iq);
        assert_eq!(power.get(0), Some(25.0));
    }

    #[test]
    fn test_set_quality() {
        let g = geometry();
        let mut ncp = ScalarField::new(g);
        ncp.set(0, Some(-0.4));
        ncp.set(1, Some(0.7));

        let mut quality = ScalarField::new(g);
        quality.set_quality(&ncp);
        assert!((quality.get(0).unwrap() - 0.4).abs() < 1e-6);
        assert!((quality.get(1).unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(quality.get(2), None);
    }

    #[test]
    fn test_pixel_count() {
        let g = geometry();
        let mut counts = PixelCount::new(g);
        counts.increment(1, 2);
        counts.increment(1, 2);
        assert_eq!(counts.get(g.linear(1, 2)), 2);
        assert_eq!(counts.at(0, 0), 0);
        assert!(PixelCount::from_counts(g, &[1, 2]).is_err());
    }
}
