use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Complex-valued radar sample (I + jQ)
pub type IqSample = Complex<f32>;

/// Real-valued per-cell data with no validity tracking
pub type RealGrid = Array2<f32>;

/// Polar scan geometry (azimuth-major, range-minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScanGeometry {
    pub num_azimuth: usize,
    pub num_gates: usize,
}

impl ScanGeometry {
    pub fn new(num_azimuth: usize, num_gates: usize) -> Self {
        Self { num_azimuth, num_gates }
    }

    /// Number of cells in one scan
    pub fn scan_size(&self) -> usize {
        self.num_azimuth * self.num_gates
    }

    /// ndarray shape `(azimuth, gate)`
    pub fn shape(&self) -> (usize, usize) {
        (self.num_azimuth, self.num_gates)
    }

    /// Split a linear index into `(azimuth, gate)`
    pub fn split(&self, index: usize) -> (usize, usize) {
        (index / self.num_gates, index % self.num_gates)
    }

    /// Linear index of `(azimuth, gate)`
    pub fn linear(&self, azimuth: usize, gate: usize) -> usize {
        azimuth * self.num_gates + gate
    }

    /// Azimuth `offset` beams away from `azimuth`, wrapping around the scan
    pub fn wrap_azimuth(&self, azimuth: usize, offset: isize) -> usize {
        let n = self.num_azimuth as isize;
        ((azimuth as isize + offset) % n + n) as usize % self.num_azimuth
    }

    pub(crate) fn ensure_same(&self, other: &ScanGeometry) -> RefractResult<()> {
        if self != other {
            return Err(RefractError::GeometryMismatch {
                expected: *self,
                actual: *other,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ScanGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.num_azimuth, self.num_gates)
    }
}

/// Error types for refractivity processing
#[derive(Debug, thiserror::Error)]
pub enum RefractError {
    #[error("Length mismatch: expected {expected} cells, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Scan geometry mismatch: expected {expected}, got {actual}")]
    GeometryMismatch {
        expected: ScanGeometry,
        actual: ScanGeometry,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for refractivity operations
pub type RefractResult<T> = Result<T, RefractError>;

/// Linear power of a dB value; missing values carry no power
pub(crate) fn linear_power(db: Option<f32>) -> f32 {
    match db {
        Some(v) => 10f32.powf(0.1 * v),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_helpers() {
        let geometry = ScanGeometry::new(4, 3);
        assert_eq!(geometry.scan_size(), 12);
        assert_eq!(geometry.split(7), (2, 1));
        assert_eq!(geometry.linear(2, 1), 7);
        assert_eq!(geometry.wrap_azimuth(0, -1), 3);
        assert_eq!(geometry.wrap_azimuth(3, 1), 0);
        assert_eq!(geometry.wrap_azimuth(1, -6), 3);
    }

    #[test]
    fn test_geometry_mismatch() {
        let a = ScanGeometry::new(4, 3);
        let b = ScanGeometry::new(3, 4);
        assert!(a.ensure_same(&a).is_ok());
        match a.ensure_same(&b) {
            Err(RefractError::GeometryMismatch { expected, actual }) => {
                assert_eq!(expected, a);
                assert_eq!(actual, b);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_linear_power() {
        assert!((linear_power(Some(10.0)) - 10.0).abs() < 1e-4);
        assert_eq!(linear_power(None), 0.0);
    }
}
