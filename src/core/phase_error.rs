use crate::core::scalar_field::ScalarField;
use crate::types::ScanGeometry;
use ndarray::{Array2, Zip};

/// Expected phase error of a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseError {
    /// Standard deviation of the phase estimate in degrees
    Degrees(f32),
    /// No usable phase (non-positive NCP)
    Unusable,
}

impl PhaseError {
    /// `sqrt(-2 ln(ncp) / ncp)` in degrees for positive NCP
    pub fn from_ncp(ncp: f32) -> Self {
        if ncp > 0.0 {
            PhaseError::Degrees((-2.0 * ncp.ln() / ncp).sqrt().to_degrees())
        } else {
            PhaseError::Unusable
        }
    }

    pub fn degrees(&self) -> Option<f32> {
        match self {
            PhaseError::Degrees(d) => Some(*d),
            PhaseError::Unusable => None,
        }
    }
}

/// Per-cell phase error; every cell starts out unusable
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseErrorField {
    geometry: ScanGeometry,
    values: Array2<PhaseError>,
}

impl PhaseErrorField {
    pub fn new(geometry: ScanGeometry) -> Self {
        Self {
            geometry,
            values: Array2::from_elem(geometry.shape(), PhaseError::Unusable),
        }
    }

    pub fn geometry(&self) -> ScanGeometry {
        self.geometry
    }

    pub fn values(&self) -> &Array2<PhaseError> {
        &self.values
    }

    pub fn get(&self, index: usize) -> PhaseError {
        self.values[self.geometry.split(index)]
    }

    pub fn at(&self, azimuth: usize, gate: usize) -> PhaseError {
        self.values[(azimuth, gate)]
    }

    /// Derive the phase error wherever NCP was computed
    pub fn set_from_ncp(&mut self, ncp: &ScalarField) {
        Zip::from(&mut self.values)
            .and(ncp.values())
            .for_each(|out, &n| {
                if let Some(n) = n {
                    *out = PhaseError::from_ncp(n);
                }
            });
    }

    /// Export as a flat array, `very_large` marking unusable cells
    pub fn to_sentinel_vec(&self, very_large: f32) -> Vec<f32> {
        self.values
            .iter()
            .map(|v| v.degrees().unwrap_or(very_large))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_ncp() {
        assert_eq!(PhaseError::from_ncp(0.0), PhaseError::Unusable);
        assert_eq!(PhaseError::from_ncp(-0.2), PhaseError::Unusable);

        // ncp = 1 is a perfect target
        assert_eq!(PhaseError::from_ncp(1.0), PhaseError::Degrees(0.0));

        let expected = (-2.0 * 0.5f32.ln() / 0.5).sqrt().to_degrees();
        assert_relative_eq!(PhaseError::from_ncp(0.5).degrees().unwrap(), expected);
    }

    #[test]
    fn test_set_from_ncp() {
        let g = ScanGeometry::new(2, 2);
        let mut ncp = ScalarField::new(g);
        ncp.set(0, Some(0.9));
        ncp.set(1, Some(0.0));

        let mut field = PhaseErrorField::new(g);
        field.set_from_ncp(&ncp);
        assert!(field.get(0).degrees().unwrap() > 0.0);
        assert_eq!(field.get(1), PhaseError::Unusable);
        assert_eq!(field.get(2), PhaseError::Unusable);

        let exported = field.to_sentinel_vec(2147483647.0);
        assert_eq!(exported[1], 2147483647.0);
        assert_eq!(exported[3], 2147483647.0);
    }
}
