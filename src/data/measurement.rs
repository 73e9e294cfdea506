use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::InputError;

/// A single dose-response observation
///
/// `effect` is the fraction affected, nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub dose: f64,
    pub effect: f64,
}

impl Measurement {
    /// Create a validated measurement
    ///
    /// # Errors
    ///
    /// Returns [InputError::NonFinite] if either value is NaN or infinite, and
    /// [InputError::NegativeDose] for doses below zero.
    pub fn new(dose: f64, effect: f64) -> Result<Self, InputError> {
        if !dose.is_finite() || !effect.is_finite() {
            return Err(InputError::NonFinite { dose, effect });
        }
        if dose < 0.0 {
            return Err(InputError::NegativeDose { dose });
        }
        Ok(Self { dose, effect })
    }

    fn key(&self) -> (u64, u64) {
        // Normalise -0.0 so it collapses with 0.0
        ((self.dose + 0.0).to_bits(), (self.effect + 0.0).to_bits())
    }

    /// Same dose with the effect complemented (`1 - effect`)
    pub fn complemented(&self) -> Self {
        Self {
            dose: self.dose,
            effect: 1.0 - self.effect,
        }
    }
}

/// Deduplicated set of measurements for a single drug
///
/// Identical (dose, effect) pairs collapse to one entry. The first occurrence
/// is kept, so iteration order is the order in which distinct pairs were seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    measurements: Vec<Measurement>,
}

impl MeasurementSet {
    /// Build a set from already validated measurements
    pub fn new(measurements: impl IntoIterator<Item = Measurement>) -> Self {
        let mut seen = HashSet::new();
        let measurements = measurements
            .into_iter()
            .filter(|m| seen.insert(m.key()))
            .collect();
        Self { measurements }
    }

    /// Build a set that keeps repeated measurements, as drawn by case resampling
    pub(crate) fn with_duplicates(measurements: Vec<Measurement>) -> Self {
        Self { measurements }
    }

    /// Build a set from parallel dose and effect slices
    pub fn from_doses_effects(doses: &[f64], effects: &[f64]) -> Result<Self, InputError> {
        if doses.len() != effects.len() {
            return Err(InputError::LengthMismatch {
                treatment: String::new(),
                doses: doses.len(),
                effects: effects.len(),
            });
        }
        let measurements = doses
            .iter()
            .zip(effects)
            .map(|(&d, &e)| Measurement::new(d, e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(measurements))
    }

    /// Build a set from `(dose, effect)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, InputError> {
        let measurements = pairs
            .iter()
            .map(|&(d, e)| Measurement::new(d, e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(measurements))
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn doses(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.dose).collect()
    }

    pub fn effects(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.effect).collect()
    }

    /// Copy of the set with every effect replaced by `1 - effect`
    pub fn complemented(&self) -> Self {
        Self {
            measurements: self.measurements.iter().map(|m| m.complemented()).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MeasurementSet {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let set =
            MeasurementSet::from_pairs(&[(1.0, 0.1), (10.0, 0.5), (1.0, 0.1), (10.0, 0.6)])
                .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.doses(), vec![1.0, 10.0, 10.0]);
        assert_eq!(set.effects(), vec![0.1, 0.5, 0.6]);
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let set = MeasurementSet::from_pairs(&[(0.0, 0.0), (-0.0, 0.0)]).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_rejects_invalid_measurements() {
        assert_eq!(
            Measurement::new(-1.0, 0.5),
            Err(InputError::NegativeDose { dose: -1.0 })
        );
        assert!(matches!(
            Measurement::new(1.0, f64::NAN),
            Err(InputError::NonFinite { .. })
        ));
        assert!(matches!(
            MeasurementSet::from_doses_effects(&[1.0, 2.0], &[0.5]),
            Err(InputError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_complemented() {
        let set = MeasurementSet::from_pairs(&[(1.0, 0.25), (2.0, 0.75)]).unwrap();
        let inv = set.complemented();
        assert_eq!(inv.effects(), vec![0.75, 0.25]);
        assert_eq!(inv.doses(), set.doses());
    }
}
