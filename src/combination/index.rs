//! Closed-form combination index (Chou-Talalay)
//!
//! For a combination of doses `(d1, d2)` reaching effect `fa`:
//!
//! `CI = d1 / Dx1 + d2 / Dx2`, with `Dx = Dm · (fa / (1 - fa))^(1/m)`
//!
//! CI < 1 indicates synergy, CI = 1 additivity and CI > 1 antagonism.

use serde::{Deserialize, Serialize};

use crate::fit::DoseResponseFit;

/// Median-effect parameters of one drug
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MedianEffect {
    pub m: f64,
    pub dm: f64,
}

impl MedianEffect {
    pub fn new(m: f64, dm: f64) -> Self {
        Self { m, dm }
    }

    pub fn is_finite(&self) -> bool {
        self.m.is_finite() && self.dm.is_finite()
    }
}

impl From<&DoseResponseFit> for MedianEffect {
    fn from(fit: &DoseResponseFit) -> Self {
        Self::new(fit.m, fit.dm)
    }
}

impl From<(f64, f64)> for MedianEffect {
    fn from((m, dm): (f64, f64)) -> Self {
        Self::new(m, dm)
    }
}

/// Dose of a single drug reaching `effect` under the median-effect equation
pub fn effective_dose(effect: f64, m: f64, dm: f64) -> f64 {
    dm * (effect / (1.0 - effect)).powf(1.0 / m)
}

/// Combination index of `(blue_dose, red_dose)` producing `effect`
pub fn combination_index(
    blue_dose: f64,
    red_dose: f64,
    effect: f64,
    blue: MedianEffect,
    red: MedianEffect,
) -> f64 {
    blue_dose / effective_dose(effect, blue.m, blue.dm)
        + red_dose / effective_dose(effect, red.m, red.dm)
}

/// Dose pair on the `blue:red` ray that is additive at a given effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdditiveDose {
    /// Factor applied to both input doses
    pub scale: f64,
    pub blue_dose: f64,
    pub red_dose: f64,
    /// `blue_dose + red_dose`
    pub total: f64,
}

/// Scale `(blue_dose, red_dose)` so that the pair has CI = 1 at `effect`
///
/// CI is linear along a fixed-ratio ray, so the scale is `1 / CI(blue_dose, red_dose)`.
/// At `effect = 0.5` the total is the additive GI50 of the mixture. Zero doses
/// give a non-finite result.
pub fn additive_dose(
    effect: f64,
    blue_dose: f64,
    red_dose: f64,
    blue: MedianEffect,
    red: MedianEffect,
) -> AdditiveDose {
    let scale = 1.0 / combination_index(blue_dose, red_dose, effect, blue, red);
    let blue_dose = scale * blue_dose;
    let red_dose = scale * red_dose;
    AdditiveDose {
        scale,
        blue_dose,
        red_dose,
        total: blue_dose + red_dose,
    }
}

/// CI values for positionally paired bootstrap samples
///
/// The i-th blue sample is paired with the i-th red sample; the longer list is
/// truncated. The two resampling processes are independent, so the pairing is
/// an informal correlation structure rather than a joint bootstrap.
///
/// The result is sorted ascending with every non-finite value removed.
pub fn random_ci(
    blue_dose: f64,
    red_dose: f64,
    effect: f64,
    blue_samples: &[(f64, f64)],
    red_samples: &[(f64, f64)],
) -> Vec<f64> {
    let mut values: Vec<f64> = blue_samples
        .iter()
        .zip(red_samples)
        .map(|(&b, &r)| combination_index(blue_dose, red_dose, effect, b.into(), r.into()))
        .filter(|ci| ci.is_finite())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_effective_dose_at_median_is_dm() {
        for &(m, dm) in &[(1.0, 10.0), (0.3, 2.5), (-2.0, 7.0), (4.2, 1e-3)] {
            assert_relative_eq!(effective_dose(0.5, m, dm), dm);
        }
    }

    #[test]
    fn test_each_drug_at_its_median() {
        let blue = MedianEffect::new(0.95, 10.0);
        let red = MedianEffect::new(0.6, 10.0);
        assert_relative_eq!(
            combination_index(10.0, 10.0, 0.5, blue, red),
            2.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            combination_index(5.0, 5.0, 0.5, blue, red),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_ci_is_monotone_in_each_dose() {
        let blue = MedianEffect::new(1.2, 4.0);
        let red = MedianEffect::new(0.7, 12.0);
        let doses = [0.0, 0.5, 1.0, 2.0, 5.0, 10.0, 50.0];
        for effect in [0.2, 0.5, 0.8] {
            for pair in doses.windows(2) {
                let (lo, hi) = (pair[0], pair[1]);
                assert!(
                    combination_index(lo, 3.0, effect, blue, red)
                        <= combination_index(hi, 3.0, effect, blue, red)
                );
                assert!(
                    combination_index(3.0, lo, effect, blue, red)
                        <= combination_index(3.0, hi, effect, blue, red)
                );
            }
        }
    }

    #[test]
    fn test_additive_dose_is_additive() {
        let blue = MedianEffect::new(1.2, 4.0);
        let red = MedianEffect::new(0.7, 12.0);
        for &(b, r, effect) in &[(1.0, 1.0, 0.5), (3.0, 0.2, 0.3), (0.1, 20.0, 0.9)] {
            let add = additive_dose(effect, b, r, blue, red);
            assert_relative_eq!(
                combination_index(add.blue_dose, add.red_dose, effect, blue, red),
                1.0,
                epsilon = 1e-10
            );
            assert_relative_eq!(add.blue_dose / add.red_dose, b / r, epsilon = 1e-10);
            assert_relative_eq!(add.total, add.blue_dose + add.red_dose);
        }
    }

    #[test]
    fn test_single_drug_additive_dose_is_its_median() {
        let blue = MedianEffect::new(1.2, 4.0);
        let red = MedianEffect::new(0.7, 12.0);
        let add = additive_dose(0.5, 1.0, 0.0, blue, red);
        assert_relative_eq!(add.total, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_random_ci_sorted_and_finite() {
        let blue = [(1.0, 10.0), (0.0, 10.0), (1.1, 9.0), (0.9, 11.0)];
        let red = [(1.0, 10.0), (1.0, 10.0), (1.0, f64::NAN), (1.2, 8.0), (1.0, 1.0)];
        let values = random_ci(10.0, 10.0, 0.7, &blue, &red);
        assert_eq!(values.len(), 2);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_random_ci_empty() {
        assert!(random_ci(1.0, 1.0, 0.5, &[], &[(1.0, 1.0)]).is_empty());
    }
}
