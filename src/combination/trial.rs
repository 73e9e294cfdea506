use serde::{Deserialize, Serialize};

use crate::data::{CombinationId, MeasurementSet};
use crate::fit::{DoseResponseFit, ModelType};

use super::direct::direct_ci;
use super::error::CombinationError;
use super::index::{additive_dose, combination_index, random_ci, MedianEffect};

/// How the CI of a trial is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CiMode {
    /// Closed form from the median-effect parameters
    Classical,
    /// Inversion of the fitted nonlinear curves
    Direct,
}

impl CiMode {
    pub fn select(model_type: ModelType, direct_ci: bool) -> Self {
        if direct_ci && !model_type.is_log_linear() {
            CiMode::Direct
        } else {
            CiMode::Classical
        }
    }
}

/// Inputs of one combination trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub combination: CombinationId,
    pub blue_measurements: MeasurementSet,
    pub red_measurements: MeasurementSet,
    pub blue_dose: f64,
    pub red_dose: f64,
    /// Effect observed for the combined dose
    pub effect: f64,
    pub fix_ratio: bool,
    pub model_type: ModelType,
    pub direct_ci: bool,
    /// Combined doses of the other pairs of this combination, for display
    pub more_doses: Vec<f64>,
    pub more_effects: Vec<f64>,
}

impl TrialSpec {
    /// Effect around which single-drug fits are linearised
    pub fn median_point(&self) -> f64 {
        if self.model_type.is_log_linear() {
            0.5
        } else {
            self.effect
        }
    }

    pub fn ci_mode(&self) -> CiMode {
        CiMode::select(self.model_type, self.direct_ci)
    }

    /// Dose pair as written in reports, `<blue>-<red>`
    pub fn doses_label(&self) -> String {
        format!("{}-{}", self.blue_dose, self.red_dose)
    }
}

/// A combination trial together with its computed synergy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationTrial {
    pub spec: TrialSpec,
    pub blue: DoseResponseFit,
    pub red: DoseResponseFit,
    pub mode: CiMode,
    /// None when either fit lacks usable parameters
    pub ci: Option<f64>,
    /// Bootstrap CI values, ascending
    pub random_ci: Vec<f64>,
    /// Additive combined dose at 50% effect
    pub gi50: Option<f64>,
    /// Single-drug doses reaching the effect (direct mode only)
    pub fit_doses: Option<(f64, f64)>,
}

impl CombinationTrial {
    /// Combine two single-drug fits into the CI of `spec`
    ///
    /// # Errors
    ///
    /// Only the direct mode fails, when a curve is missing or cannot be
    /// inverted at the trial effect.
    pub fn evaluate(
        spec: TrialSpec,
        blue: DoseResponseFit,
        red: DoseResponseFit,
    ) -> Result<Self, CombinationError> {
        let mode = spec.ci_mode();
        let mut trial = Self {
            spec,
            blue,
            red,
            mode,
            ci: None,
            random_ci: Vec::new(),
            gi50: None,
            fit_doses: None,
        };

        if !(trial.blue.has_parameters() && trial.red.has_parameters()) {
            tracing::debug!(
                combination = %trial.spec.combination,
                "Missing median-effect parameters, no CI computed"
            );
            return Ok(trial);
        }

        let (b, r, effect) = (trial.spec.blue_dose, trial.spec.red_dose, trial.spec.effect);
        let blue_me = MedianEffect::from(&trial.blue);
        let red_me = MedianEffect::from(&trial.red);

        match mode {
            CiMode::Classical => {
                trial.ci = Some(combination_index(b, r, effect, blue_me, red_me));
            }
            CiMode::Direct => {
                let direct = direct_ci(&trial.blue, &trial.red, b, r, effect)?;
                trial.ci = Some(direct.ci);
                trial.fit_doses = Some((direct.fit_dose_1, direct.fit_dose_2));
            }
        }
        trial.random_ci = random_ci(
            b,
            r,
            effect,
            &trial.blue.bootstrap_samples,
            &trial.red.bootstrap_samples,
        );
        trial.gi50 = Some(additive_dose(0.5, b, r, blue_me, red_me).total).filter(|g| g.is_finite());

        tracing::debug!(
            combination = %trial.spec.combination,
            doses = %trial.spec.doses_label(),
            ci = ?trial.ci,
            mode = ?mode,
            "Computed combination index"
        );
        Ok(trial)
    }

    /// Lower end of the bootstrap CI range
    pub fn ci_low(&self) -> Option<f64> {
        self.random_ci.first().copied()
    }

    /// Upper end of the bootstrap CI range
    pub fn ci_high(&self) -> Option<f64> {
        self.random_ci.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{fit_drug, FitOptions};
    use approx::assert_relative_eq;

    fn spec(model_type: ModelType, direct_ci: bool) -> TrialSpec {
        TrialSpec {
            combination: CombinationId::new("A", "B"),
            blue_measurements: MeasurementSet::from_pairs(&[(1.0, 0.1), (10.0, 0.5), (100.0, 0.9)])
                .unwrap(),
            red_measurements: MeasurementSet::from_pairs(&[(1.0, 0.2), (10.0, 0.5), (100.0, 0.8)])
                .unwrap(),
            blue_dose: 10.0,
            red_dose: 10.0,
            effect: 0.5,
            fix_ratio: false,
            model_type,
            direct_ci,
            more_doses: Vec::new(),
            more_effects: Vec::new(),
        }
    }

    fn fits(spec: &TrialSpec) -> (DoseResponseFit, DoseResponseFit) {
        let options = FitOptions::default().without_bootstrap();
        let blue = fit_drug(&spec.blue_measurements, &options)
            .into_result()
            .unwrap();
        let red = fit_drug(&spec.red_measurements, &options)
            .into_result()
            .unwrap();
        (blue, red)
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(CiMode::select(ModelType::LogLinear, true), CiMode::Classical);
        assert_eq!(CiMode::select(ModelType::Logistic4, false), CiMode::Classical);
        assert_eq!(CiMode::select(ModelType::Logistic4, true), CiMode::Direct);
    }

    #[test]
    fn test_both_drugs_at_their_median_give_ci_two() {
        let spec = spec(ModelType::LogLinear, false);
        let (blue, red) = fits(&spec);
        assert_relative_eq!(blue.dm, 10.0, epsilon = 1e-9);
        assert_relative_eq!(red.dm, 10.0, epsilon = 1e-9);

        let trial = CombinationTrial::evaluate(spec, blue, red).unwrap();
        assert_eq!(trial.mode, CiMode::Classical);
        assert_relative_eq!(trial.ci.unwrap(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(trial.gi50.unwrap(), 10.0, epsilon = 1e-9);
        assert!(trial.random_ci.is_empty());
        assert_eq!(trial.ci_low(), None);
        assert!(trial.fit_doses.is_none());
    }

    #[test]
    fn test_missing_parameters_give_no_ci() {
        let spec = spec(ModelType::LogLinear, false);
        let (blue, mut red) = fits(&spec);
        red.dm = f64::NAN;
        red.bootstrap_samples = vec![(1.0, 10.0)];
        let trial = CombinationTrial::evaluate(spec, blue, red).unwrap();
        assert_eq!(trial.ci, None);
        assert!(trial.random_ci.is_empty());
        assert_eq!(trial.gi50, None);
    }

    #[test]
    fn test_random_ci_goes_through_bootstrap_samples() {
        let spec = spec(ModelType::LogLinear, false);
        let (mut blue, mut red) = fits(&spec);
        blue.bootstrap_samples = vec![(1.0, 5.0), (1.0, 20.0), (1.0, 10.0)];
        red.bootstrap_samples = vec![(1.0, 10.0), (1.0, 10.0)];
        let trial = CombinationTrial::evaluate(spec, blue, red).unwrap();
        assert_eq!(trial.random_ci.len(), 2);
        assert_relative_eq!(trial.ci_low().unwrap(), 1.5, epsilon = 1e-12);
        assert_relative_eq!(trial.ci_high().unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_direct_mode_without_curve_fails() {
        let direct_spec = spec(ModelType::Logistic2, true);
        // Log-linear fits carry no curve
        let (blue, red) = fits(&direct_spec);
        assert!(matches!(
            CombinationTrial::evaluate(direct_spec, blue, red),
            Err(CombinationError::MissingCurve { .. })
        ));
    }
}
