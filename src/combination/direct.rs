//! CI computed from the fitted curves instead of the median-effect line
//!
//! Each curve is inverted numerically at the target effect, giving the dose of
//! each drug alone that reaches it.

use serde::{Deserialize, Serialize};

use crate::fit::DoseResponseFit;

use super::error::CombinationError;

/// Result of a direct CI computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectCi {
    pub ci: f64,
    /// Blue dose alone reaching the effect
    pub fit_dose_1: f64,
    /// Red dose alone reaching the effect
    pub fit_dose_2: f64,
}

/// Dose of one drug alone producing `effect`, from its fitted curve
///
/// A negative median-effect slope selects the decreasing branch.
pub fn fit_dose(fit: &DoseResponseFit, effect: f64, role: &str) -> Result<f64, CombinationError> {
    let curve = fit
        .curve
        .as_ref()
        .ok_or_else(|| CombinationError::MissingCurve {
            role: role.to_string(),
            model: fit.model_type.to_string(),
        })?;
    Ok(curve.invert(effect, fit.m < 0.0)?)
}

/// `ci = blue_dose / fit_dose_1 + red_dose / fit_dose_2`
pub fn direct_ci(
    blue: &DoseResponseFit,
    red: &DoseResponseFit,
    blue_dose: f64,
    red_dose: f64,
    effect: f64,
) -> Result<DirectCi, CombinationError> {
    let fit_dose_1 = fit_dose(blue, effect, "blue")?;
    let fit_dose_2 = fit_dose(red, effect, "red")?;
    Ok(DirectCi {
        ci: blue_dose / fit_dose_1 + red_dose / fit_dose_2,
        fit_dose_1,
        fit_dose_2,
    })
}
