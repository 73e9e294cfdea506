//! Median-effect linear regression
//!
//! The median-effect equation `ln(fa/fu) = m·ln(D) - m·ln(Dm)` is linear in
//! `ln(D)`, so `m` and `Dm` follow from an ordinary least-squares fit of
//! `logit(fa)` against `ln(D)`:
//!
//! - `m` = slope
//! - `Dm = exp(-intercept / m)`
//!
//! Only measurements with `D > 0` and `0 < fa < 1` are in the domain of the
//! transform; everything else is skipped.

use crate::data::Measurement;

use super::error::FitError;

/// `ln(e / (1 - e))`
pub fn logit(effect: f64) -> f64 {
    (effect / (1.0 - effect)).ln()
}

/// Inverse of [logit]
pub fn expit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Result of a median-effect regression
#[derive(Debug, Clone, PartialEq)]
pub struct MedianEffectLine {
    /// Slope `m`
    pub m: f64,
    /// Median dose `Dm`
    pub dm: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Lowest and highest usable dose
    pub dose_range: (f64, f64),
}

impl MedianEffectLine {
    /// Effect predicted by the line at `dose`
    pub fn predict(&self, dose: f64) -> f64 {
        expit(self.intercept + self.m * dose.ln())
    }
}

/// Whether a measurement lies in the domain of the median-effect transform
pub(crate) fn in_domain(m: &Measurement) -> bool {
    m.dose > 0.0 && m.effect > 0.0 && m.effect < 1.0
}

/// Fit the median-effect line to `measurements`
///
/// The returned `m`/`dm` are not checked for finiteness: a flat response gives
/// `m = 0` and an infinite `dm`, which the caller treats as non-convergence.
pub fn median_effect_regression(measurements: &[Measurement]) -> Result<MedianEffectLine, FitError> {
    let usable: Vec<&Measurement> = measurements.iter().filter(|m| in_domain(m)).collect();
    if usable.len() < 2 {
        return Err(FitError::InsufficientData {
            usable: usable.len(),
            required: 2,
        });
    }

    let x: Vec<f64> = usable.iter().map(|m| m.dose.ln()).collect();
    let y: Vec<f64> = usable.iter().map(|m| logit(m.effect)).collect();

    let (slope, intercept, r_squared) =
        linear_regression(&x, &y).ok_or_else(|| FitError::NonConvergence {
            reason: "all usable measurements share a single dose".to_string(),
        })?;

    let (min_dose, max_dose) = usable.iter().fold((f64::INFINITY, 0.0_f64), |(lo, hi), m| {
        (lo.min(m.dose), hi.max(m.dose))
    });

    Ok(MedianEffectLine {
        m: slope,
        dm: (-intercept / slope).exp(),
        intercept,
        r_squared,
        dose_range: (min_dose, max_dose),
    })
}

/// Simple linear regression: y = a + b*x
///
/// Returns (slope, intercept, r_squared)
pub(crate) fn linear_regression(x: &[f64], y: &[f64]) -> Option<(f64, f64, f64)> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }

    let n_f = n as f64;
    let x_mean: f64 = x.iter().sum::<f64>() / n_f;
    let y_mean: f64 = y.iter().sum::<f64>() / n_f;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let x_diff = xi - x_mean;
        let y_diff = yi - y_mean;
        ss_xy += x_diff * y_diff;
        ss_xx += x_diff * x_diff;
        ss_yy += y_diff * y_diff;
    }

    if ss_xx.abs() < 1e-15 {
        return None;
    }

    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;
    let r_squared = if ss_yy.abs() < 1e-15 {
        1.0
    } else {
        (ss_xy * ss_xy) / (ss_xx * ss_yy)
    };

    Some((slope, intercept, r_squared))
}
