//! Effect-inversion fallback around the dose-response fitter
//!
//! The median-effect regression only behaves when the data trend matches the
//! assumed sign of the slope. When a fit fails on the data as given, it is
//! repeated once on complemented effects (`1 - e`) with a complemented median
//! point, and the result is transformed back:
//!
//! ```text
//!   Normal ──fail──▶ Inverted ──fail──▶ Failure
//!     │                 │
//!     └──ok──▶ Success ◀┘
//! ```
//!
//! Whatever the outcome, the values computed along the way are kept in a
//! [PartialFit] next to the terminal status.

use std::borrow::Cow;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::MeasurementSet;

use super::bootstrap::bootstrap_samples;
use super::error::FitError;
use super::fitter::{DoseResponseFit, DoseResponseFitter, Estimate};
use super::model::LogisticCurve;
use super::nonlinear::fit_logistic;

/// State of the retry controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitState {
    /// Effects as given
    Normal,
    /// Complemented effects
    Inverted,
}

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Attempt {
    Ok(DoseResponseFit),
    Retry(FitError),
    Err(FitError),
}

/// Best-known values of a fit, recorded even when it fails
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialFit {
    pub m: Option<f64>,
    pub dm: Option<f64>,
    pub point1: Option<(f64, f64)>,
    pub point2: Option<(f64, f64)>,
    pub gi50: Option<f64>,
    /// Fitted curve of a nonlinear model, kept even when its linearisation fails
    pub curve: Option<LogisticCurve>,
    pub inverted: bool,
    /// Number of fit attempts made (1 or 2)
    pub attempts: u8,
    pub bootstrap_samples: Vec<(f64, f64)>,
}

impl PartialFit {
    fn record(&mut self, estimate: &Estimate) {
        self.m = Some(estimate.m);
        self.dm = Some(estimate.dm);
        self.point1 = Some(estimate.point1);
        self.point2 = Some(estimate.point2);
        self.gi50 = estimate.gi50;
        self.curve = estimate.curve.clone();
    }

    fn record_curve(&mut self, curve: LogisticCurve) {
        self.gi50 = curve.gi50();
        self.curve = Some(curve);
    }
}

/// Terminal status of a fit plus everything recorded on the way
#[derive(Debug, Clone)]
pub struct FitReport {
    pub partial: PartialFit,
    pub result: Result<DoseResponseFit, FitError>,
}

impl FitReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn fit(&self) -> Option<&DoseResponseFit> {
        self.result.as_ref().ok()
    }

    pub fn into_result(self) -> Result<DoseResponseFit, FitError> {
        self.result
    }
}

/// Runs a fit with at most one inverted retry
pub struct FitRetryController<'a> {
    fitter: &'a DoseResponseFitter,
}

impl<'a> FitRetryController<'a> {
    pub fn new(fitter: &'a DoseResponseFitter) -> Self {
        Self { fitter }
    }

    pub fn run(
        &self,
        set: &MeasurementSet,
        median_point: f64,
        model_path: Option<&Path>,
    ) -> FitReport {
        let mut partial = PartialFit::default();
        let mut last_error = None;

        for state in [FitState::Normal, FitState::Inverted] {
            partial.attempts += 1;
            partial.inverted = state == FitState::Inverted;
            match self.attempt(state, set, median_point, model_path, &mut partial) {
                Attempt::Ok(fit) => {
                    return FitReport {
                        partial,
                        result: Ok(fit),
                    }
                }
                Attempt::Retry(e) => {
                    tracing::warn!(error = %e, "Fit failed, inverting effects and repeating");
                    last_error = Some(e);
                }
                Attempt::Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no fit attempted".to_string());
        tracing::warn!(reason = %reason, "Could not fit dose-response model");
        FitReport {
            partial,
            result: Err(FitError::Failure { reason }),
        }
    }

    fn attempt(
        &self,
        state: FitState,
        set: &MeasurementSet,
        median_point: f64,
        model_path: Option<&Path>,
        partial: &mut PartialFit,
    ) -> Attempt {
        let (data, median_point) = match state {
            FitState::Normal => (Cow::Borrowed(set), median_point),
            FitState::Inverted => (Cow::Owned(set.complemented()), 1.0 - median_point),
        };

        match self.try_fit(state, &data, median_point, model_path, partial) {
            Ok(fit) => Attempt::Ok(fit),
            Err(e) => match state {
                FitState::Normal => Attempt::Retry(e),
                FitState::Inverted => Attempt::Err(e),
            },
        }
    }

    fn try_fit(
        &self,
        state: FitState,
        data: &MeasurementSet,
        median_point: f64,
        model_path: Option<&Path>,
        partial: &mut PartialFit,
    ) -> Result<DoseResponseFit, FitError> {
        let model = self.fitter.model_type();
        let raw = if model.is_log_linear() {
            self.fitter.estimate(data, median_point)?
        } else {
            let curve = fit_logistic(data.as_slice(), model, &self.fitter.options().optimizer)?;
            partial.record_curve(match state {
                FitState::Normal => curve.clone(),
                FitState::Inverted => curve.complemented(),
            });
            self.fitter.linearize(curve, median_point)?
        };
        let estimate = match state {
            FitState::Normal => raw.clone(),
            FitState::Inverted => raw.clone().complemented(),
        };
        partial.record(&estimate);
        tracing::debug!(
            state = ?state,
            m = estimate.m,
            dm = estimate.dm,
            "Fit attempt finished"
        );

        let raw = raw.validate()?;
        let estimate = estimate.validate()?;

        let model_path = match (&estimate.curve, model_path) {
            (Some(curve), Some(path)) => {
                curve.persist(path)?;
                Some(path.to_path_buf())
            }
            _ => None,
        };

        let mut samples = bootstrap_samples(
            self.fitter,
            data,
            median_point,
            &raw,
            &self.fitter.options().bootstrap,
        );
        if state == FitState::Inverted {
            samples.iter_mut().for_each(|(m, _)| *m = -*m);
        }
        partial.bootstrap_samples = samples.clone();

        Ok(DoseResponseFit {
            model_type: self.fitter.model_type(),
            m: estimate.m,
            dm: estimate.dm,
            point1: estimate.point1,
            point2: estimate.point2,
            inverted: state == FitState::Inverted,
            curve: estimate.curve,
            bootstrap_samples: samples,
            gi50: estimate.gi50,
            model_path,
        })
    }
}
