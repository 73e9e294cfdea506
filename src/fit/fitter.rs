use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::MeasurementSet;

use super::bootstrap::BootstrapOptions;
use super::error::FitError;
use super::model::{LogisticCurve, ModelType};
use super::nonlinear::{fit_logistic, OptimizerOptions};
use super::regression::{expit, logit, median_effect_regression};
use super::retry::{FitReport, FitRetryController};

/// Options for single-drug dose-response fits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Model fitted to each drug (default: LogLinear)
    pub model_type: ModelType,
    /// Effect around which the median-effect line of a nonlinear fit is taken (default: 0.5)
    pub median_point: f64,
    /// Dose ratio between the median point and each representative point of a
    /// nonlinear fit (default: 2.0)
    pub me_span: f64,
    /// Nelder-Mead settings for nonlinear models
    pub optimizer: OptimizerOptions,
    /// Bootstrap resampling for confidence intervals
    pub bootstrap: BootstrapOptions,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            model_type: ModelType::LogLinear,
            median_point: 0.5,
            me_span: 2.0,
            optimizer: OptimizerOptions::default(),
            bootstrap: BootstrapOptions::default(),
        }
    }
}

impl FitOptions {
    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn with_median_point(mut self, median_point: f64) -> Self {
        self.median_point = median_point;
        self
    }

    pub fn with_me_span(mut self, span: f64) -> Self {
        self.me_span = span;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerOptions) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapOptions) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Disable bootstrap resampling
    pub fn without_bootstrap(mut self) -> Self {
        self.bootstrap.samples = 0;
        self
    }
}

/// Unvalidated output of a single fit attempt
///
/// `m` and `dm` may be non-finite; [Estimate::validate] turns that into
/// [FitError::NonConvergence].
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub m: f64,
    pub dm: f64,
    pub point1: (f64, f64),
    pub point2: (f64, f64),
    pub curve: Option<LogisticCurve>,
    pub gi50: Option<f64>,
}

impl Estimate {
    pub fn has_parameters(&self) -> bool {
        self.m.is_finite() && self.dm.is_finite() && self.dm > 0.0
    }

    pub fn validate(self) -> Result<Self, FitError> {
        if self.has_parameters() {
            Ok(self)
        } else {
            Err(FitError::NonConvergence {
                reason: format!("m = {}, dm = {}", self.m, self.dm),
            })
        }
    }

    /// Effect predicted by the fitted model at `dose`
    pub fn predict(&self, dose: f64) -> f64 {
        match &self.curve {
            Some(curve) => curve.predict(dose),
            None => expit(self.m * (dose.ln() - self.dm.ln())),
        }
    }

    /// Same estimate expressed for complemented effects
    pub(crate) fn complemented(self) -> Self {
        Self {
            m: -self.m,
            dm: self.dm,
            point1: (self.point1.0, 1.0 - self.point1.1),
            point2: (self.point2.0, 1.0 - self.point2.1),
            curve: self.curve.map(|c| c.complemented()),
            gi50: self.gi50,
        }
    }
}

/// Successful dose-response fit of one drug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResponseFit {
    pub model_type: ModelType,
    /// Median-effect slope
    pub m: f64,
    /// Median dose
    pub dm: f64,
    pub point1: (f64, f64),
    pub point2: (f64, f64),
    /// Whether parameters were obtained on complemented effects
    pub inverted: bool,
    /// Fitted curve for nonlinear models
    pub curve: Option<LogisticCurve>,
    /// Resampled `(m, dm)` pairs, possibly empty
    pub bootstrap_samples: Vec<(f64, f64)>,
    /// Dose at 50% effect
    pub gi50: Option<f64>,
    /// Where the curve was persisted, if anywhere
    pub model_path: Option<PathBuf>,
}

impl DoseResponseFit {
    /// Whether `m` and `dm` are usable finite numbers
    pub fn has_parameters(&self) -> bool {
        self.m.is_finite() && self.dm.is_finite() && self.dm > 0.0
    }

    /// Dose reaching `effect` under the median-effect equation
    pub fn effective_dose(&self, effect: f64) -> f64 {
        crate::combination::effective_dose(effect, self.m, self.dm)
    }
}

/// Fits median-effect models to single-drug measurements
#[derive(Debug, Clone, Default)]
pub struct DoseResponseFitter {
    options: FitOptions,
}

impl DoseResponseFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn model_type(&self) -> ModelType {
        self.options.model_type
    }

    /// One fit attempt on the data as given
    ///
    /// Structural failures (too little data, optimizer errors, a curve that
    /// never reaches `median_point`) are errors. Non-finite parameters are
    /// returned as they are so the caller can record them.
    pub fn estimate(&self, set: &MeasurementSet, median_point: f64) -> Result<Estimate, FitError> {
        match self.options.model_type {
            ModelType::LogLinear => self.estimate_log_linear(set),
            model => self.estimate_logistic(set, median_point, model),
        }
    }

    fn estimate_log_linear(&self, set: &MeasurementSet) -> Result<Estimate, FitError> {
        let line = median_effect_regression(set.as_slice())?;
        let (lo, hi) = line.dose_range;
        Ok(Estimate {
            m: line.m,
            dm: line.dm,
            point1: (lo, line.predict(lo)),
            point2: (hi, line.predict(hi)),
            curve: None,
            gi50: Some(line.dm).filter(|d| d.is_finite()),
        })
    }

    fn estimate_logistic(
        &self,
        set: &MeasurementSet,
        median_point: f64,
        model: ModelType,
    ) -> Result<Estimate, FitError> {
        let curve = fit_logistic(set.as_slice(), model, &self.options.optimizer)?;
        self.linearize(curve, median_point)
    }

    /// Median-effect line through two points of a fitted curve around `median_point`
    pub(crate) fn linearize(
        &self,
        curve: LogisticCurve,
        median_point: f64,
    ) -> Result<Estimate, FitError> {
        let decreasing = curve.is_decreasing();
        let median_dose = curve.invert(median_point, decreasing)?;

        let span = self.options.me_span;
        let d1 = median_dose / span;
        let d2 = median_dose * span;
        let e1 = curve.predict(d1);
        let e2 = curve.predict(d2);
        if !(e1 > 0.0 && e1 < 1.0 && e2 > 0.0 && e2 < 1.0) {
            return Err(FitError::NonConvergence {
                reason: format!(
                    "median-effect points ({}, {}) and ({}, {}) fall outside (0, 1)",
                    d1, e1, d2, e2
                ),
            });
        }

        let m = (logit(e2) - logit(e1)) / (d2.ln() - d1.ln());
        let dm = (d1.ln() - logit(e1) / m).exp();
        let gi50 = curve.gi50();

        Ok(Estimate {
            m,
            dm,
            point1: (d1, e1),
            point2: (d2, e2),
            curve: Some(curve),
            gi50,
        })
    }

    /// Fit with the inversion fallback, persisting nonlinear curves to `model_path`
    pub fn fit(
        &self,
        set: &MeasurementSet,
        median_point: f64,
        model_path: Option<&Path>,
    ) -> FitReport {
        FitRetryController::new(self).run(set, median_point, model_path)
    }
}

/// Fit one drug with the options' median point and no persisted model
pub fn fit_drug(set: &MeasurementSet, options: &FitOptions) -> FitReport {
    DoseResponseFitter::new(options.clone()).fit(set, options.median_point, None)
}
