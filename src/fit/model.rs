//! Dose-response model types and the fitted logistic curve

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;

use argmin::core::{CostFunction, Error, Executor};
use argmin::solver::brent::BrentRoot;
use serde::{Deserialize, Serialize};

use super::error::FitError;

const MAX_BRACKET_STEPS: usize = 16;
const ROOT_TOLERANCE: f64 = 1e-12;
const ROOT_MAX_ITERS: u64 = 200;

/// Dose-response model used to fit a single drug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelType {
    /// Linear regression of the median-effect equation (`logit(fa)` vs `ln(D)`)
    #[default]
    #[serde(rename = "least_squares")]
    LogLinear,
    /// Log-logistic with fixed limits 0 and 1
    #[serde(rename = "LL.2")]
    Logistic2,
    /// Log-logistic with a free upper limit
    #[serde(rename = "LL.3")]
    Logistic3,
    /// Log-logistic with free lower and upper limits
    #[serde(rename = "LL.4")]
    Logistic4,
    /// Log-logistic with free limits and an asymmetry exponent
    #[serde(rename = "LL.5")]
    Logistic5,
}

impl ModelType {
    pub fn is_log_linear(&self) -> bool {
        matches!(self, ModelType::LogLinear)
    }

    /// Number of free curve parameters for nonlinear models (0 for [ModelType::LogLinear])
    pub fn n_params(&self) -> usize {
        match self {
            ModelType::LogLinear => 0,
            ModelType::Logistic2 => 2,
            ModelType::Logistic3 => 3,
            ModelType::Logistic4 => 4,
            ModelType::Logistic5 => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::LogLinear => "least_squares",
            ModelType::Logistic2 => "LL.2",
            ModelType::Logistic3 => "LL.3",
            ModelType::Logistic4 => "LL.4",
            ModelType::Logistic5 => "LL.5",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    /// Accepts `least_squares` and the drc-style names `LL.2` .. `LL.5`,
    /// optionally written as calls (`LL.4()`, `:LL.4()`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches(':').trim_end_matches("()");
        match name {
            "least_squares" | "LL" | "log_linear" => Ok(ModelType::LogLinear),
            "LL.2" => Ok(ModelType::Logistic2),
            "LL.3" => Ok(ModelType::Logistic3),
            "LL.4" => Ok(ModelType::Logistic4),
            "LL.5" => Ok(ModelType::Logistic5),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

/// Fitted log-logistic dose-response curve
///
/// `f(D) = lower + (upper - lower) / (1 + exp(-slope * (ln D - ln ec50)))^asym`
///
/// A positive slope gives a curve rising from `lower` to `upper`. This is the
/// model handle retained by nonlinear fits and inverted by the direct CI path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticCurve {
    pub model: ModelType,
    pub slope: f64,
    pub ec50: f64,
    pub lower: f64,
    pub upper: f64,
    pub asym: f64,
}

impl LogisticCurve {
    /// Build a curve from an unconstrained parameter vector
    ///
    /// Layout: `[slope, ln(ec50), upper, lower, ln(asym)]`, truncated to the
    /// number of free parameters of `model`.
    pub(crate) fn from_params(model: ModelType, p: &[f64]) -> Self {
        let get = |i: usize, default: f64| p.get(i).copied().unwrap_or(default);
        let upper = if model.n_params() >= 3 { get(2, 1.0) } else { 1.0 };
        let lower = if model.n_params() >= 4 { get(3, 0.0) } else { 0.0 };
        let asym = if model.n_params() >= 5 {
            get(4, 0.0).exp()
        } else {
            1.0
        };
        Self {
            model,
            slope: get(0, 1.0),
            ec50: get(1, 0.0).exp(),
            lower,
            upper,
            asym,
        }
    }

    pub(crate) fn to_params(&self) -> Vec<f64> {
        let all = [
            self.slope,
            self.ec50.ln(),
            self.upper,
            self.lower,
            self.asym.ln(),
        ];
        all[..self.model.n_params()].to_vec()
    }

    /// Effect predicted at `dose`
    pub fn predict(&self, dose: f64) -> f64 {
        if dose <= 0.0 {
            return if self.slope > 0.0 {
                self.lower
            } else if self.slope < 0.0 {
                self.upper
            } else {
                self.lower + (self.upper - self.lower) / 2f64.powf(self.asym)
            };
        }
        let z = (-self.slope * (dose.ln() - self.ec50.ln())).exp();
        self.lower + (self.upper - self.lower) / (1.0 + z).powf(self.asym)
    }

    /// Whether the effect decreases with dose
    pub fn is_decreasing(&self) -> bool {
        self.slope * (self.upper - self.lower) < 0.0
    }

    /// Curve of the complemented effect `1 - f(D)`
    pub(crate) fn complemented(&self) -> Self {
        Self {
            lower: 1.0 - self.lower,
            upper: 1.0 - self.upper,
            ..self.clone()
        }
    }

    /// Dose reaching 50% effect, if the curve gets there
    pub fn gi50(&self) -> Option<f64> {
        self.invert(0.5, self.is_decreasing()).ok()
    }

    /// Dose at which the curve reaches `effect`
    ///
    /// The root is searched in log-dose on the branch selected by `decreasing`.
    /// Asking for the wrong branch, or for an effect outside the curve's range,
    /// is an error.
    pub fn invert(&self, effect: f64, decreasing: bool) -> Result<f64, FitError> {
        let root = CurveRoot {
            curve: self,
            target: effect,
            sign: if decreasing { -1.0 } else { 1.0 },
        };

        let center = if self.ec50.is_finite() && self.ec50 > 0.0 {
            self.ec50.ln()
        } else {
            0.0
        };
        let mut lo = center - 1.0;
        let mut hi = center + 1.0;
        let mut width = 1.0;
        let mut bracketed = false;
        for _ in 0..MAX_BRACKET_STEPS {
            let g_lo = root.eval(lo);
            let g_hi = root.eval(hi);
            if g_lo == 0.0 {
                return Ok(lo.exp());
            }
            if g_hi == 0.0 {
                return Ok(hi.exp());
            }
            if g_lo < 0.0 && g_hi > 0.0 {
                bracketed = true;
                break;
            }
            if !(g_lo < 0.0) {
                lo -= width;
            }
            if !(g_hi > 0.0) {
                hi += width;
            }
            width *= 2.0;
        }
        if !bracketed {
            return Err(FitError::Inversion {
                effect,
                reason: format!(
                    "effect not reached on the {} branch",
                    if decreasing { "decreasing" } else { "increasing" }
                ),
            });
        }

        let solver = BrentRoot::new(lo, hi, ROOT_TOLERANCE);
        let res = Executor::new(root, solver)
            .configure(|state| state.max_iters(ROOT_MAX_ITERS))
            .run()?;
        let log_dose = res
            .state
            .best_param
            .or(res.state.param)
            .ok_or_else(|| FitError::Inversion {
                effect,
                reason: "root finder returned no solution".to_string(),
            })?;
        Ok(log_dose.exp())
    }

    /// Write the curve to `path` as JSON, creating parent directories
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), FitError> {
        let path = path.as_ref();
        let persist_err = |reason: String| FitError::Persist {
            path: path.display().to_string(),
            reason,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        let file = File::create(path).map_err(|e| persist_err(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| persist_err(e.to_string()))
    }

    /// Read a curve previously written by [LogisticCurve::persist]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FitError> {
        let path = path.as_ref();
        let load_err = |reason: String| FitError::Persist {
            path: path.display().to_string(),
            reason,
        };
        let file = File::open(path).map_err(|e| load_err(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| load_err(e.to_string()))
    }
}

/// Signed distance to the target effect as a function of log-dose
struct CurveRoot<'a> {
    curve: &'a LogisticCurve,
    target: f64,
    sign: f64,
}

impl CurveRoot<'_> {
    fn eval(&self, log_dose: f64) -> f64 {
        self.sign * (self.curve.predict(log_dose.exp()) - self.target)
    }
}

impl CostFunction for CurveRoot<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, log_dose: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.eval(*log_dose))
    }
}
