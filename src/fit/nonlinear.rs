use argmin::{
    core::{CostFunction, Error, Executor},
    solver::neldermead::NelderMead,
};
use serde::{Deserialize, Serialize};

use crate::data::Measurement;

use super::error::FitError;
use super::model::{LogisticCurve, ModelType};
use super::regression::median_effect_regression;

// Returned instead of NaN/inf so the simplex ordering stays total
const PENALTY: f64 = 1e300;

// Weight of the soft bound holding free curve limits inside [0, 1]
const LIMIT_WEIGHT: f64 = 1e3;

/// Nelder-Mead settings for nonlinear curve fits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Maximum number of iterations (default: 2000)
    pub max_iters: u64,
    /// Standard deviation tolerance of the simplex (default: 1e-10)
    pub sd_tolerance: f64,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            sd_tolerance: 1e-10,
        }
    }
}

struct LeastSquares<'a> {
    model: ModelType,
    points: &'a [Measurement],
}

impl CostFunction for LeastSquares<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, Error> {
        let curve = LogisticCurve::from_params(self.model, params);
        let sse: f64 = self
            .points
            .iter()
            .map(|m| (curve.predict(m.dose) - m.effect).powi(2))
            .sum();
        let cost = sse + LIMIT_WEIGHT * limit_excess(&curve);
        Ok(if cost.is_finite() { cost } else { PENALTY })
    }
}

/// Squared distance of the curve limits from the effect range [0, 1]
fn limit_excess(curve: &LogisticCurve) -> f64 {
    [curve.lower, curve.upper]
        .iter()
        .map(|&limit| (-limit).max(0.0) + (limit - 1.0).max(0.0))
        .map(|excess| excess * excess)
        .sum()
}

/// Least-squares fit of a log-logistic curve
pub fn fit_logistic(
    points: &[Measurement],
    model: ModelType,
    options: &OptimizerOptions,
) -> Result<LogisticCurve, FitError> {
    if model.is_log_linear() {
        return Err(FitError::NonConvergence {
            reason: "log-linear model has no logistic curve".to_string(),
        });
    }
    let positive = points.iter().filter(|m| m.dose > 0.0).count();
    let distinct_doses = {
        let mut doses: Vec<f64> = points.iter().map(|m| m.dose).collect();
        doses.sort_by(|a, b| a.total_cmp(b));
        doses.dedup();
        doses.len()
    };
    if positive < 2 || points.len() < model.n_params() || distinct_doses < 2 {
        return Err(FitError::InsufficientData {
            usable: positive.min(distinct_doses),
            required: model.n_params().max(2),
        });
    }

    let initial = initial_curve(points, model).to_params();
    let simplex = create_initial_simplex(&initial);
    let problem = LeastSquares { model, points };
    let solver: NelderMead<Vec<f64>, f64> =
        NelderMead::new(simplex).with_sd_tolerance(options.sd_tolerance)?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()?;

    let best_cost = res.state.best_cost;
    let best = res.state.best_param.ok_or_else(|| FitError::NonConvergence {
        reason: "optimizer returned no parameters".to_string(),
    })?;
    if !best_cost.is_finite() || best_cost >= PENALTY || best.iter().any(|p| !p.is_finite()) {
        return Err(FitError::NonConvergence {
            reason: format!("non-finite parameters {:?} (SSE = {})", best, best_cost),
        });
    }

    let curve = LogisticCurve::from_params(model, &best);
    tracing::debug!(
        model = %model,
        slope = curve.slope,
        ec50 = curve.ec50,
        sse = best_cost,
        "Fitted logistic curve"
    );
    Ok(curve)
}

/// Starting point from the median-effect line when it is usable
fn initial_curve(points: &[Measurement], model: ModelType) -> LogisticCurve {
    let (min_effect, max_effect) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
            (lo.min(m.effect), hi.max(m.effect))
        });
    let log_doses: Vec<f64> = points
        .iter()
        .filter(|m| m.dose > 0.0)
        .map(|m| m.dose.ln())
        .collect();
    let geometric_mean = (log_doses.iter().sum::<f64>() / log_doses.len() as f64).exp();

    let (slope, ec50) = match median_effect_regression(points) {
        Ok(line) if line.m.is_finite() && line.m != 0.0 && line.dm.is_finite() && line.dm > 0.0 => {
            (line.m, line.dm)
        }
        _ => (1.0, geometric_mean),
    };

    let upper = if max_effect > min_effect {
        max_effect
    } else {
        1.0
    };
    LogisticCurve {
        model,
        slope,
        ec50,
        lower: if model.n_params() >= 4 { min_effect } else { 0.0 },
        upper: if model.n_params() >= 3 { upper } else { 1.0 },
        asym: 1.0,
    }
}

fn create_initial_simplex(initial_point: &[f64]) -> Vec<Vec<f64>> {
    let perturbation_percentage = 0.1;

    let mut vertices = Vec::with_capacity(initial_point.len() + 1);
    vertices.push(initial_point.to_vec());

    for i in 0..initial_point.len() {
        let perturbation = if initial_point[i] == 0.0 {
            0.1
        } else {
            perturbation_percentage * initial_point[i]
        };

        let mut perturbed_point = initial_point.to_owned();
        perturbed_point[i] += perturbation;
        vertices.push(perturbed_point);
    }

    vertices
}
