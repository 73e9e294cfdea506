//! Bootstrap resampling of dose-response fits
//!
//! Each sample perturbs or resamples the measurements, refits the same model
//! and keeps the resulting `(m, dm)`. Samples that fail to fit are dropped.
//! Sample `i` draws from its own RNG seeded with `seed + i`, so the result does
//! not depend on how rayon schedules the work.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{Measurement, MeasurementSet};

use super::fitter::{DoseResponseFitter, Estimate};
use super::regression::{expit, in_domain, logit};

/// How measurements are resampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResamplingScheme {
    /// Draw measurements with replacement
    #[default]
    Cases,
    /// Add resampled residuals to the fitted predictions
    Residuals,
    /// Add normal noise with the residual standard deviation to the fitted predictions
    Predictive,
}

/// Bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapOptions {
    /// Number of resamples (default: 100, 0 disables resampling)
    pub samples: usize,
    /// Resampling scheme (default: Cases)
    pub scheme: ResamplingScheme,
    /// Seed for reproducible samples (None = random)
    pub seed: Option<u64>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            samples: 100,
            scheme: ResamplingScheme::Cases,
            seed: None,
        }
    }
}

impl BootstrapOptions {
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_scheme(mut self, scheme: ResamplingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Generate bootstrap `(m, dm)` samples for the data a fit was computed on
///
/// `base` is the accepted estimate for `set`; the residual based schemes build
/// their resamples around its predictions.
pub fn bootstrap_samples(
    fitter: &DoseResponseFitter,
    set: &MeasurementSet,
    median_point: f64,
    base: &Estimate,
    options: &BootstrapOptions,
) -> Vec<(f64, f64)> {
    if options.samples == 0 || set.is_empty() {
        return Vec::new();
    }

    let Some(residuals) = Residuals::new(set, base, options.scheme) else {
        tracing::debug!("No residuals available for bootstrap, skipping");
        return Vec::new();
    };
    let seed = options.seed.unwrap_or_else(|| rand::rng().random());

    let samples: Vec<(f64, f64)> = (0..options.samples)
        .into_par_iter()
        .filter_map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let resampled = residuals.resample(set, &mut rng)?;
            match fitter
                .estimate(&resampled, median_point)
                .and_then(Estimate::validate)
            {
                Ok(est) => Some((est.m, est.dm)),
                Err(e) => {
                    tracing::debug!(sample = i, error = %e, "Dropping bootstrap sample");
                    None
                }
            }
        })
        .collect();

    tracing::debug!(
        requested = options.samples,
        kept = samples.len(),
        scheme = ?options.scheme,
        "Bootstrap finished"
    );
    samples
}

/// Residual structure of the base fit
///
/// Log-linear fits work in logit space, nonlinear fits in effect space.
struct Residuals<'a> {
    base: &'a Estimate,
    scheme: ResamplingScheme,
    values: Vec<f64>,
    noise: Option<Normal<f64>>,
}

impl<'a> Residuals<'a> {
    fn new(set: &MeasurementSet, base: &'a Estimate, scheme: ResamplingScheme) -> Option<Self> {
        if scheme == ResamplingScheme::Cases {
            return Some(Self {
                base,
                scheme,
                values: Vec::new(),
                noise: None,
            });
        }

        let logit_space = base.curve.is_none();
        let values: Vec<f64> = set
            .iter()
            .filter(|m| !logit_space || in_domain(m))
            .map(|m| {
                if logit_space {
                    logit(m.effect) - logit(base.predict(m.dose))
                } else {
                    m.effect - base.predict(m.dose)
                }
            })
            .filter(|r| r.is_finite())
            .collect();
        if values.is_empty() {
            return None;
        }

        let noise = if scheme == ResamplingScheme::Predictive {
            let n_params = base
                .curve
                .as_ref()
                .map(|c| c.model.n_params())
                .unwrap_or(2);
            let dof = values.len().saturating_sub(n_params).max(1) as f64;
            let sigma = (values.iter().map(|r| r * r).sum::<f64>() / dof).sqrt();
            Some(Normal::new(0.0, sigma).ok()?)
        } else {
            None
        };

        Some(Self {
            base,
            scheme,
            values,
            noise,
        })
    }

    fn resample(&self, set: &MeasurementSet, rng: &mut StdRng) -> Option<MeasurementSet> {
        let points = set.as_slice();
        let resampled: Vec<Measurement> = match self.scheme {
            ResamplingScheme::Cases => (0..points.len())
                .map(|_| points[rng.random_range(0..points.len())])
                .collect(),
            ResamplingScheme::Residuals | ResamplingScheme::Predictive => {
                let logit_space = self.base.curve.is_none();
                points
                    .iter()
                    .filter(|m| !logit_space || in_domain(m))
                    .map(|m| {
                        let noise = match &self.noise {
                            Some(normal) => normal.sample(rng),
                            None => self.values[rng.random_range(0..self.values.len())],
                        };
                        let fitted = self.base.predict(m.dose);
                        let effect = if logit_space {
                            expit(logit(fitted) + noise)
                        } else {
                            fitted + noise
                        };
                        Measurement {
                            dose: m.dose,
                            effect,
                        }
                    })
                    .collect()
            }
        };
        if resampled.is_empty() {
            return None;
        }
        // Keep duplicates drawn by case resampling
        Some(MeasurementSet::with_duplicates(resampled))
    }
}
