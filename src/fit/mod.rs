//! Single-drug dose-response fitting
//!
//! Fits the median-effect equation to the measurements of one drug, either
//! directly by linear regression ([ModelType::LogLinear]) or by linearising a
//! fitted log-logistic curve around a median point (`LL.2` .. `LL.5`).
//!
//! | Model | Free parameters |
//! |-------|-----------------|
//! | `least_squares` | m, Dm (regression) |
//! | `LL.2` | slope, ec50 |
//! | `LL.3` | slope, ec50, upper |
//! | `LL.4` | slope, ec50, upper, lower |
//! | `LL.5` | slope, ec50, upper, lower, asymmetry |
//!
//! # Usage
//!
//! ```rust
//! use cisyn::data::MeasurementSet;
//! use cisyn::fit::{fit_drug, FitOptions};
//!
//! let set = MeasurementSet::from_pairs(&[(1.0, 0.1), (10.0, 0.5), (100.0, 0.9)]).unwrap();
//! let report = fit_drug(&set, &FitOptions::default().without_bootstrap());
//! let fit = report.fit().expect("fit failed");
//! assert!((fit.dm - 10.0).abs() < 1e-6);
//! ```

pub mod bootstrap;
mod error;
mod fitter;
mod model;
mod nonlinear;
pub mod regression;
pub mod retry;

pub use bootstrap::{bootstrap_samples, BootstrapOptions, ResamplingScheme};
pub use error::FitError;
pub use fitter::{fit_drug, DoseResponseFit, DoseResponseFitter, Estimate, FitOptions};
pub use model::{LogisticCurve, ModelType};
pub use nonlinear::{fit_logistic, OptimizerOptions};
pub use retry::{FitReport, FitRetryController, FitState, PartialFit};
