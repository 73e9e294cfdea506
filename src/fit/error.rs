//! Dose-response fitting errors

use thiserror::Error;

/// Errors that can occur while fitting or evaluating a dose-response model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// Too few measurements survive the model's domain restrictions
    #[error("Not enough usable measurements: {usable} (need at least {required})")]
    InsufficientData { usable: usize, required: usize },

    /// The fit produced no finite parameters
    #[error("Fit did not converge: {reason}")]
    NonConvergence { reason: String },

    /// The optimizer itself reported an error
    #[error("Optimizer error: {0}")]
    Optimizer(String),

    /// The fitted curve does not reach the requested effect
    #[error("Cannot invert curve at effect {effect}: {reason}")]
    Inversion { effect: f64, reason: String },

    /// Reading or writing a persisted model failed
    #[error("Model file {path}: {reason}")]
    Persist { path: String, reason: String },

    /// Both the direct and the inverted attempt failed
    #[error("Fit failed after inversion retry: {reason}")]
    Failure { reason: String },
}

impl From<argmin::core::Error> for FitError {
    fn from(e: argmin::core::Error) -> Self {
        FitError::Optimizer(e.to_string())
    }
}
