//! Combination-index errors

use thiserror::Error;

use crate::fit::FitError;

/// Errors raised while combining two dose-response fits
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CombinationError {
    /// Direct CI needs the fitted curve of both drugs
    #[error("No fitted curve for the {role} drug ({model})")]
    MissingCurve { role: String, model: String },

    /// A fitted curve could not be inverted at the target effect
    #[error(transparent)]
    Inversion(#[from] FitError),
}
