//! Input validation errors

use thiserror::Error;

/// Errors raised while reading or validating dose-response input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    /// A dose or effect is not a finite number
    #[error("Non-finite measurement: dose = {dose}, effect = {effect}")]
    NonFinite { dose: f64, effect: f64 },

    /// Doses must be non-negative
    #[error("Negative dose: {dose}")]
    NegativeDose { dose: f64 },

    /// Doses and effects have different lengths
    #[error("Treatment {treatment} has {doses} doses but {effects} effects")]
    LengthMismatch {
        treatment: String,
        doses: usize,
        effects: usize,
    },

    /// A dose token could not be parsed
    #[error("Unparsable dose '{token}' for {treatment}")]
    InvalidDose { treatment: String, token: String },

    /// An effect token could not be parsed
    #[error("Unparsable effect '{token}' for {treatment}")]
    InvalidEffect { treatment: String, token: String },

    /// No measurements are recorded under this treatment key
    #[error("Unknown treatment: {treatment}")]
    UnknownTreatment { treatment: String },

    /// Error reading tabular data
    #[error("Table error: {0}")]
    Table(String),
}
