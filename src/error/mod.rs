use thiserror::Error;

use crate::combination::CombinationError;
use crate::data::InputError;
use crate::fit::FitError;

#[derive(Error, Debug)]
pub enum SynergyError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),
    #[error("Fit error: {0}")]
    Fit(#[from] FitError),
    #[error("Combination error: {0}")]
    Combination(#[from] CombinationError),
    #[error("Scheduler error: {0}")]
    Scheduler(String),
    #[error("Report output error: {0}")]
    Report(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
