use thiserror::Error;

use crate::scoring::ScoringError;
use crate::validation::CoercionError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] CoercionError),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] ScoringError),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Analysis session is closed")]
    SessionClosed,
}

impl AppError {
    /// Mistakes the operator can fix by editing their input.
    pub fn is_operator_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_)
                | AppError::UnknownField(_)
                | AppError::UnknownPreset(_)
                | AppError::UnknownCommand(_)
        )
    }
}
