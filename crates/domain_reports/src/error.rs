//! Reporting errors

use core_kernel::Permission;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Permission denied: {0} required")]
    Unauthorized(Permission),

    #[error("Invalid state: {message}")]
    StateConflict { message: String },
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::StateConflict {
            message: message.into(),
        }
    }
}

impl From<core_kernel::temporal::TemporalError> for ReportError {
    fn from(err: core_kernel::temporal::TemporalError) -> Self {
        ReportError::validation(err.to_string())
    }
}
