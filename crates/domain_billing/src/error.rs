//! Billing domain errors

use core_kernel::{ChargeId, PatientId, Permission};
use thiserror::Error;

/// Errors returned by billing operations
///
/// Validation and authorization failures occur before any state is
/// touched. `Transient` marks failures that are safe to retry.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Permission denied: {0} required")]
    Unauthorized(Permission),

    #[error("Invalid state: {message}")]
    StateConflict { message: String },

    #[error("Charge not found: {0}")]
    ChargeNotFound(ChargeId),

    #[error("No account for patient: {0}")]
    AccountNotFound(PatientId),

    #[error("Transient failure: {message}")]
    Transient { message: String },
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::StateConflict {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed without operator action
    pub fn is_transient(&self) -> bool {
        matches!(self, BillingError::Transient { .. })
    }
}

impl From<core_kernel::MoneyError> for BillingError {
    fn from(err: core_kernel::MoneyError) -> Self {
        BillingError::validation(err.to_string())
    }
}

impl From<config::ConfigError> for BillingError {
    fn from(err: config::ConfigError) -> Self {
        BillingError::validation(format!("Invalid billing configuration: {err}"))
    }
}
