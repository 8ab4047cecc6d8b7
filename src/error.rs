//! Error taxonomy for the scheduling engine.
//!
//! Client-side checks produce `ValidationError`, the backend collaborator
//! produces `BackendError`, malformed records produce `DataError`. Everything
//! reaching the user is folded into `PortalError`.

use thiserror::Error;

/// A proposed action rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("You cannot select past dates or times")]
    PastWindow,

    #[error("The selected slot is in the past")]
    PastSlot,

    #[error("Start time must be before end time")]
    InvalidRange,

    #[error("This slot overlaps with an existing availability ({existing_id})")]
    Overlap { existing_id: String },

    #[error("This appointment has been canceled and cannot be modified")]
    AlreadyCanceled,

    #[error("The appointment has already started and can no longer be canceled")]
    TooLate,

    #[error("This action is not permitted for the current user")]
    NotOwner,

    #[error("The selected slot is no longer offered")]
    UnitUnavailable,
}

/// A record from the collaborator that could not be turned into a model value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record {}: {reason}", .record_id.as_deref().unwrap_or("<unknown>"))]
pub struct DataError {
    pub record_id: Option<String>,
    pub reason: String,
}

impl DataError {
    pub fn new(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DataError {
            record_id: Some(record_id.into()),
            reason: reason.into(),
        }
    }

    pub fn payload(reason: impl Into<String>) -> Self {
        DataError {
            record_id: None,
            reason: reason.into(),
        }
    }
}

/// Failures reported by the backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("slot duration must be positive, got {0} minutes")]
    NonPositiveSlot(i64),

    #[error("slot duration of {0} minutes is out of range")]
    SlotOutOfRange(i64),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The slot was taken in the meantime: {0}")]
    Conflict(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<BackendError> for PortalError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(msg) | BackendError::NotFound(msg) => PortalError::Conflict(msg),
            BackendError::Transport(msg) => PortalError::Transport(msg),
        }
    }
}

impl PortalError {
    /// Whether the caller's snapshot is stale and must be refetched.
    pub fn requires_refresh(&self) -> bool {
        matches!(self, PortalError::Conflict(_))
    }

    /// Message shown to the user.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_conflicts_require_refresh() {
        let err: PortalError = BackendError::Conflict("slot taken".into()).into();
        assert!(err.requires_refresh());

        let err: PortalError = BackendError::NotFound("window 7".into()).into();
        assert!(err.requires_refresh());

        let err: PortalError = BackendError::Transport("timeout".into()).into();
        assert!(!err.requires_refresh());
        assert_eq!(err.message(), "Request failed: timeout");
    }

    #[test]
    fn data_error_without_id_is_labelled_unknown() {
        let err = DataError::payload("expected value");
        assert_eq!(err.to_string(), "malformed record <unknown>: expected value");
    }
}
