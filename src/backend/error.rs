// src/backend/error.rs
use crate::remote::{SchemaError, StoreError, StoreErrorKind};
use candid::CandidType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a failed remote call, which picks the user-facing notice.
#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteAction {
    Load,
    Save,
}

#[derive(CandidType, Deserialize, Serialize, Error, Clone, Debug, PartialEq, Eq)]
pub enum LegacyError {
    #[error("Sign in required")]
    Unauthenticated,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Memory not found: {0}")]
    MemoryNotFound(String),

    #[error("Invitation not found: {0}")]
    InvitationNotFound(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invitation cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{operation} failed: {error}")]
    OperationFailed {
        operation: String,
        action: RemoteAction,
        error: StoreError,
    },

    #[error("Malformed record: {0}")]
    SchemaViolation(String),
}

/// Short title and detail shown to the user.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub detail: String,
}

impl LegacyError {
    pub fn load_failed(operation: &str, error: StoreError) -> Self {
        Self::remote(operation, RemoteAction::Load, error)
    }

    pub fn save_failed(operation: &str, error: StoreError) -> Self {
        Self::remote(operation, RemoteAction::Save, error)
    }

    fn remote(operation: &str, action: RemoteAction, error: StoreError) -> Self {
        if error.is_permission_denied() {
            return LegacyError::PermissionDenied(format!("{}: {}", operation, error.message));
        }
        LegacyError::OperationFailed {
            operation: operation.to_string(),
            action,
            error,
        }
    }

    /// Kind of the underlying store failure, if any.
    pub fn store_kind(&self) -> Option<StoreErrorKind> {
        match self {
            LegacyError::OperationFailed { error, .. } => Some(error.kind),
            _ => None,
        }
    }

    pub fn notice(&self) -> Notice {
        let (title, detail) = match self {
            LegacyError::Unauthenticated => ("Authentication Error", "Please sign in to continue.".to_string()),
            LegacyError::NotAuthorized(reason) => ("Not Allowed", reason.clone()),
            LegacyError::PermissionDenied(_) => (
                "Permission Denied",
                "You don't have permission to do that.".to_string(),
            ),
            LegacyError::MemoryNotFound(_) => ("Not Found", "That memory could not be found.".to_string()),
            LegacyError::InvitationNotFound(_) => (
                "Invitation Not Found",
                "No pending invitation was found for your email.".to_string(),
            ),
            LegacyError::MemberNotFound(_) => ("Not Found", "That member could not be found.".to_string()),
            LegacyError::InvalidInput(reason) => ("Invalid Input", reason.clone()),
            LegacyError::InvalidTransition { from, .. } => (
                "Invitation Unavailable",
                format!("This invitation was already {}.", from),
            ),
            LegacyError::OperationFailed {
                action: RemoteAction::Load,
                ..
            } => ("Failed to Load", "Please check your connection and try again.".to_string()),
            LegacyError::OperationFailed {
                action: RemoteAction::Save,
                ..
            } => ("Failed to Save", "Please check your connection and try again.".to_string()),
            LegacyError::SchemaViolation(_) => ("Failed to Load", "A record could not be read.".to_string()),
        };
        Notice {
            title: title.to_string(),
            detail,
        }
    }
}

impl From<SchemaError> for LegacyError {
    fn from(e: SchemaError) -> Self {
        LegacyError::SchemaViolation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_failures_surface_as_permission_denied() {
        let err = LegacyError::save_failed(
            "update_memory",
            StoreError::permission_denied("Missing or insufficient permissions."),
        );
        assert!(matches!(err, LegacyError::PermissionDenied(_)));
        assert_eq!(err.notice().title, "Permission Denied");
    }

    #[test]
    fn remote_failures_keep_their_kind_and_pick_a_notice() {
        let err = LegacyError::load_failed("list_memories", StoreError::unavailable("offline"));
        assert_eq!(err.store_kind(), Some(StoreErrorKind::Unavailable));
        assert_eq!(err.notice().title, "Failed to Load");

        let err = LegacyError::save_failed("add_comment", StoreError::internal("boom"));
        assert_eq!(err.notice().title, "Failed to Save");
    }
}
