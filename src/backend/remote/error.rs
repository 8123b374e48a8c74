// src/backend/remote/error.rs
use candid::CandidType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured failure kinds reported by the document store.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq, Copy)]
pub enum StoreErrorKind {
    Unavailable,
    DeadlineExceeded,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    InvalidArgument,
    Internal,
    Unknown,
}

#[derive(CandidType, Deserialize, Serialize, Error, Clone, Debug, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Unavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::PermissionDenied, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::FailedPrecondition, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Internal, message)
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// The structured kind decides first. Stores that only report a generic
    /// failure are classified by their message as a last resort.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Unavailable | StoreErrorKind::DeadlineExceeded
        ) || self.message.contains("offline")
            || self.message.contains("network")
    }

    /// Whether the store rejected an ordered query because its composite
    /// index is missing or still building.
    ///
    /// Stores report this only through the message text, so this matches on
    /// `index` / `building` exactly like the vault app always has.
    pub fn is_index_unavailable(&self) -> bool {
        self.message.contains("index") || self.message.contains("building")
    }

    pub fn is_permission_denied(&self) -> bool {
        self.kind == StoreErrorKind::PermissionDenied
            || self.message.contains("Missing or insufficient permissions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_by_kind() {
        assert!(StoreError::unavailable("backend down").is_transient());
        assert!(StoreError::new(StoreErrorKind::DeadlineExceeded, "slow").is_transient());
        assert!(!StoreError::permission_denied("nope").is_transient());
        assert!(!StoreError::not_found("gone").is_transient());
    }

    #[test]
    fn transient_by_message_as_last_resort() {
        assert!(StoreError::new(StoreErrorKind::Unknown, "client is offline").is_transient());
        assert!(StoreError::new(StoreErrorKind::Internal, "network request failed").is_transient());
        assert!(!StoreError::new(StoreErrorKind::Unknown, "bad things").is_transient());
    }

    #[test]
    fn index_unavailable_matches_message() {
        assert!(StoreError::failed_precondition("The query requires an index").is_index_unavailable());
        assert!(StoreError::failed_precondition("That index is currently building").is_index_unavailable());
        assert!(!StoreError::failed_precondition("document is no longer pending").is_index_unavailable());
    }
}
