//! Error types for the control layer.
//!
//! This module defines all errors that can occur while orchestrating groups
//! across fronts and answering statistics queries.

use nodemgr_core::{CoreError, FrontAddr, FrontId, GroupId};
use nodemgr_store::StoreError;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The request failed validation; no remote call was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A call to a front failed (network, timeout, non-2xx or non-zero code).
    #[error("call to front {front} failed: {cause}")]
    RemoteCallFailed {
        /// The front that was called.
        front: FrontAddr,
        /// What went wrong.
        cause: String,
    },

    /// The requested group was not found.
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    /// The requested front was not found.
    #[error("front not found: {0}")]
    FrontNotFound(FrontId),

    /// No front is registered at the given address.
    #[error("no front registered at {0}")]
    UnknownFront(FrontAddr),

    /// A front is already registered at the given address.
    #[error("front already registered at {0}")]
    DuplicateFront(FrontAddr),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::GroupNotFound(_) | Self::FrontNotFound(_) | Self::UnknownFront(_) => 404,
            Self::DuplicateFront(_) => 409,
            Self::RemoteCallFailed { .. } => 502,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RemoteCallFailed { .. } | Self::Store(_) | Self::Internal(_)
        )
    }
}

impl From<CoreError> for ControlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::FrontNotFound(id) => Self::FrontNotFound(id),
            CoreError::UnknownFrontAddr(addr) => Self::UnknownFront(addr),
            CoreError::InvalidId(e) => Self::InvalidRequest(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodemgr_core::IdError;

    fn addr() -> FrontAddr {
        FrontAddr::new("10.0.0.1", 8081).unwrap()
    }

    #[test]
    fn error_status_codes() {
        let group_id = GroupId::new(7).unwrap();

        assert_eq!(
            ControlError::InvalidRequest("empty node list".into()).http_status_code(),
            400
        );
        assert_eq!(ControlError::GroupNotFound(group_id).http_status_code(), 404);
        assert_eq!(ControlError::UnknownFront(addr()).http_status_code(), 404);
        assert_eq!(ControlError::DuplicateFront(addr()).http_status_code(), 409);
        assert_eq!(
            ControlError::RemoteCallFailed {
                front: addr(),
                cause: "timeout".into()
            }
            .http_status_code(),
            502
        );
        assert_eq!(
            ControlError::Store(StoreError::NotFound).http_status_code(),
            500
        );
    }

    #[test]
    fn retriable_errors() {
        assert!(ControlError::RemoteCallFailed {
            front: addr(),
            cause: "connection refused".into()
        }
        .is_retriable());
        assert!(ControlError::Internal("x".into()).is_retriable());
        assert!(!ControlError::InvalidRequest("x".into()).is_retriable());
        assert!(!ControlError::DuplicateFront(addr()).is_retriable());
    }

    #[test]
    fn core_errors_convert() {
        let err: ControlError = CoreError::InvalidId(IdError::Zero).into();
        assert!(matches!(err, ControlError::InvalidRequest(_)));

        let err: ControlError = CoreError::UnknownFrontAddr(addr()).into();
        assert!(matches!(err, ControlError::UnknownFront(_)));
    }
}
