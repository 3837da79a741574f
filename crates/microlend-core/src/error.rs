//! Store error types
//!
//! Read paths (`fetch_*`, `search`) never surface these: they log and leave
//! state unchanged. Mutations (`create`, `update`, `delete`, `sign_in`,
//! `sign_out`) return them so the caller can tell the user the action did
//! not take effect.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors surfaced by store mutations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The remote service rejected the call
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The backend accepted a create but the created document could not be read back
    #[error("Created {kind} '{id}' but could not read it back; its state is unknown")]
    CreationIncomplete {
        kind: &'static str,
        id: String,
        #[source]
        source: Option<RemoteError>,
    },
}

impl StoreError {
    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Remote(err) => err.is_retryable(),
            // Retrying a create would duplicate the document
            StoreError::CreationIncomplete { .. } => false,
        }
    }
}

/// Result type for store mutations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_incomplete_display() {
        let err = StoreError::CreationIncomplete {
            kind: "payments",
            id: "abc".to_string(),
            source: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("payments"));
        assert!(msg.contains("abc"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_remote_error_is_transparent() {
        let err = StoreError::from(RemoteError::Network("connection reset".to_string()));
        assert_eq!(err.to_string(), "Network error: connection reset");
        assert!(err.is_retryable());
    }
}
