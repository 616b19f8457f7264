//! Error taxonomy for the external collaborators.
//!
//! Errors carry a transient/converged classification so callers can decide
//! whether an operation should count as a failure, a no-op, or be left to
//! the next scheduled run / queue redelivery.

use thiserror::Error;

/// Errors from the inventory service.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// API throttling or a transport-level failure. Not retried in-process;
    /// the next scheduled reconciliation picks up where this one left off.
    #[error("inventory request throttled: {message}")]
    Throttled { message: String },

    /// Any other inventory API failure. Terminal for the run, including
    /// failures on a pagination continuation.
    #[error("inventory API error: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Errors from the mirroring control plane.
#[derive(Debug, Error)]
pub enum MirrorControlError {
    /// The session does not exist (delete of an already-removed session).
    #[error("mirror session not found: {session_id}")]
    NotFound { session_id: String },

    /// A session with the same interface and session number already exists.
    #[error("mirror session already exists for interface {interface_id}")]
    Duplicate { interface_id: String },

    /// The interface's instance type does not support mirroring.
    #[error("interface {interface_id} does not support mirroring")]
    UnsupportedInterface { interface_id: String },

    /// API throttling or a transport-level failure.
    #[error("mirror control plane throttled: {message}")]
    Throttled { message: String },

    /// Any other control-plane failure.
    #[error("mirror control plane error: {message}")]
    Api {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MirrorControlError {
    /// True when the operation's intended terminal state already holds:
    /// not-found on delete, duplicate on create. Callers normalize these
    /// to success.
    #[must_use]
    pub fn is_already_converged(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Duplicate { .. })
    }

    /// True for failures the next scheduled run is expected to absorb.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Errors from the durable work queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to send message to queue: {message}")]
    Send { message: String },

    #[error("failed to receive from queue: {message}")]
    Receive { message: String },

    #[error("failed to delete message {receipt}: {message}")]
    Delete { receipt: String, message: String },
}

/// Errors from the secret store.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Secret not found in the store.
    #[error("secret not found: '{secret_id}'")]
    NotFound { secret_id: String },

    /// Store unreachable (network error, auth failure).
    #[error("secret store unavailable: {detail}")]
    Unavailable { detail: String },

    /// Secret value is malformed (wrong format, empty, corrupt).
    #[error("invalid secret value for '{secret_id}': {detail}")]
    InvalidValue { secret_id: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_and_duplicate_are_converged() {
        assert!(MirrorControlError::NotFound {
            session_id: "tms-1".into()
        }
        .is_already_converged());
        assert!(MirrorControlError::Duplicate {
            interface_id: "eni-1".into()
        }
        .is_already_converged());
        assert!(!MirrorControlError::Throttled {
            message: "rate".into()
        }
        .is_already_converged());
    }

    #[test]
    fn throttled_is_transient() {
        assert!(MirrorControlError::Throttled {
            message: "rate".into()
        }
        .is_transient());
        assert!(!MirrorControlError::Api {
            message: "boom".into(),
            source: None,
        }
        .is_transient());
    }
}
