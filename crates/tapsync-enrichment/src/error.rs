//! Enrichment-side error types.

use tapsync_core::{QueueError, SecretError};
use thiserror::Error;

/// Errors raised while processing enrichment work.
///
/// Everything except [`EnrichmentError::Incomplete`] is a hard failure of
/// an external collaborator; `Incomplete` means the platform answered but
/// some devices were missing or rejected the patch, which still fails the
/// message so queue redelivery retries it.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Credential exchange with the analysis platform failed. Fatal for
    /// the whole batch; without a token no partial progress is possible.
    #[error("credential exchange failed: {0}")]
    Auth(String),

    #[error("device search failed: {0}")]
    Search(String),

    #[error("metadata patch failed for device {device_id}: {message}")]
    Patch { device_id: u64, message: String },

    /// Message body is not a valid enrichment item array.
    #[error("malformed enrichment message: {0}")]
    InvalidMessage(#[from] serde_json::Error),

    /// The message was processed but not every device converged. Carries
    /// the full per-device outcome for audit.
    #[error(
        "enrichment incomplete: {} updated, {} failed, {} not found",
        .updated.len(),
        .failed.len(),
        .not_found.len()
    )]
    Incomplete {
        /// Device ids successfully patched (idempotent; safe to re-apply
        /// on redelivery).
        updated: Vec<String>,
        /// Device ids whose patch was rejected.
        failed: Vec<String>,
        /// MAC addresses with no matching device.
        not_found: Vec<String>,
    },
}
