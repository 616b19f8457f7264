//! Metadata enrichment pipeline.
//!
//! Consumes the work items the reconciler queues for newly mirrored
//! interfaces, correlates them with analysis-platform devices by hardware
//! address, and patches cloud metadata onto every match. At-least-once:
//! queue redelivery retries failed messages, and every platform operation
//! here (bulk search, partial PATCH) is safe to repeat.

pub mod auth;
pub mod client;
pub mod error;
pub mod matcher;
pub mod worker;

pub use auth::{fetch_token, AccessToken, ApiCredentials};
pub use client::{AnalysisClient, Device, DeviceMetadata};
pub use error::EnrichmentError;
pub use matcher::DeviceMatch;
pub use worker::{BatchSummary, SyncWorker, UpdateOutcome};
