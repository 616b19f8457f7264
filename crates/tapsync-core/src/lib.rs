//! tapsync core library
//!
//! Shared domain types, configuration, error taxonomy, and the port traits
//! behind which the inventory service, mirroring control plane, work queue,
//! and secret store sit.

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::{EnrichmentConfig, ReconcilerConfig};
pub use error::{InventoryError, MirrorControlError, QueueError, SecretError};
pub use ports::{
    list_all_instances, list_all_sessions, CreateSessionRequest, InstanceFilter, InstanceInventory,
    InstancePage, MirrorSessionControl, QueueMessage, SecretStore, SessionFilter, SessionPage,
    WorkQueue,
};
pub use types::{
    ConvergencePlan, EnrichmentItem, Instance, InstanceState, MirrorSession, MonitoredEndpoint,
    NetworkInterface,
};
