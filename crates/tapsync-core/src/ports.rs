//! Port traits for the four external collaborators.
//!
//! Capability-style async traits, object-safe so components hold
//! `Arc<dyn Trait>` and tests supply in-memory fakes. The real adapters
//! (cloud SDK clients) live in the embedding application.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{InventoryError, MirrorControlError, QueueError, SecretError};
use crate::types::{Instance, InstanceState, MirrorSession};

/// Lifecycle/scope filter for an inventory query.
#[derive(Debug, Clone)]
pub struct InstanceFilter {
    /// Lifecycle states to include.
    pub states: Vec<InstanceState>,
    /// Restrict to one network; `None` means unscoped.
    pub network_id: Option<String>,
}

/// One page of an inventory listing.
#[derive(Debug, Clone)]
pub struct InstancePage {
    pub instances: Vec<Instance>,
    pub next_token: Option<String>,
}

/// Queryable, paginated instance/interface store.
#[async_trait]
pub trait InstanceInventory: Send + Sync {
    /// Fetch one page of instances matching the filter.
    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
        page_token: Option<String>,
    ) -> Result<InstancePage, InventoryError>;
}

/// Drive an inventory listing to completion across all pages.
///
/// A failure on a continuation page is terminal for the listing; partial
/// results are never returned.
pub async fn list_all_instances(
    inventory: &dyn InstanceInventory,
    filter: &InstanceFilter,
) -> Result<Vec<Instance>, InventoryError> {
    let mut all = Vec::new();
    let mut page_token = None;

    loop {
        let page = inventory.describe_instances(filter, page_token).await?;
        all.extend(page.instances);
        match page.next_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(all)
}

/// Scope filter for a mirror-session listing.
#[derive(Debug, Clone)]
pub struct SessionFilter {
    pub target_id: String,
    pub filter_id: String,
}

/// One page of a session listing.
#[derive(Debug, Clone)]
pub struct SessionPage {
    pub sessions: Vec<MirrorSession>,
    pub next_token: Option<String>,
}

/// A request to create one mirror session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub interface_id: String,
    pub target_id: String,
    pub filter_id: String,
    pub session_number: u32,
    pub description: String,
    pub tags: BTreeMap<String, String>,
}

/// Session CRUD surface of the packet-mirroring control plane.
#[async_trait]
pub trait MirrorSessionControl: Send + Sync {
    /// Fetch one page of sessions matching the filter.
    async fn describe_sessions(
        &self,
        filter: &SessionFilter,
        page_token: Option<String>,
    ) -> Result<SessionPage, MirrorControlError>;

    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<MirrorSession, MirrorControlError>;

    /// Delete a session. Returns [`MirrorControlError::NotFound`] when the
    /// session is already gone; callers normalize that to success.
    async fn delete_session(&self, session_id: &str) -> Result<(), MirrorControlError>;
}

/// Drive a session listing to completion across all pages.
pub async fn list_all_sessions(
    control: &dyn MirrorSessionControl,
    filter: &SessionFilter,
) -> Result<Vec<MirrorSession>, MirrorControlError> {
    let mut all = Vec::new();
    let mut page_token = None;

    loop {
        let page = control.describe_sessions(filter, page_token).await?;
        all.extend(page.sessions);
        match page.next_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(all)
}

/// A delivered queue message. The receipt acknowledges exactly this
/// delivery; redelivery issues a fresh receipt.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
}

/// Durable work queue with at-least-once delivery and explicit
/// acknowledgment. Unacknowledged messages are redelivered; redelivery is
/// the only retry mechanism the worker relies on.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), QueueError>;

    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge (delete) a delivered message. Only called after fully
    /// successful processing.
    async fn delete(&self, receipt: &str) -> Result<(), QueueError>;
}

/// Secret retrieval capability.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret's raw string value.
    async fn get_secret(&self, secret_id: &str) -> Result<String, SecretError>;
}
