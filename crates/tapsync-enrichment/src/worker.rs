//! Metadata sync worker.
//!
//! Consumes enrichment items from the work queue, resolves device identity
//! by hardware address, and patches cloud metadata onto every matched
//! device. Per message the state machine is
//! received → token-acquired → devices-resolved → metadata-patched →
//! acknowledged(deleted); any failure before acknowledgment leaves the
//! message for queue redelivery, which is the only retry mechanism.

use std::sync::Arc;

use tracing::{error, info, warn};

use tapsync_core::{EnrichmentConfig, EnrichmentItem, QueueMessage, SecretStore, WorkQueue};

use crate::auth::{fetch_token, ApiCredentials};
use crate::client::{AnalysisClient, DeviceMetadata};
use crate::error::EnrichmentError;
use crate::matcher::DeviceMatch;

/// Per-message outcome across all of its items and matched devices.
#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    /// Device ids successfully patched.
    pub updated: Vec<String>,
    /// Device ids whose patch was rejected.
    pub failed: Vec<String>,
    /// MAC addresses with no matching device.
    pub not_found: Vec<String>,
}

impl UpdateOutcome {
    /// A message may only be acknowledged on a clean outcome.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_found.is_empty()
    }
}

/// Counts for one worker invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub messages_processed: usize,
    pub messages_succeeded: usize,
    /// Failed messages stay on the queue for redelivery.
    pub messages_failed: usize,
}

/// Stateless, invocation-scoped worker. Credentials are fetched from the
/// secret store and exchanged for a fresh token on every invocation;
/// nothing is cached across invocations.
pub struct SyncWorker {
    queue: Arc<dyn WorkQueue>,
    secrets: Arc<dyn SecretStore>,
    http: reqwest::Client,
    config: EnrichmentConfig,
}

impl SyncWorker {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        secrets: Arc<dyn SecretStore>,
        http: reqwest::Client,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            queue,
            secrets,
            http,
            config,
        }
    }

    /// Receive one batch from the queue and process it.
    pub async fn run_once(&self) -> Result<BatchSummary, EnrichmentError> {
        let batch = self.queue.receive().await?;
        self.process_batch(&batch).await
    }

    /// Process one delivered batch.
    ///
    /// A failed credential exchange aborts the whole batch with nothing
    /// acknowledged. Past that point each message succeeds or fails
    /// independently: one bad message never blocks its siblings.
    pub async fn process_batch(
        &self,
        batch: &[QueueMessage],
    ) -> Result<BatchSummary, EnrichmentError> {
        let mut summary = BatchSummary::default();
        if batch.is_empty() {
            return Ok(summary);
        }

        let raw = self.secrets.get_secret(&self.config.secret_id).await?;
        let credentials = ApiCredentials::from_secret(&self.config.secret_id, &raw)?;
        let token = fetch_token(&self.http, &credentials).await?;
        let client = AnalysisClient::new(credentials.base_url(), token, self.http.clone());

        info!(messages = batch.len(), "Processing enrichment batch");

        for message in batch {
            summary.messages_processed += 1;
            match self.process_message(&client, message).await {
                Ok(outcome) => {
                    info!(
                        receipt = %message.receipt,
                        updated = outcome.updated.len(),
                        "Enrichment message completed"
                    );
                    if let Err(e) = self.queue.delete(&message.receipt).await {
                        // The work itself succeeded; redelivery will
                        // re-apply idempotent patches.
                        warn!(
                            receipt = %message.receipt,
                            error = %e,
                            "Failed to acknowledge completed message"
                        );
                    }
                    summary.messages_succeeded += 1;
                }
                Err(e) => {
                    error!(
                        receipt = %message.receipt,
                        error = %e,
                        "Enrichment message failed, left for redelivery"
                    );
                    summary.messages_failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Process one message: parse its items, resolve devices with a single
    /// bulk search, patch every match, and insist on a clean outcome.
    async fn process_message(
        &self,
        client: &AnalysisClient,
        message: &QueueMessage,
    ) -> Result<UpdateOutcome, EnrichmentError> {
        let items: Vec<EnrichmentItem> = serde_json::from_str(&message.body)?;
        let macs: Vec<String> = items.iter().map(|i| i.mac_address.clone()).collect();

        let devices = client.search_devices(&macs).await?;
        let matches = DeviceMatch::from_devices(&devices);

        let mut outcome = UpdateOutcome::default();
        for item in &items {
            let Some(device_ids) = matches.lookup(&item.mac_address) else {
                warn!(
                    mac_address = %item.mac_address,
                    interface_id = %item.interface_id,
                    "No device found for hardware address"
                );
                outcome.not_found.push(item.mac_address.clone());
                continue;
            };

            let metadata = DeviceMetadata::from(item);
            for device_id in device_ids {
                match client.patch_device(*device_id, &metadata).await {
                    Ok(()) => outcome.updated.push(device_id.to_string()),
                    Err(e) => {
                        warn!(
                            device_id,
                            mac_address = %item.mac_address,
                            error = %e,
                            "Device metadata patch failed"
                        );
                        outcome.failed.push(device_id.to_string());
                    }
                }
            }
        }

        info!(
            updated = ?outcome.updated,
            failed = ?outcome.failed,
            not_found = ?outcome.not_found,
            "Enrichment update results"
        );

        if outcome.is_clean() {
            Ok(outcome)
        } else {
            Err(EnrichmentError::Incomplete {
                updated: outcome.updated,
                failed: outcome.failed,
                not_found: outcome.not_found,
            })
        }
    }
}
