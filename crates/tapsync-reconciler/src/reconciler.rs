//! Session reconciler: converges the active mirror-session set onto the
//! tag-declared desired state and emits enrichment work for new sessions.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use tapsync_core::{
    list_all_instances, list_all_sessions, ConvergencePlan, CreateSessionRequest, EnrichmentItem,
    InstanceFilter, InstanceInventory, InstanceState, InventoryError, MirrorControlError,
    MirrorSessionControl, MonitoredEndpoint, ReconcilerConfig, SessionFilter, WorkQueue,
};

use crate::plan::{compute_plan, next_session_number, occupied_session_numbers};

/// Run-level failures. Individual create/delete failures never surface
/// here; only a failed enumeration aborts a run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("failed to enumerate mirror sessions: {0}")]
    SessionListing(#[from] MirrorControlError),
}

/// Aggregate counts reported by one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Running-family instances evaluated for eligibility.
    pub instances_processed: usize,
    pub sessions_created: usize,
    pub sessions_deleted: usize,
    /// Endpoint-level create/delete failures left for the next run.
    pub failures: usize,
}

/// Result of one session-creation attempt.
enum CreateOutcome {
    /// Session exists now: freshly created, or a duplicate already in place.
    Converged,
    /// Interface cannot be mirrored; diagnostic logged, not a failure.
    Skipped,
    /// Counted failure, left for the next run.
    Failed,
}

/// Stateless reconciler; all state is re-derived from the inventory and the
/// mirroring control plane at the start of each run.
pub struct SessionReconciler {
    inventory: Arc<dyn InstanceInventory>,
    control: Arc<dyn MirrorSessionControl>,
    queue: Arc<dyn WorkQueue>,
    config: ReconcilerConfig,
}

impl SessionReconciler {
    pub fn new(
        inventory: Arc<dyn InstanceInventory>,
        control: Arc<dyn MirrorSessionControl>,
        queue: Arc<dyn WorkQueue>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            inventory,
            control,
            queue,
            config,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Deletions are applied before creations. A single endpoint's failure
    /// is logged and counted but never aborts the run.
    pub async fn reconcile(&self) -> Result<ReconcileSummary, ReconcileError> {
        let filter = InstanceFilter {
            states: vec![
                InstanceState::Pending,
                InstanceState::Running,
                InstanceState::ShuttingDown,
                InstanceState::Stopping,
                InstanceState::Stopped,
                InstanceState::Terminated,
            ],
            network_id: self.config.network_id.clone(),
        };
        let instances = list_all_instances(self.inventory.as_ref(), &filter).await?;

        let session_filter = SessionFilter {
            target_id: self.config.target_id.clone(),
            filter_id: self.config.filter_id.clone(),
        };
        let sessions = list_all_sessions(self.control.as_ref(), &session_filter).await?;

        info!(
            instances = instances.len(),
            active_sessions = sessions.len(),
            target_id = %self.config.target_id,
            "Starting reconciliation"
        );

        let plan = compute_plan(&self.config, &instances, &sessions);
        let occupied = occupied_session_numbers(&sessions);

        let mut summary = ReconcileSummary {
            instances_processed: instances
                .iter()
                .filter(|i| i.state.is_running_family())
                .count(),
            ..ReconcileSummary::default()
        };

        self.apply_deletions(&plan, &mut summary).await;

        for endpoint in &plan.create {
            let numbers = occupied
                .get(&endpoint.interface_id)
                .cloned()
                .unwrap_or_default();
            match self.create_session(endpoint, &numbers).await {
                CreateOutcome::Converged => {
                    summary.sessions_created += 1;
                    self.enqueue_enrichment(endpoint).await;
                }
                CreateOutcome::Skipped => {}
                CreateOutcome::Failed => summary.failures += 1,
            }
        }

        info!(
            processed = summary.instances_processed,
            created = summary.sessions_created,
            deleted = summary.sessions_deleted,
            failures = summary.failures,
            "Reconciliation complete"
        );

        Ok(summary)
    }

    async fn apply_deletions(&self, plan: &ConvergencePlan, summary: &mut ReconcileSummary) {
        for session in &plan.delete {
            match self.control.delete_session(&session.session_id).await {
                Ok(()) => {
                    info!(
                        session_id = %session.session_id,
                        interface_id = %session.interface_id,
                        "Mirror session deleted"
                    );
                    summary.sessions_deleted += 1;
                }
                Err(e) if e.is_already_converged() => {
                    // Already gone; the terminal state is the same whether
                    // this was the first or a repeated attempt.
                    debug!(
                        session_id = %session.session_id,
                        "Mirror session already absent"
                    );
                    summary.sessions_deleted += 1;
                }
                Err(e) => {
                    error!(
                        session_id = %session.session_id,
                        interface_id = %session.interface_id,
                        error = %e,
                        "Failed to delete mirror session"
                    );
                    summary.failures += 1;
                }
            }
        }
    }

    /// Create one session, classifying the result.
    async fn create_session(
        &self,
        endpoint: &MonitoredEndpoint,
        occupied: &HashSet<u32>,
    ) -> CreateOutcome {
        let session_number = next_session_number(occupied);
        let request = CreateSessionRequest {
            interface_id: endpoint.interface_id.clone(),
            target_id: self.config.target_id.clone(),
            filter_id: self.config.filter_id.clone(),
            session_number,
            description: format!("Auto-created for {}", endpoint.instance_id),
            tags: endpoint.session_tags.clone(),
        };

        match self.control.create_session(&request).await {
            Ok(session) => {
                info!(
                    session_id = %session.session_id,
                    interface_id = %endpoint.interface_id,
                    instance_id = %endpoint.instance_id,
                    device_index = endpoint.device_index,
                    session_number,
                    "Mirror session created"
                );
                CreateOutcome::Converged
            }
            // A duplicate means a prior (possibly partial) run got here
            // first; the terminal state is identical.
            Err(MirrorControlError::Duplicate { .. }) => {
                info!(
                    interface_id = %endpoint.interface_id,
                    session_number,
                    "Mirror session already exists"
                );
                CreateOutcome::Converged
            }
            Err(MirrorControlError::UnsupportedInterface { .. }) => {
                info!(
                    interface_id = %endpoint.interface_id,
                    instance_type = %endpoint.instance_type,
                    "Interface does not support mirroring, skipped"
                );
                CreateOutcome::Skipped
            }
            Err(e) => {
                error!(
                    interface_id = %endpoint.interface_id,
                    instance_id = %endpoint.instance_id,
                    error = %e,
                    "Failed to create mirror session"
                );
                CreateOutcome::Failed
            }
        }
    }

    /// Publish one enrichment item for a just-created session.
    ///
    /// A send failure is logged and deliberately not rolled back: the next
    /// run will find the session present and skip re-creation, but nothing
    /// will re-emit this item. Known gap in the enrichment path.
    async fn enqueue_enrichment(&self, endpoint: &MonitoredEndpoint) {
        let item = EnrichmentItem {
            mac_address: endpoint.mac_address.clone(),
            cloud_instance_id: endpoint.instance_id.clone(),
            cloud_instance_type: endpoint.instance_type.clone(),
            cloud_instance_name: endpoint.instance_name.clone().unwrap_or_default(),
            cloud_account: endpoint.owner_account.clone(),
            vpc_id: endpoint.network_id.clone(),
            description: self.config.region.clone(),
            interface_id: endpoint.interface_id.clone(),
        };

        let body = match serde_json::to_string(&[&item]) {
            Ok(body) => body,
            Err(e) => {
                error!(
                    interface_id = %endpoint.interface_id,
                    error = %e,
                    "Failed to serialize enrichment item"
                );
                return;
            }
        };

        if let Err(e) = self.queue.send(&body).await {
            warn!(
                interface_id = %endpoint.interface_id,
                mac_address = %endpoint.mac_address,
                error = %e,
                "Failed to enqueue enrichment item; session left in place"
            );
        }
    }
}
