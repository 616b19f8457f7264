//! Domain types shared by the reconciler and the enrichment worker.
//!
//! Everything here is re-derived from the two authoritative systems
//! (inventory and mirroring control plane) on each run; nothing is
//! persisted by tapsync itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a compute instance as reported by the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Stopping,
    Stopped,
    Terminated,
}

impl InstanceState {
    /// States whose interfaces are candidates for mirroring. Sessions on
    /// interfaces of every other state are torn down, tags notwithstanding.
    #[must_use]
    pub fn is_running_family(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A network interface attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Control-plane identifier of the interface.
    pub interface_id: String,
    /// Hardware (MAC) address. The weak key used to correlate against the
    /// analysis platform's device inventory.
    pub mac_address: String,
    /// Attachment position on the instance (0 = primary).
    pub device_index: u32,
    /// Account that owns the interface.
    pub owner_account: String,
    /// Network (VPC) the interface lives in.
    pub network_id: String,
}

/// A compute instance as returned by the inventory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    /// Full instance type, e.g. `m5.large`.
    pub instance_type: String,
    pub state: InstanceState,
    pub tags: BTreeMap<String, String>,
    pub interfaces: Vec<NetworkInterface>,
}

impl Instance {
    /// The family portion of the instance type (`m5.large` → `m5`).
    #[must_use]
    pub fn instance_family(&self) -> &str {
        self.instance_type
            .split_once('.')
            .map_or(self.instance_type.as_str(), |(family, _)| family)
    }
}

/// An interface that should be mirrored, together with everything needed to
/// create its session and its enrichment item. Derived per reconciliation
/// pass, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredEndpoint {
    pub interface_id: String,
    pub instance_id: String,
    pub instance_type: String,
    pub instance_name: Option<String>,
    pub mac_address: String,
    pub device_index: u32,
    pub owner_account: String,
    pub network_id: String,
    /// Tag set to apply to the created session.
    pub session_tags: BTreeMap<String, String>,
}

/// An active mirror session as reported by the mirroring control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSession {
    pub session_id: String,
    pub interface_id: String,
    pub target_id: String,
    pub filter_id: String,
    pub session_number: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// The minimal set of mutations that converges actual state onto desired
/// state. An interface id appears in at most one of the two sets; an
/// eligible interface that already holds a session appears in neither.
#[derive(Debug, Clone, Default)]
pub struct ConvergencePlan {
    pub create: Vec<MonitoredEndpoint>,
    pub delete: Vec<MirrorSession>,
}

impl ConvergencePlan {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// One queued unit of enrichment work: the cloud metadata for a freshly
/// mirrored interface, keyed by its hardware address.
///
/// The serialized field names are the queue wire format consumed by the
/// analysis-platform update path; a queue message body is a JSON array of
/// these items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentItem {
    #[serde(rename = "macaddr")]
    pub mac_address: String,
    pub cloud_instance_id: String,
    pub cloud_instance_type: String,
    pub cloud_instance_name: String,
    pub cloud_account: String,
    pub vpc_id: String,
    pub description: String,
    #[serde(rename = "networkInterfaceId")]
    pub interface_id: String,
}
