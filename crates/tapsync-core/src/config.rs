//! Configuration value objects.
//!
//! Both components receive an explicit config at construction; core logic
//! never reads the environment. Loading these from the process environment
//! is the embedding application's concern.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

/// Instance-type families the mirroring control plane supports.
const SUPPORTED_FAMILIES: &[&str] = &[
    "a1", "m4", "m5", "m5a", "m5ad", "m5d", "m6g", "m6gd", "t3", "t3a", "t4g", "c4", "c5", "c5a",
    "c5ad", "c5d", "c5n", "c6g", "c6gd", "d2", "h1", "i3", "i3en", "g3", "g3s", "g5g", "p2", "p3",
    "p3dn", "r4", "r5", "r5a", "r5ad", "r5b", "r5d", "r6g", "r6gd", "x1", "x1e", "x2gd", "z1d",
];

fn default_mirror_tag_key() -> String {
    "TrafficMirror".to_string()
}

fn default_mirror_tag_values() -> Vec<String> {
    vec!["enabled".to_string(), "true".to_string()]
}

fn default_reserved_tag_prefix() -> String {
    "aws:".to_string()
}

fn default_supported_families() -> HashSet<String> {
    SUPPORTED_FAMILIES.iter().map(ToString::to_string).collect()
}

/// Configuration for the session reconciler.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    /// Tag key that opts an instance into mirroring.
    #[serde(default = "default_mirror_tag_key")]
    pub mirror_tag_key: String,

    /// Tag values (any of) that count as opted-in.
    #[serde(default = "default_mirror_tag_values")]
    pub mirror_tag_values: Vec<String>,

    /// Mirror target all sessions point at.
    pub target_id: String,

    /// Mirror filter all sessions use.
    pub filter_id: String,

    /// Restrict reconciliation to one network. `None` means every network
    /// visible to the inventory credentials.
    #[serde(default)]
    pub network_id: Option<String>,

    /// Instance-type families eligible for mirroring.
    #[serde(default = "default_supported_families")]
    pub supported_families: HashSet<String>,

    /// Provider-reserved tag prefix stripped when deriving session tags.
    #[serde(default = "default_reserved_tag_prefix")]
    pub reserved_tag_prefix: String,

    /// Fixed organizational tags stamped onto every created session.
    #[serde(default)]
    pub org_tags: BTreeMap<String, String>,

    /// Region label, carried on enrichment items as the description field.
    pub region: String,
}

impl ReconcilerConfig {
    /// Config with the defaults filled in; target, filter and region are
    /// the only inputs without a sensible default.
    #[must_use]
    pub fn new(target_id: impl Into<String>, filter_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            mirror_tag_key: default_mirror_tag_key(),
            mirror_tag_values: default_mirror_tag_values(),
            target_id: target_id.into(),
            filter_id: filter_id.into(),
            network_id: None,
            supported_families: default_supported_families(),
            reserved_tag_prefix: default_reserved_tag_prefix(),
            org_tags: BTreeMap::new(),
            region: region.into(),
        }
    }

    /// Whether an instance-type family is eligible for mirroring.
    #[must_use]
    pub fn family_supported(&self, family: &str) -> bool {
        self.supported_families.contains(family)
    }

    /// Whether a tag value opts the instance in.
    #[must_use]
    pub fn tag_value_enabled(&self, value: &str) -> bool {
        self.mirror_tag_values.iter().any(|v| v == value)
    }
}

/// Configuration for the metadata sync worker.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Identifier of the secret holding the analysis-platform credentials.
    pub secret_id: String,
}
