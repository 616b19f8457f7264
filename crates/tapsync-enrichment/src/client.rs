//! REST client for the analysis platform's device inventory.
//!
//! Two operations: a bulk device search (one round trip per message,
//! regardless of how many addresses it carries) and an idempotent partial
//! metadata PATCH.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::auth::AccessToken;
use crate::error::EnrichmentError;
use tapsync_core::EnrichmentItem;

/// A device record as returned by the platform's search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: u64,
    pub macaddr: String,
    /// Layer-3 observations of the same interface are excluded from
    /// matching; metadata belongs on the layer-2 device.
    pub is_l3: bool,
}

/// The supported subset of patchable metadata fields. Anything else an
/// enrichment item carries is dropped here rather than rejected.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DeviceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_instance_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_instance_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&EnrichmentItem> for DeviceMetadata {
    fn from(item: &EnrichmentItem) -> Self {
        Self {
            cloud_instance_id: Some(item.cloud_instance_id.clone()),
            cloud_instance_type: Some(item.cloud_instance_type.clone()),
            cloud_instance_name: Some(item.cloud_instance_name.clone()),
            cloud_account: Some(item.cloud_account.clone()),
            vpc_id: Some(item.vpc_id.clone()),
            description: Some(item.description.clone()),
        }
    }
}

/// Bearer-authenticated client over the platform REST API.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    base_url: String,
    token: AccessToken,
    http: reqwest::Client,
}

impl AnalysisClient {
    #[must_use]
    pub fn new(base_url: String, token: AccessToken, http: reqwest::Client) -> Self {
        Self {
            base_url,
            token,
            http,
        }
    }

    /// Search devices by hardware address: a single OR-of-equality filter
    /// over every given address. Side-effect free; safe to repeat on
    /// redelivery.
    pub async fn search_devices(&self, macs: &[String]) -> Result<Vec<Device>, EnrichmentError> {
        let rules: Vec<serde_json::Value> = macs
            .iter()
            .map(|mac| json!({ "field": "macaddr", "operand": mac, "operator": "=" }))
            .collect();
        let body = json!({ "filter": { "operator": "or", "rules": rules } });

        debug!(addresses = macs.len(), "Searching devices by MAC");

        let response = self
            .http
            .post(format!("{}/api/v1/devices/search", self.base_url))
            .bearer_auth(&self.token.0)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichmentError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnrichmentError::Search(format!(
                "search returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EnrichmentError::Search(format!("failed to parse device list: {e}")))
    }

    /// Apply a partial metadata update to one device. The platform answers
    /// 204 on success; the patch is a pure overwrite of the supported
    /// fields, so re-applying it is safe.
    pub async fn patch_device(
        &self,
        device_id: u64,
        metadata: &DeviceMetadata,
    ) -> Result<(), EnrichmentError> {
        let response = self
            .http
            .patch(format!("{}/api/v1/devices/{device_id}", self.base_url))
            .bearer_auth(&self.token.0)
            .json(metadata)
            .send()
            .await
            .map_err(|e| EnrichmentError::Patch {
                device_id,
                message: e.to_string(),
            })?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(EnrichmentError::Patch {
                device_id,
                message: format!("patch returned {status}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_serializes_only_supported_fields() {
        let item = EnrichmentItem {
            mac_address: "aa:bb:cc:dd:ee:ff".into(),
            cloud_instance_id: "i-1".into(),
            cloud_instance_type: "m5.large".into(),
            cloud_instance_name: "web-1".into(),
            cloud_account: "123456789012".into(),
            vpc_id: "vpc-1".into(),
            description: "us-east-1".into(),
            interface_id: "eni-1".into(),
        };

        let json = serde_json::to_value(DeviceMetadata::from(&item)).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();

        // The MAC and interface id correlate, they are never patched.
        assert!(!keys.iter().any(|k| k.as_str() == "macaddr"));
        assert!(!keys.iter().any(|k| k.as_str() == "networkInterfaceId"));
        assert_eq!(json["cloud_instance_id"], "i-1");
        assert_eq!(json["description"], "us-east-1");
    }

    #[test]
    fn absent_fields_are_omitted_not_nulled() {
        let metadata = DeviceMetadata {
            cloud_instance_id: Some("i-1".into()),
            ..DeviceMetadata::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
    }
}
