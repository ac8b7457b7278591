//! Per-role replica specs inside run kinds

use k8s_openapi::api::core::v1::{
    Affinity, Container, HostAlias, LocalObjectReference, PodDNSConfig, PodSecurityContext,
    Toleration, Volume,
};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::init::InitSpec;

/// Accept user containers without a `name`; the converter boundary names
/// them (`polyaxon-main`, `polyaxon-init-<i>`).
pub(crate) fn container_opt<'de, D>(deserializer: D) -> Result<Option<Container>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(mut value) => {
            if let Some(map) = value.as_object_mut() {
                map.entry("name")
                    .or_insert_with(|| serde_json::Value::String(String::new()));
            }
            serde_json::from_value(value)
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

/// Pod-level runtime environment for one replica role
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Node selector labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Tolerations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Pod annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Pod labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Service account the pod runs under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Pod restart policy (defaults to `Never`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,

    /// Image pull secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    /// Pod security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    /// DNS config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_config: Option<PodDNSConfig>,

    /// DNS policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_policy: Option<String>,

    /// Host aliases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_aliases: Vec<HostAlias>,
}

/// Per-role container spec inside run kinds.
///
/// Every distributed kind's role (chief/worker/launcher/...) and the single
/// replica of job/service runs share this shape.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSpec {
    /// Number of replicas for this role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Pod-level environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    /// Connection names the main container needs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<String>,

    /// Raw Kubernetes volumes supplied by the user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Init entries resolved into init containers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init: Vec<InitSpec>,

    /// Raw Kubernetes sidecar containers supplied by the user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sidecars: Vec<Container>,

    /// The main Kubernetes container
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "container_opt"
    )]
    pub container: Option<Container>,
}

impl ReplicaSpec {
    /// Number of replicas, defaulting to 1
    pub fn num_replicas(&self) -> i32 {
        self.replicas.unwrap_or(1).max(1)
    }
}
