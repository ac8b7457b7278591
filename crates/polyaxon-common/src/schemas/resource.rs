//! Mountable secrets and config-maps

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A mountable secret or config-map exposed to operation containers.
///
/// When `mount_path` is set the resource is mounted as a volume; otherwise
/// it is consumed as env-from. `items` restricts which keys are exposed.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResource {
    /// Name of the Kubernetes secret or config-map
    pub name: String,

    /// Keys exposed from the resource (all keys when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,

    /// Mount path; presence switches consumption from env-from to a volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,

    /// Host path backing the resource, when it lives on the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,

    /// Whether the operation explicitly requested this resource
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_requested: bool,
}

impl ConnectionResource {
    /// Create a named resource
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when the resource is consumed as a volume rather than env-from
    pub fn is_mounted(&self) -> bool {
        self.mount_path.is_some()
    }
}
