//! The fully-substituted operation manifest the control plane hands out

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::io::RunIo;
use super::plugins::{Plugins, Termination};
use super::run::Runtime;

/// Notification hook fired on a trigger condition
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Connection used to deliver the notification
    pub connections: Vec<String>,

    /// Status condition that fires the notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// A compiled operation.
///
/// All parameter substitution, defaults merging, and validation already
/// happened on the control plane; the agent treats this as ground truth
/// and only resolves it against its own connection catalog.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledOperation {
    /// Target namespace override; empty means the agent default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Feature toggles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Plugins>,

    /// Termination policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,

    /// The run kind union
    pub run: Runtime,

    /// Typed inputs with substituted values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<RunIo>,

    /// Typed outputs with substituted values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<RunIo>,

    /// Status-triggered notifications
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,

    /// Hook definitions passed through to the CRD verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<serde_json::Value>,
}

impl CompiledOperation {
    /// Plugins with unset fields treated as all-default
    pub fn plugins(&self) -> Plugins {
        self.plugins.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::run::RunKind;

    #[test]
    fn deserializes_a_minimal_manifest() {
        let op: CompiledOperation = serde_json::from_value(serde_json::json!({
            "run": {"kind": "job", "container": {"image": "alpine", "command": ["echo"]}}
        }))
        .unwrap();
        assert_eq!(op.run.kind(), RunKind::Job);
        assert!(op.namespace.is_none());
        assert!(!op.plugins().collect_logs());
    }

    #[test]
    fn inputs_keep_substituted_values() {
        let op: CompiledOperation = serde_json::from_value(serde_json::json!({
            "run": {"kind": "job"},
            "inputs": [
                {"name": "lr", "value": 0.01, "type": "float"},
                {"name": "data", "value": "path/x", "type": "artifacts", "connection": "store"}
            ]
        }))
        .unwrap();
        assert_eq!(op.inputs.len(), 2);
        assert_eq!(op.inputs[1].connection.as_deref(), Some("store"));
    }
}
