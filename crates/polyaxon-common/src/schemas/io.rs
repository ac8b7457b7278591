//! Typed inputs and outputs of a compiled operation

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One typed input or output parameter of a run.
///
/// Values are fully substituted by the control plane before the agent sees
/// them; the agent only surfaces them in the resolution context and, for
/// io types like `git`/`dockerfile`/`artifacts`, feeds them to init
/// containers.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunIo {
    /// Parameter name
    pub name: String,

    /// Substituted value
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,

    /// IO type: scalar types plus `artifacts`, `dockerfile`, `git`, `image`
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub iotype: Option<String>,

    /// Connection the value refers to, for connection-typed IO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

impl RunIo {
    /// Create a named IO with a JSON value
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
            iotype: None,
            connection: None,
        }
    }
}
