//! Agent configuration fetched from the control plane at registration

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::connection::Connection;
use super::plugins::{InitSettings, SidecarSettings};
use crate::error::Error;

/// Agent-wide settings and the connection catalog.
///
/// Fetched once at registration and refreshed through compatible updates;
/// every resolution of a compiled operation runs against this config.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Default namespace operations land in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Namespaces operations may opt into besides the default
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_namespaces: Vec<String>,

    /// The artifacts store connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_store: Option<Connection>,

    /// All other connections the agent exposes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,

    /// Sidecar container defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<SidecarSettings>,

    /// Init container defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSettings>,

    /// Cleaner auxiliary container defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaner: Option<InitSettings>,

    /// Notifier auxiliary container defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifier: Option<InitSettings>,

    /// Service account operation pods run under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_sa: Option<String>,

    /// Secret holding the platform app credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret_name: Option<String>,

    /// Secret holding the agent token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_secret_name: Option<String>,

    /// Forward the agent's proxy env vars into operation pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_proxy_env_vars_use_in_ops: Option<bool>,
}

impl AgentConfig {
    /// All connections including the artifacts store, store first
    pub fn all_connections(&self) -> Vec<&Connection> {
        self.artifacts_store
            .iter()
            .chain(self.connections.iter())
            .collect()
    }

    /// Look up a connection by name across the whole catalog
    pub fn connection_by_name(&self, name: &str) -> Option<&Connection> {
        self.all_connections()
            .into_iter()
            .find(|c| c.name == name)
    }

    /// Namespace an operation may target; rejects unknown namespaces
    pub fn resolve_namespace(&self, requested: Option<&str>) -> Result<String, Error> {
        let default = self.namespace.as_deref().unwrap_or("polyaxon");
        match requested {
            None => Ok(default.to_string()),
            Some(ns) if ns == default => Ok(ns.to_string()),
            Some(ns) if self.additional_namespaces.iter().any(|n| n == ns) => Ok(ns.to_string()),
            Some(ns) => Err(Error::policy(format!(
                "namespace `{}` is not enabled for this agent",
                ns
            ))),
        }
    }

    /// Reject catalogs with duplicate connection names
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = BTreeSet::new();
        for connection in self.all_connections() {
            if !seen.insert(connection.name.as_str()) {
                return Err(Error::validation_for_field(
                    "connections",
                    format!("duplicate connection name `{}`", connection.name),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::connection::{ConnectionKind, ConnectionSchema, HostPathSchema};

    fn host_path_connection(name: &str) -> Connection {
        Connection {
            name: name.to_string(),
            kind: ConnectionKind::HostPath,
            schema: Some(ConnectionSchema::HostPath(HostPathSchema {
                host_path: "/data".to_string(),
                mount_path: "/mnt/data".to_string(),
                read_only: None,
            })),
            secret: None,
            config_map: None,
        }
    }

    #[test]
    fn store_is_first_in_the_catalog() {
        let config = AgentConfig {
            artifacts_store: Some(host_path_connection("store")),
            connections: vec![host_path_connection("extra")],
            ..Default::default()
        };
        let names: Vec<_> = config.all_connections().iter().map(|c| &c.name).collect();
        assert_eq!(names, ["store", "extra"]);
        assert!(config.connection_by_name("extra").is_some());
        assert!(config.connection_by_name("missing").is_none());
    }

    #[test]
    fn duplicate_connection_names_are_rejected() {
        let config = AgentConfig {
            artifacts_store: Some(host_path_connection("store")),
            connections: vec![host_path_connection("store")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn namespace_policy() {
        let config = AgentConfig {
            namespace: Some("polyaxon".to_string()),
            additional_namespaces: vec!["team-a".to_string()],
            ..Default::default()
        };
        assert_eq!(config.resolve_namespace(None).unwrap(), "polyaxon");
        assert_eq!(config.resolve_namespace(Some("team-a")).unwrap(), "team-a");
        assert!(config.resolve_namespace(Some("team-b")).is_err());
    }
}
