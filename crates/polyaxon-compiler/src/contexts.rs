//! Resolved run context
//!
//! A strongly-typed view of the values the control plane exposes for
//! substitution: run identity globals, typed IO, artifacts paths, and the
//! referenced connection schemas. Converters consume the paths; the JSON
//! boundary is `to_value`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use polyaxon_common::constants;
use polyaxon_common::schemas::{CompiledOperation, Connection};

use crate::RunInfo;

/// Run identity and path globals
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ContextGlobals {
    pub owner_name: String,
    pub project_name: String,
    pub project_unique_name: String,
    pub name: String,
    pub uuid: String,
    /// `owner.project.runs.uuid`
    pub run_info: String,
    pub namespace: String,
    pub iteration: Option<i32>,
    pub context_path: String,
    pub artifacts_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloning_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_uuid: Option<String>,
    pub is_independent: bool,
    /// Artifacts store root, surfaced when the store is mounted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
    pub run_artifacts_path: String,
    pub run_outputs_path: String,
}

/// The nested substitution context of one run
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ResolvedContext {
    pub globals: ContextGlobals,
    pub inputs: BTreeMap<String, serde_json::Value>,
    pub outputs: BTreeMap<String, serde_json::Value>,
    pub artifacts: BTreeMap<String, serde_json::Value>,
    pub connections: BTreeMap<String, serde_json::Value>,
}

impl ResolvedContext {
    /// Build the context for one run.
    ///
    /// Path policy: when artifacts or logs collection is on, run paths live
    /// under the shared context `emptyDir`; otherwise they point directly
    /// into the artifacts store.
    pub fn build(
        run: &RunInfo,
        operation: &CompiledOperation,
        namespace: &str,
        artifacts_store: Option<&Connection>,
        connections: &[Connection],
    ) -> Self {
        let plugins = operation.plugins();
        let run_path = &run.run_uuid;

        let store_root = artifacts_store
            .and_then(|store| store.store_path())
            .unwrap_or(constants::CONTEXT_ARTIFACTS_ROOT);
        let run_artifacts_path = if plugins.collect_artifacts() || plugins.collect_logs() {
            format!("{}/{}", constants::CONTEXT_ARTIFACTS_ROOT, run_path)
        } else {
            format!("{}/{}", store_root, run_path)
        };
        let run_outputs_path = format!("{}/outputs", run_artifacts_path);
        let store_path = if plugins.mount_artifacts_store() {
            artifacts_store
                .and_then(|store| store.store_path())
                .map(str::to_string)
        } else {
            None
        };

        let globals = ContextGlobals {
            owner_name: run.owner.clone(),
            project_name: run.project.clone(),
            project_unique_name: format!("{}.{}", run.owner, run.project),
            name: run.run_name.clone(),
            uuid: run.run_uuid.clone(),
            run_info: run.run_instance(),
            namespace: namespace.to_string(),
            iteration: None,
            context_path: constants::CONTEXT_ROOT.to_string(),
            artifacts_path: constants::CONTEXT_ARTIFACTS_ROOT.to_string(),
            is_independent: true,
            store_path,
            run_artifacts_path,
            run_outputs_path,
            ..Default::default()
        };

        let io_map = |ios: &[polyaxon_common::schemas::RunIo]| {
            ios.iter()
                .map(|io| (io.name.clone(), io.value.clone()))
                .collect::<BTreeMap<_, _>>()
        };

        let connection_schemas = connections
            .iter()
            .map(|c| (c.name.clone(), c.schema_json()))
            .collect::<BTreeMap<_, _>>();

        Self {
            globals,
            inputs: io_map(&operation.inputs),
            outputs: io_map(&operation.outputs),
            artifacts: operation
                .inputs
                .iter()
                .chain(operation.outputs.iter())
                .filter(|io| io.iotype.as_deref() == Some("artifacts"))
                .map(|io| (io.name.clone(), io.value.clone()))
                .collect(),
            connections: connection_schemas,
        }
    }

    /// JSON boundary for the platform edge
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyaxon_common::schemas::connection::{ConnectionKind, ConnectionSchema, HostPathSchema};
    use polyaxon_common::schemas::Plugins;

    fn run_info() -> RunInfo {
        RunInfo {
            owner: "acme".to_string(),
            project: "vision".to_string(),
            run_uuid: "uid123".to_string(),
            run_name: "train".to_string(),
        }
    }

    fn store() -> Connection {
        Connection {
            name: "store".to_string(),
            kind: ConnectionKind::HostPath,
            schema: Some(ConnectionSchema::HostPath(HostPathSchema {
                host_path: "/tmp/store".to_string(),
                mount_path: "/plx".to_string(),
                read_only: None,
            })),
            secret: None,
            config_map: None,
        }
    }

    #[test]
    fn run_info_global_is_the_instance_path() {
        let op = CompiledOperation::default();
        let ctx = ResolvedContext::build(&run_info(), &op, "plx", Some(&store()), &[]);
        assert_eq!(ctx.globals.run_info, "acme.vision.runs.uid123");
        assert_eq!(ctx.globals.project_unique_name, "acme.vision");
    }

    #[test]
    fn collection_roots_paths_under_the_context() {
        let op = CompiledOperation {
            plugins: Some(Plugins {
                collect_artifacts: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let ctx = ResolvedContext::build(&run_info(), &op, "plx", Some(&store()), &[]);
        assert_eq!(ctx.globals.run_artifacts_path, "/plx-context/artifacts/uid123");
        assert_eq!(
            ctx.globals.run_outputs_path,
            "/plx-context/artifacts/uid123/outputs"
        );
    }

    #[test]
    fn without_collection_paths_point_into_the_store() {
        let op = CompiledOperation::default();
        let ctx = ResolvedContext::build(&run_info(), &op, "plx", Some(&store()), &[]);
        assert_eq!(ctx.globals.run_artifacts_path, "/plx/uid123");
        assert!(ctx.globals.store_path.is_none());
    }

    #[test]
    fn mounted_store_surfaces_its_path() {
        let op = CompiledOperation {
            plugins: Some(Plugins {
                mount_artifacts_store: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        let ctx = ResolvedContext::build(&run_info(), &op, "plx", Some(&store()), &[]);
        assert_eq!(ctx.globals.store_path.as_deref(), Some("/plx"));
    }
}
