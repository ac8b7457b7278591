//! Service conversion: one pod template plus the service routing knobs.

use std::collections::BTreeMap;

use polyaxon_common::schemas::ServiceRun;
use polyaxon_common::Result;

use super::{compile_replica, ConvertedOperation, ConverterContext};

pub fn convert(ctx: &ConverterContext<'_>, run: &ServiceRun) -> Result<ConvertedOperation> {
    let replica = compile_replica(ctx, &run.replica, &run.ports, &BTreeMap::new())?;

    let mut spec = serde_json::json!({
        "replicaSpec": {
            "default": replica,
        }
    });
    if !run.ports.is_empty() {
        spec["ports"] = serde_json::json!(run.ports);
    }
    if let Some(rewrite) = run.rewrite_path {
        spec["rewritePath"] = serde_json::json!(rewrite);
    }
    if let Some(external) = run.is_external {
        spec["isExternal"] = serde_json::json!(external);
    }
    if let Some(replicas) = run.replica.replicas {
        spec["replicas"] = serde_json::json!(replicas);
    }

    Ok(ConvertedOperation {
        spec_key: "serviceSpec",
        spec,
        services: vec![],
    })
}
