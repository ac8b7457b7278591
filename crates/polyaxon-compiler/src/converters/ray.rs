//! RayJob conversion
//!
//! Head plus named worker groups. The head exposes the standard Ray ports
//! and serves the dashboard on all interfaces; workers get a `ray stop`
//! preStop hook so draining nodes leave the cluster cleanly.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ExecAction, Lifecycle, LifecycleHandler};

use polyaxon_common::schemas::{RayJobRun, RayReplica};
use polyaxon_common::Result;

use super::{build_replica, replica_value, ConvertedOperation, ConverterContext};

const HEAD_PORTS: [(&str, i32); 4] = [
    ("gcs-server", 6379),
    ("dashboard", 8265),
    ("client", 10001),
    ("serve", 8000),
];

pub fn convert(ctx: &ConverterContext<'_>, run: &RayJobRun) -> Result<ConvertedOperation> {
    let mut spec = serde_json::Map::new();

    if let Some(entrypoint) = &run.entrypoint {
        spec.insert("entrypoint".to_string(), serde_json::json!(entrypoint));
    }
    if let Some(runtime_env) = &run.runtime_env {
        spec.insert("runtimeEnv".to_string(), runtime_env.clone());
    }
    if let Some(version) = &run.ray_version {
        spec.insert("rayVersion".to_string(), serde_json::json!(version));
    }
    if !run.metadata.is_empty() {
        spec.insert("metadata".to_string(), serde_json::json!(run.metadata));
    }

    if let Some(head) = &run.head {
        spec.insert("head".to_string(), head_group(ctx, head)?);
    }

    let mut workers = serde_json::Map::new();
    for (group_name, worker) in &run.workers {
        workers.insert(group_name.clone(), worker_group(ctx, worker)?);
    }
    if !workers.is_empty() {
        spec.insert("workers".to_string(), serde_json::Value::Object(workers));
    }

    Ok(ConvertedOperation {
        spec_key: "rayJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}

fn head_group(ctx: &ConverterContext<'_>, head: &RayReplica) -> Result<serde_json::Value> {
    let ports: Vec<i32> = HEAD_PORTS.iter().map(|(_, port)| *port).collect();
    let mut resource = build_replica(ctx, &head.replica, &ports)?;

    // Name the well-known head ports.
    if let Some(container_ports) = resource.main.ports.as_mut() {
        for (port, (name, _)) in container_ports.iter_mut().zip(HEAD_PORTS.iter()) {
            port.name = Some(name.to_string());
        }
    }

    let mut group = replica_value(ctx, &resource, &BTreeMap::new())?;

    let mut params = head.ray_start_params.clone();
    params
        .entry("dashboard-host".to_string())
        .or_insert_with(|| "0.0.0.0".to_string());
    group["rayStartParams"] = serde_json::json!(params);
    Ok(group)
}

fn worker_group(ctx: &ConverterContext<'_>, worker: &RayReplica) -> Result<serde_json::Value> {
    let mut resource = build_replica(ctx, &worker.replica, &[])?;

    if resource.main.lifecycle.is_none() {
        resource.main.lifecycle = Some(Lifecycle {
            pre_stop: Some(LifecycleHandler {
                exec: Some(ExecAction {
                    command: Some(vec![
                        "/bin/sh".to_string(),
                        "-c".to_string(),
                        "ray stop".to_string(),
                    ]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    let mut group = replica_value(ctx, &resource, &BTreeMap::new())?;
    if let Some(min) = worker.min_replicas {
        group["minReplicas"] = serde_json::json!(min);
    }
    if let Some(max) = worker.max_replicas {
        group["maxReplicas"] = serde_json::json!(max);
    }
    if !worker.ray_start_params.is_empty() {
        group["rayStartParams"] = serde_json::json!(worker.ray_start_params);
    }
    Ok(group)
}
