//! DaskJob conversion
//!
//! Roles Job/Worker/Scheduler under `replicaSpecs`. The scheduler gets a
//! computed dashboard prefix behind the platform proxy, HTTP health probes,
//! and a companion ClusterIP Service exposing comm and dashboard ports.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{HTTPGetAction, Probe};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use polyaxon_common::schemas::{DaskJobRun, ReplicaSpec};
use polyaxon_common::Result;

use super::{build_replica, replica_value, ConvertedOperation, ConverterContext};

const COMPONENT_LABEL: &str = "dask.org/component";
const SCHEDULER_COMM_PORT: i32 = 8786;
const SCHEDULER_DASHBOARD_PORT: i32 = 8787;
const WORKER_DASHBOARD_PORT: i32 = 8788;

pub fn convert(ctx: &ConverterContext<'_>, run: &DaskJobRun) -> Result<ConvertedOperation> {
    let mut replica_specs = serde_json::Map::new();

    if let Some(job) = &run.job {
        let labels = component_labels("job");
        let resource = build_replica(ctx, job, &[])?;
        replica_specs.insert("Job".to_string(), replica_value(ctx, &resource, &labels)?);
    }

    if let Some(worker) = &run.worker {
        let worker = with_worker_defaults(worker.clone());
        let labels = component_labels("worker");
        let resource = build_replica(ctx, &worker, &[WORKER_DASHBOARD_PORT])?;
        replica_specs.insert(
            "Worker".to_string(),
            replica_value(ctx, &resource, &labels)?,
        );
    }

    if let Some(scheduler) = &run.scheduler {
        let prefix = dashboard_prefix(ctx);
        let scheduler = with_scheduler_defaults(scheduler.clone(), &prefix);
        let labels = component_labels("scheduler");
        let mut resource = build_replica(
            ctx,
            &scheduler,
            &[SCHEDULER_COMM_PORT, SCHEDULER_DASHBOARD_PORT],
        )?;
        let probe = health_probe(&prefix);
        resource.main.readiness_probe = Some(probe.clone());
        resource.main.liveness_probe = Some(probe);
        replica_specs.insert(
            "Scheduler".to_string(),
            replica_value(ctx, &resource, &labels)?,
        );
    }

    Ok(ConvertedOperation {
        spec_key: "daskJobSpec",
        spec: serde_json::json!({ "replicaSpecs": replica_specs }),
        services: vec![scheduler_service(ctx)],
    })
}

fn component_labels(component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(COMPONENT_LABEL.to_string(), component.to_string())])
}

/// `/monitors/v1/<ns>/<owner>/<project>/runs/<uuid>/<resource>-scheduler/8787`
fn dashboard_prefix(ctx: &ConverterContext<'_>) -> String {
    format!(
        "/monitors/v1/{}/{}/{}/runs/{}/{}-scheduler/{}",
        ctx.environment.namespace,
        ctx.run.owner,
        ctx.run.project,
        ctx.run.run_uuid,
        ctx.run.resource_name(),
        SCHEDULER_DASHBOARD_PORT,
    )
}

fn with_worker_defaults(mut replica: ReplicaSpec) -> ReplicaSpec {
    let container = replica.container.get_or_insert_with(Default::default);
    if container.args.is_none() {
        container.args = Some(vec![
            "dask-worker".to_string(),
            "--name".to_string(),
            "$(DASK_WORKER_NAME)".to_string(),
            "--dashboard".to_string(),
            "--dashboard-address".to_string(),
            WORKER_DASHBOARD_PORT.to_string(),
        ]);
    }
    replica
}

fn with_scheduler_defaults(mut replica: ReplicaSpec, prefix: &str) -> ReplicaSpec {
    let container = replica.container.get_or_insert_with(Default::default);
    if container.args.is_none() {
        container.args = Some(vec![
            "dask-scheduler".to_string(),
            "--port".to_string(),
            SCHEDULER_COMM_PORT.to_string(),
            "--dashboard-address".to_string(),
            format!(":{SCHEDULER_DASHBOARD_PORT}"),
            "--dashboard-prefix".to_string(),
            prefix.to_string(),
        ]);
    }
    replica
}

fn health_probe(prefix: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(format!("{prefix}/health")),
            port: IntOrString::Int(SCHEDULER_DASHBOARD_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(5),
        period_seconds: Some(10),
        ..Default::default()
    }
}

/// ClusterIP Service selecting the scheduler pod
fn scheduler_service(ctx: &ConverterContext<'_>) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": format!("{}-scheduler", ctx.run.resource_name()),
            "namespace": ctx.environment.namespace,
            "labels": crate::crd::sanitize_string_map(&crate::crd::recommended_labels(ctx.run)),
        },
        "spec": {
            "type": "ClusterIP",
            "selector": {
                COMPONENT_LABEL: "scheduler",
                "app.kubernetes.io/instance": ctx.run.run_uuid,
            },
            "ports": [
                {"name": "tcp-comm", "port": SCHEDULER_COMM_PORT, "targetPort": SCHEDULER_COMM_PORT},
                {"name": "http-dashboard", "port": SCHEDULER_DASHBOARD_PORT, "targetPort": SCHEDULER_DASHBOARD_PORT},
            ],
        }
    })
}
