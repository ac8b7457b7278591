//! Kubeflow training-operator kinds: tfjob, pytorchjob, paddlejob, xgbjob,
//! mpijob, mxjob.
//!
//! Every role is built with the shared replica algorithm and placed under
//! its capitalised role key; absent roles are omitted entirely.

use std::collections::BTreeMap;

use polyaxon_common::schemas::{
    MpiJobRun, MxJobMode, MxJobRun, PaddleJobRun, PytorchJobRun, ReplicaSpec, TfJobRun, XgbJobRun,
};
use polyaxon_common::Result;

use super::{compile_replica, ConvertedOperation, ConverterContext};

fn role_map(
    ctx: &ConverterContext<'_>,
    roles: Vec<(&str, Option<&ReplicaSpec>)>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut map = serde_json::Map::new();
    for (role, replica) in roles {
        if let Some(replica) = replica {
            map.insert(
                role.to_string(),
                compile_replica(ctx, replica, &[], &BTreeMap::new())?,
            );
        }
    }
    Ok(map)
}

pub fn convert_tfjob(ctx: &ConverterContext<'_>, run: &TfJobRun) -> Result<ConvertedOperation> {
    let mut spec = role_map(
        ctx,
        vec![
            ("Chief", run.chief.as_ref()),
            ("PS", run.ps.as_ref()),
            ("Worker", run.worker.as_ref()),
            ("Evaluator", run.evaluator.as_ref()),
        ],
    )?;
    if let Some(policy) = &run.clean_pod_policy {
        spec.insert("cleanPodPolicy".to_string(), serde_json::json!(policy));
    }
    if let Some(policy) = &run.scheduling_policy {
        spec.insert("schedulingPolicy".to_string(), policy.clone());
    }
    if let Some(dynamic) = run.enable_dynamic_worker {
        spec.insert("enableDynamicWorker".to_string(), serde_json::json!(dynamic));
    }
    if let Some(policy) = &run.success_policy {
        spec.insert("successPolicy".to_string(), serde_json::json!(policy));
    }
    Ok(ConvertedOperation {
        spec_key: "tfJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}

pub fn convert_pytorchjob(
    ctx: &ConverterContext<'_>,
    run: &PytorchJobRun,
) -> Result<ConvertedOperation> {
    let mut spec = role_map(
        ctx,
        vec![
            ("Master", run.master.as_ref()),
            ("Worker", run.worker.as_ref()),
        ],
    )?;
    if let Some(policy) = &run.clean_pod_policy {
        spec.insert("cleanPodPolicy".to_string(), serde_json::json!(policy));
    }
    if let Some(policy) = &run.elastic_policy {
        spec.insert("elasticPolicy".to_string(), policy.clone());
    }
    if let Some(n) = run.n_proc_per_node {
        spec.insert("nProcPerNode".to_string(), serde_json::json!(n));
    }
    Ok(ConvertedOperation {
        spec_key: "pytorchJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}

pub fn convert_paddlejob(
    ctx: &ConverterContext<'_>,
    run: &PaddleJobRun,
) -> Result<ConvertedOperation> {
    let mut spec = role_map(
        ctx,
        vec![
            ("Master", run.master.as_ref()),
            ("Worker", run.worker.as_ref()),
        ],
    )?;
    if let Some(policy) = &run.clean_pod_policy {
        spec.insert("cleanPodPolicy".to_string(), serde_json::json!(policy));
    }
    if let Some(policy) = &run.elastic_policy {
        spec.insert("elasticPolicy".to_string(), policy.clone());
    }
    Ok(ConvertedOperation {
        spec_key: "paddleJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}

pub fn convert_xgbjob(ctx: &ConverterContext<'_>, run: &XgbJobRun) -> Result<ConvertedOperation> {
    let mut spec = role_map(
        ctx,
        vec![
            ("Master", run.master.as_ref()),
            ("Worker", run.worker.as_ref()),
        ],
    )?;
    if let Some(policy) = &run.clean_pod_policy {
        spec.insert("cleanPodPolicy".to_string(), serde_json::json!(policy));
    }
    Ok(ConvertedOperation {
        spec_key: "xgbJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}

pub fn convert_mpijob(ctx: &ConverterContext<'_>, run: &MpiJobRun) -> Result<ConvertedOperation> {
    let mut spec = role_map(
        ctx,
        vec![
            ("Launcher", run.launcher.as_ref()),
            ("Worker", run.worker.as_ref()),
        ],
    )?;
    if let Some(policy) = &run.clean_pod_policy {
        spec.insert("cleanPodPolicy".to_string(), serde_json::json!(policy));
    }
    if let Some(slots) = run.slots_per_worker {
        spec.insert("slotsPerWorker".to_string(), serde_json::json!(slots));
    }
    Ok(ConvertedOperation {
        spec_key: "mpiJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}

pub fn convert_mxjob(ctx: &ConverterContext<'_>, run: &MxJobRun) -> Result<ConvertedOperation> {
    let mut spec = role_map(
        ctx,
        vec![
            ("Scheduler", run.scheduler.as_ref()),
            ("Server", run.server.as_ref()),
            ("Worker", run.worker.as_ref()),
            ("Tuner", run.tuner.as_ref()),
            ("TunerTracker", run.tuner_tracker.as_ref()),
            ("TunerServer", run.tuner_server.as_ref()),
        ],
    )?;
    let mode = match run.mode.unwrap_or(MxJobMode::MXTrain) {
        MxJobMode::MXTrain => "MXTrain",
        MxJobMode::MXTune => "MXTune",
    };
    spec.insert("mode".to_string(), serde_json::json!(mode));
    if let Some(policy) = &run.clean_pod_policy {
        spec.insert("cleanPodPolicy".to_string(), serde_json::json!(policy));
    }
    Ok(ConvertedOperation {
        spec_key: "mxJobSpec",
        spec: serde_json::Value::Object(spec),
        services: vec![],
    })
}
