//! Run kinds — the discriminated union over `run.kind`
//!
//! The compiled operation's `run` field is a tagged union; the tag selects
//! the runtime converter. Distributed kinds carry one `ReplicaSpec` per
//! role; auxiliaries (cleaner, notifier, tuner, watchdog) reuse the job
//! layout.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::replica::ReplicaSpec;

/// Closed set of run kinds the agent can materialise
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    /// Batch job
    Job,
    /// Long-running service
    Service,
    /// TensorFlow distributed training
    TfJob,
    /// PyTorch distributed training
    PytorchJob,
    /// PaddlePaddle distributed training
    PaddleJob,
    /// MPI distributed training
    MpiJob,
    /// MXNet distributed training
    MxJob,
    /// XGBoost distributed training
    XgbJob,
    /// Dask cluster job
    DaskJob,
    /// Ray cluster job
    RayJob,
    /// Spark application
    SparkJob,
    /// Auxiliary cleanup operation
    Cleaner,
    /// Auxiliary notification operation
    Notifier,
    /// Auxiliary tuner operation
    Tuner,
    /// Auxiliary watchdog operation
    Watchdog,
}

impl RunKind {
    /// Kinds that fan out into multiple replica roles
    pub fn is_distributed(&self) -> bool {
        matches!(
            self,
            Self::TfJob
                | Self::PytorchJob
                | Self::PaddleJob
                | Self::MpiJob
                | Self::MxJob
                | Self::XgbJob
                | Self::DaskJob
                | Self::RayJob
                | Self::SparkJob
        )
    }

    /// Auxiliary kinds mapped to the job layout
    pub fn is_auxiliary(&self) -> bool {
        matches!(
            self,
            Self::Cleaner | Self::Notifier | Self::Tuner | Self::Watchdog
        )
    }
}

impl std::fmt::Display for RunKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Job => "job",
            Self::Service => "service",
            Self::TfJob => "tfjob",
            Self::PytorchJob => "pytorchjob",
            Self::PaddleJob => "paddlejob",
            Self::MpiJob => "mpijob",
            Self::MxJob => "mxjob",
            Self::XgbJob => "xgbjob",
            Self::DaskJob => "daskjob",
            Self::RayJob => "rayjob",
            Self::SparkJob => "sparkjob",
            Self::Cleaner => "cleaner",
            Self::Notifier => "notifier",
            Self::Tuner => "tuner",
            Self::Watchdog => "watchdog",
        };
        write!(f, "{}", s)
    }
}

/// Single-replica batch run
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    /// The single replica of the job
    #[serde(flatten)]
    pub replica: ReplicaSpec,
}

/// Long-running service run
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRun {
    /// The service replica
    #[serde(flatten)]
    pub replica: ReplicaSpec,

    /// Container ports exposed by the service
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<i32>,

    /// Strip the proxied path prefix before forwarding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_path: Option<bool>,

    /// Expose the service outside the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_external: Option<bool>,
}

/// TensorFlow training roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TfJobRun {
    /// Pod cleanup policy after completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<String>,

    /// Gang-scheduling policy passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_policy: Option<serde_json::Value>,

    /// Allow scaling workers while running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dynamic_worker: Option<bool>,

    /// Success policy passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_policy: Option<String>,

    /// Chief replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chief: Option<ReplicaSpec>,
    /// Parameter-server replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ps: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
    /// Evaluator replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<ReplicaSpec>,
}

/// PyTorch training roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PytorchJobRun {
    /// Pod cleanup policy after completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<String>,

    /// Elastic policy passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_policy: Option<serde_json::Value>,

    /// Processes per node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_proc_per_node: Option<i32>,

    /// Master replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
}

/// PaddlePaddle training roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaddleJobRun {
    /// Pod cleanup policy after completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<String>,

    /// Elastic policy passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_policy: Option<serde_json::Value>,

    /// Master replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
}

/// XGBoost training roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XgbJobRun {
    /// Pod cleanup policy after completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<String>,

    /// Master replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
}

/// MPI training roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MpiJobRun {
    /// Pod cleanup policy after completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<String>,

    /// MPI slots per worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_per_worker: Option<i32>,

    /// Launcher replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
}

/// MXNet job mode
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum MxJobMode {
    /// Distributed training
    MXTrain,
    /// Hyper-parameter tuning
    MXTune,
}

/// MXNet training roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MxJobRun {
    /// Train or tune mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MxJobMode>,

    /// Pod cleanup policy after completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<String>,

    /// Scheduler replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<ReplicaSpec>,
    /// Server replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
    /// Tuner replica (tune mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuner: Option<ReplicaSpec>,
    /// Tuner tracker replica (tune mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuner_tracker: Option<ReplicaSpec>,
    /// Tuner server replica (tune mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuner_server: Option<ReplicaSpec>,
}

/// Dask cluster roles
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaskJobRun {
    /// The job replica driving the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<ReplicaSpec>,
    /// Worker replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ReplicaSpec>,
    /// Scheduler replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<ReplicaSpec>,
}

/// One Ray worker group or the head group
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RayReplica {
    /// The group's replica spec
    #[serde(flatten)]
    pub replica: ReplicaSpec,

    /// Minimum replicas for autoscaling groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    /// Maximum replicas for autoscaling groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,

    /// `ray start` parameters passed through to the group
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ray_start_params: BTreeMap<String, String>,
}

/// Ray cluster run
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RayJobRun {
    /// Entrypoint command of the Ray job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    /// Runtime environment passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_env: Option<serde_json::Value>,

    /// Ray version of the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ray_version: Option<String>,

    /// Metadata passed through verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// Head group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<RayReplica>,

    /// Worker groups keyed by group name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub workers: BTreeMap<String, RayReplica>,
}

/// Spark replicas share the common replica shape
pub type SparkReplica = ReplicaSpec;

/// Spark application run
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SparkJobRun {
    /// Application type (Java, Scala, Python, R)
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub spark_type: Option<String>,

    /// Spark version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_version: Option<String>,

    /// Python version for pyspark applications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,

    /// Deploy mode (cluster or client)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_mode: Option<String>,

    /// Main class for JVM applications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    /// Main application file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_application_file: Option<String>,

    /// Application arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    /// Hadoop configuration entries
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hadoop_conf: BTreeMap<String, String>,

    /// Spark configuration entries
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spark_conf: BTreeMap<String, String>,

    /// Hadoop config-map name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hadoop_config_map: Option<String>,

    /// Spark config-map name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_config_map: Option<String>,

    /// Driver replica
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<SparkReplica>,
    /// Executor replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<SparkReplica>,
}

/// The discriminated union over `run.kind`
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Runtime {
    /// Batch job
    Job(JobRun),
    /// Long-running service
    Service(ServiceRun),
    /// TensorFlow distributed training
    TfJob(TfJobRun),
    /// PyTorch distributed training
    PytorchJob(PytorchJobRun),
    /// PaddlePaddle distributed training
    PaddleJob(PaddleJobRun),
    /// MPI distributed training
    MpiJob(MpiJobRun),
    /// MXNet distributed training
    MxJob(MxJobRun),
    /// XGBoost distributed training
    XgbJob(XgbJobRun),
    /// Dask cluster job
    DaskJob(DaskJobRun),
    /// Ray cluster job
    RayJob(RayJobRun),
    /// Spark application
    SparkJob(SparkJobRun),
    /// Auxiliary cleanup operation (job layout)
    Cleaner(JobRun),
    /// Auxiliary notification operation (job layout)
    Notifier(JobRun),
    /// Auxiliary tuner operation (job layout)
    Tuner(JobRun),
    /// Auxiliary watchdog operation (job layout)
    Watchdog(JobRun),
}

impl Runtime {
    /// Kind discriminator selecting the converter
    pub fn kind(&self) -> RunKind {
        match self {
            Self::Job(_) => RunKind::Job,
            Self::Service(_) => RunKind::Service,
            Self::TfJob(_) => RunKind::TfJob,
            Self::PytorchJob(_) => RunKind::PytorchJob,
            Self::PaddleJob(_) => RunKind::PaddleJob,
            Self::MpiJob(_) => RunKind::MpiJob,
            Self::MxJob(_) => RunKind::MxJob,
            Self::XgbJob(_) => RunKind::XgbJob,
            Self::DaskJob(_) => RunKind::DaskJob,
            Self::RayJob(_) => RunKind::RayJob,
            Self::SparkJob(_) => RunKind::SparkJob,
            Self::Cleaner(_) => RunKind::Cleaner,
            Self::Notifier(_) => RunKind::Notifier,
            Self::Tuner(_) => RunKind::Tuner,
            Self::Watchdog(_) => RunKind::Watchdog,
        }
    }

    /// Every replica role of the run, in role order.
    ///
    /// Used by the environment resolver to walk `connections` and
    /// `init[*].connection` across all roles of distributed kinds.
    pub fn replicas(&self) -> Vec<&ReplicaSpec> {
        match self {
            Self::Job(j) | Self::Cleaner(j) | Self::Notifier(j) | Self::Tuner(j)
            | Self::Watchdog(j) => vec![&j.replica],
            Self::Service(s) => vec![&s.replica],
            Self::TfJob(tf) => [&tf.chief, &tf.ps, &tf.worker, &tf.evaluator]
                .into_iter()
                .flatten()
                .collect(),
            Self::PytorchJob(pt) => [&pt.master, &pt.worker].into_iter().flatten().collect(),
            Self::PaddleJob(pd) => [&pd.master, &pd.worker].into_iter().flatten().collect(),
            Self::MpiJob(mpi) => [&mpi.launcher, &mpi.worker].into_iter().flatten().collect(),
            Self::MxJob(mx) => [
                &mx.scheduler,
                &mx.server,
                &mx.worker,
                &mx.tuner,
                &mx.tuner_tracker,
                &mx.tuner_server,
            ]
            .into_iter()
            .flatten()
            .collect(),
            Self::XgbJob(xgb) => [&xgb.master, &xgb.worker].into_iter().flatten().collect(),
            Self::DaskJob(dask) => [&dask.job, &dask.worker, &dask.scheduler]
                .into_iter()
                .flatten()
                .collect(),
            Self::RayJob(ray) => {
                let mut replicas: Vec<&ReplicaSpec> =
                    ray.head.iter().map(|h| &h.replica).collect();
                replicas.extend(ray.workers.values().map(|w| &w.replica));
                replicas
            }
            Self::SparkJob(spark) => [&spark.driver, &spark.executor]
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::Job(JobRun::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_selects_the_variant() {
        let run: Runtime = serde_json::from_value(serde_json::json!({
            "kind": "job",
            "container": {"image": "alpine"}
        }))
        .unwrap();
        assert_eq!(run.kind(), RunKind::Job);

        let run: Runtime = serde_json::from_value(serde_json::json!({
            "kind": "tfjob",
            "worker": {"replicas": 3, "container": {"image": "tf:latest"}}
        }))
        .unwrap();
        assert_eq!(run.kind(), RunKind::TfJob);
        assert_eq!(run.replicas().len(), 1);
    }

    #[test]
    fn auxiliary_kinds_use_job_layout() {
        let run: Runtime = serde_json::from_value(serde_json::json!({
            "kind": "notifier",
            "container": {"image": "polyaxon/polyaxon-events"}
        }))
        .unwrap();
        assert_eq!(run.kind(), RunKind::Notifier);
        assert!(run.kind().is_auxiliary());
        assert!(!run.kind().is_distributed());
    }

    #[test]
    fn replicas_walk_every_role() {
        let run: Runtime = serde_json::from_value(serde_json::json!({
            "kind": "tfjob",
            "chief": {"replicas": 1},
            "ps": {"replicas": 2},
            "worker": {"replicas": 3}
        }))
        .unwrap();
        let replicas = run.replicas();
        assert_eq!(replicas.len(), 3);
        assert_eq!(replicas[0].num_replicas(), 1);
        assert_eq!(replicas[1].num_replicas(), 2);
        assert_eq!(replicas[2].num_replicas(), 3);
    }

    #[test]
    fn ray_workers_are_keyed_by_group() {
        let run: Runtime = serde_json::from_value(serde_json::json!({
            "kind": "rayjob",
            "entrypoint": "python train.py",
            "head": {"rayStartParams": {"num-cpus": "2"}},
            "workers": {
                "gpu-group": {"replicas": 2},
                "cpu-group": {"replicas": 4}
            }
        }))
        .unwrap();
        match &run {
            Runtime::RayJob(ray) => {
                assert_eq!(ray.workers.len(), 2);
                assert!(ray.head.is_some());
            }
            _ => panic!("expected rayjob"),
        }
        assert_eq!(run.replicas().len(), 3);
    }

    #[test]
    fn run_kind_display_matches_wire_tags() {
        for (kind, tag) in [
            (RunKind::Job, "job"),
            (RunKind::TfJob, "tfjob"),
            (RunKind::PytorchJob, "pytorchjob"),
            (RunKind::DaskJob, "daskjob"),
            (RunKind::SparkJob, "sparkjob"),
        ] {
            assert_eq!(kind.to_string(), tag);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(tag.to_string())
            );
        }
    }
}
