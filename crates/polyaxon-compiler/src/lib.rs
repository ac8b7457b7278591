//! Operation compiler
//!
//! Compiles a fully-substituted operation manifest plus the agent config
//! into the `core.polyaxon.com/v1 Operation` custom object (and companion
//! objects) ready for submission.
//!
//! Pipeline: resolve the agent environment, build the run context, convert
//! the run kind into containers and pod templates, then wrap the result in
//! the Operation CRD.

use tracing::debug;

use polyaxon_common::schemas::{AgentConfig, CompiledOperation, Runtime};
use polyaxon_common::Result;

pub mod catalog;
pub mod contexts;
pub mod converters;
pub mod crd;
pub mod resolver;

use converters::{ConvertedOperation, ConverterContext};

/// Identity of one run as assigned by the control plane
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub owner: String,
    pub project: String,
    pub run_uuid: String,
    pub run_name: String,
}

impl RunInfo {
    /// `owner.project.runs.uuid`
    pub fn run_instance(&self) -> String {
        format!("{}.{}.runs.{}", self.owner, self.project, self.run_uuid)
    }

    /// Name of the Kubernetes resource backing the run
    pub fn resource_name(&self) -> String {
        format!("plx-operation-{}", self.run_uuid)
    }
}

/// Platform API settings forwarded into managed containers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiSettings {
    /// Platform host reachable from operation pods
    pub host: String,
    /// API version segment
    pub version: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            version: "v1".to_string(),
        }
    }
}

/// The compiled Kubernetes objects of one run
#[derive(Clone, Debug)]
pub struct CompiledResource {
    /// The Operation custom object
    pub resource: serde_json::Value,
    /// Companion objects applied alongside (e.g. the dask scheduler Service)
    pub services: Vec<serde_json::Value>,
    /// Namespace everything lands in
    pub namespace: String,
}

/// Compile one operation into its Kubernetes objects.
pub fn compile_operation(
    run: &RunInfo,
    operation: &CompiledOperation,
    agent: &AgentConfig,
    api: &ApiSettings,
) -> Result<CompiledResource> {
    let environment = resolver::resolve(operation, agent)?;
    let connections: Vec<_> = environment.connection_by_names.values().cloned().collect();
    let contexts = contexts::ResolvedContext::build(
        run,
        operation,
        &environment.namespace,
        environment.artifacts_store.as_ref(),
        &connections,
    );

    let plugins = operation.plugins();
    let kind = operation.run.kind();
    let ctx = ConverterContext {
        run,
        plugins: plugins.clone(),
        environment: &environment,
        contexts: &contexts,
        api,
        kind,
    };

    let converted = convert_run(&ctx, &operation.run)?;
    debug!(
        run = %run.run_instance(),
        kind = %kind,
        spec_key = converted.spec_key,
        services = converted.services.len(),
        "compiled operation"
    );

    let resource = crd::OperationResource::new(run, &environment.namespace)
        .with_kind(&kind.to_string())
        .with_spec_key(converted.spec_key, converted.spec)
        .with_termination(operation.termination.as_ref())
        .with_collect_logs(plugins.collect_logs())
        .with_sync_statuses(plugins.sync_statuses.unwrap_or(false))
        .with_notifications(&operation.notifications)
        .build();

    Ok(CompiledResource {
        resource,
        services: converted.services,
        namespace: environment.namespace,
    })
}

fn convert_run(ctx: &ConverterContext<'_>, run: &Runtime) -> Result<ConvertedOperation> {
    match run {
        Runtime::Job(job)
        | Runtime::Cleaner(job)
        | Runtime::Notifier(job)
        | Runtime::Tuner(job)
        | Runtime::Watchdog(job) => converters::job::convert(ctx, job),
        Runtime::Service(service) => converters::service::convert(ctx, service),
        Runtime::TfJob(tf) => converters::kubeflow::convert_tfjob(ctx, tf),
        Runtime::PytorchJob(pt) => converters::kubeflow::convert_pytorchjob(ctx, pt),
        Runtime::PaddleJob(paddle) => converters::kubeflow::convert_paddlejob(ctx, paddle),
        Runtime::XgbJob(xgb) => converters::kubeflow::convert_xgbjob(ctx, xgb),
        Runtime::MpiJob(mpi) => converters::kubeflow::convert_mpijob(ctx, mpi),
        Runtime::MxJob(mx) => converters::kubeflow::convert_mxjob(ctx, mx),
        Runtime::DaskJob(dask) => converters::dask::convert(ctx, dask),
        Runtime::RayJob(ray) => converters::ray::convert(ctx, ray),
        Runtime::SparkJob(spark) => converters::spark::convert(ctx, spark),
    }
}
