//! Runtime converters — compiled operation to pod templates
//!
//! A shared replica builder assembles volumes, init containers, the main
//! container, and the sidecar; per-kind modules place the result under the
//! role map of the target CRD spec.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, Volume};

use polyaxon_common::constants;
use polyaxon_common::schemas::{Environment, Plugins, ReplicaSpec, RunKind};
use polyaxon_common::{Error, Result};

use crate::contexts::ResolvedContext;
use crate::resolver::ResolvedEnvironment;
use crate::{ApiSettings, RunInfo};

pub mod dask;
pub mod env;
pub mod init;
pub mod job;
pub mod kubeflow;
pub mod ray;
pub mod service;
pub mod sidecar;
pub mod spark;
pub mod volumes;

/// Everything a converter needs about one run
pub struct ConverterContext<'a> {
    /// Run identity
    pub run: &'a RunInfo,
    /// Effective plugins (operation merged over defaults)
    pub plugins: Plugins,
    /// Resolved agent environment
    pub environment: &'a ResolvedEnvironment,
    /// Resolved substitution context
    pub contexts: &'a ResolvedContext,
    /// Platform API settings forwarded to managed containers
    pub api: &'a ApiSettings,
    /// Run kind being converted
    pub kind: RunKind,
}

/// One converted CRD spec plus any companion objects
pub struct ConvertedOperation {
    /// Top-level key inside the Operation spec (e.g. `tfJobSpec`)
    pub spec_key: &'static str,
    /// The kind-specific spec value
    pub spec: serde_json::Value,
    /// Companion Kubernetes objects (e.g. the dask scheduler Service)
    pub services: Vec<serde_json::Value>,
}

/// One fully assembled replica
pub struct ReplicaResource {
    pub volumes: Vec<Volume>,
    pub init_containers: Vec<Container>,
    pub sidecars: Vec<Container>,
    pub main: Container,
    pub environment: Option<Environment>,
    pub num_replicas: i32,
}

/// Build one replica with the shared algorithm: volumes, init chain, main
/// container env layering, and the optional sidecar.
pub fn build_replica(
    ctx: &ConverterContext<'_>,
    replica: &ReplicaSpec,
    ports: &[i32],
) -> Result<ReplicaResource> {
    let plugins = &ctx.plugins;

    let init_containers = init::build_init_containers(ctx, &replica.init)?;

    // ---- Volume assembly ----
    let mut pod_volumes: Vec<Volume> = Vec::new();

    let replica_connections: Vec<_> = replica
        .connections
        .iter()
        .filter_map(|name| ctx.environment.connection(name))
        .collect();
    for connection in &replica_connections {
        pod_volumes.extend(volumes::connection_volume(connection));
    }
    for entry in &replica.init {
        if let Some(connection) = entry
            .connection
            .as_deref()
            .and_then(|name| ctx.environment.connection(name))
        {
            pod_volumes.extend(volumes::connection_volume(connection));
        }
        if let Some(secret) = entry
            .connection
            .as_deref()
            .and_then(|name| ctx.environment.connection(name))
            .and_then(|c| c.secret.as_ref())
        {
            pod_volumes.extend(volumes::resource_volume(secret, true));
        }
    }

    for secret in &ctx.environment.secrets {
        pod_volumes.extend(volumes::resource_volume(secret, true));
    }
    for config_map in &ctx.environment.config_maps {
        pod_volumes.extend(volumes::resource_volume(config_map, false));
    }

    let needs_artifacts_context = plugins.needs_sidecar() || !replica.init.is_empty();
    if needs_artifacts_context {
        pod_volumes.push(volumes::artifacts_context_volume());
    }
    // Store-backed artifacts inits copy from the store's own mount.
    let has_store_init = replica.init.iter().any(|entry| {
        !entry.is_custom()
            && entry.connection.is_none()
            && entry.git.is_none()
            && entry.dockerfile.is_none()
            && entry.tensorboard.is_none()
    });
    let store_is_consumed =
        plugins.needs_sidecar() || plugins.mount_artifacts_store() || has_store_init;
    if store_is_consumed {
        if let Some(store) = &ctx.environment.artifacts_store {
            pod_volumes.extend(volumes::connection_volume(store));
        }
    }
    if plugins.auth() {
        pod_volumes.push(volumes::auth_context_volume());
    }
    if plugins.docker() {
        pod_volumes.push(volumes::docker_volume());
    }
    if plugins.shm() {
        pod_volumes.push(volumes::shm_volume());
    }
    pod_volumes.extend(replica.volumes.iter().cloned());
    let pod_volumes = volumes::dedup_volumes(pod_volumes);

    // ---- Main container ----
    let mut main = replica.container.clone().unwrap_or_default();
    if main.name.is_empty() {
        main.name = constants::MAIN_CONTAINER.to_string();
    }
    // Cleaner/notifier runs inherit the agent's auxiliary container defaults.
    if let Some(defaults) = &ctx.environment.auxiliary {
        if main.image.is_none() {
            main.image = defaults.full_image();
        }
        if main.image_pull_policy.is_none() {
            main.image_pull_policy = defaults.image_pull_policy.clone();
        }
        if main.resources.is_none() {
            main.resources = defaults.resources.clone();
        }
    }

    let user_env = main.env.take().unwrap_or_default();
    let mut connection_vars: Vec<_> = replica_connections
        .iter()
        .map(|c| env::connection_env(c))
        .collect();
    let mut exposed: Vec<_> = replica_connections.clone();
    if store_is_consumed {
        if let Some(store) = &ctx.environment.artifacts_store {
            if !exposed.iter().any(|c| c.name == store.name) {
                exposed.push(store);
                connection_vars.push(env::connection_env(store));
            }
        }
    }
    if !exposed.is_empty() {
        connection_vars.push(env::catalog_env(&exposed));
    }
    connection_vars.push(env::env_var(
        constants::ENV_RUN_ARTIFACTS_PATH,
        &ctx.contexts.globals.run_artifacts_path,
    ));
    connection_vars.push(env::env_var(
        constants::ENV_RUN_OUTPUTS_PATH,
        &ctx.contexts.globals.run_outputs_path,
    ));

    main.env = Some(env::merge_env(vec![
        env::base_env(&ctx.environment.namespace, ctx.environment.use_proxy_env_vars),
        env::service_env(
            ctx.api,
            &ctx.run.run_instance(),
            "runner",
            ctx.environment.auth_secret.as_deref(),
            ctx.environment.internal_auth,
            ctx.plugins.log_level.as_deref(),
        ),
        connection_vars,
        env::items_env(&ctx.environment.secrets, &ctx.environment.config_maps),
        user_env,
    ]));

    let env_from = env::env_from_resources(&ctx.environment.secrets, &ctx.environment.config_maps);
    if !env_from.is_empty() {
        main.env_from
            .get_or_insert_with(Vec::new)
            .extend(env_from);
    }

    let mut main_mounts = main.volume_mounts.take().unwrap_or_default();
    for connection in &replica_connections {
        main_mounts.extend(volumes::connection_mount(connection));
    }
    for resource in ctx
        .environment
        .secrets
        .iter()
        .chain(ctx.environment.config_maps.iter())
    {
        main_mounts.extend(volumes::resource_mount(resource));
    }
    if plugins.collect_artifacts() || !replica.init.is_empty() {
        main_mounts.push(volumes::artifacts_context_mount());
    }
    if plugins.mount_artifacts_store() {
        if let Some(store) = &ctx.environment.artifacts_store {
            main_mounts.extend(volumes::connection_mount(store));
        }
    }
    if plugins.auth() {
        main_mounts.push(volumes::auth_context_mount(true));
    }
    if plugins.docker() {
        main_mounts.push(volumes::docker_mount());
    }
    if plugins.shm() {
        main_mounts.push(volumes::shm_mount());
    }
    let main_mounts = volumes::dedup_mounts(main_mounts);
    if !main_mounts.is_empty() {
        main.volume_mounts = Some(main_mounts);
    }

    if !ports.is_empty() {
        let container_ports = ports
            .iter()
            .map(|port| ContainerPort {
                container_port: *port,
                ..Default::default()
            })
            .collect();
        main.ports = Some(container_ports);
    }

    // ---- Sidecar ----
    let mut sidecars = Vec::new();
    if let Some(sidecar) = sidecar::build_sidecar(ctx, &main.name)? {
        sidecars.push(sidecar);
    }
    sidecars.extend(replica.sidecars.iter().cloned());

    Ok(ReplicaResource {
        volumes: pod_volumes,
        init_containers,
        sidecars,
        main,
        environment: replica.environment.clone(),
        num_replicas: replica.num_replicas(),
    })
}

/// Wrap a built replica as `{replicas, restartPolicy, template}` JSON.
///
/// `extra_labels` lets per-kind converters stamp selector labels (e.g. the
/// dask scheduler component label).
pub fn replica_value(
    ctx: &ConverterContext<'_>,
    resource: &ReplicaResource,
    extra_labels: &BTreeMap<String, String>,
) -> Result<serde_json::Value> {
    let environment = resource.environment.clone().unwrap_or_default();
    let restart_policy = environment
        .restart_policy
        .clone()
        .unwrap_or_else(|| "Never".to_string());

    let mut labels = crate::crd::recommended_labels(ctx.run);
    labels.extend(environment.labels.clone());
    labels.extend(extra_labels.clone());
    let labels = crate::crd::sanitize_string_map(&labels);
    let annotations = crate::crd::sanitize_string_map(&environment.annotations);

    let mut containers = vec![resource.main.clone()];
    containers.extend(resource.sidecars.iter().cloned());

    let pod_spec = PodSpec {
        init_containers: Some(resource.init_containers.clone()).filter(|c| !c.is_empty()),
        containers,
        volumes: Some(resource.volumes.clone()).filter(|v| !v.is_empty()),
        restart_policy: Some(restart_policy.clone()),
        service_account_name: environment
            .service_account_name
            .clone()
            .or_else(|| ctx.environment.default_sa.clone()),
        node_selector: environment.node_selector.clone(),
        tolerations: Some(environment.tolerations.clone()).filter(|t| !t.is_empty()),
        affinity: environment.affinity.clone(),
        image_pull_secrets: Some(environment.image_pull_secrets.clone())
            .filter(|s| !s.is_empty()),
        security_context: environment.security_context.clone(),
        dns_config: environment.dns_config.clone(),
        dns_policy: environment.dns_policy.clone(),
        host_aliases: Some(environment.host_aliases.clone()).filter(|h| !h.is_empty()),
        ..Default::default()
    };

    let mut metadata = serde_json::Map::new();
    if !labels.is_empty() {
        metadata.insert("labels".to_string(), serde_json::to_value(&labels).map_err(to_ser_err)?);
    }
    if !annotations.is_empty() {
        metadata.insert(
            "annotations".to_string(),
            serde_json::to_value(&annotations).map_err(to_ser_err)?,
        );
    }

    Ok(serde_json::json!({
        "replicas": resource.num_replicas,
        "restartPolicy": restart_policy,
        "template": {
            "metadata": serde_json::Value::Object(metadata),
            "spec": serde_json::to_value(&pod_spec).map_err(to_ser_err)?,
        }
    }))
}

/// Build and wrap one replica in a single step
pub fn compile_replica(
    ctx: &ConverterContext<'_>,
    replica: &ReplicaSpec,
    ports: &[i32],
    extra_labels: &BTreeMap<String, String>,
) -> Result<serde_json::Value> {
    let resource = build_replica(ctx, replica, ports)?;
    replica_value(ctx, &resource, extra_labels)
}

fn to_ser_err(err: serde_json::Error) -> Error {
    Error::serialization(err.to_string())
}
