//! Sidecar container synthesis
//!
//! Injected when artifacts or logs collection is requested. The sidecar
//! watches the main container and syncs the shared context to the store.

use k8s_openapi::api::core::v1::Container;

use polyaxon_common::constants;
use polyaxon_common::Result;

use super::{env, volumes, ConverterContext};

/// Fallback image when the agent configures no sidecar defaults
const DEFAULT_SIDECAR_IMAGE: &str = "polyaxon/polyaxon-sidecar";

/// Build the sidecar for one replica; `None` when no collection is on
pub fn build_sidecar(
    ctx: &ConverterContext<'_>,
    main_container_name: &str,
) -> Result<Option<Container>> {
    if !ctx.plugins.needs_sidecar() {
        return Ok(None);
    }
    let settings = &ctx.environment.sidecar;

    let mut args = vec![format!("--container-id={main_container_name}")];
    if let Some(sleep) = settings.sleep_interval {
        args.push(format!("--sleep-interval={sleep}"));
    }
    if let Some(sync) = settings.sync_interval {
        args.push(format!("--sync-interval={sync}"));
    }
    // Unset monitors mean enabled.
    if settings.monitor_logs.unwrap_or(true) {
        args.push("--monitor-logs".to_string());
    }
    if settings.monitor_spec.unwrap_or(true) {
        args.push("--monitor-spec".to_string());
    }

    let mut env_vars = env::merge_env(vec![
        env::base_env(&ctx.environment.namespace, ctx.environment.use_proxy_env_vars),
        env::service_env(
            ctx.api,
            &ctx.run.run_instance(),
            "sidecar",
            ctx.environment.auth_secret.as_deref(),
            ctx.environment.internal_auth,
            ctx.plugins.log_level.as_deref(),
        ),
    ]);
    env_vars.push(env::env_var(
        constants::ENV_CONTAINER_ID,
        main_container_name,
    ));

    let mut mounts = Vec::new();
    if ctx.plugins.auth() {
        mounts.push(volumes::auth_context_mount(true));
    }
    mounts.push(volumes::artifacts_context_mount());
    if let Some(store) = &ctx.environment.artifacts_store {
        env_vars.push(env::env_var(constants::ENV_ARTIFACTS_STORE_NAME, &store.name));
        env_vars.push(env::connection_env(store));
        if let Some(mount) = volumes::connection_mount(store) {
            mounts.push(mount);
        }
        for resource in [&store.secret, &store.config_map].into_iter().flatten() {
            if let Some(mount) = volumes::resource_mount(resource) {
                mounts.push(mount);
            }
        }
    }

    Ok(Some(Container {
        name: constants::SIDECAR_CONTAINER.to_string(),
        image: Some(
            settings
                .full_image()
                .unwrap_or_else(|| DEFAULT_SIDECAR_IMAGE.to_string()),
        ),
        image_pull_policy: settings.image_pull_policy.clone(),
        command: Some(vec!["polyaxon".to_string(), "sidecar".to_string()]),
        args: Some(args),
        env: Some(env_vars),
        resources: settings.resources.clone(),
        volume_mounts: Some(volumes::dedup_mounts(mounts)),
        ..Default::default()
    }))
}
