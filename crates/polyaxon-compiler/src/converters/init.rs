//! Init container chain
//!
//! Each init entry becomes one container, in order: git clone, artifacts
//! download, dockerfile generation, tensorboard pre-download, or a raw
//! user container. An inline `container` on a generated entry overrides
//! image/command/args/env/resources.

use k8s_openapi::api::core::v1::{Container, VolumeMount};

use polyaxon_common::constants;
use polyaxon_common::schemas::connection::ConnectionKind;
use polyaxon_common::schemas::{Connection, InitSpec};
use polyaxon_common::{Error, Result};

use super::{env, volumes, ConverterContext};

/// Fallback image when the agent configures no init defaults
const DEFAULT_INIT_IMAGE: &str = "polyaxon/polyaxon-init";

/// Build the init container chain for one replica
pub fn build_init_containers(
    ctx: &ConverterContext<'_>,
    init: &[InitSpec],
) -> Result<Vec<Container>> {
    init.iter()
        .enumerate()
        .map(|(index, entry)| build_init_container(ctx, entry, index))
        .collect()
}

fn build_init_container(
    ctx: &ConverterContext<'_>,
    entry: &InitSpec,
    index: usize,
) -> Result<Container> {
    let connection = entry
        .connection
        .as_deref()
        .map(|name| {
            ctx.environment.connection(name).ok_or_else(|| {
                Error::converter(
                    ctx.kind.to_string(),
                    format!("init connection `{name}` escaped resolution"),
                )
            })
        })
        .transpose()?;

    let mut container = if entry.is_custom() {
        let mut custom = entry.container.clone().unwrap_or_default();
        if custom.name.is_empty() {
            custom.name = init_name(index);
        }
        custom
    } else if entry.git.is_some() || connection.is_some_and(|c| c.kind == ConnectionKind::Git) {
        git_container(ctx, entry, connection, index)
    } else if let Some(dockerfile) = &entry.dockerfile {
        generator_container(
            ctx,
            index,
            "dockerfile",
            vec![format!(
                "--spec={}",
                serde_json::to_string(dockerfile).map_err(|e| Error::serialization_for_kind(
                    "dockerfile",
                    e.to_string()
                ))?
            )],
            entry,
        )
    } else if let Some(tensorboard) = &entry.tensorboard {
        let mut args = Vec::new();
        if let Some(port) = tensorboard.port {
            args.push(format!("--port={port}"));
        }
        if !tensorboard.uuids.is_empty() {
            args.push(format!("--uuids={}", tensorboard.uuids.join(",")));
        }
        if tensorboard.use_names == Some(true) {
            args.push("--use-names".to_string());
        }
        if let Some(prefix) = &tensorboard.path_prefix {
            args.push(format!("--path-prefix={prefix}"));
        }
        if !tensorboard.plugins.is_empty() {
            args.push(format!("--plugins={}", tensorboard.plugins.join(",")));
        }
        if let Some(store) = &ctx.environment.artifacts_store {
            args.push(format!("--connection-name={}", store.name));
        }
        generator_container(ctx, index, "tensorboard", args, entry)
    } else {
        artifacts_container(ctx, entry, connection, index)
    };

    if !entry.is_custom() {
        if let Some(overrides) = &entry.container {
            apply_overrides(&mut container, overrides);
        }
    }
    Ok(container)
}

/// Git clone init: `polyaxon initializer git` with the clone flags
fn git_container(
    ctx: &ConverterContext<'_>,
    entry: &InitSpec,
    connection: Option<&Connection>,
    index: usize,
) -> Container {
    let connection_git = connection.and_then(|c| c.git());
    let url = entry
        .git
        .as_ref()
        .and_then(|g| g.url.clone())
        .or_else(|| connection_git.and_then(|g| g.url.clone()));
    let revision = entry
        .git
        .as_ref()
        .and_then(|g| g.revision.clone())
        .or_else(|| connection_git.and_then(|g| g.revision.clone()));
    let flags = entry
        .git
        .as_ref()
        .map(|g| g.flags.clone())
        .filter(|f| !f.is_empty())
        .or_else(|| connection_git.map(|g| g.flags.clone()).filter(|f| !f.is_empty()));

    let repo_path = entry.path.clone().unwrap_or_else(|| {
        let repo = url
            .as_deref()
            .and_then(|u| u.rsplit('/').next())
            .unwrap_or("repo");
        format!("{}/{}", constants::CONTEXT_ARTIFACTS_ROOT, repo)
    });

    let mut args = vec![format!("--repo-path={repo_path}")];
    if let Some(url) = &url {
        args.push(format!("--url={url}"));
    }
    if let Some(revision) = &revision {
        args.push(format!("--revision={revision}"));
    }
    if let Some(connection) = connection {
        args.push(format!("--connection={}", connection.name));
    }
    if let Some(flags) = &flags {
        args.push(format!(
            "--flags={}",
            serde_json::Value::from(flags.clone())
        ));
    }

    let mut container = base_container(ctx, index, "git", args, connection);

    // SSH credentials are exposed by mount path, not env-from.
    if let Some(secret) = connection.and_then(|c| c.secret.as_ref()) {
        if let Some(mount_path) = &secret.mount_path {
            container
                .env
                .get_or_insert_with(Vec::new)
                .push(env::env_var(constants::ENV_SSH_PATH, mount_path));
            if let Some(mount) = volumes::resource_mount(secret) {
                container.volume_mounts.get_or_insert_with(Vec::new).push(mount);
            }
        }
    }
    container
}

/// Artifacts init: native copy for mounted stores, `polyaxon initializer
/// path` for object storage.
fn artifacts_container(
    ctx: &ConverterContext<'_>,
    entry: &InitSpec,
    connection: Option<&Connection>,
    index: usize,
) -> Container {
    let store = connection.or(ctx.environment.artifacts_store.as_ref());
    let target_root = entry
        .path
        .clone()
        .unwrap_or_else(|| constants::CONTEXT_ARTIFACTS_ROOT.to_string());

    let selections = entry.artifacts.clone().unwrap_or_default();

    if let Some(store) = store.filter(|s| s.is_mount()) {
        // Mounted store: plain shell copy from the mount path.
        let source_root = store.mount_path().unwrap_or_default().to_string();
        let mut script = vec![format!("mkdir -p {target_root}")];
        for file in &selections.files {
            script.push(format!(
                "cp {}/{} {}/{}",
                source_root,
                file.from_path(),
                target_root,
                file.to_path()
            ));
        }
        if selections.dirs.is_empty() && selections.files.is_empty() {
            script.push(format!("cp -R {source_root}/. {target_root}"));
        }
        for dir in &selections.dirs {
            script.push(format!(
                "cp -R {}/{} {}/{}",
                source_root,
                dir.from_path(),
                target_root,
                dir.to_path()
            ));
        }
        let mut container = base_container(ctx, index, "path", vec![], Some(store));
        container.command = Some(vec!["/bin/sh".to_string(), "-c".to_string()]);
        container.args = Some(vec![script.join(" && ")]);
        if let Some(mount) = volumes::connection_mount(store) {
            container.volume_mounts.get_or_insert_with(Vec::new).push(mount);
        }
        return container;
    }

    // Object storage: one initializer invocation per selection; bare entries
    // default to the entire store path.
    let mut args = Vec::new();
    if let Some(store) = store {
        args.push(format!("--connection-name={}", store.name));
        args.push(format!("--connection-kind={}", store.kind));
    }
    for file in &selections.files {
        args.push(format!("--path-from={}", file.from_path()));
        args.push(format!("--path-to={}/{}", target_root, file.to_path()));
        args.push("--is-file".to_string());
    }
    for dir in &selections.dirs {
        args.push(format!("--path-from={}", dir.from_path()));
        args.push(format!("--path-to={}/{}", target_root, dir.to_path()));
        args.push("--check-path".to_string());
    }
    if selections.is_empty() {
        args.push(format!("--path-to={target_root}"));
        args.push("--check-path".to_string());
    }
    base_container(ctx, index, "path", args, store)
}

fn generator_container(
    ctx: &ConverterContext<'_>,
    index: usize,
    subcommand: &str,
    args: Vec<String>,
    entry: &InitSpec,
) -> Container {
    let connection = entry
        .connection
        .as_deref()
        .and_then(|name| ctx.environment.connection(name));
    base_container(ctx, index, subcommand, args, connection)
}

/// Shared shape of generated init containers
fn base_container(
    ctx: &ConverterContext<'_>,
    index: usize,
    subcommand: &str,
    args: Vec<String>,
    connection: Option<&Connection>,
) -> Container {
    let settings = &ctx.environment.init;

    let mut env_vars = env::merge_env(vec![
        env::base_env(&ctx.environment.namespace, ctx.environment.use_proxy_env_vars),
        env::service_env(
            ctx.api,
            &ctx.run.run_instance(),
            "initializer",
            ctx.environment.auth_secret.as_deref(),
            ctx.environment.internal_auth,
            ctx.plugins.log_level.as_deref(),
        ),
    ]);
    if let Some(connection) = connection {
        env_vars.push(env::connection_env(connection));
    }

    let mut mounts = vec![volumes::artifacts_context_mount()];
    if ctx.plugins.auth() {
        mounts.push(volumes::auth_context_mount(true));
    }

    Container {
        name: init_name(index),
        image: Some(
            settings
                .full_image()
                .unwrap_or_else(|| DEFAULT_INIT_IMAGE.to_string()),
        ),
        image_pull_policy: settings.image_pull_policy.clone(),
        command: Some(vec![
            "polyaxon".to_string(),
            "initializer".to_string(),
            subcommand.to_string(),
        ]),
        args: Some(args),
        env: Some(env_vars),
        resources: settings.resources.clone(),
        volume_mounts: Some(mounts),
        ..Default::default()
    }
}

fn apply_overrides(container: &mut Container, overrides: &Container) {
    if overrides.image.is_some() {
        container.image = overrides.image.clone();
    }
    if overrides.command.is_some() {
        container.command = overrides.command.clone();
    }
    if overrides.args.is_some() {
        container.args = overrides.args.clone();
    }
    if let Some(extra_env) = &overrides.env {
        container
            .env
            .get_or_insert_with(Vec::new)
            .extend(extra_env.iter().cloned());
    }
    if overrides.resources.is_some() {
        container.resources = overrides.resources.clone();
    }
}

fn init_name(index: usize) -> String {
    format!("{}-{}", constants::INIT_CONTAINER_PREFIX, index)
}
