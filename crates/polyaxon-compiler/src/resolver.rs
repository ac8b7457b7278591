//! Agent environment resolution
//!
//! Turns an agent config plus a compiled operation into the effective
//! environment a converter runs against: namespace, connection closure,
//! requested secrets/config-maps, and sidecar/init defaults.

use std::collections::BTreeMap;

use tracing::debug;

use polyaxon_common::schemas::{
    AgentConfig, CompiledOperation, Connection, ConnectionResource, InitSettings, RunKind,
    SidecarSettings,
};
use polyaxon_common::Result;

use crate::catalog;

/// Sidecar sleep/sync defaults applied when the agent sets none
const DEFAULT_SIDECAR_INTERVAL: i64 = 10;

/// The effective environment one operation compiles against
#[derive(Clone, Debug, Default)]
pub struct ResolvedEnvironment {
    /// Namespace the operation lands in
    pub namespace: String,

    /// The agent's artifacts store
    pub artifacts_store: Option<Connection>,

    /// Every connection the operation references, plus the store
    pub connection_by_names: BTreeMap<String, Connection>,

    /// Requested secrets, in catalog order
    pub secrets: Vec<ConnectionResource>,

    /// Requested config-maps, in catalog order
    pub config_maps: Vec<ConnectionResource>,

    /// Effective sidecar settings (agent defaults patched by the operation)
    pub sidecar: SidecarSettings,

    /// Effective init settings
    pub init: InitSettings,

    /// Container defaults for cleaner/notifier runs, applied to the main
    /// container when the operation leaves them unset
    pub auxiliary: Option<InitSettings>,

    /// Default service account for operation pods
    pub default_sa: Option<String>,

    /// Secret carrying the auth token for managed containers
    pub auth_secret: Option<String>,

    /// Auxiliaries authenticate with the internal token instead
    pub internal_auth: bool,

    /// Forward the agent's proxy env vars into operation pods
    pub use_proxy_env_vars: bool,
}

impl ResolvedEnvironment {
    /// Connection lookup by name
    pub fn connection(&self, name: &str) -> Option<&Connection> {
        self.connection_by_names.get(name)
    }
}

/// Resolve a compiled operation against the agent config.
///
/// Fails with a policy error on a namespace outside the agent's managed set
/// and with a missing-connections error naming every unresolved reference.
pub fn resolve(
    operation: &CompiledOperation,
    agent: &AgentConfig,
) -> Result<ResolvedEnvironment> {
    let namespace = agent.resolve_namespace(operation.namespace.as_deref())?;

    let by_name: BTreeMap<String, Connection> = agent
        .all_connections()
        .into_iter()
        .map(|c| (c.name.clone(), c.clone()))
        .collect();

    // Walk every replica role of the run and resolve its references.
    let mut connection_names = Vec::new();
    let mut init_entries = Vec::new();
    for replica in operation.run.replicas() {
        connection_names.extend(replica.connections.iter().cloned());
        init_entries.extend(replica.init.iter().cloned());
    }

    let connections = catalog::resolve_requested_connections(
        &connection_names,
        &init_entries,
        agent.artifacts_store.as_ref(),
        &by_name,
    )?;
    debug!(
        count = connections.len(),
        kind = %operation.run.kind(),
        "resolved operation connections"
    );

    let connection_refs: Vec<&Connection> = connections.iter().collect();
    let resources = catalog::resolve_requested_resources(&connection_refs, &[]);
    // Secrets and config-maps are tracked separately so the converter can
    // emit the right volume source for each.
    let mut secrets = Vec::new();
    let mut config_maps = Vec::new();
    for resource in resources {
        let from_config_map = connections.iter().any(|c| {
            c.config_map
                .as_ref()
                .is_some_and(|cm| cm.name == resource.name)
        });
        if from_config_map {
            config_maps.push(resource);
        } else {
            secrets.push(resource);
        }
    }

    let plugins = operation.plugins();
    let sidecar = effective_sidecar(agent.sidecar.as_ref(), plugins.sidecar.as_ref());
    let init = agent.init.clone().unwrap_or_default();

    let kind = operation.run.kind();
    let auxiliary = match kind {
        RunKind::Cleaner => agent.cleaner.clone(),
        RunKind::Notifier => agent.notifier.clone(),
        _ => None,
    };
    let internal_auth = kind.is_auxiliary();
    let auth_secret = if internal_auth {
        agent.agent_secret_name.clone()
    } else {
        agent
            .app_secret_name
            .clone()
            .or_else(|| agent.agent_secret_name.clone())
    };

    let mut connection_by_names: BTreeMap<String, Connection> = connections
        .into_iter()
        .map(|c| (c.name.clone(), c))
        .collect();
    if let Some(store) = &agent.artifacts_store {
        connection_by_names
            .entry(store.name.clone())
            .or_insert_with(|| store.clone());
    }

    Ok(ResolvedEnvironment {
        namespace,
        artifacts_store: agent.artifacts_store.clone(),
        connection_by_names,
        secrets,
        config_maps,
        sidecar,
        init,
        auxiliary,
        default_sa: agent.runs_sa.clone(),
        auth_secret,
        internal_auth,
        use_proxy_env_vars: agent.use_proxy_env_vars_use_in_ops.unwrap_or(false),
    })
}

/// Agent defaults patched by the operation's sidecar overrides, with
/// interval fallbacks applied last.
fn effective_sidecar(
    agent_default: Option<&SidecarSettings>,
    operation_override: Option<&SidecarSettings>,
) -> SidecarSettings {
    let base = agent_default.cloned().unwrap_or_default();
    let mut merged = match operation_override {
        Some(overrides) => base.patched_with(overrides),
        None => base,
    };
    merged.sleep_interval = merged.sleep_interval.or(Some(DEFAULT_SIDECAR_INTERVAL));
    merged.sync_interval = merged.sync_interval.or(Some(DEFAULT_SIDECAR_INTERVAL));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyaxon_common::schemas::connection::{
        BucketSchema, ConnectionKind, ConnectionSchema, HostPathSchema,
    };
    use polyaxon_common::schemas::{JobRun, Plugins, ReplicaSpec, Runtime, TfJobRun};

    fn bucket(name: &str) -> Connection {
        Connection {
            name: name.to_string(),
            kind: ConnectionKind::S3,
            schema: Some(ConnectionSchema::Bucket(BucketSchema {
                bucket: format!("s3://{name}"),
            })),
            secret: Some(ConnectionResource {
                name: format!("{name}-creds"),
                items: vec![],
                mount_path: None,
                host_path: None,
                is_requested: false,
            }),
            config_map: None,
        }
    }

    fn host_path(name: &str) -> Connection {
        Connection {
            name: name.to_string(),
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

    fn agent() -> AgentConfig {
        AgentConfig {
            namespace: Some("polyaxon".to_string()),
            additional_namespaces: vec!["team-a".to_string()],
            artifacts_store: Some(host_path("store")),
            connections: vec![bucket("gcs-data")],
            runs_sa: Some("polyaxon-runs".to_string()),
            agent_secret_name: Some("agent-token".to_string()),
            ..Default::default()
        }
    }

    fn job_with_connections(connections: Vec<String>) -> CompiledOperation {
        CompiledOperation {
            run: Runtime::Job(JobRun {
                replica: ReplicaSpec {
                    connections,
                    ..Default::default()
                },
            }),
            ..Default::default()
        }
    }

    #[test]
    fn store_is_always_in_the_closure() {
        let env = resolve(&job_with_connections(vec![]), &agent()).unwrap();
        assert_eq!(env.namespace, "polyaxon");
        assert!(env.connection_by_names.contains_key("store"));
        assert_eq!(env.default_sa.as_deref(), Some("polyaxon-runs"));
    }

    #[test]
    fn namespace_outside_the_managed_set_is_rejected() {
        let op = CompiledOperation {
            namespace: Some("other".to_string()),
            ..job_with_connections(vec![])
        };
        let err = resolve(&op, &agent()).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn missing_connections_list_every_name() {
        let op = job_with_connections(vec!["ghost-a".to_string(), "ghost-b".to_string()]);
        let err = resolve(&op, &agent()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ghost-a"));
        assert!(msg.contains("ghost-b"));
    }

    #[test]
    fn distributed_roles_are_walked() {
        let op = CompiledOperation {
            run: Runtime::TfJob(TfJobRun {
                worker: Some(ReplicaSpec {
                    connections: vec!["gcs-data".to_string()],
                    ..Default::default()
                }),
                chief: Some(ReplicaSpec::default()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let env = resolve(&op, &agent()).unwrap();
        assert!(env.connection_by_names.contains_key("gcs-data"));
        assert_eq!(env.secrets.len(), 1);
        assert_eq!(env.secrets[0].name, "gcs-data-creds");
    }

    #[test]
    fn auxiliary_defaults_resolve_per_kind() {
        let mut agent = agent();
        agent.cleaner = Some(InitSettings {
            image: Some("polyaxon/polyaxon-init".to_string()),
            image_tag: Some("v2".to_string()),
            ..Default::default()
        });

        let op = CompiledOperation {
            run: Runtime::Cleaner(JobRun::default()),
            ..Default::default()
        };
        let env = resolve(&op, &agent).unwrap();
        assert_eq!(
            env.auxiliary.as_ref().and_then(|s| s.full_image()).as_deref(),
            Some("polyaxon/polyaxon-init:v2")
        );
        assert!(env.internal_auth);

        // Plain jobs never pick up auxiliary defaults.
        let env = resolve(&job_with_connections(vec![]), &agent).unwrap();
        assert!(env.auxiliary.is_none());
    }

    #[test]
    fn sidecar_intervals_default_to_ten() {
        let env = resolve(&job_with_connections(vec![]), &agent()).unwrap();
        assert_eq!(env.sidecar.sleep_interval, Some(10));
        assert_eq!(env.sidecar.sync_interval, Some(10));
    }

    #[test]
    fn operation_sidecar_overrides_patch_the_defaults() {
        let mut agent = agent();
        agent.sidecar = Some(SidecarSettings {
            image: Some("polyaxon/polyaxon-sidecar".to_string()),
            sleep_interval: Some(30),
            ..Default::default()
        });
        let op = CompiledOperation {
            plugins: Some(Plugins {
                sidecar: Some(SidecarSettings {
                    sleep_interval: Some(5),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..job_with_connections(vec![])
        };
        let env = resolve(&op, &agent).unwrap();
        assert_eq!(env.sidecar.sleep_interval, Some(5));
        assert_eq!(
            env.sidecar.image.as_deref(),
            Some("polyaxon/polyaxon-sidecar")
        );
    }
}
