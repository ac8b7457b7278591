//! Environment variable synthesis for managed containers
//!
//! Layering order (last wins): additional kv vars, the fixed base set, the
//! service/auth set, items-from resources, then the user's explicit env.

use k8s_openapi::api::core::v1::{
    ConfigMapEnvSource, ConfigMapKeySelector, EnvFromSource, EnvVar, EnvVarSource,
    ObjectFieldSelector, SecretEnvSource, SecretKeySelector,
};

use polyaxon_common::constants;
use polyaxon_common::schemas::{Connection, ConnectionResource};

use crate::ApiSettings;

/// Proxy variables forwarded when the agent opts operations in
const PROXY_VARS: [&str; 3] = ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"];

/// Plain name/value env var
pub fn env_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// Env var sourced from the downward API
fn downward_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

/// Env var sourced from a secret key
pub fn secret_key_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

/// All env values cross the wire as strings; non-strings are JSON-encoded.
pub fn to_env_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The fixed base set: downward API identity plus optional proxy passthrough
pub fn base_env(namespace: &str, use_proxy: bool) -> Vec<EnvVar> {
    let mut vars = vec![
        downward_env(constants::ENV_K8S_NODE_NAME, "spec.nodeName"),
        downward_env(constants::ENV_K8S_POD_ID, "metadata.name"),
        env_var(constants::ENV_K8S_NAMESPACE, namespace),
    ];
    if use_proxy {
        for proxy in PROXY_VARS {
            if let Ok(value) = std::env::var(proxy) {
                vars.push(env_var(proxy, value.clone()));
                vars.push(env_var(proxy.to_lowercase(), value));
            }
        }
    }
    vars
}

/// The service set authenticating a managed container against the platform.
///
/// `header_service` names the calling surface (runner, sidecar,
/// initializer). The token comes from the agent or app secret; auxiliaries
/// use the internal token key.
pub fn service_env(
    api: &ApiSettings,
    run_instance: &str,
    header_service: &str,
    auth_secret: Option<&str>,
    internal_auth: bool,
    log_level: Option<&str>,
) -> Vec<EnvVar> {
    let mut vars = vec![
        env_var(constants::ENV_HOST, &api.host),
        env_var(constants::ENV_API_VERSION, &api.version),
        env_var(constants::ENV_HEADER, "X-POLYAXON-SERVICE"),
        env_var(constants::ENV_HEADER_SERVICE, header_service),
        env_var(constants::ENV_IS_MANAGED, "true"),
        env_var(constants::ENV_RUN_INSTANCE, run_instance),
    ];
    if let Some(secret) = auth_secret {
        let (auth_type, key) = if internal_auth {
            ("internal_token", constants::ENV_SECRET_INTERNAL_TOKEN)
        } else {
            ("token", constants::ENV_AUTH_TOKEN)
        };
        vars.push(secret_key_env(constants::ENV_AUTH_TOKEN, secret, key));
        vars.push(env_var(constants::ENV_AUTHENTICATION_TYPE, auth_type));
    }
    if let Some(level) = log_level {
        vars.push(env_var(constants::ENV_LOG_LEVEL, level));
    }
    vars
}

/// `POLYAXON_CONNECTION_<NAME>` carrying the connection schema as JSON
pub fn connection_env(connection: &Connection) -> EnvVar {
    env_var(
        format!(
            "{}{}",
            constants::ENV_CONNECTION_PREFIX,
            sanitize_env_name(&connection.name)
        ),
        to_env_string(&connection.schema_json()),
    )
}

/// `POLYAXON_CONNECTION_CATALOG` listing every exposed connection name
pub fn catalog_env(connections: &[&Connection]) -> EnvVar {
    let names: Vec<&str> = connections.iter().map(|c| c.name.as_str()).collect();
    env_var(
        constants::ENV_CONNECTION_CATALOG,
        serde_json::Value::from(names).to_string(),
    )
}

/// Env-from sources for requested resources without a mount path or items
pub fn env_from_resources(
    secrets: &[ConnectionResource],
    config_maps: &[ConnectionResource],
) -> Vec<EnvFromSource> {
    let mut sources = Vec::new();
    for secret in secrets.iter().filter(|r| !r.is_mounted() && r.items.is_empty()) {
        sources.push(EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret.name.clone(),
                optional: None,
            }),
            ..Default::default()
        });
    }
    for config_map in config_maps
        .iter()
        .filter(|r| !r.is_mounted() && r.items.is_empty())
    {
        sources.push(EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: config_map.name.clone(),
                optional: None,
            }),
            ..Default::default()
        });
    }
    sources
}

/// Per-item env vars for resources exposing explicit keys
pub fn items_env(secrets: &[ConnectionResource], config_maps: &[ConnectionResource]) -> Vec<EnvVar> {
    let mut vars = Vec::new();
    for secret in secrets.iter().filter(|r| !r.items.is_empty()) {
        for item in &secret.items {
            vars.push(secret_key_env(item, &secret.name, item));
        }
    }
    for config_map in config_maps.iter().filter(|r| !r.items.is_empty()) {
        for item in &config_map.items {
            vars.push(EnvVar {
                name: item.clone(),
                value: None,
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: config_map.name.clone(),
                        key: item.clone(),
                        optional: None,
                    }),
                    ..Default::default()
                }),
            });
        }
    }
    vars
}

/// Merge env layers; later layers override earlier ones by name while the
/// first occurrence keeps its position.
pub fn merge_env(layers: Vec<Vec<EnvVar>>) -> Vec<EnvVar> {
    let mut merged: Vec<EnvVar> = Vec::new();
    for layer in layers {
        for var in layer {
            match merged.iter_mut().find(|existing| existing.name == var.name) {
                Some(existing) => *existing = var,
                None => merged.push(var),
            }
        }
    }
    merged
}

fn sanitize_env_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
