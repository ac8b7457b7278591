//! CLI and environment configuration for the agent binary

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use polyaxon_common::schemas::AgentConfig;
use polyaxon_common::{Error, Result};
use polyaxon_compiler::ApiSettings;

use crate::agent::AgentSettings;
use crate::health::HealthFile;

/// Polyaxon Kubernetes agent
#[derive(Clone, Debug, Parser)]
#[command(name = "polyaxon-agent", version, about = "Schedules Polyaxon operations on Kubernetes")]
pub struct AgentArgs {
    /// Platform API host, e.g. https://cloud.polyaxon.com
    #[arg(long, env = "POLYAXON_HOST")]
    pub host: String,

    /// Platform API version segment
    #[arg(long, env = "POLYAXON_API_VERSION", default_value = "v1")]
    pub api_version: String,

    /// Organization that owns the agent
    #[arg(long, env = "POLYAXON_AGENT_OWNER")]
    pub owner: String,

    /// Agent uuid assigned by the control plane
    #[arg(long, env = "POLYAXON_AGENT_UUID")]
    pub agent_uuid: String,

    /// Auth token for the platform API
    #[arg(long, env = "POLYAXON_AUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// File the auth token is read from (cleared when credentials are rejected)
    #[arg(long, env = "POLYAXON_AUTH_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Path to a local agent config JSON used until registration completes
    #[arg(long, env = "POLYAXON_AGENT_CONFIG_FILE")]
    pub agent_config_file: Option<PathBuf>,

    /// Upper bound on concurrently dispatched run tasks
    #[arg(long, env = "POLYAXON_AGENT_MAX_PARALLEL", default_value_t = 10)]
    pub max_parallel: usize,

    /// Healthz file touched after every tick
    #[arg(long, env = "POLYAXON_AGENT_HEALTH_FILE")]
    pub health_file: Option<PathBuf>,

    /// Seconds before the health file counts as stale
    #[arg(long, env = "POLYAXON_AGENT_HEALTH_INTERVAL", default_value_t = 60)]
    pub health_interval: u64,
}

impl AgentArgs {
    /// Token from the flag/env, falling back to the token file
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if self.token.is_some() {
            return Ok(self.token.clone());
        }
        match &self.token_file {
            Some(path) => {
                let token = std::fs::read_to_string(path).map_err(|e| {
                    Error::internal("config", format!("failed to read token file: {e}"))
                })?;
                Ok(Some(token.trim().to_string()))
            }
            None => Ok(None),
        }
    }

    /// Local agent config, when one is deployed next to the binary
    pub fn load_agent_config(&self) -> Result<AgentConfig> {
        match &self.agent_config_file {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::internal("config", format!("failed to read agent config: {e}"))
                })?;
                let config: AgentConfig = serde_json::from_str(&content)
                    .map_err(|e| Error::serialization(format!("invalid agent config: {e}")))?;
                config.validate()?;
                Ok(config)
            }
            None => Ok(AgentConfig::default()),
        }
    }

    /// Remove local credentials after the control plane rejects them
    pub fn clear_auth(&self) {
        if let Some(path) = &self.token_file {
            match std::fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), "cleared local auth token"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to clear auth token"),
            }
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            host: self.host.clone(),
            version: self.api_version.clone(),
        }
    }

    pub fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            max_parallel: self.max_parallel,
            health: self.health_file.as_ref().map(|path| {
                HealthFile::new(path, Duration::from_secs(self.health_interval))
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "polyaxon-agent",
            "--host",
            "https://plx.example.com",
            "--owner",
            "acme",
            "--agent-uuid",
            "agent-1",
        ]
    }

    #[test]
    fn defaults_apply_without_optional_flags() {
        let args = AgentArgs::parse_from(base_args());
        assert_eq!(args.api_version, "v1");
        assert_eq!(args.max_parallel, 10);
        assert!(args.token.is_none());
        assert!(args.health_file.is_none());
        assert!(args.agent_settings().health.is_none());
        assert_eq!(args.api_settings().host, "https://plx.example.com");
    }

    #[test]
    fn token_file_wins_when_no_token_flag() {
        let path = std::env::temp_dir().join(format!("plx-token-{}", std::process::id()));
        std::fs::write(&path, "secret-token\n").unwrap();

        let mut argv = base_args();
        let path_str = path.to_str().unwrap().to_string();
        argv.push("--token-file");
        let leaked: &'static str = Box::leak(path_str.into_boxed_str());
        argv.push(leaked);

        let args = AgentArgs::parse_from(argv);
        assert_eq!(args.resolve_token().unwrap().as_deref(), Some("secret-token"));

        args.clear_auth();
        assert!(!path.exists());
    }

    #[test]
    fn missing_agent_config_file_falls_back_to_defaults() {
        let args = AgentArgs::parse_from(base_args());
        let config = args.load_agent_config().unwrap();
        assert!(config.namespace.is_none());
        assert!(config.connections.is_empty());
    }
}
