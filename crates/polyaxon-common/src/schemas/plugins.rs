//! Plugins, termination policy, and sidecar/init container defaults

use k8s_openapi::api::core::v1::ResourceRequirements;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-operation feature toggles.
///
/// Unset toggles fall back to the agent defaults at conversion time.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plugins {
    /// Mount the auth context into init/sidecar/main containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<bool>,

    /// Mount the docker socket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<bool>,

    /// Mount a shared-memory tmpfs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shm: Option<bool>,

    /// Surface the artifacts store's own mount in the pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_artifacts_store: Option<bool>,

    /// Collect stdout/stderr of the main container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_logs: Option<bool>,

    /// Collect artifacts written under the shared context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collect_artifacts: Option<bool>,

    /// Sync statuses through the CRD controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_statuses: Option<bool>,

    /// External platform host override for managed containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_host: Option<bool>,

    /// Sidecar overrides for this operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<SidecarSettings>,

    /// Log level forwarded to managed containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Plugins {
    /// Artifacts collection requested
    pub fn collect_artifacts(&self) -> bool {
        self.collect_artifacts.unwrap_or(false)
    }

    /// Logs collection requested
    pub fn collect_logs(&self) -> bool {
        self.collect_logs.unwrap_or(false)
    }

    /// Auth context requested
    pub fn auth(&self) -> bool {
        self.auth.unwrap_or(false)
    }

    /// Docker socket requested
    pub fn docker(&self) -> bool {
        self.docker.unwrap_or(false)
    }

    /// Shared memory requested
    pub fn shm(&self) -> bool {
        self.shm.unwrap_or(false)
    }

    /// Store mount requested
    pub fn mount_artifacts_store(&self) -> bool {
        self.mount_artifacts_store.unwrap_or(false)
    }

    /// A sidecar is needed iff artifacts or logs are collected
    pub fn needs_sidecar(&self) -> bool {
        self.collect_artifacts() || self.collect_logs()
    }
}

/// Termination policy enforced by the platform controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Termination {
    /// Maximum retries before giving up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i32>,

    /// Active deadline in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,

    /// TTL after completion, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl Termination {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.max_retries.is_none() && self.timeout.is_none() && self.ttl.is_none()
    }
}

/// Sidecar container defaults and overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSettings {
    /// Sidecar image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Sidecar image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// Image pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Seconds the sidecar sleeps between checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_interval: Option<i64>,

    /// Seconds between artifact syncs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<i64>,

    /// Monitor container logs (unset means true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_logs: Option<bool>,

    /// Monitor the operation spec (unset means true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_spec: Option<bool>,

    /// Resource requirements for the sidecar container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl SidecarSettings {
    /// Full image reference, `image:tag` when a tag is set
    pub fn full_image(&self) -> Option<String> {
        let image = self.image.as_ref()?;
        Some(match &self.image_tag {
            Some(tag) if !tag.is_empty() => format!("{}:{}", image, tag),
            _ => image.clone(),
        })
    }

    /// Merge operation-level overrides on top of these defaults
    pub fn patched_with(&self, overrides: &SidecarSettings) -> SidecarSettings {
        SidecarSettings {
            image: overrides.image.clone().or_else(|| self.image.clone()),
            image_tag: overrides.image_tag.clone().or_else(|| self.image_tag.clone()),
            image_pull_policy: overrides
                .image_pull_policy
                .clone()
                .or_else(|| self.image_pull_policy.clone()),
            sleep_interval: overrides.sleep_interval.or(self.sleep_interval),
            sync_interval: overrides.sync_interval.or(self.sync_interval),
            monitor_logs: overrides.monitor_logs.or(self.monitor_logs),
            monitor_spec: overrides.monitor_spec.or(self.monitor_spec),
            resources: overrides.resources.clone().or_else(|| self.resources.clone()),
        }
    }
}

/// Init container defaults
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitSettings {
    /// Init image repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Init image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// Image pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Resource requirements for generated init containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl InitSettings {
    /// Full image reference, `image:tag` when a tag is set
    pub fn full_image(&self) -> Option<String> {
        let image = self.image.as_ref()?;
        Some(match &self.image_tag {
            Some(tag) if !tag.is_empty() => format!("{}:{}", image, tag),
            _ => image.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_needed_when_any_collection_enabled() {
        let plugins = Plugins {
            collect_logs: Some(true),
            ..Default::default()
        };
        assert!(plugins.needs_sidecar());

        let plugins = Plugins {
            collect_artifacts: Some(true),
            ..Default::default()
        };
        assert!(plugins.needs_sidecar());

        assert!(!Plugins::default().needs_sidecar());
    }

    #[test]
    fn sidecar_patch_prefers_operation_overrides() {
        let defaults = SidecarSettings {
            image: Some("polyaxon/polyaxon-sidecar".to_string()),
            image_tag: Some("v1".to_string()),
            sleep_interval: Some(10),
            sync_interval: Some(10),
            ..Default::default()
        };
        let overrides = SidecarSettings {
            sleep_interval: Some(5),
            ..Default::default()
        };

        let merged = defaults.patched_with(&overrides);
        assert_eq!(merged.sleep_interval, Some(5));
        assert_eq!(merged.sync_interval, Some(10));
        assert_eq!(
            merged.full_image().as_deref(),
            Some("polyaxon/polyaxon-sidecar:v1")
        );
    }
}
