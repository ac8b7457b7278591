//! Operation CRD assembly
//!
//! Builds the final `core.polyaxon.com/v1 Operation` custom object:
//! recommended labels, operation identity annotations, sanitized metadata
//! maps, and the spec-level setters for termination and collection flags.

use std::collections::BTreeMap;

use polyaxon_common::constants;
use polyaxon_common::schemas::{Notification, Termination};

use crate::RunInfo;

/// Kubernetes label values cap at 63 characters
const MAX_LABEL_LEN: usize = 63;

/// The `app.kubernetes.io/*` recommended labels for one run
pub fn recommended_labels(run: &RunInfo) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            slugify(&run.run_name),
        ),
        (
            "app.kubernetes.io/instance".to_string(),
            run.run_uuid.clone(),
        ),
        (
            "app.kubernetes.io/version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        ),
        (
            "app.kubernetes.io/part-of".to_string(),
            constants::MANAGED_BY.to_string(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            "runs".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            constants::MANAGED_BY.to_string(),
        ),
    ])
}

/// Lowercased, dash-separated, label-safe slug
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    truncate_label(&slug)
}

/// Coerce values to label-safe strings: strip disallowed characters and
/// trim to the Kubernetes length limit.
pub fn sanitize_string_map(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(key, value)| (key.clone(), sanitize_label_value(value)))
        .collect()
}

fn sanitize_label_value(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    truncate_label(cleaned.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
}

fn truncate_label(value: &str) -> String {
    value.chars().take(MAX_LABEL_LEN).collect()
}

/// Builder for the Operation custom object
pub struct OperationResource {
    namespace: String,
    resource_name: String,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    spec: serde_json::Map<String, serde_json::Value>,
}

impl OperationResource {
    pub fn new(run: &RunInfo, namespace: impl Into<String>) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            format!("{}/name", constants::ANNOTATION_PREFIX),
            run.run_name.clone(),
        );
        annotations.insert(
            format!("{}/owner", constants::ANNOTATION_PREFIX),
            run.owner.clone(),
        );
        annotations.insert(
            format!("{}/project", constants::ANNOTATION_PREFIX),
            run.project.clone(),
        );

        Self {
            namespace: namespace.into(),
            resource_name: run.resource_name(),
            labels: recommended_labels(run),
            annotations,
            spec: serde_json::Map::new(),
        }
    }

    /// Record the run kind identity annotation
    pub fn with_kind(mut self, kind: &str) -> Self {
        self.annotations.insert(
            format!("{}/kind", constants::ANNOTATION_PREFIX),
            kind.to_string(),
        );
        self
    }

    /// Merge user labels over the recommended set
    pub fn with_labels(mut self, labels: &BTreeMap<String, String>) -> Self {
        self.labels.extend(labels.clone());
        self
    }

    /// Merge user annotations over the operation set
    pub fn with_annotations(mut self, annotations: &BTreeMap<String, String>) -> Self {
        self.annotations.extend(annotations.clone());
        self
    }

    /// Place the kind-specific spec under its top-level key
    pub fn with_spec_key(mut self, key: &str, value: serde_json::Value) -> Self {
        self.spec.insert(key.to_string(), value);
        self
    }

    /// Layer the termination policy into the spec
    pub fn with_termination(mut self, termination: Option<&Termination>) -> Self {
        if let Some(termination) = termination.filter(|t| !t.is_empty()) {
            self.spec.insert(
                "termination".to_string(),
                serde_json::json!(termination),
            );
        }
        self
    }

    /// Layer the logs-collection flag into the spec
    pub fn with_collect_logs(mut self, collect_logs: bool) -> Self {
        self.spec
            .insert("collectLogs".to_string(), serde_json::json!(collect_logs));
        self
    }

    /// Layer the status-sync flag into the spec
    pub fn with_sync_statuses(mut self, sync_statuses: bool) -> Self {
        self.spec
            .insert("syncStatuses".to_string(), serde_json::json!(sync_statuses));
        self
    }

    /// Layer notifications into the spec
    pub fn with_notifications(mut self, notifications: &[Notification]) -> Self {
        if !notifications.is_empty() {
            self.spec.insert(
                "notifications".to_string(),
                serde_json::json!(notifications),
            );
        }
        self
    }

    /// Assemble the final custom object
    pub fn build(self) -> serde_json::Value {
        serde_json::json!({
            "apiVersion": format!(
                "{}/{}",
                constants::OPERATION_GROUP,
                constants::OPERATION_VERSION
            ),
            "kind": constants::OPERATION_KIND,
            "metadata": {
                "name": self.resource_name,
                "namespace": self.namespace,
                "labels": sanitize_string_map(&self.labels),
                "annotations": self.annotations,
            },
            "spec": serde_json::Value::Object(self.spec),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_info() -> RunInfo {
        RunInfo {
            owner: "acme".to_string(),
            project: "vision".to_string(),
            run_uuid: "uid123".to_string(),
            run_name: "Train ResNet v2".to_string(),
        }
    }

    #[test]
    fn slug_is_label_safe() {
        assert_eq!(slugify("Train ResNet v2"), "train-resnet-v2");
        assert_eq!(slugify("--weird__name--"), "weird-name");
        assert!(slugify(&"x".repeat(100)).len() <= 63);
    }

    #[test]
    fn recommended_labels_identify_the_run() {
        let labels = recommended_labels(&run_info());
        assert_eq!(labels["app.kubernetes.io/instance"], "uid123");
        assert_eq!(labels["app.kubernetes.io/managed-by"], "polyaxon");
        assert_eq!(labels["app.kubernetes.io/name"], "train-resnet-v2");
    }

    #[test]
    fn builder_produces_the_operation_object() {
        let resource = OperationResource::new(&run_info(), "plx")
            .with_kind("job")
            .with_spec_key("jobSpec", serde_json::json!({"replicaSpec": {}}))
            .with_collect_logs(true)
            .with_sync_statuses(false)
            .build();

        assert_eq!(resource["apiVersion"], "core.polyaxon.com/v1");
        assert_eq!(resource["kind"], "Operation");
        assert_eq!(resource["metadata"]["name"], "plx-operation-uid123");
        assert_eq!(resource["metadata"]["namespace"], "plx");
        assert_eq!(
            resource["metadata"]["annotations"]["operation.polyaxon.com/kind"],
            "job"
        );
        assert_eq!(resource["spec"]["collectLogs"], true);
        assert!(resource["spec"]["jobSpec"].is_object());
        assert!(resource["spec"].get("termination").is_none());
    }

    #[test]
    fn termination_is_skipped_when_empty() {
        let resource = OperationResource::new(&run_info(), "plx")
            .with_termination(Some(&Termination::default()))
            .build();
        assert!(resource["spec"].get("termination").is_none());

        let termination = Termination {
            max_retries: Some(3),
            timeout: Some(600),
            ttl: None,
        };
        let resource = OperationResource::new(&run_info(), "plx")
            .with_termination(Some(&termination))
            .build();
        assert_eq!(resource["spec"]["termination"]["maxRetries"], 3);
    }

    #[test]
    fn label_values_are_sanitized() {
        let labels = BTreeMap::from([(
            "team".to_string(),
            "ML Research / Vision!".to_string(),
        )]);
        let sanitized = sanitize_string_map(&labels);
        assert_eq!(sanitized["team"], "MLResearchVision");
    }
}
