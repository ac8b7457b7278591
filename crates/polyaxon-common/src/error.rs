//! Error types for the Polyaxon agent runtime
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries contextual information like run kinds, connection
//! names, and underlying causes.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for agent and compiler operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Malformed user description caught during compile
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "run.container.image")
        field: Option<String>,
    },

    /// Operation outside the agent's managed set (namespace or catalog)
    #[error("policy error: {message}")]
    Policy {
        /// Description of the policy violation
        message: String,
    },

    /// Connection names referenced by the operation but absent from the catalog
    #[error("missing connections: [{}]", names.join(", "))]
    MissingConnections {
        /// Every missing connection name, in reference order
        names: Vec<String>,
    },

    /// Internal inconsistency during container synthesis
    #[error("converter error [{kind}]: {message}")]
    Converter {
        /// Description of what failed
        message: String,
        /// Run kind being converted
        kind: String,
    },

    /// Transient or permanent error from the control plane
    #[error("platform error{}: {message}", code.map(|c| format!(" [{c}]")).unwrap_or_default())]
    Platform {
        /// HTTP status code, when the request reached the server
        code: Option<u16>,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "tick", "executor")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a policy error with the given message
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy {
            message: msg.into(),
        }
    }

    /// Create a missing-connections error from the full missing set
    pub fn missing_connections(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::MissingConnections {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a converter error for a specific run kind
    pub fn converter(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Converter {
            message: msg.into(),
            kind: kind.into(),
        }
    }

    /// Create a platform error without a status code (transport failure)
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform {
            code: None,
            message: msg.into(),
        }
    }

    /// Create a platform error with an HTTP status code
    pub fn platform_status(code: u16, msg: impl Into<String>) -> Self {
        Self::Platform {
            code: Some(code),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Compile-time errors (validation, policy, missing connections,
    /// converter, serialization) require a user or config fix and are never
    /// retried. Kubernetes and platform errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout, 5xx).
                // Don't retry on 4xx errors (validation, not found, conflict).
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::Policy { .. } => false,
            Error::MissingConnections { .. } => false,
            Error::Converter { .. } => false,
            Error::Platform { code, .. } => match code {
                Some(c) => *c >= 500,
                None => true,
            },
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Check if this error is a Kubernetes 404, meaning the workload vanished
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// Check if this error is a Kubernetes 409, meaning apply should become patch
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 409)
    }

    /// Check if the control plane rejected our credentials
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Error::Platform { code: Some(403), .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> Error {
        Error::Kube {
            source: kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "err".to_string(),
                reason: "err".to_string(),
                code,
            }),
        }
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = Error::validation("unknown run kind");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("validation error"));

        let err = Error::validation_for_field("run.container.image", "image is required");
        match &err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("run.container.image"));
            }
            _ => panic!("expected Validation variant"),
        }
    }

    #[test]
    fn policy_errors_surface_the_namespace() {
        let err = Error::policy("namespace 'other' is not managed by this agent");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not managed"));
    }

    #[test]
    fn missing_connections_list_every_name() {
        let err = Error::missing_connections(["gcs-store", "repo-creds"]);
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("gcs-store"));
        assert!(msg.contains("repo-creds"));
    }

    #[test]
    fn converter_errors_carry_the_run_kind() {
        let err = Error::converter("tfjob", "sidecar required for artifacts collection");
        assert!(err.to_string().contains("[tfjob]"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn kube_404_is_not_found_and_not_retryable() {
        let err = api_error(404);
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn kube_409_is_conflict() {
        let err = api_error(409);
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn kube_5xx_is_retryable() {
        assert!(api_error(503).is_retryable());
    }

    #[test]
    fn platform_errors_classify_by_status() {
        assert!(Error::platform("connection reset").is_retryable());
        assert!(Error::platform_status(502, "bad gateway").is_retryable());
        assert!(!Error::platform_status(422, "bad payload").is_retryable());
        assert!(Error::platform_status(403, "forbidden").is_auth_rejected());
        assert!(!Error::platform_status(401, "unauthorized").is_auth_rejected());
    }

    #[test]
    fn internal_errors_are_retryable() {
        let err = Error::internal("tick", "unexpected state");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("[tick]"));
    }
}
