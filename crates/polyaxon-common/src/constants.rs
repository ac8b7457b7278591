//! Well-known names, paths, and environment variable keys shared by the
//! compiler and the agent.

/// API group of the platform Operation CRD
pub const OPERATION_GROUP: &str = "core.polyaxon.com";
/// API version of the platform Operation CRD
pub const OPERATION_VERSION: &str = "v1";
/// Kind of the platform Operation CRD
pub const OPERATION_KIND: &str = "Operation";
/// Plural used for API calls against the Operation CRD
pub const OPERATION_PLURAL: &str = "operations";

/// Name given to the main container when the user leaves it unnamed
pub const MAIN_CONTAINER: &str = "polyaxon-main";
/// Name of the auto-injected sidecar container
pub const SIDECAR_CONTAINER: &str = "polyaxon-sidecar";
/// Prefix for auto-generated init container names
pub const INIT_CONTAINER_PREFIX: &str = "polyaxon-init";

/// Root of the in-pod shared context
pub const CONTEXT_ROOT: &str = "/plx-context";
/// Shared context directory populated for artifacts collection
pub const CONTEXT_ARTIFACTS_ROOT: &str = "/plx-context/artifacts";
/// Mount path of the auth context consumed by init and sidecar containers
pub const CONTEXT_AUTH_ROOT: &str = "/plx-context/auth";
/// Mount path of the docker context
pub const CONTEXT_DOCKER_ROOT: &str = "/plx-context/docker";

/// Volume name backing the shared artifacts context
pub const VOLUME_ARTIFACTS_CONTEXT: &str = "plx-context-artifacts";
/// Volume name backing the auth context
pub const VOLUME_AUTH_CONTEXT: &str = "plx-auth-context";
/// Volume name backing the docker socket mount
pub const VOLUME_DOCKER: &str = "plx-docker";
/// Volume name backing the shared-memory tmpfs
pub const VOLUME_SHM: &str = "plx-shm";
/// Host path of the docker socket
pub const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";
/// Mount path of the shared-memory tmpfs
pub const SHM_MOUNT_PATH: &str = "/dev/shm";

/// Platform API host seen by in-cluster containers
pub const ENV_HOST: &str = "POLYAXON_HOST";
/// Platform API version header value
pub const ENV_API_VERSION: &str = "POLYAXON_API_VERSION";
/// Marks a container as managed by the platform
pub const ENV_IS_MANAGED: &str = "POLYAXON_IS_MANAGED";
/// Fully qualified run instance `owner.project.runs.uuid`
pub const ENV_RUN_INSTANCE: &str = "POLYAXON_RUN_INSTANCE";
/// Namespace the pod runs in
pub const ENV_K8S_NAMESPACE: &str = "POLYAXON_K8S_NAMESPACE";
/// Node name injected via the downward API
pub const ENV_K8S_NODE_NAME: &str = "POLYAXON_K8S_NODE_NAME";
/// Pod name injected via the downward API
pub const ENV_K8S_POD_ID: &str = "POLYAXON_K8S_POD_ID";
/// Auth token sourced from a secret key ref
pub const ENV_AUTH_TOKEN: &str = "POLYAXON_AUTH_TOKEN";
/// Authentication scheme used with the token
pub const ENV_AUTHENTICATION_TYPE: &str = "POLYAXON_AUTHENTICATION_TYPE";
/// Auth header name
pub const ENV_HEADER: &str = "POLYAXON_HEADER";
/// Auth header service value
pub const ENV_HEADER_SERVICE: &str = "POLYAXON_HEADER_SERVICE";
/// Log level forwarded to managed containers
pub const ENV_LOG_LEVEL: &str = "POLYAXON_LOG_LEVEL";
/// App secret key ref
pub const ENV_SECRET_KEY: &str = "POLYAXON_SECRET_KEY";
/// Internal token secret key ref
pub const ENV_SECRET_INTERNAL_TOKEN: &str = "POLYAXON_SECRET_INTERNAL_TOKEN";
/// Container the sidecar monitors
pub const ENV_CONTAINER_ID: &str = "POLYAXON_CONTAINER_ID";
/// Name of the artifacts store connection
pub const ENV_ARTIFACTS_STORE_NAME: &str = "POLYAXON_ARTIFACTS_STORE_NAME";
/// Names of all connections exposed to the container
pub const ENV_CONNECTION_CATALOG: &str = "POLYAXON_CONNECTION_CATALOG";
/// Prefix for per-connection schema env vars
pub const ENV_CONNECTION_PREFIX: &str = "POLYAXON_CONNECTION_";
/// Mount path env var for SSH-kind git credentials
pub const ENV_SSH_PATH: &str = "POLYAXON_SSH_PATH";
/// Artifacts path of the current run
pub const ENV_RUN_ARTIFACTS_PATH: &str = "POLYAXON_RUN_ARTIFACTS_PATH";
/// Outputs path of the current run
pub const ENV_RUN_OUTPUTS_PATH: &str = "POLYAXON_RUN_OUTPUTS_PATH";

/// Label/annotation prefix for operation identity metadata
pub const ANNOTATION_PREFIX: &str = "operation.polyaxon.com";

/// Value of the `app.kubernetes.io/managed-by` recommended label
pub const MANAGED_BY: &str = "polyaxon";
