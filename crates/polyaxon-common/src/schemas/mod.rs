//! Data model for compiled operations and the agent catalog
//!
//! These types are the JSON boundary between the control plane and the
//! agent: connections and mountable resources, the fully-substituted
//! `CompiledOperation` with its per-kind run union, the agent configuration
//! singleton, and run lifecycle states.

pub mod agent;
pub mod connection;
pub mod init;
pub mod io;
pub mod operation;
pub mod plugins;
pub mod replica;
pub mod resource;
pub mod run;
pub mod status;

pub use agent::AgentConfig;
pub use connection::{Connection, ConnectionKind, ConnectionSchema};
pub use init::{ArtifactsRefs, ArtifactsSelector, DockerfileSpec, InitSpec, TensorboardSpec};
pub use io::RunIo;
pub use operation::{CompiledOperation, Notification};
pub use plugins::{InitSettings, Plugins, SidecarSettings, Termination};
pub use replica::{Environment, ReplicaSpec};
pub use resource::ConnectionResource;
pub use run::{
    DaskJobRun, JobRun, MpiJobRun, MxJobMode, MxJobRun, PaddleJobRun, PytorchJobRun, RayJobRun,
    RayReplica, RunKind, Runtime, ServiceRun, SparkJobRun, SparkReplica, TfJobRun, XgbJobRun,
};
pub use status::{RunState, StatusCondition};
