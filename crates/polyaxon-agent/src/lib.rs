//! Polyaxon Kubernetes agent
//!
//! Registers against the control plane, polls the per-agent state queues,
//! compiles each queued operation into its `core.polyaxon.com/v1 Operation`
//! custom object, and drives it against the Kubernetes API. Per-run status
//! transitions are reported back as signed conditions.

pub mod agent;
pub mod client;
pub mod config;
pub mod executor;
pub mod health;

pub use agent::{Agent, AgentSettings};
pub use client::{PlatformClient, RestPlatformClient};
pub use executor::{KubeExecutor, WorkloadExecutor};
