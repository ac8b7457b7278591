//! Run lifecycle states and status conditions

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a run as reported to the control plane
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created on the platform, not yet scheduled
    Created,
    /// Resuming a previously stopped run
    Resuming,
    /// Compiled on the control plane
    Compiled,
    /// Waiting in an agent queue
    Queued,
    /// Pods are being scheduled
    Scheduled,
    /// Main container is starting
    Starting,
    /// Main container is running
    Running,
    /// Pods are being processed (pending/init)
    Processing,
    /// Completed successfully
    Succeeded,
    /// Completed with a failure
    Failed,
    /// Uploading outputs
    Upstream,
    /// Retry in progress
    Retrying,
    /// Stop requested
    Stopping,
    /// Stopped
    Stopped,
    /// Skipped by the platform
    Skipped,
    /// Warning state, still progressing
    Warning,
    /// Unschedulable pods
    Unschedulable,
    /// Unknown state
    Unknown,
    /// Terminal bookkeeping state
    Done,
}

impl RunState {
    /// Terminal states the agent never transitions out of
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Stopped | Self::Skipped | Self::Done
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Resuming => "resuming",
            Self::Compiled => "compiled",
            Self::Queued => "queued",
            Self::Scheduled => "scheduled",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Upstream => "upstream",
            Self::Retrying => "retrying",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Skipped => "skipped",
            Self::Warning => "warning",
            Self::Unschedulable => "unschedulable",
            Self::Unknown => "unknown",
            Self::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// One status condition reported with a run state transition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    /// The state this condition reports
    #[serde(rename = "type")]
    pub type_: RunState,

    /// Whether the condition holds
    pub status: bool,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the condition was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl StatusCondition {
    /// New true condition stamped with the current time
    pub fn for_state(
        state: RunState,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: state,
            status: true,
            reason: Some(reason.into()),
            message: Some(message.into()),
            last_transition_time: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunState::Succeeded.is_done());
        assert!(RunState::Failed.is_done());
        assert!(RunState::Stopped.is_done());
        assert!(!RunState::Running.is_done());
        assert!(!RunState::Stopping.is_done());
    }

    #[test]
    fn state_wire_format_is_snake_case() {
        assert_eq!(
            serde_json::to_value(RunState::Unschedulable).unwrap(),
            serde_json::Value::String("unschedulable".to_string())
        );
        let state: RunState = serde_json::from_str("\"stopping\"").unwrap();
        assert_eq!(state, RunState::Stopping);
    }

    #[test]
    fn condition_carries_reason_and_timestamp() {
        let cond = StatusCondition::for_state(RunState::Stopped, "AgentLogic", "workload deleted");
        assert_eq!(cond.type_, RunState::Stopped);
        assert!(cond.status);
        assert!(cond.last_transition_time.is_some());
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["type"], "stopped");
    }
}
