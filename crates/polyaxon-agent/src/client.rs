//! HTTP client for the control plane
//!
//! The agent talks to the platform over a small REST surface: its own
//! descriptor, the per-agent state queues, keepalive crons, data collection,
//! and status reporting for agents and runs. The surface is behind a trait so
//! the tick loop can be exercised against a mock.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use polyaxon_common::schemas::{AgentConfig, StatusCondition};
use polyaxon_common::{Error, Result};
use polyaxon_compiler::RunInfo;

/// Agent live state at or above which the control plane considers it usable
pub const LIVE_STATE_LIVE: i32 = 1;

/// Agent status string that blocks registration
pub const AGENT_STOPPED: &str = "stopped";

/// One run entry in a state bucket.
///
/// The wire format is a tuple `[owner, project, run_uuid, run_name, content]`
/// where status-only operations truncate after the uuid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunItem {
    pub owner: String,
    pub project: String,
    pub run_uuid: String,
    pub run_name: Option<String>,
    pub content: Option<String>,
}

impl RunItem {
    /// Identity of this run as the compiler expects it
    pub fn run_info(&self) -> RunInfo {
        RunInfo {
            owner: self.owner.clone(),
            project: self.project.clone(),
            run_uuid: self.run_uuid.clone(),
            run_name: self.run_name.clone().unwrap_or_default(),
        }
    }
}

impl<'de> Deserialize<'de> for RunItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ItemVisitor;

        impl<'de> Visitor<'de> for ItemVisitor {
            type Value = RunItem;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a run tuple [owner, project, uuid, name?, content?]")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<RunItem, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let owner = seq
                    .next_element::<String>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let project = seq
                    .next_element::<String>()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let run_uuid = seq
                    .next_element::<String>()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                let run_name = seq.next_element::<Option<String>>()?.flatten();
                let content = seq.next_element::<Option<String>>()?.flatten();
                Ok(RunItem {
                    owner,
                    project,
                    run_uuid,
                    run_name,
                    content,
                })
            }
        }

        deserializer.deserialize_seq(ItemVisitor)
    }
}

impl Serialize for RunItem {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(5))?;
        seq.serialize_element(&self.owner)?;
        seq.serialize_element(&self.project)?;
        seq.serialize_element(&self.run_uuid)?;
        seq.serialize_element(&self.run_name)?;
        seq.serialize_element(&self.content)?;
        seq.end()
    }
}

/// Per-agent state buckets pulled once per tick
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AgentState {
    #[serde(default)]
    pub queued: Vec<RunItem>,
    #[serde(default)]
    pub created: Vec<RunItem>,
    #[serde(default)]
    pub resuming: Vec<RunItem>,
    #[serde(default)]
    pub stopping: Vec<RunItem>,
    #[serde(default)]
    pub apply: Vec<RunItem>,
    #[serde(default)]
    pub checking: Vec<RunItem>,
    #[serde(default)]
    pub deleting: Vec<RunItem>,
    #[serde(default)]
    pub hooks: Vec<RunItem>,
    #[serde(default)]
    pub watchdog: Vec<RunItem>,
    #[serde(default)]
    pub tuning: Vec<RunItem>,
}

impl AgentState {
    /// True when no bucket has work
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
            && self.created.is_empty()
            && self.resuming.is_empty()
            && self.stopping.is_empty()
            && self.apply.is_empty()
            && self.checking.is_empty()
            && self.deleting.is_empty()
            && self.hooks.is_empty()
            && self.watchdog.is_empty()
            && self.tuning.is_empty()
    }
}

/// The agent's own descriptor as the control plane sees it
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AgentDescriptor {
    /// Lifecycle status string (`stopped` blocks registration)
    #[serde(default)]
    pub status: Option<String>,
    /// Liveness gate; below [`LIVE_STATE_LIVE`] the agent must wait
    #[serde(default)]
    pub live_state: Option<i32>,
    /// Serialized [`AgentConfig`] deployed for this agent
    #[serde(default)]
    pub content: Option<String>,
}

/// State response: the buckets plus any compatible config updates
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AgentStateResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub live_state: Option<i32>,
    /// Server-side patches to sidecar/init/connections settings
    #[serde(default)]
    pub compatible_updates: Option<AgentConfig>,
    #[serde(default)]
    pub state: AgentState,
}

/// Control plane operations the agent depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch the agent's own descriptor
    async fn get_agent(&self) -> Result<AgentDescriptor>;

    /// Pull the per-agent state buckets
    async fn get_agent_state(&self) -> Result<AgentStateResponse>;

    /// Push the agent config back after applying compatible updates
    async fn sync_agent(&self, config: &AgentConfig) -> Result<()>;

    /// Ask the control plane to requeue anything the agent may have missed
    async fn reconcile_agent(&self) -> Result<()>;

    /// Keepalive cron call, once per tick
    async fn cron_agent(&self) -> Result<()>;

    /// Push cluster and version summaries
    async fn collect_agent_data(&self) -> Result<()>;

    /// Report an agent-level status condition
    async fn create_agent_status(&self, condition: &StatusCondition) -> Result<()>;

    /// Report a run-level status condition
    async fn create_run_status(
        &self,
        owner: &str,
        project: &str,
        run_uuid: &str,
        condition: &StatusCondition,
    ) -> Result<()>;
}

/// REST implementation of [`PlatformClient`] over reqwest
pub struct RestPlatformClient {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    agent_uuid: String,
    token: Option<String>,
}

impl RestPlatformClient {
    /// Client timeout for every platform request
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

    pub fn new(
        host: impl Into<String>,
        owner: impl Into<String>,
        agent_uuid: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::platform(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: host.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            agent_uuid: agent_uuid.into(),
            token,
        })
    }

    fn agent_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/orgs/{}/agents/{}{}",
            self.base_url, self.owner, self.agent_uuid, suffix
        )
    }

    fn run_url(&self, owner: &str, project: &str, run_uuid: &str, suffix: &str) -> String {
        format!(
            "{}/api/v1/{}/{}/runs/{}{}",
            self.base_url, owner, project, run_uuid, suffix
        )
    }

    async fn request(
        &self,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        debug!(method = %method, url = %url, "platform request");
        let mut builder = self.http.request(method, &url);
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("token {token}"));
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::platform(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::platform_status(status.as_u16(), message));
        }
        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| Error::serialization(e.to_string()))
    }
}

#[async_trait]
impl PlatformClient for RestPlatformClient {
    async fn get_agent(&self) -> Result<AgentDescriptor> {
        let response = self
            .request(Method::GET, self.agent_url(""), None)
            .await?;
        Self::json(response).await
    }

    async fn get_agent_state(&self) -> Result<AgentStateResponse> {
        let response = self
            .request(Method::GET, self.agent_url("/state"), None)
            .await?;
        Self::json(response).await
    }

    async fn sync_agent(&self, config: &AgentConfig) -> Result<()> {
        let body = serde_json::to_value(config)
            .map_err(|e| Error::serialization(e.to_string()))?;
        self.request(Method::PATCH, self.agent_url("/sync"), Some(body))
            .await?;
        Ok(())
    }

    async fn reconcile_agent(&self) -> Result<()> {
        self.request(
            Method::PATCH,
            self.agent_url("/reconcile"),
            Some(serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    async fn cron_agent(&self) -> Result<()> {
        self.request(
            Method::POST,
            self.agent_url("/cron"),
            Some(serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    async fn collect_agent_data(&self) -> Result<()> {
        self.request(
            Method::POST,
            self.agent_url("/collect"),
            Some(serde_json::json!({})),
        )
        .await?;
        Ok(())
    }

    async fn create_agent_status(&self, condition: &StatusCondition) -> Result<()> {
        let body = serde_json::json!({ "condition": condition });
        self.request(Method::POST, self.agent_url("/statuses"), Some(body))
            .await?;
        Ok(())
    }

    async fn create_run_status(
        &self,
        owner: &str,
        project: &str,
        run_uuid: &str,
        condition: &StatusCondition,
    ) -> Result<()> {
        let body = serde_json::json!({ "condition": condition });
        self.request(
            Method::POST,
            self.run_url(owner, project, run_uuid, "/statuses"),
            Some(body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_items_deserialize_from_full_tuples() {
        let json = r#"["acme", "vision", "uuid-1", "train-v2", "{\"run\": {}}"]"#;
        let item: RunItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.owner, "acme");
        assert_eq!(item.project, "vision");
        assert_eq!(item.run_uuid, "uuid-1");
        assert_eq!(item.run_name.as_deref(), Some("train-v2"));
        assert!(item.content.is_some());
        assert_eq!(item.run_info().run_instance(), "acme.vision.runs.uuid-1");
    }

    #[test]
    fn run_items_deserialize_from_status_only_tuples() {
        let json = r#"["acme", "vision", "uuid-2"]"#;
        let item: RunItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.run_uuid, "uuid-2");
        assert!(item.run_name.is_none());
        assert!(item.content.is_none());
    }

    #[test]
    fn run_items_round_trip_through_the_tuple_shape() {
        let item = RunItem {
            owner: "o".into(),
            project: "p".into(),
            run_uuid: "u".into(),
            run_name: None,
            content: Some("{}".into()),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert!(value.is_array());
        let back: RunItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn state_buckets_default_to_empty() {
        let response: AgentStateResponse = serde_json::from_str(
            r#"{"state": {"queued": [["o", "p", "u", "n", "{}"]]}}"#,
        )
        .unwrap();
        assert!(!response.state.is_empty());
        assert_eq!(response.state.queued.len(), 1);
        assert!(response.state.stopping.is_empty());
        assert!(response.compatible_updates.is_none());

        let empty: AgentStateResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.state.is_empty());
    }

    #[test]
    fn urls_target_the_agent_and_run_surfaces() {
        let client =
            RestPlatformClient::new("https://plx.example.com/", "acme", "agent-1", None).unwrap();
        assert_eq!(
            client.agent_url("/state"),
            "https://plx.example.com/api/v1/orgs/acme/agents/agent-1/state"
        );
        assert_eq!(
            client.run_url("acme", "vision", "u1", "/statuses"),
            "https://plx.example.com/api/v1/acme/vision/runs/u1/statuses"
        );
    }
}
