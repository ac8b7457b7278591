//! Agent tick loop
//!
//! One cooperative scheduler: register against the control plane, then once
//! per tick send the cron keepalive, collect data on its cadence, apply
//! compatible config updates, pull the state buckets, and dispatch every run
//! with bounded parallelism. Partial failures become run status conditions
//! and never abort the tick.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use polyaxon_common::retry::{retry_linear, retry_with_backoff, RetryConfig};
use polyaxon_common::schemas::{AgentConfig, CompiledOperation, RunState, StatusCondition};
use polyaxon_common::{Error, Result};
use polyaxon_compiler::{compile_operation, ApiSettings, CompiledResource};

use crate::client::{AgentState, PlatformClient, RunItem, AGENT_STOPPED, LIVE_STATE_LIVE};
use crate::executor::WorkloadExecutor;
use crate::health::HealthFile;

/// Wait before re-checking a stopped agent descriptor
const SLEEP_AGENT_STOPPED: Duration = Duration::from_secs(5 * 60);
/// Wait before re-checking an agent that is not yet live
const SLEEP_AGENT_NOT_LIVE: Duration = Duration::from_secs(60 * 60);
/// Delete retry attempts for stop operations
const STOP_MAX_ATTEMPTS: u32 = 3;
/// Linear step between delete retries (0s, 2s, 4s sleeps)
const STOP_RETRY_STEP: Duration = Duration::from_secs(2);

/// Tick cadences and dispatch limits
#[derive(Clone, Debug)]
pub struct AgentSettings {
    /// Tick interval before registration succeeds
    pub tick_interval_unregistered: Duration,
    /// Tick interval once registered
    pub tick_interval_registered: Duration,
    /// How often cluster/version summaries are pushed
    pub data_collect_interval: Duration,
    /// Upper bound on concurrently dispatched run tasks
    pub max_parallel: usize,
    /// Health file touched after every tick, when enabled
    pub health: Option<HealthFile>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            tick_interval_unregistered: Duration::from_secs(4),
            tick_interval_registered: Duration::from_secs(6),
            data_collect_interval: Duration::from_secs(30 * 60),
            max_parallel: 10,
            health: None,
        }
    }
}

/// The agent: platform client, cluster executor, and the config they share.
///
/// The config is mutated only while applying compatible updates; dispatch
/// reads the snapshot taken at tick start.
pub struct Agent<C, E> {
    client: C,
    executor: E,
    config: AgentConfig,
    api: ApiSettings,
    settings: AgentSettings,
    registered: bool,
    last_collect: Option<Instant>,
}

impl<C: PlatformClient, E: WorkloadExecutor> Agent<C, E> {
    pub fn new(
        client: C,
        executor: E,
        config: AgentConfig,
        api: ApiSettings,
        settings: AgentSettings,
    ) -> Self {
        Self {
            client,
            executor,
            config,
            api,
            settings,
            registered: false,
            last_collect: None,
        }
    }

    /// Drive the agent until the token is cancelled.
    ///
    /// Returns an error only on registration failure or when the control
    /// plane rejects the agent's credentials; everything else is absorbed
    /// into per-run conditions and log lines. Every error exit is preceded
    /// by a best-effort `WARNING` condition.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        match self.run_loop(&shutdown).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let condition = StatusCondition::for_state(
                    RunState::Warning,
                    "AgentExit",
                    format!("agent exiting: {e}"),
                );
                if let Err(err) = self.client.create_agent_status(&condition).await {
                    warn!(error = %err, "failed to report exit condition");
                }
                Err(e)
            }
        }
    }

    async fn run_loop(&mut self, shutdown: &CancellationToken) -> Result<()> {
        if !self.register(shutdown).await? {
            return Ok(());
        }
        if let Err(e) = self.client.reconcile_agent().await {
            warn!(error = %e, "reconcile request failed");
        }

        loop {
            let interval = self.tick_interval();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, draining");
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }

            if let Err(e) = self.tick().await {
                if e.is_auth_rejected() {
                    return Err(e);
                }
                error!(error = %e, "tick failed, keeping the agent alive");
            }

            if let Some(health) = &self.settings.health {
                if let Err(e) = health.touch() {
                    warn!(error = %e, "failed to touch health file");
                }
            }
        }
    }

    fn tick_interval(&self) -> Duration {
        if self.registered {
            self.settings.tick_interval_registered
        } else {
            self.settings.tick_interval_unregistered
        }
    }

    /// Gate on the agent descriptor until the control plane lets us in.
    ///
    /// A stopped agent re-checks every 5 minutes, a not-yet-live one every
    /// hour. Returns false when shutdown wins the wait.
    async fn register(&mut self, shutdown: &CancellationToken) -> Result<bool> {
        loop {
            let descriptor = retry_with_backoff(&RetryConfig::default(), "get agent", || {
                self.client.get_agent()
            })
            .await?;

            if descriptor.status.as_deref() == Some(AGENT_STOPPED) {
                warn!("agent is marked stopped, waiting before re-checking");
                if wait_or_cancel(shutdown, SLEEP_AGENT_STOPPED).await {
                    return Ok(false);
                }
                continue;
            }
            if descriptor.live_state.unwrap_or(0) < LIVE_STATE_LIVE {
                warn!(
                    live_state = descriptor.live_state.unwrap_or(0),
                    "agent is not live, waiting before re-checking"
                );
                if wait_or_cancel(shutdown, SLEEP_AGENT_NOT_LIVE).await {
                    return Ok(false);
                }
                continue;
            }

            if let Some(content) = descriptor.content.as_deref() {
                let config: AgentConfig = serde_json::from_str(content)
                    .map_err(|e| Error::serialization(format!("invalid agent config: {e}")))?;
                config.validate()?;
                self.config = config;
            }

            let condition = StatusCondition::for_state(
                RunState::Running,
                "AgentRegistered",
                "agent connected and polling",
            );
            self.client.create_agent_status(&condition).await?;
            self.registered = true;
            info!("agent registered");
            return Ok(true);
        }
    }

    /// One tick: keepalive, data collection, compatible updates, dispatch
    async fn tick(&mut self) -> Result<()> {
        if let Err(e) = self.client.cron_agent().await {
            if e.is_auth_rejected() {
                return Err(e);
            }
            warn!(error = %e, "cron keepalive failed");
        }

        let collect_due = self
            .last_collect
            .map(|at| at.elapsed() >= self.settings.data_collect_interval)
            .unwrap_or(true);
        if collect_due {
            match self.client.collect_agent_data().await {
                Ok(()) => self.last_collect = Some(Instant::now()),
                Err(e) => {
                    if e.is_auth_rejected() {
                        return Err(e);
                    }
                    warn!(error = %e, "data collection failed");
                }
            }
        }

        let response = match self.client.get_agent_state().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_auth_rejected() {
                    return Err(e);
                }
                warn!(error = %e, "state pull failed, skipping tick");
                return Ok(());
            }
        };

        if let Some(updates) = response.compatible_updates {
            self.sync_compatible_updates(updates).await;
        }

        if !response.state.is_empty() {
            self.dispatch(&response.state).await;
        }
        Ok(())
    }

    /// Merge server-provided sidecar/init/connections patches and push the
    /// resulting config back. This is the only place the config mutates.
    async fn sync_compatible_updates(&mut self, updates: AgentConfig) {
        let mut candidate = self.config.clone();
        if updates.sidecar.is_some() {
            candidate.sidecar = updates.sidecar;
        }
        if updates.init.is_some() {
            candidate.init = updates.init;
        }
        if !updates.connections.is_empty() {
            candidate.connections = updates.connections;
        }
        if updates.artifacts_store.is_some() {
            candidate.artifacts_store = updates.artifacts_store;
        }
        if let Err(e) = candidate.validate() {
            warn!(error = %e, "rejecting compatible updates");
            return;
        }
        self.config = candidate;
        if let Err(e) = self.client.sync_agent(&self.config).await {
            warn!(error = %e, "failed to push synced config");
        }
    }

    /// Fan the buckets out into bounded-parallel tasks
    async fn dispatch(&self, state: &AgentState) {
        let mut tasks: Vec<BoxFuture<'_, ()>> = Vec::new();
        for item in state.queued.iter().chain(state.created.iter()) {
            tasks.push(self.submit(item, RunState::Scheduled).boxed());
        }
        for item in &state.resuming {
            tasks.push(self.submit(item, RunState::Running).boxed());
        }
        for item in &state.apply {
            tasks.push(self.apply_update(item).boxed());
        }
        for item in state.stopping.iter().chain(state.deleting.iter()) {
            tasks.push(self.stop(item).boxed());
        }
        for item in &state.checking {
            tasks.push(self.check(item).boxed());
        }
        for item in state
            .hooks
            .iter()
            .chain(state.watchdog.iter())
            .chain(state.tuning.iter())
        {
            tasks.push(self.auxiliary(item).boxed());
        }

        debug!(tasks = tasks.len(), "dispatching state buckets");
        futures::stream::iter(tasks)
            .buffer_unordered(self.settings.max_parallel.max(1))
            .collect::<Vec<()>>()
            .await;
    }

    fn compile(&self, item: &RunItem) -> Result<CompiledResource> {
        let content = item
            .content
            .as_deref()
            .ok_or_else(|| Error::validation("operation content is missing"))?;
        let operation: CompiledOperation = serde_json::from_str(content)
            .map_err(|e| Error::serialization(format!("invalid operation content: {e}")))?;
        compile_operation(&item.run_info(), &operation, &self.config, &self.api)
    }

    /// Namespace a status-only operation targets; falls back to the default
    /// when the content is absent or names a namespace we do not manage.
    fn target_namespace(&self, item: &RunItem) -> String {
        let requested = item
            .content
            .as_deref()
            .and_then(|c| serde_json::from_str::<CompiledOperation>(c).ok())
            .and_then(|op| op.namespace);
        self.config
            .resolve_namespace(requested.as_deref())
            .unwrap_or_else(|_| {
                self.config
                    .namespace
                    .clone()
                    .unwrap_or_else(|| "polyaxon".to_string())
            })
    }

    /// queued/created/resuming: compile, apply, and report
    async fn submit(&self, item: &RunItem, on_success: RunState) {
        match self.compile(item) {
            Ok(compiled) => match self.executor.apply(&compiled).await {
                Ok(()) => {
                    self.report(
                        item,
                        StatusCondition::for_state(
                            on_success,
                            "AgentScheduled",
                            format!("operation applied in namespace {}", compiled.namespace),
                        ),
                    )
                    .await;
                }
                Err(e) if e.is_not_found() => {
                    self.report(
                        item,
                        StatusCondition::for_state(
                            RunState::Stopped,
                            "AgentStopped",
                            "workload target vanished",
                        ),
                    )
                    .await;
                }
                Err(e) => {
                    self.report(
                        item,
                        StatusCondition::for_state(RunState::Failed, "AgentFailed", e.to_string()),
                    )
                    .await;
                }
            },
            Err(e) => {
                self.report(
                    item,
                    StatusCondition::for_state(
                        RunState::Failed,
                        "AgentCompileFailed",
                        e.to_string(),
                    ),
                )
                .await;
            }
        }
    }

    /// apply: patch the existing object with a recomputed spec
    async fn apply_update(&self, item: &RunItem) {
        let name = item.run_info().resource_name();
        match self.compile(item) {
            Ok(compiled) => match self.executor.patch(&name, &compiled).await {
                Ok(()) => debug!(run = %item.run_uuid, "operation patched"),
                Err(e) if e.is_not_found() => {
                    self.report(
                        item,
                        StatusCondition::for_state(
                            RunState::Stopped,
                            "AgentStopped",
                            "workload vanished before patch",
                        ),
                    )
                    .await;
                }
                Err(e) => {
                    self.report(
                        item,
                        StatusCondition::for_state(RunState::Failed, "AgentFailed", e.to_string()),
                    )
                    .await;
                }
            },
            Err(e) => {
                self.report(
                    item,
                    StatusCondition::for_state(
                        RunState::Failed,
                        "AgentCompileFailed",
                        e.to_string(),
                    ),
                )
                .await;
            }
        }
    }

    /// stopping/deleting: capture final logs, then delete with the linear
    /// retry policy
    async fn stop(&self, item: &RunItem) {
        let name = item.run_info().resource_name();
        let namespace = self.target_namespace(item);
        self.collect_final_logs(item, &namespace).await;
        let outcome = retry_linear(STOP_MAX_ATTEMPTS, STOP_RETRY_STEP, "delete operation", || {
            self.executor.delete(&name, &namespace)
        })
        .await;
        match outcome {
            Ok(()) => {
                self.report(
                    item,
                    StatusCondition::for_state(
                        RunState::Stopped,
                        "AgentStopped",
                        "workload deleted",
                    ),
                )
                .await;
            }
            Err(e) => {
                self.report(
                    item,
                    StatusCondition::for_state(RunState::Failed, "AgentFailed", e.to_string()),
                )
                .await;
            }
        }
    }

    /// Read the main container logs before the workload is torn down, when
    /// the run opted into log collection. Best-effort: the pods may already
    /// be gone.
    async fn collect_final_logs(&self, item: &RunItem, namespace: &str) {
        let wants_logs = item
            .content
            .as_deref()
            .and_then(|c| serde_json::from_str::<CompiledOperation>(c).ok())
            .map(|op| op.plugins().collect_logs())
            .unwrap_or(false);
        if !wants_logs {
            return;
        }
        match self.executor.logs(&item.run_uuid, namespace).await {
            Ok(logs) if !logs.is_empty() => {
                info!(
                    run = %item.run_uuid,
                    lines = logs.lines().count(),
                    "captured final logs before teardown"
                );
            }
            Ok(_) => debug!(run = %item.run_uuid, "no final logs to capture"),
            Err(e) => warn!(run = %item.run_uuid, error = %e, "failed to capture final logs"),
        }
    }

    /// checking: report stopped when the object is gone, otherwise no-op
    async fn check(&self, item: &RunItem) {
        let name = item.run_info().resource_name();
        let namespace = self.target_namespace(item);
        match self.executor.exists(&name, &namespace).await {
            Ok(true) => {}
            Ok(false) => {
                self.report(
                    item,
                    StatusCondition::for_state(
                        RunState::Stopped,
                        "AgentStopped",
                        "workload no longer exists",
                    ),
                )
                .await;
            }
            Err(e) => warn!(run = %item.run_uuid, error = %e, "check failed"),
        }
    }

    /// hooks/watchdog/tuning: schedule the auxiliary operation, log failures.
    /// The parent run is terminal, so no run status is pushed.
    async fn auxiliary(&self, item: &RunItem) {
        match self.compile(item) {
            Ok(compiled) => {
                if let Err(e) = self.executor.apply(&compiled).await {
                    warn!(run = %item.run_uuid, error = %e, "auxiliary operation failed");
                }
            }
            Err(e) => {
                warn!(run = %item.run_uuid, error = %e, "auxiliary operation did not compile");
            }
        }
    }

    async fn report(&self, item: &RunItem, condition: StatusCondition) {
        if let Err(e) = self
            .client
            .create_run_status(&item.owner, &item.project, &item.run_uuid, &condition)
            .await
        {
            warn!(run = %item.run_uuid, error = %e, "failed to report run status");
        }
    }
}

/// Sleep unless shutdown wins; true when cancelled
async fn wait_or_cancel(shutdown: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::client::{AgentDescriptor, MockPlatformClient};
    use crate::executor::MockWorkloadExecutor;

    fn kube_error(code: u16) -> Error {
        Error::Kube {
            source: kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "err".to_string(),
                reason: "err".to_string(),
                code,
            }),
        }
    }

    fn job_content() -> String {
        serde_json::json!({
            "run": {
                "kind": "job",
                "container": {"name": "polyaxon-main", "image": "alpine"}
            }
        })
        .to_string()
    }

    fn run_item(content: Option<String>) -> RunItem {
        RunItem {
            owner: "acme".to_string(),
            project: "vision".to_string(),
            run_uuid: "u1".to_string(),
            run_name: Some("train".to_string()),
            content,
        }
    }

    fn agent(client: MockPlatformClient, executor: MockWorkloadExecutor) -> Agent<MockPlatformClient, MockWorkloadExecutor> {
        Agent::new(
            client,
            executor,
            AgentConfig::default(),
            ApiSettings::default(),
            AgentSettings::default(),
        )
    }

    fn expect_condition(client: &mut MockPlatformClient, state: RunState) {
        client
            .expect_create_run_status()
            .withf(move |owner, project, uuid, condition| {
                owner == "acme" && project == "vision" && uuid == "u1" && condition.type_ == state
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn registration_waits_while_the_agent_is_stopped() {
        let mut client = MockPlatformClient::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        client.expect_get_agent().returning(move || {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(AgentDescriptor {
                    status: Some("stopped".to_string()),
                    live_state: Some(1),
                    content: None,
                })
            } else {
                Ok(AgentDescriptor {
                    status: Some("running".to_string()),
                    live_state: Some(1),
                    content: None,
                })
            }
        });
        client
            .expect_create_agent_status()
            .withf(|condition| condition.type_ == RunState::Running)
            .times(1)
            .returning(|_| Ok(()));

        let mut agent = agent(client, MockWorkloadExecutor::new());
        let start = Instant::now();
        let registered = agent.register(&CancellationToken::new()).await.unwrap();

        assert!(registered);
        assert!(agent.registered);
        assert_eq!(start.elapsed(), SLEEP_AGENT_STOPPED);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn registration_adopts_the_deployed_config() {
        let content = serde_json::json!({"namespace": "plx-runs"}).to_string();
        let mut client = MockPlatformClient::new();
        client.expect_get_agent().returning(move || {
            Ok(AgentDescriptor {
                status: None,
                live_state: Some(1),
                content: Some(content.clone()),
            })
        });
        client
            .expect_create_agent_status()
            .returning(|_| Ok(()));

        let mut agent = agent(client, MockWorkloadExecutor::new());
        agent.register(&CancellationToken::new()).await.unwrap();
        assert_eq!(agent.config.namespace.as_deref(), Some("plx-runs"));
    }

    #[tokio::test]
    async fn invalid_deployed_config_exits_with_a_warning_condition() {
        let mut client = MockPlatformClient::new();
        client.expect_get_agent().returning(|| {
            Ok(AgentDescriptor {
                status: None,
                live_state: Some(1),
                content: Some("not json".to_string()),
            })
        });
        client
            .expect_create_agent_status()
            .withf(|condition| condition.type_ == RunState::Warning)
            .times(1)
            .returning(|_| Ok(()));

        let mut agent = agent(client, MockWorkloadExecutor::new());
        let result = agent.run(CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn queued_runs_are_compiled_and_scheduled() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Scheduled);
        let mut executor = MockWorkloadExecutor::new();
        executor.expect_apply().times(1).returning(|_| Ok(()));

        let agent = agent(client, executor);
        let state = AgentState {
            queued: vec![run_item(Some(job_content()))],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn resuming_runs_report_running_on_apply() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Running);
        let mut executor = MockWorkloadExecutor::new();
        executor.expect_apply().times(1).returning(|_| Ok(()));

        let agent = agent(client, executor);
        let state = AgentState {
            resuming: vec![run_item(Some(job_content()))],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn malformed_content_reports_failed_without_touching_the_cluster() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Failed);

        let agent = agent(client, MockWorkloadExecutor::new());
        let state = AgentState {
            queued: vec![run_item(Some("not json".to_string()))],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn missing_content_reports_failed() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Failed);

        let agent = agent(client, MockWorkloadExecutor::new());
        let state = AgentState {
            queued: vec![run_item(None)],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn vanished_workload_reports_stopped_on_apply() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Stopped);
        let mut executor = MockWorkloadExecutor::new();
        executor
            .expect_patch()
            .times(1)
            .returning(|_, _| Err(kube_error(404)));

        let agent = agent(client, executor);
        let state = AgentState {
            apply: vec![run_item(Some(job_content()))],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_retries_three_times_then_reports_stopped() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Stopped);
        let mut executor = MockWorkloadExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        executor.expect_delete().returning(move |name, namespace| {
            assert_eq!(name, "plx-operation-u1");
            assert_eq!(namespace, "polyaxon");
            if c.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::platform("transient"))
            } else {
                Ok(())
            }
        });

        let agent = agent(client, executor);
        let state = AgentState {
            stopping: vec![run_item(None)],
            ..Default::default()
        };
        let start = Instant::now();
        agent.dispatch(&state).await;

        // Sleeps 2s before the second call and 4s before the third.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_gives_up_after_three_attempts_and_reports_failed() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Failed);
        let mut executor = MockWorkloadExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        executor.expect_delete().returning(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Err(Error::platform("still failing"))
        });

        let agent = agent(client, executor);
        let state = AgentState {
            stopping: vec![run_item(None)],
            ..Default::default()
        };
        agent.dispatch(&state).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stopping_runs_with_log_collection_capture_final_logs() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Stopped);
        let mut executor = MockWorkloadExecutor::new();
        executor
            .expect_logs()
            .withf(|uuid, namespace| uuid == "u1" && namespace == "polyaxon")
            .times(1)
            .returning(|_, _| Ok("step 1\nstep 2\n".to_string()));
        executor.expect_delete().times(1).returning(|_, _| Ok(()));

        let content = serde_json::json!({
            "plugins": {"collectLogs": true},
            "run": {
                "kind": "job",
                "container": {"name": "polyaxon-main", "image": "alpine"}
            }
        })
        .to_string();
        let agent = agent(client, executor);
        let state = AgentState {
            stopping: vec![run_item(Some(content))],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn checking_a_missing_workload_reports_stopped() {
        let mut client = MockPlatformClient::new();
        expect_condition(&mut client, RunState::Stopped);
        let mut executor = MockWorkloadExecutor::new();
        executor.expect_exists().times(1).returning(|_, _| Ok(false));

        let agent = agent(client, executor);
        let state = AgentState {
            checking: vec![run_item(None)],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn checking_an_existing_workload_is_a_no_op() {
        let client = MockPlatformClient::new();
        let mut executor = MockWorkloadExecutor::new();
        executor.expect_exists().times(1).returning(|_, _| Ok(true));

        let agent = agent(client, executor);
        let state = AgentState {
            checking: vec![run_item(None)],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn auxiliary_operations_do_not_report_run_statuses() {
        let client = MockPlatformClient::new();
        let mut executor = MockWorkloadExecutor::new();
        executor.expect_apply().times(1).returning(|_| Ok(()));

        let agent = agent(client, executor);
        let content = serde_json::json!({
            "run": {
                "kind": "notifier",
                "container": {"name": "polyaxon-notifier", "image": "polyaxon/polyaxon-events"}
            }
        })
        .to_string();
        let state = AgentState {
            hooks: vec![run_item(Some(content))],
            ..Default::default()
        };
        agent.dispatch(&state).await;
    }

    #[tokio::test]
    async fn compatible_updates_replace_settings_and_push_back() {
        let mut client = MockPlatformClient::new();
        client
            .expect_sync_agent()
            .withf(|config| {
                config
                    .sidecar
                    .as_ref()
                    .and_then(|s| s.sleep_interval)
                    == Some(30)
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut agent = agent(client, MockWorkloadExecutor::new());
        let updates = AgentConfig {
            sidecar: Some(polyaxon_common::schemas::SidecarSettings {
                sleep_interval: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        agent.sync_compatible_updates(updates).await;
        assert_eq!(
            agent.config.sidecar.as_ref().and_then(|s| s.sleep_interval),
            Some(30)
        );
    }

    #[test]
    fn conditions_emitted_in_sequence_have_non_decreasing_timestamps() {
        let first = StatusCondition::for_state(RunState::Scheduled, "AgentScheduled", "a");
        let second = StatusCondition::for_state(RunState::Stopped, "AgentStopped", "b");
        assert!(first.last_transition_time <= second.last_transition_time);
    }
}
