//! Agent binary entrypoint
//!
//! Exit codes: 0 on graceful shutdown, 1 on registration or credential
//! failure.

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use polyaxon_agent::config::AgentArgs;
use polyaxon_agent::{Agent, KubeExecutor, RestPlatformClient};

#[tokio::main]
async fn main() {
    if let Err(e) = polyaxon_common::logging::init() {
        eprintln!("failed to initialize logging: {e}");
        std::process::exit(1);
    }
    let args = AgentArgs::parse();
    let code = run(args).await;
    std::process::exit(code);
}

async fn run(args: AgentArgs) -> i32 {
    let token = match args.resolve_token() {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "failed to resolve auth token");
            return 1;
        }
    };
    let config = match args.load_agent_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load agent config");
            return 1;
        }
    };
    let client = match RestPlatformClient::new(&args.host, &args.owner, &args.agent_uuid, token) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build platform client");
            return 1;
        }
    };
    let kube_client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build kubernetes client");
            return 1;
        }
    };

    let mut agent = Agent::new(
        client,
        KubeExecutor::new(kube_client),
        config,
        args.api_settings(),
        args.agent_settings(),
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let result = agent.run(shutdown).await;
    // Drain window for in-flight status reports.
    tokio::time::sleep(Duration::from_secs(1)).await;

    match result {
        Ok(()) => {
            info!("agent stopped gracefully");
            0
        }
        Err(e) if e.is_auth_rejected() => {
            error!(error = %e, "credentials rejected by the control plane");
            args.clear_auth();
            1
        }
        Err(e) => {
            error!(error = %e, "agent failed to register");
            1
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            let _ = ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
