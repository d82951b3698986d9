mod config;

use std::sync::Arc;

use ai_llm_service::telemetry as llm_telemetry;
use anyhow::Context;
use review_broker::BrokerClient;
use review_store::ReviewStateStore;
use review_worker::{ConsumerConfig, Orchestrator, OrchestratorConfig, WorkerLoop};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file.
    // Fails if .env file not found, not readable or invalid.
    dotenvy::dotenv()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(llm_telemetry::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration from environment")?;

    let broker = match &config.redis_url {
        Some(url) => BrokerClient::connect_redis(url).await.context("failed to connect to Redis")?,
        None => {
            warn!("REDIS_URL not set, falling back to the in-memory broker (single-process only)");
            BrokerClient::in_memory()
        }
    };

    let store = ReviewStateStore::connect(&config.postgres_dsn)
        .await
        .context("failed to connect to the review state store")?;
    let store = Arc::new(Mutex::new(store));

    let llm = ai_llm_service::LlmPort::new(config.llm.clone()).context("failed to construct the LLM port")?;

    let docker = match bollard::Docker::connect_with_local_defaults() {
        Ok(docker) => Some(docker),
        Err(e) => {
            warn!(error = %e, "no Docker daemon available, AGENTIC-mode container analysis will fail at request time");
            None
        }
    };

    let orchestrator_config = OrchestratorConfig {
        scm_credentials: config.scm_credentials.clone(),
        confidence_threshold: config.confidence_threshold,
        llm_timeout: config.llm.timeout_secs.map(std::time::Duration::from_secs).unwrap_or(std::time::Duration::from_secs(120)),
        llm_provider_name: config.llm.provider.as_str().to_string(),
        llm_model_name: config.llm.model.clone(),
        runner_image: config.runner_image.clone(),
        sandbox_timeout: config.sandbox_timeout,
        max_expand_file_lines: 400,
        max_expand_total_bytes: 200_000,
        max_policy_chars: 20_000,
        include_pr_metadata: true,
        max_pr_commits: 50,
    };
    let orchestrator = Arc::new(Orchestrator::new(orchestrator_config, broker.clone(), store, llm, docker));

    let shutdown = Arc::new(tokio::sync::Notify::new());
    let mut worker_handles = Vec::with_capacity(config.worker_count * 2);
    for stream in [review_broker::DIFF_STREAM, review_broker::AGENTIC_STREAM] {
        for idx in 0..config.worker_count {
            let consumer_config = {
                let mut c = ConsumerConfig::new(stream, "review-workers");
                c.consumer_id = format!("worker-{}-{idx}", std::process::id());
                c
            };
            let worker = WorkerLoop::new(consumer_config, broker.clone(), orchestrator.clone());
            let worker_shutdown = worker.shutdown_handle();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown.notified().await;
                worker_shutdown.notify_one();
            });
            worker_handles.push(tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    warn!(stream, error = %e, "worker loop exited with an error");
                }
            }));
        }
    }

    let app_state = Arc::new(review_gateway::AppState {
        broker: broker.clone(),
        api_keys: config.api_keys.clone(),
        webhook_enabled: config.webhook_enabled,
        idempotency_ttl: config.idempotency_ttl,
        default_review_mode: config.default_review_mode,
        scm_credentials: config.scm_credentials.clone(),
    });

    tokio::spawn(review_gateway::subscriber::run(app_state.clone()));

    let router = review_gateway::build_router(app_state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "review-pipeline listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server error")?;

    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}

async fn shutdown_signal(notify: Arc<tokio::sync::Notify>) {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, notifying workers");
    notify.notify_waiters();
}
