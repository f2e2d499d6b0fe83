use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neurovid_pipeline::providers::ProviderConfig;
use neurovid_pipeline::{GenerationPipeline, PgGenerationStore, PgJobQueue};
use neurovid_worker::{PoolSettings, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "neurovid_worker=debug,neurovid_pipeline=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    let providers = ProviderConfig::from_env();
    tracing::info!(
        concurrency = config.concurrency,
        model = %providers.gemini_model,
        text_timeout_secs = providers.text_timeout.as_secs(),
        video_timeout_secs = providers.video_timeout.as_secs(),
        "Loaded worker configuration",
    );
    if providers.google_api_key.is_none() {
        tracing::warn!("GOOGLE_API_KEY not set; every text generation will fail");
    }

    // --- Database ---
    let pool = neurovid_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    neurovid_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    neurovid_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Pipeline ---
    let http = reqwest::Client::new();
    let pipeline = GenerationPipeline::new(
        Arc::new(PgGenerationStore::new(pool.clone())),
        providers.text_generator(http.clone()),
        providers.video_renderer(http),
    )
    .with_timeouts(providers.text_timeout, providers.video_timeout);

    let worker_pool = WorkerPool::new(
        Arc::new(PgJobQueue::new(pool)),
        Arc::new(pipeline),
        PoolSettings::from(&config),
    );

    // --- Run until signalled ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    worker_pool.run(cancel).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing in-flight jobs");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing in-flight jobs");
        }
    }
}
