// ABOUTME: Application state, router assembly and the HTTP server lifecycle.
// ABOUTME: Starts the periodic flusher and performs the final flush after graceful shutdown.

use crate::routes;
use crate::websearch::{DuckDuckGo, SearchProvider};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use parley_core::flusher::spawn_flusher;
use parley_core::{metrics, BackendRegistry, ChatBackend, Config, Dispatcher, ImageBackend, Stores};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Arc<Stores>,
    pub dispatcher: Dispatcher,
    pub search: Arc<dyn SearchProvider>,
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: Config,
        stores: Arc<Stores>,
        chat: Arc<dyn ChatBackend>,
        image: Arc<dyn ImageBackend>,
        search: Arc<dyn SearchProvider>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&stores), chat, image, &config);
        Self {
            config: Arc::new(config),
            stores,
            dispatcher,
            search,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::chats::router())
        .merge(routes::profile::router())
        .merge(routes::settings::router())
        .merge(routes::feedback::router())
        .merge(routes::websearch::router())
        .merge(routes::files::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics exporter not installed".to_string(),
        ),
    }
}

/// Run the server until Ctrl-C / SIGTERM, then stop the flusher and save everything
pub async fn serve(config: Config) -> Result<()> {
    let metrics_handle =
        metrics::init_metrics().context("Failed to initialize Prometheus metrics")?;

    let registry = BackendRegistry::default();
    let chat = registry
        .chat_from_config(&config.backend)
        .context("Failed to create chat backend")?;
    let image = registry
        .image_from_config(&config.image)
        .context("Failed to create image backend")?;
    tracing::info!(
        chat_backend = chat.name(),
        image_backend = image.name(),
        "Backends ready"
    );

    let stores = Arc::new(Stores::open(&config).context("Failed to load state")?);
    let search = Arc::new(DuckDuckGo::new()?);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let flush_period = Duration::from_secs(config.chat.flush_interval_secs);

    let state = AppState::new(config, Arc::clone(&stores), chat, image, search)
        .with_metrics(metrics_handle);
    let app = build_router(Arc::new(state));

    let shutdown = CancellationToken::new();
    let flusher = spawn_flusher(Arc::clone(&stores), flush_period, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Err(e) = flusher.await {
        tracing::error!(error = %e, "Flusher task panicked");
    }
    stores.flush_all().context("Final flush failed")?;
    tracing::info!("State saved, bye");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
