//! # cmms-api — Axum API Service for the CMMS Stack
//!
//! HTTP surface over the in-memory stores, with optional Postgres
//! write-through. The state rules themselves (schedule completion, the
//! equipment tree) live in `cmms-state`; handlers here apply them under
//! the right locks and persist the result.
//!
//! ## API Surface
//!
//! | Prefix              | Module                 | Domain                  |
//! |---------------------|------------------------|-------------------------|
//! | `/v1/vendors/*`     | [`routes::vendors`]    | Vendors                 |
//! | `/v1/equipment/*`   | [`routes::equipment`]  | Equipment hierarchy     |
//! | `/v1/parts/*`       | [`routes::parts`]      | Spare parts             |
//! | `/v1/tasks/*`       | [`routes::tasks`]      | Tasks                   |
//! | `/v1/schedules/*`   | [`routes::schedules`]  | Schedules, completion   |
//! | `/v1/users`         | [`routes::users`]      | Assignable users        |
//! | `/metrics`          | [`middleware::metrics`]| Request counters        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros, served at `/openapi.json`.

pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::state::{AppState, LogFormat};

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the metrics and trace
/// layers so orchestrator polling does not skew request counts.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::vendors::router())
        .merge(routes::equipment::router())
        .merge(routes::parts::router())
        .merge(routes::tasks::router())
        .merge(routes::schedules::router())
        .merge(routes::users::router())
        .merge(openapi::router())
        .route("/metrics", get(middleware::metrics::metrics_report))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter` when set.
pub fn init_tracing(format: LogFormat, default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Bind `0.0.0.0:port` and serve the application until the process exits.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let app = app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("CMMS API listening on {}", addr);
    axum::serve(listener, app).await
}

/// Connect the configured database (if any), hydrate, and build the state.
///
/// Also installs the Prometheus exporter when a metrics port is configured.
pub async fn bootstrap(config: state::AppConfig) -> Result<AppState, BootstrapError> {
    if let Some(port) = config.metrics_port {
        middleware::metrics::install_prometheus(port)?;
    }
    let db_pool = db::init_pool(config.database_url.as_deref()).await?;
    let state = AppState::with_config(config, db_pool);
    state
        .hydrate_from_db()
        .await
        .map_err(BootstrapError::Hydration)?;
    Ok(state)
}

/// Failure while preparing the application state.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Connecting to the database or running migrations failed.
    #[error("database initialization failed: {0}")]
    Database(#[from] sqlx::Error),
    /// The Prometheus exporter could not be installed.
    #[error("metrics exporter failed to start: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    /// The stored records could not be loaded.
    #[error("database hydration failed: {0}")]
    Hydration(String),
}
