//! # cmms-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the CMMS API.
//! Reads `PORT` (default 8080), `DATABASE_URL` and `CMMS_LOG_FORMAT`.

use cmms_api::state::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    cmms_api::init_tracing(config.log_format, "info");

    let port = config.port;
    let state = cmms_api::bootstrap(config).await.map_err(|e| {
        tracing::error!("Startup failed: {e}");
        e
    })?;

    cmms_api::serve(state, port).await?;
    Ok(())
}
