//! # Serve Subcommand
//!
//! Runs the API server from the CLI. Configuration comes from the same
//! environment variables as the `cmms-api` binary; `--port` overrides
//! `PORT`.

use anyhow::{Context, Result};
use clap::Args;

use cmms_api::state::AppConfig;

/// Arguments for the `cmms serve` subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on. Overrides `PORT`.
    #[arg(long, short)]
    pub port: Option<u16>,
}

/// Resolve the server configuration from the environment and flags.
pub fn resolve_config(
    args: &ServeArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig> {
    let mut config = AppConfig::from_lookup(lookup).context("invalid server configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    Ok(config)
}

/// Execute the serve subcommand. Blocks until the server stops.
pub fn run_serve(args: &ServeArgs) -> Result<u8> {
    let config = resolve_config(args, |key| std::env::var(key).ok())?;
    let port = config.port;
    tracing::info!(?config, "starting API server");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let state = cmms_api::bootstrap(config).await?;
        cmms_api::serve(state, port)
            .await
            .with_context(|| format!("server on port {port} failed"))?;
        Ok::<_, anyhow::Error>(())
    })?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_flag_overrides_environment() {
        let args = ServeArgs { port: Some(9000) };
        let config = resolve_config(&args, |key| match key {
            "PORT" => Some("7000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn environment_port_used_without_flag() {
        let args = ServeArgs { port: None };
        let config = resolve_config(&args, |key| match key {
            "PORT" => Some("7000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn invalid_environment_is_an_error() {
        let args = ServeArgs { port: Some(9000) };
        let result = resolve_config(&args, |key| match key {
            "CMMS_LOG_FORMAT" => Some("xml".to_string()),
            _ => None,
        });
        assert!(result.is_err());
    }
}
