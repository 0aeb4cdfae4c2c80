use anyhow::{Context, Result};
use clap::Parser;
use fourpics_generator::app::App;
use fourpics_generator::models::Config;
use fourpics_generator::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "fourpics-generator")]
#[command(about = "Serve 4-Pics-1-Word puzzle generation over HTTP")]
struct CliArgs {
    /// Address to listen on (overrides BIND_ADDR).
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Directory generated images are written to (overrides OUTPUT_DIR).
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fourpics_generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let app = Arc::new(App::new(&config).context("Failed to initialize application")?);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, server::router(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_parse() {
        let args = CliArgs::parse_from([
            "fourpics-generator",
            "--bind",
            "0.0.0.0:8080",
            "--output-dir",
            "/tmp/images",
        ]);
        assert_eq!(args.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(args.output_dir.unwrap().to_string_lossy(), "/tmp/images");
    }

    #[test]
    fn test_cli_defaults_to_config() {
        let args = CliArgs::parse_from(["fourpics-generator"]);
        assert!(args.bind.is_none());
        assert!(args.output_dir.is_none());
    }
}
