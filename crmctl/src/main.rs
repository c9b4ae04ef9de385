use clap::Parser;
use crmctl::{Application, Config, config::Args, telemetry};
use tokio::signal;
use tracing::info;

/// Resolves on SIGTERM or Ctrl+C, whichever comes first.
async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let received = tokio::select! {
        _ = interrupt => "Ctrl+C",
        _ = sigterm => "SIGTERM",
    };
    info!("Received {received}, draining requests before exit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // TLS to Postgres and the OTLP collector both go through rustls
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::debug!("{:?}", args);

    Application::new(config).await?.serve(shutdown_signal()).await
}
