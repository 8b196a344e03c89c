// ABOUTME: Main entry point for the parley chat assistant server
// ABOUTME: Initializes logging and configuration, then runs the selected subcommand

use anyhow::Result;
use clap::Parser;
use parley::cli::{Cli, Commands};
use parley::{paths, server};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Config) => {
            let config = cli.load_config()?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Commands::Start(_)) | None => {
            let _guard = init_logging()?;
            install_panic_hook();

            tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting parley");
            let config = cli.load_config()?;
            tracing::info!(
                host = %config.server.host,
                port = config.server.port,
                backend = %config.backend.backend_type(),
                image_backend = %config.image.backend_type(),
                data_dir = %config.storage.data_dir,
                "Configuration loaded"
            );
            server::serve(config).await
        }
    }
}

/// Stdout plus a daily rolling file in the log directory.
/// The returned guard flushes the file writer when dropped.
fn init_logging() -> Result<WorkerGuard> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "parley.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    tracing::info!(log_dir = %log_dir.display(), "Logging initialized");
    Ok(guard)
}

/// Log panics through tracing before the default hook prints them
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(
            panic = %panic_info,
            backtrace = %std::backtrace::Backtrace::force_capture(),
            "Parley crashed"
        );
        default_hook(panic_info);
    }));
}
