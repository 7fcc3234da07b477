use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bdfr_media_archiver::config::{Cli, Config};
use bdfr_media_archiver::fetch::Fetcher;
use bdfr_media_archiver::fs_utils::{collect_post_filenames, copy_non_post_files};
use bdfr_media_archiver::media::{default_registry, MediaResolver};
use bdfr_media_archiver::process::process_files;
use bdfr_media_archiver::store::Store;

const EXIT_USAGE: u8 = 1;
const EXIT_COPY: u8 = 2;
const EXIT_PROCESS: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let config = Config::from(cli);

    if let Err(e) = init_tracing(config.verbose) {
        eprintln!("{e:#}");
        return ExitCode::from(EXIT_USAGE);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return ExitCode::from(EXIT_USAGE);
    }

    run(config).await
}

async fn run(config: Config) -> ExitCode {
    info!(
        source = %config.source.display(),
        dest = %config.dest_dir.display(),
        jobs = config.jobs,
        "Starting bdfr-media"
    );

    let filenames = match prepare(&config).await {
        Ok(filenames) => filenames,
        Err(e) => {
            error!("Failed to prepare destination: {e:#}");
            return ExitCode::from(EXIT_COPY);
        }
    };

    let cancel = CancellationToken::new();
    let resolver = match build_resolver(&config, &cancel) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("Failed to initialize: {e:#}");
            return ExitCode::from(EXIT_PROCESS);
        }
    };

    tokio::select! {
        result = process_files(&config, &resolver, filenames, &cancel) => match result {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Processing failed: {e:#}");
                ExitCode::from(EXIT_PROCESS)
            }
        },
        () = shutdown_signal() => {
            info!("Interrupted, shutting down...");
            cancel.cancel();
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

/// Copy the archive's non-post files and list the posts to process.
async fn prepare(config: &Config) -> Result<Vec<String>> {
    let copied = copy_non_post_files(&config.source, &config.dest_dir)
        .await
        .context("Failed to copy non-post files")?;
    let filenames = collect_post_filenames(&config.source).await?;
    info!(files = copied, posts = filenames.len(), "Destination prepared");
    Ok(filenames)
}

fn build_resolver(config: &Config, cancel: &CancellationToken) -> Result<MediaResolver> {
    let fetcher = Fetcher::new(config.fetch_timeout).context("Failed to build HTTP client")?;
    let store = Arc::new(Store::new(&config.dest_dir, fetcher, cancel.clone()));
    Ok(MediaResolver::new(
        default_registry(&store),
        config.attempt_timeout,
    ))
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "info,bdfr_media_archiver=debug"
    } else {
        "info,bdfr_media_archiver=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
