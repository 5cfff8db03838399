use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use site_mirror::{HttpMirror, MirrorOptions};
use sitegrab_common::{
    parse_target, ArchiveRequest, Archiver, Config, CrawlSettings, FetchJob, JobWorkspace,
    MirrorFetcher, MirrorRequest,
};
use sitegrab_server::{build_router, build_state, keepalive};
use zip_packer::ZipPacker;

#[derive(Parser)]
#[command(name = "sitegrab", about = "Download whole websites as zip archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web service
    Serve,

    /// Mirror a website into a local zip file (no upload)
    Mirror {
        /// Website to download
        url: String,

        /// Archive path (defaults to `<host>.zip` in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Link depth to follow from the start page
        #[arg(long)]
        depth: Option<u32>,

        /// Scratch directory for the working copy
        #[arg(long, env = "DOWNLOADS_DIR", default_value = "downloads")]
        work_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .json()
                .init();
            serve().await
        }
        Commands::Mirror {
            url,
            out,
            depth,
            work_dir,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();
            mirror(url, out, depth, work_dir).await
        }
    }
}

async fn serve() -> Result<()> {
    info!("Starting sitegrab server");

    // Fails fast on missing credentials, before anything binds.
    let config = Config::from_env().context("Invalid configuration")?;
    config.log_summary();

    tokio::fs::create_dir_all(&config.downloads_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.downloads_dir.display()))?;

    let shutdown = CancellationToken::new();
    let state = build_state(&config, shutdown.clone())?;
    let app = build_router(state);

    let heartbeat = config.keep_alive_url.clone().map(|url| {
        keepalive::spawn_heartbeat(
            reqwest::Client::new(),
            url,
            config.keep_alive_interval,
            shutdown.clone(),
        )
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Sitegrab listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = heartbeat {
        let _ = handle.await;
    }
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and cancels `shutdown`, which aborts in-flight jobs.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
    shutdown.cancel();
}

async fn mirror(url: String, out: Option<PathBuf>, depth: Option<u32>, work_dir: PathBuf) -> Result<()> {
    let mut settings = CrawlSettings::from_env().context("Invalid crawl configuration")?;
    if let Some(depth) = depth {
        settings.max_depth = depth;
    }

    let target = parse_target(Some(url.as_str()))?;
    let job = FetchJob::new(&work_dir, target);
    let workspace = JobWorkspace::create(&job)
        .await
        .with_context(|| format!("Failed to create {}", job.work_dir.display()))?;
    let out = out.unwrap_or_else(|| PathBuf::from(job.archive_file_name()));

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Mirroring {} (depth {})", job.target.url, settings.max_depth));

    let fetcher = HttpMirror::new(MirrorOptions::from_settings(&settings))?;
    let report = fetcher
        .mirror(
            &MirrorRequest {
                url: job.target.url.clone(),
                host: job.host().clone(),
                dest: workspace.work_dir().to_path_buf(),
                max_depth: settings.max_depth,
            },
            &cancel,
        )
        .await;
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            spinner.abandon_with_message("Mirror failed");
            return Err(e.into());
        }
    };

    spinner.set_message(format!(
        "Packing {} pages and {} assets into {}",
        report.pages,
        report.assets,
        out.display()
    ));
    let archived = ZipPacker::new()
        .archive(
            &ArchiveRequest {
                source_dir: workspace.work_dir().to_path_buf(),
                dest: out.clone(),
            },
            &cancel,
        )
        .await;
    let archived = match archived {
        Ok(archived) => archived,
        Err(e) => {
            spinner.abandon_with_message("Packing failed");
            return Err(e.into());
        }
    };

    workspace.cleanup().await;
    spinner.finish_with_message(format!(
        "Saved {} ({} files, {} bytes downloaded, {} skipped)",
        out.display(),
        archived.files,
        report.bytes,
        report.skipped
    ));
    Ok(())
}
