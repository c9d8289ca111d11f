use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use frame3d::config;
use frame3d::events::{FrameInput, HostEvent, LoadCompleted, LoadRequest, UserIntent};
use frame3d::platform::environment::{self, Environment};
use frame3d::tasks;

#[derive(Debug, Parser)]
#[command(name = "frame3d", version, about = "3d picture frame viewer")]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Treat the session as reduced-motion; the frame is not rendered
    #[arg(long = "reduced-motion")]
    reduced_motion: bool,
    /// Deterministic RNG seed for the feed shuffle
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,
    /// Debug logging for frame3d (RUST_LOG still takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn default_filter(verbose: bool) -> EnvFilter {
    let base = if verbose { "info,frame3d=debug" } else { "info" };
    EnvFilter::new(format!("{base},wgpu_core=warn,wgpu_hal=warn,naga=warn"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        reduced_motion,
        seed,
        verbose,
    } = Args::parse();

    // RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose)),
        )
        .with_target(false)
        .compact()
        .init();

    let mut cfg = config::Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    if reduced_motion {
        cfg.renderer.reduced_motion = true;
    }
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    if let Environment::Unsupported(reason) = environment::probe(&cfg.renderer) {
        tracing::warn!(reason = reason.as_str(), "3d frame unsupported; exiting");
        return Ok(());
    }

    let (to_load_tx, to_load_rx) = mpsc::unbounded_channel::<LoadRequest>(); // Viewer -> Loader
    let (loaded_tx, loaded_rx) = mpsc::channel::<LoadCompleted>(16); // Loader -> Viewer
    let (host_events_tx, host_events_rx) = mpsc::unbounded_channel::<HostEvent>(); // Viewer -> Host
    let (inputs_tx, inputs_rx) = mpsc::channel::<FrameInput>(16); // Host -> Viewer
    let (intents_tx, intents_rx) = mpsc::channel::<UserIntent>(16); // Viewer -> Host

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Loader
    tasks.spawn({
        let cancel = cancel.clone();
        let loader_cfg = cfg.loader.clone();
        async move {
            tasks::loader::run(to_load_rx, loaded_tx, cancel, loader_cfg)
                .await
                .context("loader task failed")
        }
    });

    // Host
    tasks.spawn({
        let cancel = cancel.clone();
        let host_cfg = cfg.host.clone();
        let images = cfg.images.clone();
        async move {
            tasks::host::run(
                host_cfg,
                images,
                seed,
                intents_rx,
                host_events_rx,
                inputs_tx,
                cancel,
            )
            .await
            .context("host task failed")
        }
    });

    // The viewer owns the window and must stay on the main thread
    let channels = tasks::viewer::ViewerChannels {
        host_events: host_events_tx,
        inputs: inputs_rx,
        to_loader: to_load_tx,
        loaded: loaded_rx,
        intents: intents_tx,
    };
    if let Err(e) = tasks::viewer::run_windowed(cfg.renderer.clone(), channels, cancel.clone())
        .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
