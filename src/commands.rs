//! CLI command handlers.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    cli::{Cli, Commands},
    clock::{Clock, ManualClock, SystemClock},
    gate::{run_gate, GateController, GateRuntime, GateSurface, NullSurface, TerminalSurface},
    notify::{LogToastSink, ToastCenter},
    settings::{default_data_dir, SettingsStore},
    store::Storage,
    window::{
        clear_window, load_window, parse_instant, save_window, VotingWindowConfig, WindowSource,
    },
};

struct Paths {
    store: PathBuf,
    settings: PathBuf,
}

impl Paths {
    fn resolve(cli: &Cli) -> Result<Self> {
        let store = match &cli.store {
            Some(path) => path.clone(),
            None => default_data_dir()?.join("store.sqlite3"),
        };
        let settings = match &cli.settings {
            Some(path) => path.clone(),
            None => default_data_dir()?.join("settings.json"),
        };
        Ok(Self { store, settings })
    }
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let paths = Paths::resolve(&cli)?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => watch(&paths).await,
        Commands::Status { at, json } => status(&paths, at.as_deref(), json).await,
        Commands::Set { start, end } => set(&paths, &start, &end).await,
        Commands::Clear => clear(&paths).await,
        Commands::Show => show(&paths).await,
        Commands::Settings {
            tick_ms,
            poll_ms,
            toasts,
        } => settings(&paths, tick_ms, poll_ms, toasts),
    }
}

async fn watch(paths: &Paths) -> Result<()> {
    let settings = SettingsStore::new(paths.settings.clone())?.gate();
    let storage = Storage::open(paths.store.clone())?;

    let toasts = ToastCenter::new(Arc::new(LogToastSink));
    if !settings.toasts_enabled {
        toasts.lock();
    }

    let runtime = GateRuntime {
        storage,
        settings,
        clock: Arc::new(SystemClock),
        toasts,
        make_surface: Box::new(|| Box::new(TerminalSurface::stdout()) as Box<dyn GateSurface>),
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Interrupt received, shutting down"),
                Err(err) => warn!("Failed to listen for Ctrl-C: {err}"),
            }
            shutdown.cancel();
        });
    }

    let reloads = run_gate(&runtime, shutdown).await?;
    println!();
    info!("Gate stopped after {reloads} reload(s)");
    Ok(())
}

async fn status(paths: &Paths, at: Option<&str>, json: bool) -> Result<()> {
    let storage = Storage::open(paths.store.clone())?;

    let clock: Arc<dyn Clock> = match at {
        Some(raw) => Arc::new(ManualClock::new(parse_instant(raw, &Local)?)),
        None => Arc::new(SystemClock),
    };
    let loaded = load_window(&storage, &Local, &clock.now()).await?;

    // A one-off evaluation has no phase history, so its toast would be noise.
    let toasts = ToastCenter::new(Arc::new(LogToastSink));
    toasts.lock();

    let gate = GateController::new(
        loaded.config,
        clock,
        Box::new(NullSurface),
        toasts,
        std::time::Duration::from_millis(100),
    );
    let snapshot = gate.tick_now().await;

    if json {
        let rendered =
            serde_json::to_string_pretty(&snapshot).context("failed to serialise snapshot")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("phase:        {}", snapshot.phase.as_str());
    println!("votes open:   {}", snapshot.accepts_votes);
    if let Some(title) = snapshot.view.title {
        println!("title:        {title}");
    }
    if let Some(fields) = &snapshot.view.countdown {
        println!("starts in:    {}", fields.joined());
    }
    println!(
        "remaining:    {}{}",
        snapshot.view.remaining,
        if snapshot.view.remaining_critical { " (critical)" } else { "" }
    );
    println!("current time: {}", snapshot.view.current_time);
    Ok(())
}

async fn set(paths: &Paths, start: &str, end: &str) -> Result<()> {
    let storage = Storage::open(paths.store.clone())?;
    let window = VotingWindowConfig::new(
        parse_instant(start, &Local).context("invalid --start")?,
        parse_instant(end, &Local).context("invalid --end")?,
    );
    save_window(&storage, &window).await?;
    println!("Voting window set: {} -> {}", window.start, window.end);
    Ok(())
}

async fn clear(paths: &Paths) -> Result<()> {
    let storage = Storage::open(paths.store.clone())?;
    if clear_window(&storage).await? {
        println!("Voting window cleared; the default window applies");
    } else {
        println!("No voting window was stored");
    }
    Ok(())
}

async fn show(paths: &Paths) -> Result<()> {
    let storage = Storage::open(paths.store.clone())?;
    let loaded = load_window(&storage, &Local, &Local::now().fixed_offset()).await?;

    println!("start:  {}", loaded.config.start);
    println!("end:    {}", loaded.config.end);
    match loaded.source {
        WindowSource::Persisted => println!("source: stored in {}", storage.path().display()),
        WindowSource::Default { reason } => println!("source: default ({reason})"),
    }
    Ok(())
}

fn settings(
    paths: &Paths,
    tick_ms: Option<u64>,
    poll_ms: Option<u64>,
    toasts: Option<bool>,
) -> Result<()> {
    let store = SettingsStore::new(paths.settings.clone())?;
    let mut gate = store.gate();

    if tick_ms.is_some() || poll_ms.is_some() || toasts.is_some() {
        if let Some(tick_ms) = tick_ms {
            gate.tick_interval_ms = tick_ms;
        }
        if let Some(poll_ms) = poll_ms {
            gate.storage_poll_ms = poll_ms;
        }
        if let Some(toasts) = toasts {
            gate.toasts_enabled = toasts;
        }
        store.update_gate(gate.clone())?;
        info!("Settings written to {}", store.path().display());
    }

    println!("{}", serde_json::to_string_pretty(&gate)?);
    Ok(())
}
