use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::{GateController, GateSurface};
use crate::clock::Clock;
use crate::notify::ToastCenter;
use crate::settings::GateSettings;
use crate::store::{Storage, StorageWatcher};
use crate::window::{load_window, WindowSource, CONFIG_KEY};

pub type SurfaceFactory = Box<dyn Fn() -> Box<dyn GateSurface> + Send + Sync>;

/// Everything a gate needs that outlives a single configuration.
pub struct GateRuntime {
    pub storage: Storage,
    pub settings: GateSettings,
    pub clock: Arc<dyn Clock>,
    pub toasts: ToastCenter,
    pub make_surface: SurfaceFactory,
}

/// Runs the gate until `shutdown` fires. A change to the stored window made
/// by another process tears the gate down and builds it again from scratch
/// with the new value. Local dates are read in the system time zone.
/// Returns how many such reloads happened.
pub async fn run_gate(runtime: &GateRuntime, shutdown: CancellationToken) -> Result<u32> {
    let mut reloads = 0;

    loop {
        // The watcher takes its baseline before the window is read, so a
        // write landing in between is still reported.
        let (mut watcher, mut events) = StorageWatcher::spawn(
            runtime.storage.clone(),
            CONFIG_KEY,
            runtime.settings.storage_poll_interval(),
        )
        .await?;

        let loaded = load_window(&runtime.storage, &Local, &runtime.clock.now()).await?;
        match &loaded.source {
            WindowSource::Persisted => info!(
                "Voting window {} -> {}",
                loaded.config.start, loaded.config.end
            ),
            WindowSource::Default { reason } => info!(
                "Voting window {} -> {} (default: {reason})",
                loaded.config.start, loaded.config.end
            ),
        }

        let controller = GateController::new(
            loaded.config,
            runtime.clock.clone(),
            (runtime.make_surface)(),
            runtime.toasts.clone(),
            runtime.settings.tick_interval(),
        );
        controller.start().await;

        let reload = tokio::select! {
            Some(event) = events.recv() => {
                info!("{} changed in another process; reloading", event.key);
                true
            }
            _ = shutdown.cancelled() => false,
        };

        if let Err(err) = watcher.stop().await {
            warn!("Storage watcher did not stop cleanly: {err:?}");
        }
        controller.stop().await?;

        if !reload {
            return Ok(reloads);
        }
        reloads += 1;
    }
}
