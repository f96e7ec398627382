use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::Storage;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

const EVENT_BUFFER: usize = 8;

/// A key was changed by another store handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
}

/// Polls one key and reports writes made through other handles. Writes made
/// through the watched handle itself are never reported.
pub struct StorageWatcher {
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl StorageWatcher {
    /// Reads the current revision as the baseline before returning, so only
    /// writes made after this call are reported.
    pub async fn spawn(
        storage: Storage,
        key: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<(Self, mpsc::Receiver<StorageEvent>)> {
        let key = key.into();
        let baseline = storage
            .entry_revision(&key)
            .await
            .with_context(|| format!("failed to read baseline revision of {key}"))?
            .map(|entry| entry.revision);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(watch_loop(
            storage,
            key,
            baseline,
            poll_interval,
            cancel_token.clone(),
            event_tx,
        ));

        Ok((
            Self {
                handle: Some(handle),
                cancel_token,
            },
            event_rx,
        ))
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.context("storage watcher task failed to join")?;
        }
        Ok(())
    }
}

impl Drop for StorageWatcher {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn watch_loop(
    storage: Storage,
    key: String,
    mut last_seen: Option<u64>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
    event_tx: mpsc::Sender<StorageEvent>,
) {
    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_debug!("watching {key} from revision {last_seen:?}");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let entry = match storage.entry_revision(&key).await {
                    Ok(entry) => entry,
                    Err(err) => {
                        log_error!("failed to poll {key}: {err:?}");
                        continue;
                    }
                };

                let Some(entry) = entry else {
                    continue;
                };
                if last_seen == Some(entry.revision) {
                    continue;
                }
                last_seen = Some(entry.revision);

                if entry.origin == storage.origin() {
                    log_debug!("ignoring own write to {key} (revision {})", entry.revision);
                    continue;
                }

                log_info!("{key} changed elsewhere (revision {})", entry.revision);
                let event = StorageEvent {
                    key: key.clone(),
                    new_value: entry.value,
                };
                if event_tx.send(event).await.is_err() {
                    log_debug!("storage event receiver dropped; stopping watcher");
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                log_debug!("storage watcher for {key} shutting down");
                break;
            }
        }
    }
}
