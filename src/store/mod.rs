//! Persistent key-value store shared by every gate process on the machine.
//!
//! SQLite access is serialised on one worker thread per handle. Each handle
//! carries an origin id that is recorded with every write, so a watcher can
//! tell its own writes from those made by other processes.

use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;
use uuid::Uuid;

mod migrations;
pub mod watcher;

use migrations::run_migrations;

pub use watcher::{StorageEvent, StorageWatcher};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StorageInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Latest write to one key. `value` is `None` once the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRevision {
    pub revision: u64,
    pub origin: String,
    pub value: Option<String>,
}

#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
    path: Arc<PathBuf>,
    origin: Arc<str>,
}

impl Storage {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = path.clone();

        let worker = thread::Builder::new()
            .name("votegate-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite store")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.busy_timeout(BUSY_TIMEOUT) {
                    error!("Failed to set busy timeout: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => task(&mut conn),
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        let origin: Arc<str> = Uuid::new_v4().to_string().into();
        info!("Store opened at {} (origin {origin})", path.display());

        Ok(Self {
            inner: Arc::new(StorageInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            path: Arc::new(path),
            origin,
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let value: Option<Option<String>> = conn
                .query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .with_context(|| format!("failed to read key {key}"))?;
            Ok(value.flatten())
        })
        .await
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        let origin = self.origin.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, revision, origin, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     revision = kv_entries.revision + 1,
                     origin = excluded.origin,
                     updated_at = excluded.updated_at",
                params![key, value, origin, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
        .await
    }

    /// Leaves a tombstone so watchers observe the removal. Returns whether a
    /// live value was removed.
    pub async fn remove_item(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        let origin = self.origin.to_string();
        self.execute(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE kv_entries
                     SET value = NULL,
                         revision = revision + 1,
                         origin = ?2,
                         updated_at = ?3
                     WHERE key = ?1 AND value IS NOT NULL",
                    params![key, origin, Utc::now().to_rfc3339()],
                )
                .with_context(|| format!("failed to remove key {key}"))?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn entry_revision(&self, key: &str) -> Result<Option<EntryRevision>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let row = conn
                .query_row(
                    "SELECT revision, origin, value FROM kv_entries WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()
                .with_context(|| format!("failed to read revision of key {key}"))?;

            row.map(|(revision, origin, value)| -> Result<EntryRevision> {
                Ok(EntryRevision {
                    revision: to_u64(revision, "revision")?,
                    origin,
                    value,
                })
            })
            .transpose()
        })
        .await
    }
}
