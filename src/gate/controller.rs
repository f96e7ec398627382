use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Datelike;
use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{GateState, GateSurface, GateView, Phase};
use crate::clock::Clock;
use crate::notify::ToastCenter;
use crate::window::VotingWindowConfig;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateSnapshot {
    pub phase: Phase,
    pub accepts_votes: bool,
    pub view: GateView,
}

/// Year of the election period shown in the page header.
pub fn election_period<D: Datelike>(now: &D) -> i32 {
    now.year() + 1
}

struct GateCore {
    state: Mutex<GateState>,
    last: Mutex<Option<GateSnapshot>>,
    clock: Arc<dyn Clock>,
    surface: Mutex<Box<dyn GateSurface>>,
    toasts: ToastCenter,
}

impl GateCore {
    async fn tick(&self) -> GateSnapshot {
        let now = self.clock.now();

        let (phase, notification, view) = {
            let mut state = self.state.lock().await;
            let (phase, notification) = state.advance(now);
            let view = GateView::build(phase, now, state.window());
            (phase, notification, view)
        };

        {
            let mut surface = self.surface.lock().await;
            view.apply(&mut **surface);
        }

        if let Some(notification) = notification {
            log_info!("voting phase is now {} ({notification:?})", phase.as_str());
            self.toasts.notify(notification);
        }

        let snapshot = GateSnapshot {
            phase,
            accepts_votes: phase.accepts_votes(),
            view,
        };
        *self.last.lock().await = Some(snapshot.clone());
        snapshot
    }
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Drives one voting window: owns the gate state and re-evaluates it on a
/// fixed interval until stopped.
#[derive(Clone)]
pub struct GateController {
    core: Arc<GateCore>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    tick_interval: Duration,
}

impl GateController {
    pub fn new(
        window: VotingWindowConfig,
        clock: Arc<dyn Clock>,
        surface: Box<dyn GateSurface>,
        toasts: ToastCenter,
        tick_interval: Duration,
    ) -> Self {
        Self {
            core: Arc::new(GateCore {
                state: Mutex::new(GateState::new(window)),
                last: Mutex::new(None),
                clock,
                surface: Mutex::new(surface),
                toasts,
            }),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: tick_interval.max(Duration::from_millis(1)),
        }
    }

    pub async fn window(&self) -> VotingWindowConfig {
        *self.core.state.lock().await.window()
    }

    /// Runs one tick right away, outside the ticker.
    pub async fn tick_now(&self) -> GateSnapshot {
        self.core.tick().await
    }

    /// Result of the most recent tick, if any ran.
    pub async fn snapshot(&self) -> Option<GateSnapshot> {
        self.core.last.lock().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished())
    }

    /// Renders the election period, then starts ticking. The first tick runs
    /// immediately. Restarting replaces the running ticker.
    pub async fn start(&self) {
        let year = election_period(&self.core.clock.now());
        self.core.surface.lock().await.set_election_period(year);

        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel_token.cancel();
            previous.handle.abort();
        }

        let core = self.core.clone();
        let tick_interval = self.tick_interval;
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let snapshot = core.tick().await;
                        log_debug!("tick: {} remaining {}", snapshot.phase.as_str(), snapshot.view.remaining);
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        log_info!("gate ticker started ({}ms)", tick_interval.as_millis());
        *ticker_guard = Some(Ticker {
            handle,
            cancel_token,
        });
    }

    pub async fn stop(&self) -> Result<()> {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel_token.cancel();
            ticker
                .handle
                .await
                .context("gate ticker task failed to join")?;
            log_info!("gate ticker stopped");
        }
        Ok(())
    }
}
