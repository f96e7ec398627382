use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::notify::Notification;
use crate::window::VotingWindowConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Before,
    During,
    After,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::During => "during",
            Phase::After => "after",
        }
    }

    pub fn accepts_votes(&self) -> bool {
        matches!(self, Phase::During)
    }
}

/// Where `now` falls relative to the `[start, end)` voting window.
pub fn classify(
    now: DateTime<FixedOffset>,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Phase {
    if now < start {
        Phase::Before
    } else if now >= end {
        Phase::After
    } else {
        Phase::During
    }
}

/// Which one-shot message, if any, entering `next` from `previous` fires.
pub fn transition(previous: Option<Phase>, next: Phase) -> Option<Notification> {
    match (previous, next) {
        (None, Phase::During) => Some(Notification::VotingInProgress),
        (Some(Phase::During), Phase::After) => Some(Notification::VotingEnded),
        (Some(prev), Phase::During) if prev != Phase::During => Some(Notification::VotingStarted),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct GateState {
    window: VotingWindowConfig,
    previous_phase: Option<Phase>,
}

impl GateState {
    pub fn new(window: VotingWindowConfig) -> Self {
        Self {
            window,
            previous_phase: None,
        }
    }

    pub fn window(&self) -> &VotingWindowConfig {
        &self.window
    }

    pub fn previous_phase(&self) -> Option<Phase> {
        self.previous_phase
    }

    /// Classifies `now` and records it as the previous phase for the next
    /// call. The notification is `Some` only on a phase-entry edge.
    pub fn advance(&mut self, now: DateTime<FixedOffset>) -> (Phase, Option<Notification>) {
        let phase = self.window.classify(now);
        let notification = transition(self.previous_phase, phase);
        self.previous_phase = Some(phase);
        (phase, notification)
    }
}
