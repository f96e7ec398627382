//! What the gate draws, and where it draws it.
//!
//! A [`GateSurface`] exposes one setter per element the gate drives. Every
//! setter defaults to a no-op, so a surface without a given element simply
//! ignores it.

use std::io::Write;

use chrono::{DateTime, FixedOffset};
use log::warn;
use serde::Serialize;

use super::format::{format_remaining, format_wall_clock, CountdownFields, ZERO_READOUT};
use super::state::Phase;
use crate::window::VotingWindowConfig;

pub const TITLE_NOT_STARTED: &str = "Voting Belum Dimulai";
pub const DESCRIPTION_NOT_STARTED: &str = "Pemilihan akan dimulai dalam:";
pub const TITLE_ENDED: &str = "Voting Telah Berakhir";
pub const DESCRIPTION_ENDED: &str = "Terima kasih atas partisipasi Anda.";

/// Below this much remaining time the readout turns critical.
pub const CRITICAL_REMAINING_MS: i64 = 5 * 60 * 1_000;

pub trait GateSurface: Send {
    fn set_overlay_visible(&mut self, _visible: bool) {}
    fn set_title(&mut self, _text: &str) {}
    fn set_description(&mut self, _text: &str) {}
    fn set_countdown(&mut self, _fields: &CountdownFields) {}
    fn set_countdown_visible(&mut self, _visible: bool) {}
    fn set_current_time(&mut self, _text: &str) {}
    fn set_remaining(&mut self, _text: &str, _critical: bool) {}
    fn set_election_period(&mut self, _year: i32) {}
    /// Called once after all setters of a tick.
    fn commit(&mut self) {}
}

/// A surface with no elements at all.
#[derive(Debug, Default)]
pub struct NullSurface;

impl GateSurface for NullSurface {}

/// Everything one tick puts on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateView {
    pub phase: Phase,
    pub overlay_visible: bool,
    /// `None` leaves the previous text in place.
    pub title: Option<&'static str>,
    pub description: Option<&'static str>,
    /// Only refreshed while voting has not started.
    pub countdown: Option<CountdownFields>,
    pub countdown_visible: bool,
    pub current_time: String,
    pub remaining: String,
    pub remaining_critical: bool,
}

impl GateView {
    pub fn build(phase: Phase, now: DateTime<FixedOffset>, window: &VotingWindowConfig) -> Self {
        let current_time = format_wall_clock(now);

        match phase {
            Phase::Before => Self {
                phase,
                overlay_visible: true,
                title: Some(TITLE_NOT_STARTED),
                description: Some(DESCRIPTION_NOT_STARTED),
                countdown: Some(CountdownFields::from_remaining(window.start - now)),
                countdown_visible: true,
                current_time,
                remaining: ZERO_READOUT.to_string(),
                remaining_critical: false,
            },
            Phase::During => {
                let remaining = window.end - now;
                Self {
                    phase,
                    overlay_visible: false,
                    title: None,
                    description: None,
                    countdown: None,
                    countdown_visible: true,
                    current_time,
                    remaining: format_remaining(remaining),
                    remaining_critical: remaining.num_milliseconds() < CRITICAL_REMAINING_MS,
                }
            }
            Phase::After => Self {
                phase,
                overlay_visible: true,
                title: Some(TITLE_ENDED),
                description: Some(DESCRIPTION_ENDED),
                countdown: None,
                countdown_visible: false,
                current_time,
                remaining: ZERO_READOUT.to_string(),
                remaining_critical: false,
            },
        }
    }

    pub fn apply(&self, surface: &mut dyn GateSurface) {
        surface.set_overlay_visible(self.overlay_visible);
        if let Some(title) = self.title {
            surface.set_title(title);
        }
        if let Some(description) = self.description {
            surface.set_description(description);
        }
        if let Some(fields) = &self.countdown {
            surface.set_countdown(fields);
        }
        surface.set_countdown_visible(self.countdown_visible);
        surface.set_current_time(&self.current_time);
        surface.set_remaining(&self.remaining, self.remaining_critical);
        surface.commit();
    }
}

/// Single status line on a terminal, redrawn in place when it changes.
pub struct TerminalSurface<W: Write + Send> {
    out: W,
    overlay_visible: bool,
    title: String,
    description: String,
    countdown: Option<CountdownFields>,
    countdown_visible: bool,
    current_time: String,
    remaining: String,
    critical: bool,
    election_period: Option<i32>,
    last_line: String,
    write_failed: bool,
}

impl TerminalSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            overlay_visible: false,
            title: String::new(),
            description: String::new(),
            countdown: None,
            countdown_visible: true,
            current_time: String::new(),
            remaining: ZERO_READOUT.to_string(),
            critical: false,
            election_period: None,
            last_line: String::new(),
            write_failed: false,
        }
    }

    pub fn line(&self) -> String {
        let mut line = String::new();
        if let Some(year) = self.election_period {
            line.push_str(&format!("Periode {year} | "));
        }

        if self.overlay_visible {
            line.push_str(&format!("{} - {}", self.title, self.description));
            if let (true, Some(fields)) = (self.countdown_visible, &self.countdown) {
                line.push_str(&format!(" {}", fields.joined()));
            }
        } else {
            line.push_str(&format!("Voting dibuka, sisa waktu {}", self.remaining));
            if self.critical {
                line.push_str(" (!)");
            }
        }

        line.push_str(&format!(" | {}", self.current_time));
        line
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> GateSurface for TerminalSurface<W> {
    fn set_overlay_visible(&mut self, visible: bool) {
        self.overlay_visible = visible;
    }

    fn set_title(&mut self, text: &str) {
        self.title = text.to_string();
    }

    fn set_description(&mut self, text: &str) {
        self.description = text.to_string();
    }

    fn set_countdown(&mut self, fields: &CountdownFields) {
        self.countdown = Some(fields.clone());
    }

    fn set_countdown_visible(&mut self, visible: bool) {
        self.countdown_visible = visible;
    }

    fn set_current_time(&mut self, text: &str) {
        self.current_time = text.to_string();
    }

    fn set_remaining(&mut self, text: &str, critical: bool) {
        self.remaining = text.to_string();
        self.critical = critical;
    }

    fn set_election_period(&mut self, year: i32) {
        self.election_period = Some(year);
    }

    fn commit(&mut self) {
        let line = self.line();
        if line == self.last_line {
            return;
        }
        // Pad over the remains of a longer previous line.
        let width = self.last_line.chars().count();
        let drawn = write!(self.out, "\r{line:<width$}").and_then(|()| self.out.flush());
        match drawn {
            Ok(()) => {
                self.write_failed = false;
                self.last_line = line;
            }
            Err(err) => {
                // Warn once per outage; the line is retried on the next commit.
                if !self.write_failed {
                    warn!("Failed to draw the gate line: {err}");
                }
                self.write_failed = true;
            }
        }
    }
}
