use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
}

/// One-shot messages fired on phase-entry edges.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Notification {
    /// The gate came up while voting was already open.
    VotingInProgress,
    VotingStarted,
    VotingEnded,
}

impl Notification {
    pub fn message(&self) -> &'static str {
        match self {
            Notification::VotingInProgress => {
                "Voting sedang berlangsung! Silakan pilih kandidat Anda."
            }
            Notification::VotingStarted => "Voting telah dimulai! Silakan pilih kandidat Anda.",
            Notification::VotingEnded => "Voting telah berakhir!",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Notification::VotingInProgress | Notification::VotingStarted => Severity::Success,
            Notification::VotingEnded => Severity::Info,
        }
    }

    pub fn toast(&self) -> Toast {
        Toast {
            message: self.message().to_string(),
            severity: self.severity(),
        }
    }
}

/// Where toasts end up. Implemented by whatever owns the screen.
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: &Toast);
}

/// Routes toasts to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogToastSink;

impl ToastSink for LogToastSink {
    fn show(&self, toast: &Toast) {
        match toast.severity {
            Severity::Success | Severity::Info => info!("[{}] {}", toast.severity.as_str(), toast.message),
            Severity::Warning => warn!("{}", toast.message),
            Severity::Error => error!("{}", toast.message),
        }
    }
}

/// Front door for toasts. While locked, every toast is dropped.
#[derive(Clone)]
pub struct ToastCenter {
    sink: Arc<dyn ToastSink>,
    locked: Arc<AtomicBool>,
}

impl ToastCenter {
    pub fn new(sink: Arc<dyn ToastSink>) -> Self {
        Self {
            sink,
            locked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Returns whether the toast reached the sink.
    pub fn show(&self, message: impl Into<String>, severity: Severity) -> bool {
        if self.is_locked() {
            return false;
        }
        self.sink.show(&Toast {
            message: message.into(),
            severity,
        });
        true
    }

    pub fn notify(&self, notification: Notification) -> bool {
        self.show(notification.message(), notification.severity())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryToastSink;
    use super::*;

    #[test]
    fn notifications_carry_fixed_messages() {
        assert_eq!(Notification::VotingStarted.severity(), Severity::Success);
        assert_eq!(Notification::VotingEnded.severity(), Severity::Info);
        assert_eq!(
            Notification::VotingEnded.toast().message,
            "Voting telah berakhir!"
        );
    }

    #[test]
    fn locked_center_drops_toasts() {
        let sink = MemoryToastSink::default();
        let center = ToastCenter::new(Arc::new(sink.clone()));

        center.lock();
        assert!(!center.notify(Notification::VotingStarted));
        assert!(sink.toasts().is_empty());

        center.unlock();
        assert!(center.show("Vote Telah berhasil", Severity::Success));
        assert_eq!(
            sink.toasts(),
            vec![Toast {
                message: "Vote Telah berhasil".into(),
                severity: Severity::Success,
            }]
        );
    }

    #[test]
    fn clones_share_the_lock() {
        let center = ToastCenter::new(Arc::new(LogToastSink));
        let other = center.clone();
        other.lock();
        assert!(center.is_locked());
    }
}
