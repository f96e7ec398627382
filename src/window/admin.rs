//! Write side of the voting window, used by the admin tooling.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use log::info;

use super::config::{ConfigError, PersistedWindow, VotingWindowConfig, CONFIG_KEY};
use crate::store::Storage;

pub fn validate_window(window: &VotingWindowConfig) -> Result<(), ConfigError> {
    if window.is_ordered() {
        Ok(())
    } else {
        Err(ConfigError::InvertedWindow {
            start: window.start.to_rfc3339(),
            end: window.end.to_rfc3339(),
        })
    }
}

/// Serialises with UTC millisecond timestamps, the format browsers emit.
pub fn encode_window(window: &VotingWindowConfig) -> Result<String> {
    let persisted = PersistedWindow {
        start_date: window
            .start
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        end_date: window
            .end
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    serde_json::to_string(&persisted).context("failed to serialise voting window")
}

pub async fn save_window(storage: &Storage, window: &VotingWindowConfig) -> Result<()> {
    validate_window(window)?;
    let payload = encode_window(window)?;
    storage.set_item(CONFIG_KEY, &payload).await?;
    info!("Voting window saved: {} -> {}", window.start, window.end);
    Ok(())
}

/// Removes the stored window; readers fall back to the default window.
pub async fn clear_window(storage: &Storage) -> Result<bool> {
    let removed = storage.remove_item(CONFIG_KEY).await?;
    if removed {
        info!("Voting window cleared");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, Local};
    use tempfile::tempdir;

    use super::*;
    use crate::window::{load_window, parse_window, WindowSource};

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn window() -> VotingWindowConfig {
        VotingWindowConfig::new(
            at("2025-05-25T20:20:00+07:00"),
            at("2025-10-06T16:20:00+07:00"),
        )
    }

    #[test]
    fn encodes_browser_style_timestamps() {
        let encoded = encode_window(&window()).unwrap();
        assert_eq!(
            encoded,
            r#"{"startDate":"2025-05-25T13:20:00.000Z","endDate":"2025-10-06T09:20:00.000Z"}"#
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(parse_window(&encoded, &utc).unwrap(), window());
    }

    #[test]
    fn rejects_inverted_and_empty_windows() {
        let w = window();
        assert!(matches!(
            validate_window(&VotingWindowConfig::new(w.end, w.start)),
            Err(ConfigError::InvertedWindow { .. })
        ));
        assert!(validate_window(&VotingWindowConfig::new(w.start, w.start)).is_err());
        assert!(validate_window(&w).is_ok());
    }

    #[tokio::test]
    async fn save_then_clear_round_trips_through_storage() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("store.sqlite3")).unwrap();

        save_window(&storage, &window()).await.unwrap();
        let loaded = load_window(&storage, &Local, &Local::now().fixed_offset()).await.unwrap();
        assert_eq!(loaded.source, WindowSource::Persisted);
        assert_eq!(loaded.config, window());

        assert!(clear_window(&storage).await.unwrap());
        assert!(!clear_window(&storage).await.unwrap());
        let loaded = load_window(&storage, &Local, &Local::now().fixed_offset()).await.unwrap();
        assert!(matches!(loaded.source, WindowSource::Default { .. }));
    }

    #[tokio::test]
    async fn inverted_window_is_not_persisted() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("store.sqlite3")).unwrap();
        let w = window();

        assert!(save_window(&storage, &VotingWindowConfig::new(w.end, w.start))
            .await
            .is_err());
        assert_eq!(storage.get_item(CONFIG_KEY).await.unwrap(), None);
    }
}
