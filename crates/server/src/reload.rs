//! Configuration reload-on-change.
//!
//! The base settings file is watched; whenever it changes the full layered
//! load re-runs and, on success, the shared snapshot is replaced. A reload
//! that fails to parse or bind keeps the previous snapshot in place.

use std::path::Path;

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Settings;

/// Keeps the file watcher alive. Dropping the handle stops reloads.
pub struct ReloadHandle {
    _watcher: Option<RecommendedWatcher>,
}

/// Watch the base settings file and push refreshed snapshots into `tx`.
///
/// When the base file does not exist there is nothing to watch and reloads
/// are disabled, matching the optional nature of the file itself.
pub fn watch(
    config_dir: &Path,
    environment: &str,
    tx: watch::Sender<Settings>,
) -> Result<ReloadHandle> {
    let base_file = Settings::base_file(config_dir);
    if !base_file.exists() {
        return Ok(ReloadHandle { _watcher: None });
    }

    let dir = config_dir.to_path_buf();
    let environment = environment.to_string();
    let mut watcher = notify::recommended_watcher(
        move |event: std::result::Result<Event, notify::Error>| match event {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                match Settings::load(&dir, &environment) {
                    Ok(settings) => {
                        if tx.send(settings).is_ok() {
                            info!("configuration reloaded");
                        }
                    }
                    Err(err) => warn!("configuration reload failed, keeping previous: {err:#}"),
                }
            }
            Ok(_) => {}
            Err(err) => warn!("settings watcher error: {err}"),
        },
    )
    .context("failed to create settings watcher")?;

    watcher
        .watch(&base_file, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", base_file.display()))?;

    Ok(ReloadHandle {
        _watcher: Some(watcher),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn base_settings(connection: &str) -> String {
        format!(r#"{{ "data": {{ "default_connection": "{connection}" }} }}"#)
    }

    #[test]
    fn test_missing_base_file_disables_reload() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Settings =
            serde_json::from_str(&base_settings("postgres://initial")).unwrap();
        let (tx, _rx) = watch::channel(settings);

        let handle = watch(dir.path(), "production", tx).unwrap();
        assert!(handle._watcher.is_none());
    }

    #[tokio::test]
    async fn test_change_to_base_file_refreshes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("settings.json");
        fs::write(&base, base_settings("postgres://initial")).unwrap();

        let settings = Settings::load(dir.path(), "production").unwrap();
        let (tx, mut rx) = watch::channel(settings);
        let _handle = watch(dir.path(), "production", tx).unwrap();

        fs::write(&base, base_settings("postgres://rewritten")).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no reload observed")
            .expect("watch channel closed");
        assert_eq!(
            rx.borrow().data.default_connection,
            "postgres://rewritten"
        );
    }
}
