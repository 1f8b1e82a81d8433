//! Layered configuration loading.
//!
//! Settings are assembled from three sources, in order of increasing
//! precedence: `settings.json`, `settings.<environment>.json`, then process
//! environment variables prefixed with `RESOLVE__`. Both files are optional;
//! an absent file is treated as empty. A present but malformed file, or a
//! missing required key after all sources are merged, aborts startup.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Environment variable prefix for overrides. `__` separates path segments,
/// so `RESOLVE__DATA__DEFAULT_CONNECTION` overrides `data.default_connection`.
pub const ENV_PREFIX: &str = "RESOLVE";

/// Fully merged and typed host settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub data: DataSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

/// Data access settings. The connection string is required and is handed to
/// the rest of the host explicitly through application state.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    pub default_connection: String,
}

/// Logging settings handed to the logging subsystem at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Console verbosity, an `EnvFilter` directive such as `info` or
    /// `warn,resolve_server=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Directory the rolling log files are written to.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_level() -> String {
    String::from("info")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("../logs")
}

impl Settings {
    /// Path of the base settings file inside `config_dir`.
    pub fn base_file(config_dir: &Path) -> PathBuf {
        config_dir.join("settings.json")
    }

    /// Path of the environment overlay file inside `config_dir`.
    pub fn environment_file(config_dir: &Path, environment: &str) -> PathBuf {
        config_dir.join(format!(
            "settings.{}.json",
            environment.to_ascii_lowercase()
        ))
    }

    /// Load and merge all configuration sources for `environment`.
    pub fn load(config_dir: &Path, environment: &str) -> Result<Self> {
        Self::load_with_prefix(config_dir, environment, ENV_PREFIX)
    }

    fn load_with_prefix(config_dir: &Path, environment: &str, prefix: &str) -> Result<Self> {
        let mut root = Value::Object(Map::new());

        for path in [
            Self::base_file(config_dir),
            Self::environment_file(config_dir, environment),
        ] {
            if let Some(overlay) = read_optional(&path)? {
                tracing::debug!("merging configuration file {}", path.display());
                merge(&mut root, overlay);
            }
        }

        apply_env_overrides(&mut root, prefix);

        serde_json::from_value(root).context("configuration binding failed")
    }
}

/// Read a JSON file, treating a missing file as empty.
fn read_optional(path: &Path) -> Result<Option<Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };

    let value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Some(value))
}

/// Overlay `other` onto `base`. Objects merge key by key, anything else
/// replaces the previous value.
fn merge(base: &mut Value, other: Value) {
    match (base, other) {
        (Value::Object(base_map), Value::Object(other_map)) => {
            for (key, value) in other_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(root: &mut Value, prefix: &str) {
    let marker = format!("{prefix}__");
    for (key, raw) in env::vars() {
        let Some(path) = key.strip_prefix(&marker) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(|s| s.to_ascii_lowercase()).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        set_path(root, &segments, parse_scalar(&raw));
    }
}

/// Keep JSON-typed booleans, numbers and null; everything else is a string.
fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn set_path(slot: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    let Value::Object(map) = slot else {
        return;
    };
    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if rest.is_empty() {
        *entry = value;
    } else {
        set_path(entry, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_base_file_only() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "settings.json",
            r#"{
                "server": { "listen": "127.0.0.1:8080" },
                "data": { "default_connection": "postgres://base" }
            }"#,
        );

        let settings =
            Settings::load_with_prefix(dir.path(), "production", "RESOLVE_TEST_BASE").unwrap();
        assert_eq!(
            settings.server.listen,
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(settings.data.default_connection, "postgres://base");
        // Untouched sections fall back to defaults.
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.dir, PathBuf::from("../logs"));
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "settings.json",
            r#"{
                "data": { "default_connection": "postgres://base" },
                "logging": { "level": "warn" }
            }"#,
        );
        write(
            dir.path(),
            "settings.staging.json",
            r#"{ "data": { "default_connection": "postgres://staging" } }"#,
        );

        let settings =
            Settings::load_with_prefix(dir.path(), "Staging", "RESOLVE_TEST_OVERLAY").unwrap();
        // Overlay wins for the shared key, sibling keys from the base survive.
        assert_eq!(settings.data.default_connection, "postgres://staging");
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn test_environment_variable_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "settings.json",
            r#"{ "data": { "default_connection": "postgres://base" } }"#,
        );
        write(
            dir.path(),
            "settings.production.json",
            r#"{ "data": { "default_connection": "postgres://overlay" } }"#,
        );

        env::set_var(
            "RESOLVE_TEST_ENVVAR__DATA__DEFAULT_CONNECTION",
            "postgres://from-env",
        );
        let settings =
            Settings::load_with_prefix(dir.path(), "production", "RESOLVE_TEST_ENVVAR").unwrap();
        env::remove_var("RESOLVE_TEST_ENVVAR__DATA__DEFAULT_CONNECTION");

        assert_eq!(settings.data.default_connection, "postgres://from-env");
    }

    #[test]
    fn test_environment_variable_creates_missing_sections() {
        let dir = tempfile::tempdir().unwrap();

        env::set_var(
            "RESOLVE_TEST_FRESH__DATA__DEFAULT_CONNECTION",
            "postgres://only-env",
        );
        env::set_var("RESOLVE_TEST_FRESH__SERVER__LISTEN", "0.0.0.0:9000");
        let settings =
            Settings::load_with_prefix(dir.path(), "production", "RESOLVE_TEST_FRESH").unwrap();
        env::remove_var("RESOLVE_TEST_FRESH__DATA__DEFAULT_CONNECTION");
        env::remove_var("RESOLVE_TEST_FRESH__SERVER__LISTEN");

        assert_eq!(settings.data.default_connection, "postgres://only-env");
        assert_eq!(
            settings.server.listen,
            "0.0.0.0:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_missing_connection_string_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "settings.json", r#"{ "logging": {} }"#);

        let result = Settings::load_with_prefix(dir.path(), "production", "RESOLVE_TEST_MISSING");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "settings.json", "{ not json");

        let result = Settings::load_with_prefix(dir.path(), "production", "RESOLVE_TEST_BROKEN");
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_replaces_scalars_and_merges_objects() {
        let mut base = serde_json::json!({
            "a": { "x": 1, "y": 2 },
            "b": [1, 2, 3]
        });
        merge(
            &mut base,
            serde_json::json!({
                "a": { "y": 20, "z": 30 },
                "b": [9]
            }),
        );
        assert_eq!(
            base,
            serde_json::json!({
                "a": { "x": 1, "y": 20, "z": 30 },
                "b": [9]
            })
        );
    }

    #[test]
    fn test_typed_env_scalars() {
        assert_eq!(parse_scalar("true"), Value::Bool(true));
        assert_eq!(parse_scalar("42"), serde_json::json!(42));
        assert_eq!(
            parse_scalar("127.0.0.1:8080"),
            Value::String(String::from("127.0.0.1:8080"))
        );
    }
}
