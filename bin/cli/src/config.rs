//! Runner configuration.
//!
//! Loaded via the `config` crate from an optional TOML file and
//! `SWITCHYARD__*` environment variables, e.g.
//! `SWITCHYARD__ENGINE__MAX_DEPTH=64`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use switchyard_ai::AiConfig;
use switchyard_workflow::EngineConfig;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "switchyard.toml";

/// Runner configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Directory holding execution records.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Generation backends for `ai_generate` nodes.
    #[serde(default)]
    pub ai: AiConfig,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".switchyard/executions")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            store_dir: default_store_dir(),
            engine: EngineConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads configuration.
    ///
    /// An explicit `path` must exist; otherwise `switchyard.toml` is read
    /// if present. Environment variables override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("SWITCHYARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_config_has_correct_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.store_dir, PathBuf::from(".switchyard/executions"));
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.ai.backends.is_empty());
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        write!(
            file,
            r#"
log_filter = "debug"
store_dir = "/var/lib/switchyard"

[engine]
max_depth = 32

[ai]
attempts_per_backend = 3

[[ai.backends]]
name = "local"
base_url = "http://localhost:11434/v1"
model = "llama3"
"#
        )
        .expect("write config");

        let config = CliConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.store_dir, PathBuf::from("/var/lib/switchyard"));
        assert_eq!(config.engine.max_depth, 32);
        assert_eq!(config.engine.default_timeout_ms, 30_000);
        assert_eq!(config.ai.attempts_per_backend, 3);
        assert_eq!(config.ai.backends.len(), 1);
        assert_eq!(config.ai.backends[0].model, "llama3");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope.toml");
        assert!(CliConfig::load(Some(&missing)).is_err());
    }
}
