//! Application configuration.
//!
//! Loaded from an optional `sdgen.yaml` in the working directory with
//! `SDGEN_`-prefixed environment variables overriding file values.

use serde::Deserialize;

/// Service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control-plane database DSN. Empty selects the embedded default
    /// (`./data/sdgen.db`).
    pub db: String,
    /// Directory scanned by the external scenario loader.
    pub scenarios_dir: String,
    /// Bind address for the outer API surface.
    pub bind: String,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Rows per insert batch.
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db: String::new(),
            scenarios_dir: "./scenarios".to_string(),
            bind: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            batch_size: 1000,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Sources, later overrides earlier:
    /// 1. `sdgen.yaml` in the current directory (if present)
    /// 2. Environment variables with the `SDGEN_` prefix
    pub fn load() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::new("sdgen", ::config::FileFormat::Yaml).required(false))
            .add_source(::config::Environment::with_prefix("SDGEN"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.bind, "127.0.0.1:8080");
    }
}
