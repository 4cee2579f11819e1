//! Process-wide configuration.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable overriding [`EcadConfig::threads`].
pub const THREADS_ENV: &str = "ECAD_THREADS";
/// Environment variable overriding [`EcadConfig::log_level`].
pub const LOG_LEVEL_ENV: &str = "ECAD_LOG_LEVEL";

/// Verbosity of the log output installed by [`Context::init`](crate::context::Context::init).
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Debugging output.
    Debug,
    /// Progress messages.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The equivalent `tracing` level.
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            other => return Err(format!("unknown log level `{other}`")),
        })
    }
}

/// Settings shared by every database in a [`Context`](crate::context::Context).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcadConfig {
    /// Default worker thread count for extraction and solving.
    pub threads: usize,
    /// Separator between instance names in hierarchical names.
    pub hier_sep: char,
    /// Number of segments used to approximate circles.
    pub circle_div: usize,
    /// Log verbosity. `RUST_LOG` takes precedence when set.
    pub log_level: LogLevel,
}

impl Default for EcadConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            hier_sep: '/',
            circle_div: 16,
            log_level: LogLevel::Info,
        }
    }
}

impl EcadConfig {
    /// Parses a configuration from TOML. Missing keys take their default values.
    ///
    /// ```
    /// # use ecad::config::*;
    /// let cfg = EcadConfig::from_toml_str("threads = 2\nlog_level = \"debug\"").unwrap();
    /// assert_eq!(cfg.threads, 2);
    /// assert_eq!(cfg.log_level, LogLevel::Debug);
    /// assert_eq!(cfg.hier_sep, '/');
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Applies overrides from environment variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn with_env(mut self, env: &HashMap<String, String>) -> Self {
        if let Some(v) = env.get(THREADS_ENV) {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.threads = n,
                _ => tracing::warn!(var = THREADS_ENV, value = %v, "ignoring invalid thread count"),
            }
        }
        if let Some(v) = env.get(LOG_LEVEL_ENV) {
            match v.parse() {
                Ok(level) => self.log_level = level,
                Err(err) => tracing::warn!(var = LOG_LEVEL_ENV, "{err}"),
            }
        }
        self
    }

    /// Applies overrides from the process environment.
    pub fn with_process_env(self) -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        self.with_env(&env)
    }

    /// The thread count, never zero.
    pub fn threads(&self) -> usize {
        self.threads.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_file_values() {
        let cfg = EcadConfig::from_toml_str("threads = 3\ncircle_div = 32").unwrap();
        let env = HashMap::from([
            (THREADS_ENV.to_string(), "8".to_string()),
            (LOG_LEVEL_ENV.to_string(), "bogus".to_string()),
        ]);
        let cfg = cfg.with_env(&env);
        assert_eq!(cfg.threads(), 8);
        assert_eq!(cfg.circle_div, 32);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn load_reads_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ecad.toml");
        std::fs::write(&path, "hier_sep = \".\"\n")?;
        let cfg = EcadConfig::load(&path)?;
        assert_eq!(cfg.hier_sep, '.');
        assert!(EcadConfig::from_toml_str("threads = \"many\"").is_err());
        Ok(())
    }
}
