//! Configuration for memocache (memocache.toml).
//!
//! ```toml
//! [cache]
//! capacity = 1024
//! idle_ttl_ms = 0          # 0 disables the idle sweep
//! sweep_interval_ms = 6000
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "MEMOCACHE_CONFIG";

/// File name probed in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "memocache.toml";

// =============================================================================
// Cache settings
// =============================================================================

/// Cache sizing and idle-sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries. Must be > 0.
    pub capacity: usize,
    /// Entries idle for longer than this are swept. 0 disables the sweep.
    pub idle_ttl_ms: u64,
    /// Period between sweep passes.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            idle_ttl_ms: 0,
            sweep_interval_ms: 6_000,
        }
    }
}

impl CacheConfig {
    /// Validate configuration constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be > 0".into(),
            ));
        }
        if self.idle_ttl_ms > 0 && self.sweep_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cache.sweep_interval_ms must be > 0 when idle_ttl_ms is set".into(),
            ));
        }
        Ok(())
    }

    /// Idle threshold, or `None` when the sweep is disabled.
    #[must_use]
    pub fn idle_ttl(&self) -> Option<Duration> {
        (self.idle_ttl_ms > 0).then(|| Duration::from_millis(self.idle_ttl_ms))
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

// =============================================================================
// Log format
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected one of: pretty, json")),
        }
    }
}

// =============================================================================
// Top-level config
// =============================================================================

/// Top-level memocache configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub logging: LogConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&source)
    }

    /// Load the resolved config file, falling back to defaults when none exists.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match resolve_config_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeFailed(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.logging
            .level
            .parse::<crate::logging::LogLevel>()
            .map_err(ConfigError::ValidationError)?;
        Ok(())
    }
}

/// Resolve which config file to read.
///
/// Order: explicit path, then `$MEMOCACHE_CONFIG`, then `./memocache.toml`
/// if it exists. An explicit or env path is returned even if missing so the
/// caller reports it.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.capacity, 1024);
        assert_eq!(cfg.idle_ttl(), None);
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(6));
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let cfg = CacheConfig {
            capacity: 0,
            ..CacheConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn sweep_interval_required_when_ttl_set() {
        let cfg = CacheConfig {
            idle_ttl_ms: 500,
            sweep_interval_ms: 0,
            ..CacheConfig::default()
        };
        assert!(cfg.validate().is_err());

        let disabled = CacheConfig {
            idle_ttl_ms: 0,
            sweep_interval_ms: 0,
            ..CacheConfig::default()
        };
        disabled.validate().unwrap();
    }

    #[test]
    fn idle_ttl_converts_to_duration() {
        let cfg = CacheConfig {
            idle_ttl_ms: 1500,
            ..CacheConfig::default()
        };
        assert_eq!(cfg.idle_ttl(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn parses_partial_toml() {
        let cfg = Config::from_toml_str(
            r#"
            [cache]
            capacity = 5
            idle_ttl_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cache.capacity, 5);
        assert_eq!(cfg.cache.idle_ttl_ms, 250);
        assert_eq!(cfg.cache.sweep_interval_ms, 6_000);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parses_logging_section() {
        let cfg = Config::from_toml_str(
            r#"
            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Config::from_toml_str("[cache\ncapacity = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn invalid_values_are_validation_errors() {
        let err = Config::from_toml_str("[cache]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = Config::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = Config::default();
        cfg.cache.capacity = 42;
        cfg.cache.idle_ttl_ms = 1000;
        let text = cfg.to_toml_string().unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.cache, cfg.cache);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memocache.toml");
        std::fs::write(&path, "[cache]\ncapacity = 7\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.cache.capacity, 7);
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
