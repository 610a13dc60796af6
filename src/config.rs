use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use time::macros::format_description;
use time::UtcOffset;

use crate::engine::DEFAULT_DEBOUNCE;

pub const DEFAULT_LOG_DIR: &str = ".dayboard/logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub debounce: Duration,
    /// Offset used to decide which calendar day "today" is.
    pub utc_offset: UtcOffset,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    /// Relative paths are resolved against the working directory.
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            utc_offset: UtcOffset::UTC,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    debounce_ms: Option<u64>,
    #[serde(default)]
    utc_offset: Option<String>,
    #[serde(default)]
    logging: RawLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLoggingConfig {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    dir: Option<PathBuf>,
}

impl Config {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: err,
            }),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let file: RawConfig = toml::from_str(raw)?;
        let defaults = Self::default();

        let debounce = match file.debounce_ms {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.debounce,
        };
        let utc_offset = match file.utc_offset.as_deref() {
            Some(raw) => parse_offset(raw)?,
            None => defaults.utc_offset,
        };
        let logging = LoggingConfig {
            level: file.logging.level.unwrap_or(defaults.logging.level),
            dir: file.logging.dir.unwrap_or(defaults.logging.dir),
        };

        Ok(Self {
            debounce,
            utc_offset,
            logging,
        })
    }
}

/// Accepts `Z`, `UTC`, or `+HH:MM` / `-HH:MM`.
pub fn parse_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    UtcOffset::parse(trimmed, &format).map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid utc_offset '{}': expected Z or +HH:MM",
            raw
        ))
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config '{}': {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_offset, Config, ConfigError, DEFAULT_LOG_DIR};
    use std::path::PathBuf;
    use std::time::Duration;
    use time::macros::offset;
    use uuid::Uuid;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("dayboard-config-{}.toml", Uuid::now_v7()));
        let config = Config::load(&path).expect("missing config should fall back to defaults");
        assert_eq!(config, Config::default());
        assert_eq!(config.debounce, Duration::from_millis(3000));
        assert_eq!(config.logging.dir, PathBuf::from(DEFAULT_LOG_DIR));
    }

    #[test]
    fn reads_every_field() {
        let config = Config::from_toml(
            r#"
debounce_ms = 250
utc_offset = "-05:00"

[logging]
level = "debug"
dir = "/var/log/dayboard"
"#,
        )
        .expect("config should parse");
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.utc_offset, offset!(-5));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir, PathBuf::from("/var/log/dayboard"));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config =
            Config::from_toml("[logging]\nlevel = \"warn\"\n").expect("config should parse");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.debounce, Config::default().debounce);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_offsets() {
        assert!(matches!(
            Config::from_toml("debounce = 10"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            Config::from_toml("utc_offset = \"five\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn offsets_accept_utc_aliases() {
        assert_eq!(parse_offset("Z").expect("Z parses"), offset!(UTC));
        assert_eq!(parse_offset("+09:30").expect("parses"), offset!(+9:30));
    }
}
