//! User configuration from `~/.config/zeta/config.toml`.
//!
//! Every field is optional; a missing file means defaults. Command-line
//! flags override whatever is loaded here.
//!
//! ```toml
//! rom_dir = "/home/me/roms"
//! cpu_clock_hz = 3500000
//! frame_rate = 50
//! log_level = "debug"
//!
//! [keys]
//! script = "50:Enter:down, 52:Enter:up"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_CLOCK_HZ: u32 = 3_500_000;
pub const DEFAULT_FRAME_RATE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory searched for ROM files and archives.
    pub rom_dir: Option<PathBuf>,
    pub cpu_clock_hz: u32,
    pub frame_rate: u32,
    /// Default log filter when `RUST_LOG` is unset (e.g. "info", "zeta_core=trace").
    pub log_level: Option<String>,
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeysConfig {
    /// Key script applied when `--keys` is not given.
    pub script: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rom_dir: None,
            cpu_clock_hz: DEFAULT_CLOCK_HZ,
            frame_rate: DEFAULT_FRAME_RATE,
            log_level: None,
            keys: KeysConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "{}: {e}", path.display()),
            Self::Parse(path, e) => write!(f, "{}: {e}", path.display()),
            Self::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Parse(_, e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl Config {
    /// `~/.config/zeta/config.toml` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("zeta").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`. A file
    /// that does not exist yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text).map_err(|e| match e {
                ConfigError::Parse(_, inner) => ConfigError::Parse(path, inner),
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(path, e)),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cpu_clock_hz == 0 {
            return Err(ConfigError::Invalid("cpu_clock_hz must be positive".into()));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be positive".into()));
        }
        Ok(())
    }
}
