use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use playlake_core::Calendar;

use crate::source::MalformedPolicy;

/// Configuration for playlake.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (PLAYLAKE_* prefix)
/// 3. Config file (~/.config/playlake/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding `song_data/` and `log_data/`.
    ///
    /// Can be set via:
    /// - CLI: --input /path/to/data
    /// - ENV: PLAYLAKE_INPUT_DIR
    /// - Config: input_dir = "/path/to/data"
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory the five output tables are written under.
    ///
    /// Can be set via:
    /// - CLI: --output /path/to/lake
    /// - ENV: PLAYLAKE_OUTPUT_DIR
    /// - Config: output_dir = "/path/to/lake"
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory for the workflow state database.
    ///
    /// Default: ~/.local/share/playlake
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Offset from UTC, in minutes, used to derive calendar fields.
    #[serde(default, deserialize_with = "native_or_text")]
    pub utc_offset_minutes: i32,

    /// What to do with records that do not match their schema.
    #[serde(default)]
    pub malformed_records: MalformedPolicy,

    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_coloured", deserialize_with = "native_or_text")]
    pub log_coloured: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            state_dir: default_state_dir(),
            utc_offset_minutes: 0,
            malformed_records: MalformedPolicy::default(),
            log_level: default_log_level(),
            log_coloured: default_log_coloured(),
        }
    }
}

/// Every key accepted by `config get` and `config set`.
pub const KEYS: [&str; 7] = [
    "input_dir",
    "output_dir",
    "state_dir",
    "utc_offset_minutes",
    "malformed_records",
    "log_level",
    "log_coloured",
];

impl Config {
    /// Load configuration from the default file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, reading `path` instead of the default config
    /// file when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file does not exist, or if
    /// the file or environment cannot be parsed.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => config_file_path(),
        };

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("playlake");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        log::debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    /// The calendar timestamps are decomposed in.
    ///
    /// # Errors
    ///
    /// Returns an error if `utc_offset_minutes` is not a valid offset.
    pub fn calendar(&self) -> playlake_core::Result<Calendar> {
        Calendar::with_offset_minutes(self.utc_offset_minutes)
    }

    /// Path of the workflow state database.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join("pipeline.db")
    }

    /// The value of one key, rendered for display.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "input_dir" => self.input_dir.display().to_string(),
            "output_dir" => self.output_dir.display().to_string(),
            "state_dir" => self.state_dir.display().to_string(),
            "utc_offset_minutes" => self.utc_offset_minutes.to_string(),
            "malformed_records" => self.malformed_records.to_string(),
            "log_level" => self.log_level.clone(),
            "log_coloured" => self.log_coloured.to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// A value given natively in the config file, or as text from the
/// environment.
#[derive(Deserialize)]
#[serde(untagged)]
enum NativeOrText<T> {
    Native(T),
    Text(String),
}

fn native_or_text<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match NativeOrText::<T>::deserialize(deserializer)? {
        NativeOrText::Native(value) => Ok(value),
        NativeOrText::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Returns: ~/.local/share/playlake (or platform equivalent)
fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playlake")
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_log_coloured() -> bool {
    true
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/playlake/config.toml
/// - macOS: ~/Library/Application Support/playlake/config.toml
/// - Windows: %APPDATA%\playlake\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playlake")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Playlake Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (PLAYLAKE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Directory holding song_data/ and log_data/
#
# Can also be set via:
# - CLI: playlake run --input /path/to/data
# - Environment: PLAYLAKE_INPUT_DIR=/path/to/data
input_dir = "data"

# Directory the output tables are written under. Every run replaces the
# tables found here.
#
# Can also be set via:
# - CLI: playlake run --output /path/to/lake
# - Environment: PLAYLAKE_OUTPUT_DIR=/path/to/lake
output_dir = "output"

# Directory for the workflow state database
#
# Default: Platform-specific data directory
#state_dir = "/path/to/state"

# Offset from UTC, in minutes, used for the hour/day/week/month/year/weekday
# columns. 0 means UTC.
utc_offset_minutes = 0

# Records that do not match their schema are either skipped with a warning
# ("drop") or abort the run ("fail").
malformed_records = "drop"

# Logging
log_level = "info"
log_coloured = true
"#
}

/// Create the config file at `path` if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn ensure_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
