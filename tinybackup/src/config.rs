//! Configuration management for tinybackup.
//!
//! Loads configuration from an optional TOML file with environment variable
//! overrides. Every field has a default, so running without a file is normal.

use crate::utils::errors::{Result, TinyBackupError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file when `--config` is absent.
pub const CONFIG_ENV: &str = "TINYBACKUP_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// at(1) queue letter all jobs are submitted to
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// at(1) executable
    #[serde(default = "default_at_binary")]
    pub at_binary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// logrotate(8) executable
    #[serde(default = "default_logrotate_binary")]
    pub logrotate_binary: String,

    /// Revisions kept when --keeprevisions is not given
    #[serde(default = "default_keep_revisions")]
    pub default_keep_revisions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// How a scheduled job finds the program (auto, path, inline)
    #[serde(default)]
    pub embed: EmbedMode,

    /// Pinned program path for `path` payloads; defaults to the running executable
    #[serde(default)]
    pub program: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Whether job payloads reference the installed binary or carry a copy of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Embed only when the running executable looks transient
    #[default]
    Auto,
    /// Always reference the executable by path
    Path,
    /// Always carry the executable inside the payload
    Inline,
}

impl std::str::FromStr for EmbedMode {
    type Err = TinyBackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EmbedMode::Auto),
            "path" => Ok(EmbedMode::Path),
            "inline" => Ok(EmbedMode::Inline),
            other => Err(TinyBackupError::Config(format!(
                "unknown embed mode '{}' (expected auto, path or inline)",
                other
            ))),
        }
    }
}

// Default values
fn default_queue_name() -> String {
    "z".to_string()
}

fn default_at_binary() -> String {
    "at".to_string()
}

fn default_logrotate_binary() -> String {
    "logrotate".to_string()
}

fn default_keep_revisions() -> u32 {
    14
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            at_binary: default_at_binary(),
        }
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            logrotate_binary: default_logrotate_binary(),
            default_keep_revisions: default_keep_revisions(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            embed: EmbedMode::Auto,
            program: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TinyBackupError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| TinyBackupError::Config(format!("{}: {}", path.display(), e)))
    }

    fn from_toml(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Resolve the configuration for this process: explicit file, then
    /// `TINYBACKUP_CONFIG`, then built-in defaults; environment overrides last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match explicit.or(from_env.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TINYBACKUP_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(queue) = lookup("TINYBACKUP_QUEUE") {
            self.queue.name = queue;
        }
        if let Some(at) = lookup("TINYBACKUP_AT") {
            self.queue.at_binary = at;
        }
        if let Some(logrotate) = lookup("TINYBACKUP_LOGROTATE") {
            self.rotation.logrotate_binary = logrotate;
        }
        if let Some(embed) = lookup("TINYBACKUP_EMBED") {
            self.install.embed = embed.parse()?;
        }
        if let Some(level) = lookup("TINYBACKUP_LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut chars = self.queue.name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {}
            _ => {
                return Err(TinyBackupError::Config(format!(
                    "queue name '{}' must be a single letter",
                    self.queue.name
                )))
            }
        }
        if self.rotation.default_keep_revisions == 0 {
            return Err(TinyBackupError::Config(
                "default_keep_revisions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
