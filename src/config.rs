//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILFRAME_CONFIG` (environment variable)
//! 2. `~/.config/mailframe/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailframe\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::render::sanitize::UnsanitizedPolicy;
use crate::render::theme::HostTheme;
use crate::render::RenderEnv;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Theme settings.
    pub display: DisplayConfig,
    /// Measurement and mount tuning.
    pub render: RenderConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Theme settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Host theme: "dark", "light" or "auto".
    pub theme: HostTheme,
    /// System color-scheme preference used when `theme` is "auto".
    pub system_prefers_dark: bool,
}

/// Measurement and mount tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixels added to every measured body height.
    pub height_padding: u32,
    /// Height used when neither the probe nor the container report one.
    pub fallback_height: u32,
    /// Delay before the one-off fallback re-measure after the visible frame loads.
    pub settle_delay_ms: u64,
    /// How long to wait for the probe to load before mounting at fallback
    /// height. `0` waits forever.
    pub probe_timeout_ms: u64,
    /// Sanitized body size (bytes) above which the probe is skipped.
    pub large_email_threshold: usize,
    /// Initial frame height for large emails.
    pub large_email_initial_height: u32,
    /// Re-measure delay for large emails.
    pub large_email_remeasure_ms: u64,
    /// Behavior when no sanitizer is configured.
    pub unsanitized: UnsanitizedPolicy,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: HostTheme::Dark,
            system_prefers_dark: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            height_padding: crate::render::document::HEIGHT_PADDING,
            fallback_height: 300,
            settle_delay_ms: 300,
            probe_timeout_ms: 5_000,
            large_email_threshold: 50_000,
            large_email_initial_height: 800,
            large_email_remeasure_ms: 150,
            unsanitized: UnsanitizedPolicy::Refuse,
        }
    }
}

impl DisplayConfig {
    /// Theme inputs for the renderer.
    pub fn render_env(&self) -> RenderEnv {
        RenderEnv {
            host_theme: self.theme,
            system_prefers_dark: self.system_prefers_dark,
        }
    }
}

impl RenderConfig {
    /// Settle delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Probe timeout, or `None` to wait forever.
    pub fn probe_timeout(&self) -> Option<Duration> {
        (self.probe_timeout_ms > 0).then(|| Duration::from_millis(self.probe_timeout_ms))
    }

    /// Large-email re-measure delay as a `Duration`.
    pub fn large_email_remeasure(&self) -> Duration {
        Duration::from_millis(self.large_email_remeasure_ms)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILFRAME_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailframe").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailframe")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailframe.log")
}
