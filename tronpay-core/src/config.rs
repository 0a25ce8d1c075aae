//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "demoMode": false },
//!   "api": { "baseUrl": "https://api.example.com", "timeoutSecs": 30 },
//!   "polling": { "intervalMs": 2000, "maxAttempts": null, "timeoutSecs": null }
//! }
//! ```
//! Keys this client does not manage are kept when saving.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapters::DEFAULT_TIMEOUT;
use crate::services::{PollConfig, DEFAULT_POLL_INTERVAL};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub const ENV_BASE_URL: &str = "TRONPAY_BASE_URL";
pub const ENV_DEMO_MODE: &str = "TRONPAY_DEMO_MODE";

/// Keys accepted by [`Config::set`]
pub const CONFIG_KEYS: &[&str] = &[
    "api.baseUrl",
    "api.timeoutSecs",
    "polling.intervalMs",
    "polling.maxAttempts",
    "polling.timeoutSecs",
    "app.demoMode",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    api: ApiSettings,
    #[serde(default)]
    polling: PollingSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Values taken from the environment, applied on top of the file
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    base_url: Option<String>,
    demo_mode: Option<bool>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            base_url: std::env::var(ENV_BASE_URL)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            demo_mode: std::env::var(ENV_DEMO_MODE)
                .ok()
                .as_deref()
                .and_then(parse_bool),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" | "yes" | "on" | "TRUE" | "YES" | "ON" => Some(true),
        "false" | "0" | "no" | "off" | "FALSE" | "NO" | "OFF" => Some(false),
        _ => None,
    }
}

/// Effective client configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll: PollConfig,
    pub demo_mode: bool,
    settings: SettingsFile,
    overrides: EnvOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            poll: PollConfig::default(),
            demo_mode: false,
            settings: SettingsFile::default(),
            overrides: EnvOverrides::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory.
    ///
    /// An unreadable settings file falls back to defaults. `TRONPAY_BASE_URL`
    /// and `TRONPAY_DEMO_MODE` take precedence over the file.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings = read_settings(&data_dir.join(SETTINGS_FILE))?;
        Self::resolve(settings, EnvOverrides::from_env())
    }

    fn resolve(settings: SettingsFile, overrides: EnvOverrides) -> Result<Self> {
        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| settings.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        validate_base_url(&base_url)?;

        let interval = match settings.polling.interval_ms {
            Some(0) => bail!("polling.intervalMs must be greater than zero"),
            Some(ms) => Duration::from_millis(ms),
            None => DEFAULT_POLL_INTERVAL,
        };
        let mut poll = PollConfig::default().with_interval(interval);
        if let Some(max) = settings.polling.max_attempts {
            poll = poll.with_max_attempts(max);
        }
        if let Some(secs) = settings.polling.timeout_secs {
            poll = poll.with_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            request_timeout: settings
                .api
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            poll,
            demo_mode: overrides.demo_mode.unwrap_or(settings.app.demo_mode),
            settings,
            overrides,
        })
    }

    /// Save managed keys, preserving everything else in the file
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let mut on_disk = read_settings(&path).unwrap_or_default();

        on_disk.app.demo_mode = self.settings.app.demo_mode;
        on_disk.api.base_url = self.settings.api.base_url.clone();
        on_disk.api.timeout_secs = self.settings.api.timeout_secs;
        on_disk.polling.interval_ms = self.settings.polling.interval_ms;
        on_disk.polling.max_attempts = self.settings.polling.max_attempts;
        on_disk.polling.timeout_secs = self.settings.polling.timeout_secs;

        let content = serde_json::to_string_pretty(&on_disk)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Set one key from [`CONFIG_KEYS`]. An empty value unsets it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let mut settings = self.settings.clone();

        match key {
            "api.baseUrl" => {
                settings.api.base_url = non_empty(value).map(str::to_string);
            }
            "api.timeoutSecs" => settings.api.timeout_secs = parse_opt(key, value)?,
            "polling.intervalMs" => settings.polling.interval_ms = parse_opt(key, value)?,
            "polling.maxAttempts" => settings.polling.max_attempts = parse_opt(key, value)?,
            "polling.timeoutSecs" => settings.polling.timeout_secs = parse_opt(key, value)?,
            "app.demoMode" => {
                settings.app.demo_mode = parse_bool(value)
                    .ok_or_else(|| anyhow!("{} expects true or false", key))?;
            }
            _ => bail!(
                "Unknown config key '{}'. Known keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }

        *self = Self::resolve(settings, self.overrides.clone())?;
        Ok(())
    }

    /// Effective value of every managed key, for display
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let opt = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        vec![
            ("api.baseUrl", self.base_url.clone()),
            ("api.timeoutSecs", self.request_timeout.as_secs().to_string()),
            ("polling.intervalMs", self.poll.interval.as_millis().to_string()),
            (
                "polling.maxAttempts",
                opt(self.poll.max_attempts.map(|m| m.to_string())),
            ),
            (
                "polling.timeoutSecs",
                opt(self.poll.timeout.map(|t| t.as_secs().to_string())),
            ),
            ("app.demoMode", self.demo_mode.to_string()),
        ]
    }

    pub fn enable_demo_mode(&mut self) {
        self.settings.app.demo_mode = true;
        self.demo_mode = self.overrides.demo_mode.unwrap_or(true);
    }

    pub fn disable_demo_mode(&mut self) {
        self.settings.app.demo_mode = false;
        self.demo_mode = self.overrides.demo_mode.unwrap_or(false);
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let url = Url::parse(base_url.trim())
        .with_context(|| format!("Invalid API base URL '{}'", base_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("API base URL must use http or https, got '{}'", url.scheme());
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_opt<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    non_empty(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| anyhow!("{} expects a non-negative integer, got '{}'", key, v))
        })
        .transpose()
}
