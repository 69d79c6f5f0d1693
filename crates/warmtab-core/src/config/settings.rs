use crate::dispatch::DispatchSettings;
use crate::pool::{AdoptionBounds, DEFAULT_TARGET_URL, PoolSettings};
use crate::rules::DEFAULT_PROMPT;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;
use warmtab_types::Geometry;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load config from file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        super::validation::warn_unknown_fields(&content, "config.json");
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pool and dispatcher cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pool.max_size == 0 {
            return Err(Error::Config("pool.maxSize must be at least 1".to_string()));
        }
        let is_web = Url::parse(&self.pool.target_url)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
        if !is_web {
            return Err(Error::Config(format!(
                "pool.targetUrl must be an http(s) URL, got {:?}",
                self.pool.target_url
            )));
        }
        if self.dispatch.max_send_attempts == 0 {
            return Err(Error::Config(
                "dispatch.maxSendAttempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.pool.max_size,
            target_url: self.pool.target_url.clone(),
            refill_delay: Duration::from_millis(self.pool.refill_delay_ms),
            suppress_popup_focus: Duration::from_millis(self.pool.suppress_popup_focus_ms),
            offscreen: self.pool.offscreen,
            adoption: self.pool.adoption,
        }
    }

    #[must_use]
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            max_send_attempts: self.dispatch.max_send_attempts,
            send_retry_delay: Duration::from_millis(self.dispatch.send_retry_delay_ms),
            acquire_timeout: Duration::from_millis(self.dispatch.acquire_timeout_ms),
            extraction_timeout: Duration::from_millis(self.dispatch.extraction_timeout_ms),
            default_prompt: self.dispatch.default_prompt.clone(),
            target_url: self.pool.target_url.clone(),
        }
    }
}

/// Warm pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    #[serde(default = "default_target_url")]
    pub target_url: String,

    #[serde(default = "default_refill_delay")]
    pub refill_delay_ms: u64,

    #[serde(default = "default_suppress_popup_focus")]
    pub suppress_popup_focus_ms: u64,

    /// Position and size of newly created warm windows
    #[serde(default)]
    pub offscreen: Geometry,

    /// Shape a stray popup must have to be adopted as a warm window
    #[serde(default)]
    pub adoption: AdoptionBounds,
}

fn default_max_size() -> usize {
    1
}
fn default_target_url() -> String {
    DEFAULT_TARGET_URL.to_string()
}
fn default_refill_delay() -> u64 {
    2000
}
fn default_suppress_popup_focus() -> u64 {
    800
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            target_url: default_target_url(),
            refill_delay_ms: default_refill_delay(),
            suppress_popup_focus_ms: default_suppress_popup_focus(),
            offscreen: Geometry::default(),
            adoption: AdoptionBounds::default(),
        }
    }
}

/// Query delivery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,

    #[serde(default = "default_send_retry_delay")]
    pub send_retry_delay_ms: u64,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_ms: u64,

    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_ms: u64,

    #[serde(default = "default_prompt")]
    pub default_prompt: String,
}

fn default_max_send_attempts() -> u32 {
    10
}
fn default_send_retry_delay() -> u64 {
    500
}
fn default_acquire_timeout() -> u64 {
    8000
}
fn default_extraction_timeout() -> u64 {
    3000
}
fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: default_max_send_attempts(),
            send_retry_delay_ms: default_send_retry_delay(),
            acquire_timeout_ms: default_acquire_timeout(),
            extraction_timeout_ms: default_extraction_timeout(),
            default_prompt: default_prompt(),
        }
    }
}
