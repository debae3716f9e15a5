//! Externally supplied, read-only configuration surface.
//!
//! The surrounding application owns where settings come from (preferences
//! screen, config file); this crate only recognizes the options below and
//! validates their ranges before any subsystem consumes them.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default number of parallel download workers.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: u8 = 3;

/// Default number of retries the surrounding UI will offer for a failed job.
pub const DEFAULT_MAX_RETRIES: u8 = 1;

/// Default delay between page fetches during collection, in seconds.
pub const DEFAULT_INTER_PAGE_DELAY_SECS: u64 = 2;

/// Validation errors for recognized settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// `max_concurrent_downloads` outside 1..=10.
    #[error("invalid max_concurrent_downloads value: {value}. Expected range: 1..=10")]
    InvalidMaxConcurrentDownloads {
        /// The rejected value.
        value: u8,
    },

    /// `max_retries` outside 0..=3.
    #[error("invalid max_retries value: {value}. Expected range: 0..=3")]
    InvalidMaxRetries {
        /// The rejected value.
        value: u8,
    },

    /// `inter_page_delay_secs` outside 2..=10.
    #[error("invalid inter_page_delay_secs value: {value}. Expected range: 2..=10")]
    InvalidInterPageDelay {
        /// The rejected value.
        value: u64,
    },

    /// Settings payload could not be deserialized.
    #[error("malformed settings: {0}")]
    Malformed(String),
}

/// Recognized configuration options.
///
/// All fields default so partial payloads are accepted; unknown keys are
/// ignored to keep the surface forward-compatible with the host application.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Parallel download workers, 1..=10.
    pub max_concurrent_downloads: u8,
    /// How many times the surrounding UI offers retry before giving up, 0..=3.
    /// The queue manager itself never retries automatically.
    pub max_retries: u8,
    /// Admit downloads only on an unmetered network.
    pub wifi_only: bool,
    /// Mandatory delay between page fetches, 2..=10 seconds.
    pub inter_page_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_retries: DEFAULT_MAX_RETRIES,
            wifi_only: false,
            inter_page_delay_secs: DEFAULT_INTER_PAGE_DELAY_SECS,
        }
    }
}

impl Settings {
    /// Parses settings from a JSON payload handed over by the host
    /// application, then validates ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Malformed`] on invalid JSON, or the matching
    /// range error for out-of-range values.
    pub fn from_json_str(payload: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            serde_json::from_str(payload).map_err(|e| SettingsError::Malformed(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates all recognized options against their documented ranges.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range option found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=10).contains(&self.max_concurrent_downloads) {
            return Err(SettingsError::InvalidMaxConcurrentDownloads {
                value: self.max_concurrent_downloads,
            });
        }
        if self.max_retries > 3 {
            return Err(SettingsError::InvalidMaxRetries {
                value: self.max_retries,
            });
        }
        if !(2..=10).contains(&self.inter_page_delay_secs) {
            return Err(SettingsError::InvalidInterPageDelay {
                value: self.inter_page_delay_secs,
            });
        }
        Ok(())
    }

    /// The inter-page delay as a [`Duration`] for the collector.
    #[must_use]
    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_secs(self.inter_page_delay_secs)
    }
}
