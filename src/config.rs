//! Configuration types for creating recordings

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::bits::MAX_CHANNELS;
use crate::block::info::planned_body_len;
use crate::{Result, WiffError};

/// Largest supported bit depth; samples decode into a `u64`
pub const MAX_BIT_DEPTH: u8 = 64;

/// Timestamp format of the WIFFINFO start and end fields (22 characters)
pub const DATE_FMT: &str = "%Y%m%d %H%M%S%.6f";

/// Format a timestamp the way WIFFINFO stores it
#[must_use]
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(DATE_FMT).to_string()
}

/// Recording creation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Recording start time
    pub start: NaiveDateTime,
    /// Recording end time
    pub end: NaiveDateTime,
    /// Free-form description; its length is fixed once written
    #[serde(default)]
    pub description: String,
    /// Sampling rate in frames per second
    pub fs: u32,
    /// Channel catalog; channel `i` gets index `i`
    pub channels: Vec<ChannelConfig>,
}

/// Channel definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name (eg, lead name)
    pub name: String,
    /// Bits per sample
    pub bits: u8,
    /// Physical unit
    #[serde(default)]
    pub unit: String,
    /// Arbitrary comment
    #[serde(default)]
    pub comment: String,
}

impl ChannelConfig {
    /// Channel with no comment
    #[must_use]
    pub fn new(name: &str, bits: u8, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            bits,
            unit: unit.to_string(),
            comment: String::new(),
        }
    }

    /// Attach a comment
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }
}

impl RecordingConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WiffError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| WiffError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.fs == 0 {
            return Err(WiffError::ConfigError(
                "Sampling rate must be > 0".to_string(),
            ));
        }

        if self.channels.is_empty() {
            return Err(WiffError::ConfigError(
                "At least one channel must be configured".to_string(),
            ));
        }

        if self.channels.len() > MAX_CHANNELS {
            return Err(WiffError::ConfigError(format!(
                "{} channels configured, at most {MAX_CHANNELS} are supported",
                self.channels.len()
            )));
        }

        for (i, channel) in self.channels.iter().enumerate() {
            if channel.bits == 0 || channel.bits > MAX_BIT_DEPTH {
                return Err(WiffError::ConfigError(format!(
                    "Channel {i}: bit depth {} outside 1..={MAX_BIT_DEPTH}",
                    channel.bits
                )));
            }
        }

        let body = planned_body_len(self, "");
        if body > u64::from(u16::MAX) {
            return Err(WiffError::ConfigError(format!(
                "Catalog needs {body} bytes, exceeding the 16-bit offset range"
            )));
        }

        Ok(())
    }
}
