//! Link configuration.
//!
//! Every field has a default, so a JSON document only needs the values it
//! overrides:
//!
//! ```
//! use uart_link::LinkConfig;
//!
//! let config = LinkConfig::from_json(r#"{ "max_consecutive_crc_failures": 4 }"#).unwrap();
//! assert_eq!(config.max_consecutive_crc_failures, Some(4));
//! assert!(config.drain_all_packets);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};
use crate::writer::{WriterConfig, DEFAULT_CHANNEL_CAPACITY};

/// Default bound on consecutive CRC failures before the link gives up.
pub const DEFAULT_MAX_CONSECUTIVE_CRC_FAILURES: u32 = 16;

/// Default transport read size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 256;

/// Default capacity of the consumer-to-link command channel.
pub const DEFAULT_COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Settings for one link session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Consecutive corrupted packets tolerated before failing the link.
    ///
    /// Each tolerated failure is answered with a RETX. `None` never gives up.
    pub max_consecutive_crc_failures: Option<u32>,
    /// Extract every complete packet per read (`true`) or only one (`false`).
    pub drain_all_packets: bool,
    /// Bytes requested per transport read.
    pub read_buffer_size: usize,
    /// Capacity of the writer task's queue.
    pub writer_channel_capacity: usize,
    /// Capacity of the queue carrying consumer sends into the link task.
    pub command_channel_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_consecutive_crc_failures: Some(DEFAULT_MAX_CONSECUTIVE_CRC_FAILURES),
            drain_all_packets: true,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            writer_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            command_channel_capacity: DEFAULT_COMMAND_CHANNEL_CAPACITY,
        }
    }
}

impl LinkConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(LinkError::InvalidConfig(
                "read_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.writer_channel_capacity == 0 {
            return Err(LinkError::InvalidConfig(
                "writer_channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.command_channel_capacity == 0 {
            return Err(LinkError::InvalidConfig(
                "command_channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            channel_capacity: self.writer_channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.max_consecutive_crc_failures, Some(16));
        assert!(config.drain_all_packets);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(LinkConfig::from_json("{}").unwrap(), LinkConfig::default());
    }

    #[test]
    fn test_null_disables_bound() {
        let config = LinkConfig::from_json(r#"{ "max_consecutive_crc_failures": null }"#).unwrap();
        assert_eq!(config.max_consecutive_crc_failures, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = LinkConfig {
            max_consecutive_crc_failures: Some(3),
            drain_all_packets: false,
            read_buffer_size: 18,
            writer_channel_capacity: 4,
            command_channel_capacity: 2,
        };
        let json = config.to_json().unwrap();
        assert_eq!(LinkConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let result = LinkConfig::from_json(r#"{ "read_buffer_size": 0 }"#);
        assert!(matches!(result, Err(LinkError::InvalidConfig(_))));

        let result = LinkConfig::from_json(r#"{ "command_channel_capacity": 0 }"#);
        assert!(result.unwrap_err().to_string().contains("command_channel_capacity"));
    }

    #[test]
    fn test_malformed_json() {
        let result = LinkConfig::from_json(r#"{ "drain_all_packets": "yes" }"#);
        assert!(matches!(result, Err(LinkError::Json(_))));
    }
}
