// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every field is optional. Any present field with an invalid value results
//! in a HardValidationError.

use std::path::Path;

use serde::Deserialize;

use crate::error::{HardValidationError, ShmpixError, ShmpixResult};

/// Largest side the protocol's 16-bit signed coordinates can address.
pub const PROTOCOL_MAX_SIDE: i32 = 0x7fff;

/// Upper bound for `max_segment_bytes` (1 GB).
pub const MAX_SEGMENT_BYTES_LIMIT: usize = 1024 * 1024 * 1024;

/// Raw connection configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnectionConfig {
    #[serde(default = "default_max_side")]
    max_side: i32,
    #[serde(default = "default_max_segment_bytes")]
    max_segment_bytes: usize,
    #[serde(default = "default_segment_prefix")]
    segment_prefix: String,
}

fn default_max_side() -> i32 {
    PROTOCOL_MAX_SIDE
}

fn default_max_segment_bytes() -> usize {
    256 * 1024 * 1024
}

fn default_segment_prefix() -> String {
    "shmpix".to_string()
}

impl Default for RawConnectionConfig {
    fn default() -> Self {
        Self {
            max_side: default_max_side(),
            max_segment_bytes: default_max_segment_bytes(),
            segment_prefix: default_segment_prefix(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    connection: RawConnectionConfig,
}

/// Validated connection limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Largest allowed width or height, in pixels.
    pub max_side: i32,
    /// Largest allowed segment, in bytes.
    pub max_segment_bytes: usize,
    /// Prefix of the POSIX shared memory object names.
    pub segment_prefix: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_side: default_max_side(),
            max_segment_bytes: default_max_segment_bytes(),
            segment_prefix: default_segment_prefix(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub connection: ConnectionConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> ShmpixResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ShmpixError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ShmpixError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> ShmpixResult<Config> {
        if content.trim().is_empty() {
            return Self::validate(RawConfig::default());
        }

        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ShmpixError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> ShmpixResult<Config> {
        let connection = Self::validate_connection(raw.connection)?;
        Ok(Config { connection })
    }

    fn validate_connection(raw: RawConnectionConfig) -> ShmpixResult<ConnectionConfig> {
        if !(1..=PROTOCOL_MAX_SIDE).contains(&raw.max_side) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "max_side",
                value: raw.max_side.to_string(),
                reason: format!("Must be between 1 and {}", PROTOCOL_MAX_SIDE),
            }
            .into());
        }

        if raw.max_segment_bytes == 0 || raw.max_segment_bytes > MAX_SEGMENT_BYTES_LIMIT {
            return Err(HardValidationError::InvalidFieldValue {
                field: "max_segment_bytes",
                value: raw.max_segment_bytes.to_string(),
                reason: format!("Must be between 1 and {} bytes", MAX_SEGMENT_BYTES_LIMIT),
            }
            .into());
        }

        // The prefix becomes part of a /dev/shm file name.
        let prefix = &raw.segment_prefix;
        if prefix.is_empty() || prefix.len() > 64 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "segment_prefix",
                value: prefix.clone(),
                reason: "Must be 1 to 64 characters".to_string(),
            }
            .into());
        }
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "segment_prefix",
                value: prefix.clone(),
                reason: "Must contain only ASCII alphanumerics, hyphens, and underscores"
                    .to_string(),
            }
            .into());
        }

        Ok(ConnectionConfig {
            max_side: raw.max_side,
            max_segment_bytes: raw.max_segment_bytes,
            segment_prefix: raw.segment_prefix,
        })
    }
}
