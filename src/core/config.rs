//! Reader/writer configuration
//!
//! Loadable from TOML:
//!
//! ```toml
//! format_version = 2
//! application_marker = 77
//! verify_data_hash = false
//! inline_threshold = 256
//! inline_encoding = "raw"
//! temp_dir = "/var/tmp/assets"
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Encoding used for payloads the writer places inside the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InlineEncoding {
    #[default]
    Base64,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Manifest format version written into new containers
    pub format_version: u8,

    /// Application marker written into new containers
    pub application_marker: u32,

    /// Hash the whole data region on open
    pub verify_data_hash: bool,

    /// Check each item's payload hash before decoding
    pub verify_item_hash: bool,

    /// Payloads up to this size are inlined by automatic placement (0 = never)
    pub inline_threshold: usize,

    pub inline_encoding: InlineEncoding,

    /// Directory for disk-backed lazy assets (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            format_version: 1,
            application_marker: 0,
            verify_data_hash: true,
            verify_item_hash: true,
            inline_threshold: 0,
            inline_encoding: InlineEncoding::Base64,
            temp_dir: None,
        }
    }
}

impl ContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_format_version(mut self, version: u8) -> Self {
        self.format_version = version;
        self
    }

    pub fn with_application_marker(mut self, marker: u32) -> Self {
        self.application_marker = marker;
        self
    }

    pub fn with_verify_data_hash(mut self, verify: bool) -> Self {
        self.verify_data_hash = verify;
        self
    }

    pub fn with_verify_item_hash(mut self, verify: bool) -> Self {
        self.verify_item_hash = verify;
        self
    }

    pub fn with_inline_threshold(mut self, threshold: usize, encoding: InlineEncoding) -> Self {
        self.inline_threshold = threshold;
        self.inline_encoding = encoding;
        self
    }

    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}
