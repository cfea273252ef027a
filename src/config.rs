//! Configuration for dbdump
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{DumpError, Result};
use crate::format::MAX_SUPPORTED_VERSION;

/// Main configuration shared by the dumper and the restorer
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Dump Configuration
    // -------------------------------------------------------------------------
    /// Size of each copy step when moving spill files into the archive.
    /// Peak memory during the copy phase is one buffer of this size.
    pub copy_buffer_size: usize,

    /// Parent directory for the per-dump spill directory.
    /// `None` uses the system temp directory.
    /// Internal structure:
    ///   {spill_dir}/
    ///     └── .dbdump-XXXXXX/      (removed when the dump returns)
    ///           └── {object_id}    (one append-only file per object)
    pub spill_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Restore Configuration
    // -------------------------------------------------------------------------
    /// Number of interleave lanes (objects streamed concurrently)
    pub fan_out: usize,

    /// Highest archive format version accepted by the parser
    pub max_supported_version: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            copy_buffer_size: 10 * 1024 * 1024, // 10 MiB
            spill_dir: None,
            fan_out: 4,
            max_supported_version: MAX_SUPPORTED_VERSION,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values that would make the dump or restore loop degenerate
    pub fn validate(&self) -> Result<()> {
        if self.copy_buffer_size == 0 {
            return Err(DumpError::InvalidParameter(
                "copy buffer size must be at least 1 byte".to_string(),
            ));
        }
        if self.fan_out == 0 {
            return Err(DumpError::InvalidParameter(
                "invalid interleave factor: fan-out must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the copy step size (in bytes)
    pub fn copy_buffer_size(mut self, size: usize) -> Self {
        self.config.copy_buffer_size = size;
        self
    }

    /// Set the parent directory for spill files
    pub fn spill_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.spill_dir = Some(path.into());
        self
    }

    /// Set the restore interleave fan-out
    pub fn fan_out(mut self, lanes: usize) -> Self {
        self.config.fan_out = lanes;
        self
    }

    /// Set the highest accepted archive format version
    pub fn max_supported_version(mut self, version: u64) -> Self {
        self.config.max_supported_version = version;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
