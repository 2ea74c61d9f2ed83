//! Configuration for dataset creation.

use serde::{Deserialize, Serialize};

/// Highest compression level accepted by the deflate codec.
pub const MAX_COMPRESSION_LEVEL: u8 = 9;

/// Chunk length used for growable 1-D arrays when no chunk size is given.
pub const DEFAULT_VR_CHUNK_SIZE: u64 = 1024;

/// Storage settings applied to layers created without explicit arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagConfig {
    /// Square chunk edge for 2-D layers. 0 stores each layer as one chunk.
    pub chunk_size: u64,

    /// Deflate compression level (0-9). 0 disables compression.
    pub compression_level: u8,

    /// Chunk length for growable 1-D arrays (VR refinements, VR nodes,
    /// tracking lists).
    pub vr_chunk_size: u64,
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            compression_level: 5,
            vr_chunk_size: DEFAULT_VR_CHUNK_SIZE,
        }
    }
}

impl BagConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("BAG_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("BAG_COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Ok(val) = std::env::var("BAG_VR_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.vr_chunk_size = size;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(format!(
                "compression_level must be 0-{MAX_COMPRESSION_LEVEL}"
            ));
        }

        if self.vr_chunk_size == 0 {
            return Err("vr_chunk_size must be > 0".to_string());
        }

        Ok(())
    }

    /// The chunk length to use for a growable 1-D array.
    pub(crate) fn growable_chunk(&self, chunk_size: u64) -> u64 {
        if chunk_size > 0 {
            chunk_size
        } else {
            self.vr_chunk_size
        }
    }
}

/// Check a per-layer compression level.
pub(crate) fn check_compression_level(level: u8) -> crate::Result<()> {
    if level > MAX_COMPRESSION_LEVEL {
        return Err(crate::BagError::invalid_argument(format!(
            "compression level {level} is outside 0-{MAX_COMPRESSION_LEVEL}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BagConfig::default();
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.compression_level, 5);
        assert_eq!(config.vr_chunk_size, DEFAULT_VR_CHUNK_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = BagConfig::default();
        config.compression_level = 10;
        assert!(config.validate().is_err());

        config = BagConfig::default();
        config.vr_chunk_size = 0;
        assert!(config.validate().is_err());

        config = BagConfig::default();
        config.chunk_size = 0;
        config.compression_level = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_growable_chunk_falls_back() {
        let config = BagConfig::default();
        assert_eq!(config.growable_chunk(0), DEFAULT_VR_CHUNK_SIZE);
        assert_eq!(config.growable_chunk(64), 64);
    }

    #[test]
    fn test_check_compression_level() {
        assert!(check_compression_level(0).is_ok());
        assert!(check_compression_level(9).is_ok());
        assert!(check_compression_level(10).is_err());
    }
}
