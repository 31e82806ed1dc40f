use std::fs;
use std::path::Path;

use sc_data::AugmentConfig;
use sc_hash::{sha256, Digest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration failures surfaced to the operator.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("batch_size must be positive")]
    ZeroBatchSize,
    #[error("epochs must be positive")]
    ZeroEpochs,
}

/// Operator-authored pipeline configuration.
///
/// Serialized as JSON on disk; committed to the provenance chain through
/// [`config_hash`](PipelineConfig::config_hash).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed for the permutation and every augmentation draw.
    pub seed: u64,
    /// Maximum samples per batch.
    pub batch_size: u32,
    /// Number of epochs to run.
    pub epochs: u32,
    pub augment: AugmentConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            batch_size: 32,
            epochs: 1,
            augment: AugmentConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a JSON configuration document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Pretty JSON rendering for tooling.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.epochs == 0 {
            return Err(ConfigError::ZeroEpochs);
        }
        Ok(())
    }

    /// Canonical little-endian encoding of every field, in a fixed order:
    /// seed, batch_size, epochs, then the augmentation flags as single
    /// bytes in pipeline order (crop, h_flip, v_flip, brightness, noise)
    /// followed by crop_height, crop_width, brightness_delta, noise_std.
    ///
    /// This byte layout — not the JSON text — is what the configuration
    /// hash commits to, and it is frozen: reordering or widening a field
    /// changes every downstream provenance hash.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(37);
        bytes.extend_from_slice(&self.seed.to_le_bytes());
        bytes.extend_from_slice(&self.batch_size.to_le_bytes());
        bytes.extend_from_slice(&self.epochs.to_le_bytes());
        let a = &self.augment;
        bytes.push(a.random_crop as u8);
        bytes.push(a.h_flip as u8);
        bytes.push(a.v_flip as u8);
        bytes.push(a.brightness as u8);
        bytes.push(a.additive_noise as u8);
        bytes.extend_from_slice(&a.crop_height.to_le_bytes());
        bytes.extend_from_slice(&a.crop_width.to_le_bytes());
        bytes.extend_from_slice(&a.brightness_delta.to_le_bytes());
        bytes.extend_from_slice(&a.noise_std.to_le_bytes());
        bytes
    }

    /// The 32-byte commitment the provenance chain binds at genesis.
    pub fn config_hash(&self) -> Digest {
        sha256(&self.canonical_bytes())
    }
}
