//! Session configuration, loaded from JSON.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pixel width and height requested for each of the three planes
    pub plane_resolution: [u16; 2],
    /// Maximum resolution of whole-volume fetches
    pub volume_resolution: [u16; 3],
    /// Keep every whole-volume frame in memory for scrubbing
    pub preload_frames: bool,
    /// Preloading is skipped above this many frames
    pub max_preload_frames: usize,
    pub enable_flow: bool,
    pub enable_ecg: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            plane_resolution: [256, 256],
            volume_resolution: [150, 150, 150],
            preload_frames: false,
            max_preload_frames: 128,
            enable_flow: true,
            enable_ecg: true,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
