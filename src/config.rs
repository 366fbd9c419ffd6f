//! Engine configuration, read from TOML.
//!
//! ```toml
//! model = "shape_predictor_68_face_landmarks.dat.bz2"
//! pixel_format = 17
//! equalize = true
//! min_contrast = 4.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::PixelFormat;
use crate::gate::ContrastGate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Model loaded when the engine is built. Optional.
    pub model: Option<PathBuf>,
    /// Android `ImageFormat` code of incoming frames.
    pub pixel_format: i32,
    /// Equalize the luma histogram before prediction.
    pub equalize: bool,
    /// Minimum luma standard deviation inside the region; 0 disables gating.
    pub min_contrast: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: None,
            pixel_format: PixelFormat::NV21_CODE,
            equalize: true,
            min_contrast: ContrastGate::DEFAULT_MIN_STDDEV,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read a config file. A relative `model` path is resolved against the
    /// file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_toml_str(&fs::read_to_string(path)?)?;

        if let (Some(model), Some(dir)) = (config.model.as_mut(), path.parent()) {
            if model.is_relative() {
                *model = dir.join(&*model);
            }
        }
        Ok(config)
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::from_code(self.pixel_format)
    }
}
