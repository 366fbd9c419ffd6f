//! The landmark detector seam and the engine behind it.
//!
//! [`LandmarkDetector`] is what callers program against. [`LandmarkEngine`]
//! is the engine context: it owns the loaded model and the configured pixel
//! format, so initialization order is visible in the types. Loading and
//! configuring take `&mut self`, detection takes `&self`; sharing an engine
//! across threads is the caller's choice (`Arc<RwLock<_>>` works).

use std::path::Path;

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dlib::load_dlib_model;
use crate::error::{Error, Result};
use crate::frame::{equalize_histogram, Frame, Orientation, PixelFormat};
use crate::gate::{AcceptAll, ContrastGate, FaceGate};
use crate::model::ShapePredictor;
use crate::types::Landmarks;

/// A swappable landmark detection engine.
pub trait LandmarkDetector: Send + Sync {
    /// Load a model, replacing the current one on success.
    fn load(&mut self, path: &Path) -> Result<()>;

    /// Set the pixel format used to read subsequent frames.
    fn configure(&mut self, format: PixelFormat);

    /// Find landmarks in one frame. An empty result means no face.
    fn detect(&self, frame: &Frame<'_>) -> Result<Landmarks>;
}

/// On-disk model encodings, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `*.bz2`: bzip2-compressed dlib model.
    DlibCompressed,
    /// `*.bin`: this crate's bincode model cache.
    Native,
    /// Anything else: raw dlib `.dat`.
    Dlib,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bz2") => Self::DlibCompressed,
            Some("bin") => Self::Native,
            _ => Self::Dlib,
        }
    }

    pub fn load(self, path: &Path) -> Result<ShapePredictor> {
        match self {
            Self::Native => ShapePredictor::load(path),
            Self::Dlib | Self::DlibCompressed => load_dlib_model(path),
        }
    }
}

/// ERT-based [`LandmarkDetector`].
pub struct LandmarkEngine {
    predictor: Option<ShapePredictor>,
    format: PixelFormat,
    equalize: bool,
    gate: Box<dyn FaceGate>,
}

impl LandmarkEngine {
    pub fn new() -> Self {
        Self {
            predictor: None,
            format: PixelFormat::default(),
            equalize: true,
            gate: Box::new(ContrastGate::default()),
        }
    }

    /// Build an engine from a configuration, loading its model if one is named.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let gate: Box<dyn FaceGate> = if config.min_contrast > 0.0 {
            Box::new(ContrastGate::new(config.min_contrast))
        } else {
            Box::new(AcceptAll)
        };

        let mut engine = Self::new()
            .with_equalization(config.equalize)
            .with_gate(gate);
        engine.configure(config.pixel_format());

        if let Some(model) = &config.model {
            engine.load(model)?;
        }
        Ok(engine)
    }

    pub fn with_predictor(mut self, predictor: ShapePredictor) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_equalization(mut self, equalize: bool) -> Self {
        self.equalize = equalize;
        self
    }

    pub fn with_gate(mut self, gate: Box<dyn FaceGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn predictor(&self) -> Option<&ShapePredictor> {
        self.predictor.as_ref()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }
}

impl Default for LandmarkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkDetector for LandmarkEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        let format = ModelFormat::from_path(path);
        match format.load(path) {
            Ok(predictor) => {
                info!(
                    "model loaded from {}: {} landmarks, {} cascade stages, tree depth {}",
                    path.display(),
                    predictor.num_landmarks(),
                    predictor.num_cascade_stages(),
                    predictor.max_tree_depth()
                );
                self.predictor = Some(predictor);
                Ok(())
            }
            Err(e) => {
                warn!("failed to load model {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    fn configure(&mut self, format: PixelFormat) {
        debug!("pixel format set to {:?}", format);
        self.format = format;
    }

    fn detect(&self, frame: &Frame<'_>) -> Result<Landmarks> {
        let predictor = self.predictor.as_ref().ok_or(Error::ModelNotLoaded)?;

        let luma = frame.luma(self.format)?;
        let mut image = Orientation::from_hint(frame.rotation).apply(luma);
        if self.equalize {
            equalize_histogram(&mut image);
        }

        if !self.gate.admits(&image, &frame.region) {
            debug!("no face in {}", frame.region);
            return Ok(Landmarks::empty());
        }

        let shape = predictor.predict(&image, &frame.region);
        Ok(Landmarks::from(&shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_5_point_mean_shape;
    use crate::region::Region;
    use crate::tree::{PixelFeature, RegressionTree, TreeEnsemble};
    use crate::types::{Point, Shape};

    fn zero_model() -> ShapePredictor {
        let stage = TreeEnsemble::new(
            vec![PixelFeature {
                anchor: 0,
                offset: Point::zero(),
            }],
            vec![RegressionTree::leaf(Shape::zeros(5))],
            5,
        );
        ShapePredictor::new(default_5_point_mean_shape(), vec![stage]).unwrap()
    }

    fn textured_nv21(width: usize, height: usize) -> Vec<u8> {
        let mut data = vec![128u8; width * (height + height / 2)];
        for (i, px) in data[..width * height].iter_mut().enumerate() {
            *px = if (i / 3) % 2 == 0 { 40 } else { 210 };
        }
        data
    }

    #[test]
    fn model_format_from_extension() {
        assert_eq!(
            ModelFormat::from_path(Path::new("sp68.dat.bz2")),
            ModelFormat::DlibCompressed
        );
        assert_eq!(ModelFormat::from_path(Path::new("model.bin")), ModelFormat::Native);
        assert_eq!(ModelFormat::from_path(Path::new("sp5.dat")), ModelFormat::Dlib);
        assert_eq!(ModelFormat::from_path(Path::new("noext")), ModelFormat::Dlib);
    }

    #[test]
    fn detect_without_model_is_an_error() {
        let engine = LandmarkEngine::new();
        let data = textured_nv21(8, 8);
        let frame = Frame::new(&data, 270, 8, 8, Region::new(0, 0, 8, 8));

        assert!(matches!(engine.detect(&frame), Err(Error::ModelNotLoaded)));
    }

    #[test]
    fn detect_maps_mean_shape_into_region() {
        let engine = LandmarkEngine::new().with_predictor(zero_model());
        let data = textured_nv21(100, 100);
        let frame = Frame::new(&data, 270, 100, 100, Region::new(0, 0, 100, 100));

        let landmarks = engine.detect(&frame).unwrap();
        assert_eq!(landmarks.len(), 5);
        assert_eq!(landmarks.to_flat_vec()[..4], [30, 30, 70, 30]);
    }

    #[test]
    fn flat_frame_yields_no_landmarks() {
        let engine = LandmarkEngine::new().with_predictor(zero_model());
        let data = vec![0u8; 64 * 96];
        let frame = Frame::new(&data, 90, 64, 64, Region::new(8, 8, 56, 56));

        assert!(engine.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn accept_all_gate_predicts_on_flat_frames() {
        let engine = LandmarkEngine::new()
            .with_predictor(zero_model())
            .with_gate(Box::new(AcceptAll));
        let data = vec![0u8; 64 * 96];
        let frame = Frame::new(&data, 90, 64, 64, Region::new(8, 8, 56, 56));

        assert_eq!(engine.detect(&frame).unwrap().len(), 5);
    }

    #[test]
    fn unsupported_format_is_reported_on_detect() {
        let mut engine = LandmarkEngine::new().with_predictor(zero_model());
        engine.configure(PixelFormat::from_code(1));
        let data = textured_nv21(8, 8);
        let frame = Frame::new(&data, 0, 8, 8, Region::new(0, 0, 8, 8));

        assert!(matches!(engine.detect(&frame), Err(Error::UnsupportedFormat(1))));
    }

    #[test]
    fn failed_load_keeps_previous_model() {
        let mut engine = LandmarkEngine::new().with_predictor(zero_model());
        let dir = tempfile::tempdir().unwrap();

        assert!(engine.load(&dir.path().join("missing.bin")).is_err());
        assert_eq!(engine.predictor().map(|p| p.num_landmarks()), Some(5));
    }

    #[test]
    fn from_config_applies_settings() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.bin");
        zero_model().save(&model_path).unwrap();

        let config = EngineConfig {
            model: Some(model_path),
            pixel_format: PixelFormat::YV12_CODE,
            equalize: false,
            min_contrast: 0.0,
        };
        let engine = LandmarkEngine::from_config(&config).unwrap();

        assert_eq!(engine.pixel_format(), PixelFormat::Yv12);
        assert!(engine.predictor().is_some());
    }
}
