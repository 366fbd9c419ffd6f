//! # landmark-bridge
//!
//! Facial landmark detection on raw camera frames behind a typed detector
//! interface.
//!
//! This crate provides:
//! - **Frame marshalling**: a positional `load_model` / `set_image_format` /
//!   `analyze_frame` surface over any [`LandmarkDetector`]
//! - **An ERT engine**: a pure Rust implementation of dlib's shape predictor
//!   ("One Millisecond Face Alignment with an Ensemble of Regression Trees",
//!   Kazemi & Sullivan, 2014) that reads dlib `.dat` / `.dat.bz2` models
//! - **Frame preprocessing**: YUV luma extraction, orientation correction and
//!   histogram equalization
//! - **Model management**: a downloadable model catalog with integrity checks
//!
//! ## Pipeline
//!
//! 1. Take the luma plane of an NV21 / YV12 / YUV_420_888 frame
//! 2. Rotate or mirror it according to the rotation hint
//! 3. Equalize its histogram
//! 4. Skip regions without enough contrast to hold a face (empty result)
//! 5. Run the regression-tree cascade inside the region of interest
//! 6. Return integer `[x0, y0, x1, y1, ...]` coordinates in the oriented frame
//!
//! ## Quick Start
//!
//! ```rust
//! use landmark_bridge::{
//!     default_5_point_mean_shape, FrameMarshaller, LandmarkEngine, PixelFeature,
//!     PixelFormat, Point, Region, RegressionTree, Shape, ShapePredictorBuilder,
//!     TreeEnsemble,
//! };
//!
//! // Load a trained model with `marshaller.load_model(path)`, or build a
//! // trivial one for development:
//! let stage = TreeEnsemble::new(
//!     vec![PixelFeature { anchor: 0, offset: Point::zero() }],
//!     vec![RegressionTree::leaf(Shape::zeros(5))],
//!     5,
//! );
//! let model = ShapePredictorBuilder::new()
//!     .initial_shape(default_5_point_mean_shape())
//!     .add_cascade_stage(stage)
//!     .build()
//!     .unwrap();
//!
//! let mut marshaller = FrameMarshaller::new(LandmarkEngine::new().with_predictor(model));
//! marshaller.set_image_format(PixelFormat::NV21_CODE);
//!
//! // A 64x48 NV21 frame with a striped luma plane.
//! let (w, h) = (64usize, 48usize);
//! let mut frame = vec![128u8; w * (h + h / 2)];
//! for (i, px) in frame[..w * h].iter_mut().enumerate() {
//!     *px = if i % 2 == 0 { 30 } else { 220 };
//! }
//!
//! let coords = marshaller
//!     .analyze_frame(&frame, 90, w as i32, h as i32, Region::new(4, 4, 44, 44))
//!     .unwrap();
//! assert_eq!(coords.len(), 10);
//! ```

pub mod catalog;
pub mod config;
pub mod dlib;
pub mod engine;
mod error;
mod features;
pub mod frame;
pub mod gate;
pub mod marshal;
mod model;
pub mod region;
mod tree;
mod types;

pub use catalog::{CatalogDiff, HashAlgorithm, ModelCatalog, ModelEntry};
pub use config::EngineConfig;
pub use engine::{LandmarkDetector, LandmarkEngine, ModelFormat};
pub use error::{Error, Result};
pub use features::{find_similarity_transform, ImageAccess, SimilarityTransform2D};
pub use frame::{equalize_histogram, Frame, Orientation, PixelFormat};
pub use gate::{AcceptAll, ContrastGate, FaceGate};
pub use marshal::FrameMarshaller;
pub use model::{default_5_point_mean_shape, ShapePredictor, ShapePredictorBuilder};
pub use region::Region;
pub use tree::{PixelFeature, RegressionTree, Split, TreeEnsemble};
pub use types::{Landmarks, PixelPoint, Point, Shape};
