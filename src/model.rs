use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{extract_feature_values, ImageAccess, Unnormalize};
use crate::region::Region;
use crate::tree::{RegressionTree, TreeEnsemble};
use crate::types::{Point, Shape};

/// The main shape predictor model.
///
/// This implements the ERT algorithm for facial landmark detection.
/// The model consists of:
/// - An initial shape in normalized [0,1] region coordinates
/// - A cascade of stages, each a set of pixel features plus a tree forest
///
/// The whole cascade runs in normalized coordinates; only feature sampling
/// and the final result touch image space.
///
/// # Usage
///
/// ```ignore
/// let model = ShapePredictor::load("model.bin")?;
/// let landmarks = model.predict(&image, &Region::new(100, 100, 300, 300));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapePredictor {
    initial_shape: Shape,
    cascade: Vec<TreeEnsemble>,
}

impl ShapePredictor {
    /// Create a predictor, checking that every stage is consistent with the
    /// initial shape.
    pub fn new(initial_shape: Shape, cascade: Vec<TreeEnsemble>) -> Result<Self> {
        let model = Self {
            initial_shape,
            cascade,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let num_landmarks = self.initial_shape.num_landmarks();
        for (i, stage) in self.cascade.iter().enumerate() {
            if stage.num_landmarks != num_landmarks {
                return Err(Error::InvalidModel(format!(
                    "Cascade stage {} predicts {} landmarks, initial shape has {}",
                    i, stage.num_landmarks, num_landmarks
                )));
            }
            stage.validate()?;
        }
        Ok(())
    }

    /// Load a model from the bincode cache format.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Save the model in the bincode cache format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn num_landmarks(&self) -> usize {
        self.initial_shape.num_landmarks()
    }

    pub fn num_cascade_stages(&self) -> usize {
        self.cascade.len()
    }

    /// Depth of the deepest tree in the cascade, leaves included.
    pub fn max_tree_depth(&self) -> usize {
        self.cascade
            .iter()
            .flat_map(|stage| &stage.trees)
            .map(RegressionTree::depth)
            .max()
            .unwrap_or(0)
    }

    /// Predict landmarks for the face inside `region`, in image coordinates.
    ///
    /// The region is used as given. An inverted rectangle mirrors the
    /// normalized shape instead of failing.
    pub fn predict<I: ImageAccess>(&self, image: &I, region: &Region) -> Shape {
        let mut current = self.initial_shape.clone();

        for stage in &self.cascade {
            let values = extract_feature_values(
                image,
                region,
                &current,
                &self.initial_shape,
                &stage.features,
            );
            current.add_delta(&stage.predict(&values));
        }

        let to_image = Unnormalize::new(region);
        Shape::new(current.points.iter().map(|p| to_image.apply(*p)).collect())
    }
}

/// Builder for creating a ShapePredictor model.
pub struct ShapePredictorBuilder {
    initial_shape: Option<Shape>,
    cascade: Vec<TreeEnsemble>,
}

impl ShapePredictorBuilder {
    pub fn new() -> Self {
        Self {
            initial_shape: None,
            cascade: Vec::new(),
        }
    }

    /// Set the initial (mean) shape.
    pub fn initial_shape(mut self, shape: Shape) -> Self {
        self.initial_shape = Some(shape);
        self
    }

    /// Add a stage to the cascade.
    pub fn add_cascade_stage(mut self, ensemble: TreeEnsemble) -> Self {
        self.cascade.push(ensemble);
        self
    }

    pub fn build(self) -> Result<ShapePredictor> {
        let initial_shape = self
            .initial_shape
            .ok_or_else(|| Error::InvalidModel("Missing initial shape".into()))?;

        if self.cascade.is_empty() {
            return Err(Error::InvalidModel(
                "Cascade must have at least one stage".into(),
            ));
        }

        ShapePredictor::new(initial_shape, self.cascade)
    }
}

impl Default for ShapePredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a simple 5-point mean face shape.
/// Points: left eye center, right eye center, nose tip, left mouth corner, right mouth corner.
pub fn default_5_point_mean_shape() -> Shape {
    Shape::new(vec![
        Point::new(0.30, 0.30), // left eye
        Point::new(0.70, 0.30), // right eye
        Point::new(0.50, 0.55), // nose tip
        Point::new(0.35, 0.75), // left mouth
        Point::new(0.65, 0.75), // right mouth
    ])
}
