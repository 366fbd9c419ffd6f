use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Point, Shape};

/// A pixel sampled relative to one landmark of the current shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PixelFeature {
    /// Landmark the sample is anchored to.
    pub anchor: u16,
    /// Offset from the anchor, in the reference (initial) shape's frame.
    pub offset: Point,
}

/// Split test comparing the difference of two sampled pixels to a threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Split {
    pub idx1: u32,
    pub idx2: u32,
    pub threshold: f32,
}

/// A single regression tree.
///
/// The tree is complete and stored heap-style: the children of split `i`
/// are `2i + 1` and `2i + 2`, and indices past the last split address
/// `leaf_values`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub splits: Vec<Split>,
    pub leaf_values: Vec<Shape>,
}

impl RegressionTree {
    pub fn new(splits: Vec<Split>, leaf_values: Vec<Shape>) -> Self {
        Self {
            splits,
            leaf_values,
        }
    }

    /// A tree with no splits that always predicts `delta`.
    pub fn leaf(delta: Shape) -> Self {
        Self::new(Vec::new(), vec![delta])
    }

    /// Traverse the tree with the stage's feature values and return the leaf delta.
    pub fn predict(&self, feature_values: &[f32]) -> &Shape {
        let mut i = 0usize;
        while i < self.splits.len() {
            let split = &self.splits[i];
            let diff = feature_values[split.idx1 as usize] - feature_values[split.idx2 as usize];
            i = if diff > split.threshold { 2 * i + 1 } else { 2 * i + 2 };
        }
        &self.leaf_values[i - self.splits.len()]
    }

    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut first_leaf = 1usize;
        while first_leaf <= self.splits.len() {
            first_leaf = 2 * first_leaf + 1;
            depth += 1;
        }
        depth
    }

    fn validate(&self, num_features: usize, num_landmarks: usize) -> Result<()> {
        if self.leaf_values.len() != self.splits.len() + 1 {
            return Err(Error::InvalidModel(format!(
                "Invalid tree: {} splits should have {} leaves, got {}",
                self.splits.len(),
                self.splits.len() + 1,
                self.leaf_values.len()
            )));
        }
        for split in &self.splits {
            if split.idx1 as usize >= num_features || split.idx2 as usize >= num_features {
                return Err(Error::InvalidModel(format!(
                    "Split references feature ({}, {}) but the stage has {}",
                    split.idx1, split.idx2, num_features
                )));
            }
        }
        for leaf in &self.leaf_values {
            if leaf.num_landmarks() != num_landmarks {
                return Err(Error::InvalidModel(format!(
                    "Leaf delta has {} points, expected {}",
                    leaf.num_landmarks(),
                    num_landmarks
                )));
            }
        }
        Ok(())
    }
}

/// One cascade stage: the pixels it samples and the forest that reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub features: Vec<PixelFeature>,
    pub trees: Vec<RegressionTree>,
    pub num_landmarks: usize,
}

impl TreeEnsemble {
    pub fn new(
        features: Vec<PixelFeature>,
        trees: Vec<RegressionTree>,
        num_landmarks: usize,
    ) -> Self {
        Self {
            features,
            trees,
            num_landmarks,
        }
    }

    /// Sum the leaf deltas chosen by every tree.
    pub fn predict(&self, feature_values: &[f32]) -> Shape {
        let mut delta = Shape::zeros(self.num_landmarks);
        for tree in &self.trees {
            delta.add_delta(tree.predict(feature_values));
        }
        delta
    }

    /// Check that every index used during prediction is in range.
    pub fn validate(&self) -> Result<()> {
        for feature in &self.features {
            if feature.anchor as usize >= self.num_landmarks {
                return Err(Error::InvalidModel(format!(
                    "Feature anchored to landmark {} of {}",
                    feature.anchor, self.num_landmarks
                )));
            }
        }
        for tree in &self.trees {
            tree.validate(self.features.len(), self.num_landmarks)?;
        }
        Ok(())
    }
}
