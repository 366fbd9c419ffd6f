use image::GrayImage;

use crate::region::Region;
use crate::tree::PixelFeature;
use crate::types::{Point, Shape};

/// Trait for accessing pixel intensities from an image.
pub trait ImageAccess {
    /// Get the grayscale intensity at (x, y). Returns 0 for out-of-bounds pixels.
    fn get_pixel(&self, x: i64, y: i64) -> u8;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl ImageAccess for GrayImage {
    fn get_pixel(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return 0;
        }
        self.get_pixel(x as u32, y as u32).0[0]
    }

    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }
}

/// The rotation+scale part of a 2D similarity transform, as `[[a, -b], [b, a]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform2D {
    pub a: f32,
    pub b: f32,
}

impl SimilarityTransform2D {
    pub const IDENTITY: Self = Self { a: 1.0, b: 0.0 };

    pub fn apply(&self, p: Point) -> Point {
        Point::new(self.a * p.x - self.b * p.y, self.b * p.x + self.a * p.y)
    }
}

/// Least-squares similarity transform mapping `from` onto `to`.
///
/// Only the linear part is returned; the translation is irrelevant when the
/// transform is applied to offsets. Degenerate inputs yield the identity.
pub fn find_similarity_transform(from: &Shape, to: &Shape) -> SimilarityTransform2D {
    let n = from.num_landmarks().min(to.num_landmarks());
    if n == 0 {
        return SimilarityTransform2D::IDENTITY;
    }

    let mean = |s: &Shape| {
        let (sx, sy) = s.points[..n]
            .iter()
            .fold((0.0f64, 0.0f64), |(ax, ay), p| (ax + p.x as f64, ay + p.y as f64));
        (sx / n as f64, sy / n as f64)
    };
    let (fmx, fmy) = mean(from);
    let (tmx, tmy) = mean(to);

    // Treat points as complex numbers: the optimal map is z -> c * z with
    // c = sum(conj(f) * t) / sum(|f|^2) over the centred points.
    let mut dot = 0.0f64;
    let mut cross = 0.0f64;
    let mut norm = 0.0f64;
    for (f, t) in from.points[..n].iter().zip(&to.points[..n]) {
        let (fx, fy) = (f.x as f64 - fmx, f.y as f64 - fmy);
        let (tx, ty) = (t.x as f64 - tmx, t.y as f64 - tmy);
        dot += fx * tx + fy * ty;
        cross += fx * ty - fy * tx;
        norm += fx * fx + fy * fy;
    }

    if norm <= f64::EPSILON {
        return SimilarityTransform2D::IDENTITY;
    }

    SimilarityTransform2D {
        a: (dot / norm) as f32,
        b: (cross / norm) as f32,
    }
}

/// Maps normalized shape coordinates onto a region: `(0,0)` to its top-left
/// corner and `(1,1)` to its bottom-right corner.
#[derive(Debug, Clone, Copy)]
pub struct Unnormalize {
    origin: Point,
    scale: Point,
}

impl Unnormalize {
    pub fn new(region: &Region) -> Self {
        Self {
            origin: Point::new(region.left as f32, region.top as f32),
            scale: Point::new(region.width() as f32, region.height() as f32),
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.origin.x + p.x * self.scale.x,
            self.origin.y + p.y * self.scale.y,
        )
    }
}

/// Sample every pixel feature of a cascade stage.
///
/// Each feature's offset is rotated and scaled into the current shape's
/// frame, added to its anchor, mapped into the image and rounded to the
/// nearest pixel. Samples outside the image read as 0.
pub fn extract_feature_values<I: ImageAccess>(
    image: &I,
    region: &Region,
    current: &Shape,
    reference: &Shape,
    features: &[PixelFeature],
) -> Vec<f32> {
    let tform = find_similarity_transform(reference, current);
    let to_image = Unnormalize::new(region);

    features
        .iter()
        .map(|feature| {
            let anchor = current[feature.anchor as usize];
            let p = to_image.apply(tform.apply(feature.offset) + anchor).round();
            image.get_pixel(p.x, p.y) as f32
        })
        .collect()
}
