//! Face gates decide whether a region is worth running the predictor on.
//!
//! A shape predictor always produces a full set of points, face or not, so
//! "no face" has to be decided before prediction. A rejected region yields an
//! empty landmark list.

use image::GrayImage;

use crate::region::Region;

pub trait FaceGate: Send + Sync {
    fn admits(&self, image: &GrayImage, region: &Region) -> bool;
}

/// Admits every region.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FaceGate for AcceptAll {
    fn admits(&self, _image: &GrayImage, _region: &Region) -> bool {
        true
    }
}

/// Rejects regions whose luma is (nearly) flat.
///
/// The region is sampled with its corners put in order and clipped to the
/// image. A region that does not overlap the image is rejected.
#[derive(Debug, Clone, Copy)]
pub struct ContrastGate {
    pub min_stddev: f32,
}

impl ContrastGate {
    pub const DEFAULT_MIN_STDDEV: f32 = 4.0;

    pub fn new(min_stddev: f32) -> Self {
        Self { min_stddev }
    }
}

impl Default for ContrastGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_STDDEV)
    }
}

impl FaceGate for ContrastGate {
    fn admits(&self, image: &GrayImage, region: &Region) -> bool {
        let (width, height) = image.dimensions();
        let right = i32::try_from(width).unwrap_or(i32::MAX);
        let bottom = i32::try_from(height).unwrap_or(i32::MAX);
        let area = region.normalized().in_bounds(0, 0, right, bottom);

        if area.width() <= 0 || area.height() <= 0 {
            return false;
        }

        let mut count = 0f64;
        let mut sum = 0f64;
        let mut sum_sq = 0f64;
        for y in area.top..area.bottom {
            for x in area.left..area.right {
                let v = image.get_pixel(x as u32, y as u32).0[0] as f64;
                count += 1.0;
                sum += v;
                sum_sq += v * v;
            }
        }

        let mean = sum / count;
        let variance = (sum_sq / count - mean * mean).max(0.0);
        variance.sqrt() >= self.min_stddev as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn flat_region_is_rejected() {
        let image = GrayImage::from_pixel(64, 64, Luma([0]));
        assert!(!ContrastGate::default().admits(&image, &Region::new(8, 8, 56, 56)));
    }

    #[test]
    fn textured_region_is_admitted() {
        let image = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 4 + y / 4) % 2 == 0 { 30 } else { 220 }])
        });
        assert!(ContrastGate::default().admits(&image, &Region::new(8, 8, 56, 56)));
    }

    #[test]
    fn only_the_region_is_measured() {
        // Texture on the left half, flat on the right.
        let image = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if x < 32 && (x + y) % 2 == 0 { 255 } else { 0 }])
        });
        let gate = ContrastGate::default();

        assert!(gate.admits(&image, &Region::new(0, 0, 32, 64)));
        assert!(!gate.admits(&image, &Region::new(32, 0, 64, 64)));
    }

    #[test]
    fn inverted_and_outside_regions() {
        let image = GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]));
        let gate = ContrastGate::default();

        assert!(gate.admits(&image, &Region::new(56, 56, 8, 8)));
        assert!(!gate.admits(&image, &Region::new(100, 100, 200, 200)));
        assert!(!gate.admits(&image, &Region::new(10, 10, 10, 10)));
    }

    #[test]
    fn accept_all_admits_anything() {
        let image = GrayImage::from_pixel(4, 4, Luma([0]));
        assert!(AcceptAll.admits(&image, &Region::new(3, 3, 0, 0)));
    }
}
