//! The frame marshaller: positional call surface over a [`LandmarkDetector`].
//!
//! Arguments are packed into a [`Frame`] and forwarded. The detector's answer
//! is returned as a flat `[x0, y0, x1, y1, ...]` sequence; nothing is
//! validated or retained here.

use std::path::Path;

use crate::engine::{LandmarkDetector, LandmarkEngine};
use crate::error::Result;
use crate::frame::{Frame, PixelFormat};
use crate::region::Region;

pub struct FrameMarshaller<D: LandmarkDetector = LandmarkEngine> {
    detector: D,
}

impl<D: LandmarkDetector> FrameMarshaller<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }

    pub fn load_model<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.detector.load(path.as_ref())
    }

    /// Select the frame layout by Android `ImageFormat` code.
    pub fn set_image_format(&mut self, code: i32) {
        self.detector.configure(PixelFormat::from_code(code));
    }

    pub fn analyze_frame(
        &self,
        buffer: &[u8],
        rotation: i32,
        width: i32,
        height: i32,
        region: Region,
    ) -> Result<Vec<i64>> {
        let frame = Frame::new(buffer, rotation, width, height, region);
        Ok(self.detector.detect(&frame)?.to_flat_vec())
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn into_inner(self) -> D {
        self.detector
    }
}

impl Default for FrameMarshaller<LandmarkEngine> {
    fn default() -> Self {
        Self::new(LandmarkEngine::new())
    }
}
