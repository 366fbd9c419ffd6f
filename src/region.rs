//! Region of interest and the rectangle helpers used to prepare one.
//!
//! A [`Region`] is an integer rectangle in frame pixels, `left`/`top`
//! inclusive and `right`/`bottom` exclusive. Nothing here enforces
//! `left <= right` or `top <= bottom`: detectors receive the caller's
//! rectangle exactly as given.

use serde::{Deserialize, Serialize};

/// Camera-driver face rectangles live in `[-1000, 1000]` on both axes.
const CAMERA_SPACE_HALF_EXTENT: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Signed horizontal extent. Widened so that any pair of `i32` edges fits.
    pub const fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    /// Signed vertical extent. Widened like [`Region::width`].
    pub const fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    pub const fn is_well_formed(&self) -> bool {
        self.left <= self.right && self.top <= self.bottom
    }

    /// Integer centre, rounding towards negative infinity.
    pub const fn center(&self) -> (i32, i32) {
        (
            ((self.left as i64 + self.right as i64) >> 1) as i32,
            ((self.top as i64 + self.bottom as i64) >> 1) as i32,
        )
    }

    /// Same rectangle with corners swapped where needed so that it is well formed.
    pub fn normalized(&self) -> Self {
        Self {
            left: self.left.min(self.right),
            top: self.top.min(self.bottom),
            right: self.left.max(self.right),
            bottom: self.top.max(self.bottom),
        }
    }

    /// Clamp each edge into the given bounds.
    pub fn in_bounds(mut self, left: i32, top: i32, right: i32, bottom: i32) -> Self {
        if self.left < left {
            self.left = left;
        }
        if self.right > right {
            self.right = right;
        }
        if self.top < top {
            self.top = top;
        }
        if self.bottom > bottom {
            self.bottom = bottom;
        }
        self
    }

    /// Grow (or shrink) the rectangle about its centre by the given factors.
    pub fn scale(mut self, x_scale: f32, y_scale: f32) -> Self {
        let w = self.width() as f32;
        let h = self.height() as f32;
        let dw = ((w * x_scale - w) * 0.5) as i32;
        let dh = ((h * y_scale - h) * 0.5) as i32;

        self.left = self.left.saturating_sub(dw);
        self.right = self.right.saturating_add(dw);
        self.top = self.top.saturating_sub(dh);
        self.bottom = self.bottom.saturating_add(dh);
        self
    }

    /// Map a camera-driver face rectangle into frame pixels.
    ///
    /// The face is first squared around its centre, then its normalized
    /// extents are laid out according to the display rotation: `90` for
    /// portrait, `0` for landscape-left and `180` for landscape-right. Any
    /// other rotation leaves the rectangle untouched.
    pub fn map_from_camera(self, width: i32, height: i32, rotation: i32) -> Self {
        let hw = self.width() as f32 / 2.0;
        let hh = self.height() as f32 / 2.0;
        let cx = self.left as f32 + hw;
        let cy = self.top as f32 + hh;
        let side = (hh + hw) / 2.0;

        let to_unit = |v: f32| (v + CAMERA_SPACE_HALF_EXTENT) / (2.0 * CAMERA_SPACE_HALF_EXTENT);
        let l = to_unit(cx - side);
        let r = to_unit(cx + side);
        let t = to_unit(cy - side);
        let b = to_unit(cy + side);

        let short = width.min(height) as f32;
        let long = width.max(height) as f32;

        match rotation {
            90 => {
                let (w, h) = (short, long);
                Self::new(
                    round(w - w * b),
                    round(h - h * r),
                    round(w - w * t),
                    round(h - h * l),
                )
            }
            0 => {
                let (w, h) = (long, short);
                Self::new(round(w - w * r), round(h * t), round(w - w * l), round(h * b))
                    .swap_extents()
            }
            180 => {
                let (w, h) = (long, short);
                Self::new(round(w * l), round(h - h * b), round(w * r), round(h - h * t))
                    .swap_extents()
            }
            _ => self,
        }
    }

    /// Exchange horizontal and vertical extents while keeping the centre.
    fn swap_extents(self) -> Self {
        let half_w = self.width() as f32 * 0.5;
        let half_h = self.height() as f32 * 0.5;
        let (x0, y0) = self.center();
        let (x0, y0) = (x0 as f32, y0 as f32);

        Self::new(
            (x0 - half_h) as i32,
            (y0 - half_w) as i32,
            (x0 + half_h) as i32,
            (y0 + half_w) as i32,
        )
    }
}

fn round(v: f32) -> i32 {
    (v + 0.5).floor() as i32
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Region] (left: {} top: {}), (right: {} bottom: {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    /// Parse `left,top,right,bottom`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<i32> = s
            .split(',')
            .map(|p| p.trim().parse::<i32>().map_err(|e| format!("{p:?}: {e}")))
            .collect::<std::result::Result<_, _>>()?;

        match parts.as_slice() {
            [left, top, right, bottom] => Ok(Self::new(*left, *top, *right, *bottom)),
            _ => Err(format!("expected 4 comma-separated integers, got {}", parts.len())),
        }
    }
}
