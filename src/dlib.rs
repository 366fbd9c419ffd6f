//! Loader for dlib's shape_predictor .dat format.
//!
//! A pure Rust parser for dlib's binary shape predictor format, supporting
//! both raw `.dat` files and bzip2-compressed `.dat.bz2` files.
//!
//! # Example
//!
//! ```ignore
//! use landmark_bridge::dlib::load_dlib_model;
//!
//! let model = load_dlib_model("shape_predictor_68_face_landmarks.dat.bz2")?;
//! ```
//!
//! Pre-trained models are available from the dlib-models repository:
//!
//! ```bash
//! git clone --depth 1 git@github.com:davisking/dlib-models.git
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;

use crate::error::{Error, Result};
use crate::model::ShapePredictor;
use crate::tree::{PixelFeature, RegressionTree, Split, TreeEnsemble};
use crate::types::{Point, Shape};

/// Upper bound on speculative preallocation while reading lengths from
/// untrusted input. Longer sequences still load, they just grow as they go.
const MAX_PREALLOC: usize = 1 << 16;

/// Reader wrapper for parsing dlib's binary format.
///
/// dlib uses a variable-length integer encoding:
/// - Control byte: high bit = sign (1 = negative), low 4 bits = number of bytes following
/// - Value bytes: little-endian integer value
///
/// Floats are stored as (mantissa, exponent) pairs, reconstructed via ldexp.
struct DlibReader<R: Read> {
    reader: R,
}

impl<R: Read> DlibReader<R> {
    fn new(reader: R) -> Self {
        Self { reader }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Decode a variable-length integer.
    fn read_int(&mut self) -> Result<i64> {
        let control = self.read_byte()?;
        let is_negative = (control & 0x80) != 0;
        let num_bytes = (control & 0x0F) as usize;

        if num_bytes > 8 {
            return Err(Error::InvalidModel(format!(
                "Integer encoded with {} bytes",
                num_bytes
            )));
        }

        let mut val: u64 = 0;
        for i in 0..num_bytes {
            let byte = self.read_byte()? as u64;
            val |= byte << (8 * i);
        }

        let magnitude = i64::try_from(val)
            .map_err(|_| Error::InvalidModel(format!("Integer {} out of range", val)))?;
        Ok(if is_negative { -magnitude } else { magnitude })
    }

    fn read_ulong(&mut self) -> Result<u64> {
        let val = self.read_int()?;
        if val < 0 {
            return Err(Error::InvalidModel(format!(
                "Expected unsigned value, got {}",
                val
            )));
        }
        Ok(val as u64)
    }

    /// Read a sequence length.
    fn read_len(&mut self) -> Result<usize> {
        let val = self.read_ulong()?;
        usize::try_from(val)
            .map_err(|_| Error::InvalidModel(format!("Length {} out of range", val)))
    }

    fn read_feature_index(&mut self) -> Result<u32> {
        let val = self.read_ulong()?;
        u32::try_from(val)
            .map_err(|_| Error::InvalidModel(format!("Feature index {} out of range", val)))
    }

    /// Decode a float stored as (mantissa, exponent) pair.
    fn read_float(&mut self) -> Result<f32> {
        let mantissa = self.read_int()?;
        let exponent = self.read_int()?;

        if mantissa == 0 {
            return Ok(0.0);
        }

        let exponent = i32::try_from(exponent)
            .map_err(|_| Error::InvalidModel(format!("Float exponent {} out of range", exponent)))?;
        let result = (mantissa as f64) * (2.0_f64).powi(exponent);
        Ok(result as f32)
    }

    /// Read a matrix stored as (-rows, -cols, data...).
    fn read_float_matrix(&mut self) -> Result<(usize, usize, Vec<f32>)> {
        let rows_neg = self.read_int()?;
        let cols_neg = self.read_int()?;

        // Current dlib writes negated dimensions; older files store them as is.
        let rows = rows_neg.unsigned_abs() as usize;
        let cols = cols_neg.unsigned_abs() as usize;
        let len = rows.checked_mul(cols).ok_or_else(|| {
            Error::InvalidModel(format!("Matrix of {}x{} is too large", rows, cols))
        })?;

        let mut data = Vec::with_capacity(len.min(MAX_PREALLOC));
        for _ in 0..len {
            data.push(self.read_float()?);
        }

        Ok((rows, cols, data))
    }
}

/// Load a dlib shape_predictor from a .dat or .dat.bz2 file.
pub fn load_dlib_model<P: AsRef<Path>>(path: P) -> Result<ShapePredictor> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let is_bz2 = path.extension().is_some_and(|ext| ext == "bz2");

    if is_bz2 {
        load_dlib_model_from_reader(BzDecoder::new(reader))
    } else {
        load_dlib_model_from_reader(reader)
    }
}

/// Load a dlib model from an already-opened reader.
pub fn load_dlib_model_from_reader<R: Read>(reader: R) -> Result<ShapePredictor> {
    let mut r = DlibReader::new(reader);
    parse_shape_predictor(&mut r)
}

fn parse_shape_predictor<R: Read>(r: &mut DlibReader<R>) -> Result<ShapePredictor> {
    let version = r.read_int()?;
    if version != 1 {
        return Err(Error::InvalidModel(format!(
            "Unsupported shape_predictor version: {}",
            version
        )));
    }

    let (rows, cols, data) = r.read_float_matrix()?;
    if cols != 1 || rows % 2 != 0 {
        return Err(Error::InvalidModel(format!(
            "Invalid initial_shape dimensions: {}x{}",
            rows, cols
        )));
    }
    let num_landmarks = rows / 2;
    let initial_shape = Shape::from_flat(&data);

    // forests[cascade][tree]
    let num_cascades = r.read_len()?;
    let mut forests: Vec<Vec<RegressionTree>> = Vec::with_capacity(num_cascades.min(MAX_PREALLOC));
    for _ in 0..num_cascades {
        let num_trees = r.read_len()?;
        let mut trees = Vec::with_capacity(num_trees.min(MAX_PREALLOC));
        for _ in 0..num_trees {
            trees.push(parse_tree(r, num_landmarks)?);
        }
        forests.push(trees);
    }

    // anchor_idx[cascade][feature] = landmark index
    let num_anchor_cascades = r.read_len()?;
    let mut anchors: Vec<Vec<u16>> = Vec::with_capacity(num_anchor_cascades.min(MAX_PREALLOC));
    for _ in 0..num_anchor_cascades {
        let n = r.read_len()?;
        let mut cascade_anchors = Vec::with_capacity(n.min(MAX_PREALLOC));
        for _ in 0..n {
            let idx = r.read_ulong()?;
            let idx = u16::try_from(idx)
                .map_err(|_| Error::InvalidModel(format!("Anchor index {} too large", idx)))?;
            cascade_anchors.push(idx);
        }
        anchors.push(cascade_anchors);
    }

    // deltas[cascade][feature] = offset from the anchor
    let num_delta_cascades = r.read_len()?;
    let mut deltas: Vec<Vec<Point>> = Vec::with_capacity(num_delta_cascades.min(MAX_PREALLOC));
    for _ in 0..num_delta_cascades {
        let n = r.read_len()?;
        let mut cascade_deltas = Vec::with_capacity(n.min(MAX_PREALLOC));
        for _ in 0..n {
            let dx = r.read_float()?;
            let dy = r.read_float()?;
            cascade_deltas.push(Point::new(dx, dy));
        }
        deltas.push(cascade_deltas);
    }

    let mut cascade = Vec::with_capacity(num_cascades.min(MAX_PREALLOC));
    for (i, trees) in forests.into_iter().enumerate() {
        let stage_anchors = anchors.get(i).ok_or_else(|| {
            Error::InvalidModel(format!("Missing anchor_idx for cascade {}", i))
        })?;
        let stage_deltas = deltas.get(i).ok_or_else(|| {
            Error::InvalidModel(format!("Missing deltas for cascade {}", i))
        })?;
        if stage_anchors.len() != stage_deltas.len() {
            return Err(Error::InvalidModel(format!(
                "Cascade {} has {} anchors but {} deltas",
                i,
                stage_anchors.len(),
                stage_deltas.len()
            )));
        }

        let features = stage_anchors
            .iter()
            .zip(stage_deltas)
            .map(|(&anchor, &offset)| PixelFeature { anchor, offset })
            .collect();
        cascade.push(TreeEnsemble::new(features, trees, num_landmarks));
    }

    ShapePredictor::new(initial_shape, cascade)
}

fn parse_tree<R: Read>(r: &mut DlibReader<R>, num_landmarks: usize) -> Result<RegressionTree> {
    let num_splits = r.read_len()?;
    let mut splits = Vec::with_capacity(num_splits.min(MAX_PREALLOC));
    for _ in 0..num_splits {
        let idx1 = r.read_feature_index()?;
        let idx2 = r.read_feature_index()?;
        let threshold = r.read_float()?;
        splits.push(Split {
            idx1,
            idx2,
            threshold,
        });
    }

    let num_leaves = r.read_len()?;
    if num_leaves != num_splits + 1 {
        return Err(Error::InvalidModel(format!(
            "Invalid tree: {} splits should have {} leaves, got {}",
            num_splits,
            num_splits + 1,
            num_leaves
        )));
    }

    let mut leaf_values = Vec::with_capacity(num_leaves.min(MAX_PREALLOC));
    for _ in 0..num_leaves {
        let (rows, cols, data) = r.read_float_matrix()?;
        if cols != 1 || rows != num_landmarks * 2 {
            return Err(Error::InvalidModel(format!(
                "Invalid leaf delta: {}x{}, expected {}x1",
                rows,
                cols,
                num_landmarks * 2
            )));
        }
        leaf_values.push(Shape::from_flat(&data));
    }

    Ok(RegressionTree::new(splits, leaf_values))
}
