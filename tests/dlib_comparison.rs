//! Integration tests comparing engine output against dlib reference results.
//!
//! These need the published models:
//! `git clone --depth 1 git@github.com:davisking/dlib-models.git`

use std::path::PathBuf;

use landmark_bridge::{AcceptAll, FrameMarshaller, LandmarkEngine, PixelFormat, Region};

fn published_model(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("dlib-models")
        .join(name);
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Skipping test: {:?} not found", path);
        None
    }
}

/// NV21 frame whose luma is the gradient `(x + y) % 256`.
fn gradient_frame(width: usize, height: usize) -> Vec<u8> {
    let mut data = vec![128u8; width * (height + height / 2)];
    for y in 0..height {
        for x in 0..width {
            data[y * width + x] = ((x + y) % 256) as u8;
        }
    }
    data
}

/// Engine without preprocessing side effects, so the predictor sees the raw gradient.
fn raw_marshaller(model: &PathBuf) -> FrameMarshaller {
    let engine = LandmarkEngine::new()
        .with_equalization(false)
        .with_gate(Box::new(AcceptAll));
    let mut marshaller = FrameMarshaller::new(engine);
    marshaller.load_model(model).expect("Failed to load model");
    marshaller.set_image_format(PixelFormat::NV21_CODE);
    marshaller
}

/// dlib's 5-point model on a 100x100 gradient, rectangle(25, 25, 75, 75).
const DLIB_REFERENCE_5POINT: [(i64, i64); 5] = [(68, 46), (60, 45), (40, 40), (48, 42), (51, 60)];

#[test]
fn compare_5point_inference() {
    let Some(model) = published_model("shape_predictor_5_face_landmarks.dat.bz2") else {
        return;
    };
    let marshaller = raw_marshaller(&model);

    // Rotation 270 leaves the frame as captured.
    let frame = gradient_frame(100, 100);
    let coords = marshaller
        .analyze_frame(&frame, 270, 100, 100, Region::new(25, 25, 75, 75))
        .unwrap();
    assert_eq!(coords.len(), 10);

    println!("{:<8} {:>12} {:>12}", "Landmark", "engine", "dlib");
    let mut max_error = 0.0f64;
    for (i, (xy, (ex, ey))) in coords.chunks_exact(2).zip(DLIB_REFERENCE_5POINT).enumerate() {
        let error = (((xy[0] - ex).pow(2) + (xy[1] - ey).pow(2)) as f64).sqrt();
        max_error = max_error.max(error);
        println!("{:<8} ({:>4}, {:>4}) ({:>4}, {:>4})", i, xy[0], xy[1], ex, ey);
    }

    assert!(max_error <= 1.5, "Max error {:.2}px exceeds tolerance", max_error);
}

#[test]
fn inference_stays_near_region() {
    let Some(model) = published_model("shape_predictor_68_face_landmarks.dat.bz2") else {
        return;
    };
    let marshaller = raw_marshaller(&model);

    let frame = gradient_frame(200, 200);
    let region = Region::new(50, 50, 150, 150);
    let coords = marshaller.analyze_frame(&frame, 270, 200, 200, region).unwrap();
    assert_eq!(coords.len(), 136);

    let margin = 50;
    for xy in coords.chunks_exact(2) {
        assert!((region.left as i64 - margin..=region.right as i64 + margin).contains(&xy[0]));
        assert!((region.top as i64 - margin..=region.bottom as i64 + margin).contains(&xy[1]));
    }
}
