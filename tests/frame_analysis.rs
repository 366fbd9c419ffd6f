//! End-to-end frame analysis through the marshaller with a synthetic model.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::thread;

use landmark_bridge::{
    default_5_point_mean_shape, Error, FrameMarshaller, PixelFeature, PixelFormat, Point, Region,
    RegressionTree, Shape, ShapePredictorBuilder, Split, TreeEnsemble,
};
use rstest::rstest;

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

/// Five-point model whose single split compares the two eye samples.
fn write_model(path: &Path) {
    let features = vec![
        PixelFeature {
            anchor: 0,
            offset: Point::zero(),
        },
        PixelFeature {
            anchor: 1,
            offset: Point::zero(),
        },
        PixelFeature {
            anchor: 2,
            offset: Point::new(0.0, 0.05),
        },
    ];
    let nudge = |dy: f32| Shape::new(vec![Point::new(0.0, dy); 5]);
    let tree = RegressionTree::new(
        vec![Split {
            idx1: 2,
            idx2: 0,
            threshold: 0.0,
        }],
        vec![nudge(-0.01), nudge(0.01)],
    );

    ShapePredictorBuilder::new()
        .initial_shape(default_5_point_mean_shape())
        .add_cascade_stage(TreeEnsemble::new(features, vec![tree], 5))
        .build()
        .unwrap()
        .save(path)
        .unwrap();
}

/// Luma of a cartoon face centred at (200, 200) in portrait (rotation 90) orientation.
fn face_luma(x: i64, y: i64) -> u8 {
    let in_circle = |cx: i64, cy: i64, r: i64| (x - cx).pow(2) + (y - cy).pow(2) <= r * r;

    if in_circle(170, 175, 12) || in_circle(230, 175, 12) {
        30
    } else if (175..225).contains(&x) && (240..250).contains(&y) {
        40
    } else if in_circle(200, 200, 90) {
        180
    } else {
        90
    }
}

/// NV21 frame that shows `face_luma` once rotated for portrait display.
fn face_frame() -> Vec<u8> {
    let mut data = vec![128u8; WIDTH * (HEIGHT + HEIGHT / 2)];
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            // Portrait orientation maps captured (x, y) to (H-1-y, W-1-x).
            let (ox, oy) = ((HEIGHT - 1 - y) as i64, (WIDTH - 1 - x) as i64);
            data[y * WIDTH + x] = face_luma(ox, oy);
        }
    }
    data
}

fn loaded_marshaller(dir: &Path) -> FrameMarshaller {
    let model = dir.join("model.bin");
    write_model(&model);

    let mut marshaller: FrameMarshaller = FrameMarshaller::default();
    marshaller.load_model(&model).unwrap();
    marshaller.set_image_format(PixelFormat::NV21_CODE);
    marshaller
}

#[test]
fn face_in_region_yields_landmarks() {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = loaded_marshaller(dir.path());

    let coords = marshaller
        .analyze_frame(&face_frame(), 90, 640, 480, Region::new(100, 100, 300, 300))
        .unwrap();

    assert_eq!(coords.len(), 10);
    // Left eye of the mean shape, (0.3, 0.3 +/- 0.01) of the region.
    assert_eq!(coords[0], 160);
    assert!((158..=162).contains(&coords[1]));
    for xy in coords.chunks_exact(2) {
        assert!((100..300).contains(&xy[0]));
        assert!((100..300).contains(&xy[1]));
    }
}

#[test]
fn all_zero_frame_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = loaded_marshaller(dir.path());

    let frame = vec![0u8; WIDTH * (HEIGHT + HEIGHT / 2)];
    let coords = marshaller
        .analyze_frame(&frame, 90, 640, 480, Region::new(100, 100, 300, 300))
        .unwrap();

    assert!(coords.is_empty());
}

#[rstest]
fn result_length_is_even_for_every_rotation(#[values(0, 90, 180, 270)] rotation: i32) {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = loaded_marshaller(dir.path());

    let coords = marshaller
        .analyze_frame(&face_frame(), rotation, 640, 480, Region::new(100, 100, 300, 300))
        .unwrap();

    assert_eq!(coords.len() % 2, 0);
}

#[test]
fn analysis_before_loading_reports_missing_model() {
    let marshaller: FrameMarshaller = FrameMarshaller::default();
    let result =
        marshaller.analyze_frame(&face_frame(), 90, 640, 480, Region::new(100, 100, 300, 300));

    assert!(matches!(result, Err(Error::ModelNotLoaded)));
}

#[test]
fn inverted_region_is_forwarded_without_failure() {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = loaded_marshaller(dir.path());

    let coords = marshaller
        .analyze_frame(&face_frame(), 90, 640, 480, Region::new(300, 300, 100, 100))
        .unwrap();

    // The inverted box mirrors the mean shape: the "left eye" lands at 300 - 0.3 * 200.
    assert_eq!(coords.len(), 10);
    assert_eq!(coords[0], 240);
}

#[test]
fn full_width_region_does_not_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = loaded_marshaller(dir.path());

    // Spans more than i32::MAX horizontally; the face rows keep the gate open.
    let region = Region::new(i32::MIN, 100, i32::MAX, 300);
    let coords = marshaller
        .analyze_frame(&face_frame(), 90, 640, 480, region)
        .unwrap();

    assert_eq!(coords.len(), 10);
    // The eyes straddle the centre of the box, far outside the frame.
    assert!(coords[0] < -1_000_000);
    assert!(coords[2] > 1_000_000);
    for xy in coords.chunks_exact(2) {
        assert!((100..300).contains(&xy[1]));
    }
}

#[test]
fn mismatched_buffer_is_diagnosed() {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = loaded_marshaller(dir.path());

    let result =
        marshaller.analyze_frame(&[0u8; 100], 90, 640, 480, Region::new(100, 100, 300, 300));
    assert!(matches!(result, Err(Error::FrameTooSmall { .. })));
}

#[test]
fn unknown_image_format_is_diagnosed() {
    let dir = tempfile::tempdir().unwrap();
    let mut marshaller = loaded_marshaller(dir.path());
    marshaller.set_image_format(20);

    let result =
        marshaller.analyze_frame(&face_frame(), 90, 640, 480, Region::new(100, 100, 300, 300));
    assert!(matches!(result, Err(Error::UnsupportedFormat(20))));
}

#[test]
fn shared_engine_serves_concurrent_readers() {
    let dir = tempfile::tempdir().unwrap();
    let marshaller = Arc::new(RwLock::new(loaded_marshaller(dir.path())));
    let frame = Arc::new(face_frame());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let marshaller = Arc::clone(&marshaller);
            let frame = Arc::clone(&frame);
            thread::spawn(move || {
                let guard = marshaller.read().unwrap();
                guard
                    .analyze_frame(&frame, 90, 640, 480, Region::new(100, 100, 300, 300))
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<Vec<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].len(), 10);
}
