//! CLI for facial landmark detection on raw camera frames.
//!
//! Usage:
//!   landmark-bridge detect frame.yuv --width 640 --height 480 --model sp68.dat.bz2 --region 100,100,300,300
//!   landmark-bridge detect frame.yuv --width 640 --height 480 --model sp68.dat.bz2 --detector seeta_fd_frontal_v1.0.bin --json
//!   landmark-bridge convert sp68.dat.bz2 sp68.bin

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use landmark_bridge::{
    dlib::load_dlib_model, EngineConfig, Frame, FrameMarshaller, LandmarkEngine, Orientation,
    PixelFormat, Region,
};
use log::{debug, info};
use rustface::ImageData;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "landmark-bridge")]
#[command(
    author,
    version,
    about = "Facial landmark detection on raw camera frames",
    long_about = None
)]
struct Args {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect landmarks in one raw YUV frame
    Detect(DetectArgs),
    /// Convert a dlib model into the compact .bin cache format
    Convert {
        /// dlib model (.dat or .dat.bz2)
        input: PathBuf,
        /// Output .bin file
        output: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct DetectArgs {
    /// Raw frame file
    frame: PathBuf,

    #[arg(long)]
    width: i32,

    #[arg(long)]
    height: i32,

    /// Frame pixel layout
    #[arg(long, value_enum, default_value = "nv21", conflicts_with = "format_code")]
    format: FormatArg,

    /// Android ImageFormat code, for layouts without a name here
    #[arg(long)]
    format_code: Option<i32>,

    /// Rotation hint (90 portrait, 0 landscape-left, 180 landscape-right)
    #[arg(long, default_value = "90", allow_hyphen_values = true)]
    rotation: i32,

    /// Region of interest as left,top,right,bottom
    #[arg(long, allow_hyphen_values = true)]
    region: Option<Region>,

    /// Face detector model used to find the region when --region is absent
    #[arg(long)]
    detector: Option<PathBuf>,

    /// Minimum face size for the face detector
    #[arg(long, default_value = "20")]
    min_face_size: u32,

    /// Landmark model path (overrides the config file)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Nv21,
    Yv12,
    Yuv420,
}

impl FormatArg {
    fn code(self) -> i32 {
        match self {
            Self::Nv21 => PixelFormat::NV21_CODE,
            Self::Yv12 => PixelFormat::YV12_CODE,
            Self::Yuv420 => PixelFormat::YUV_420_888_CODE,
        }
    }
}

#[derive(Serialize)]
struct Output {
    frame: String,
    width: i32,
    height: i32,
    rotation: i32,
    region: Region,
    landmark_count: usize,
    /// Flat [x0, y0, x1, y1, ...] in oriented frame pixels
    coordinates: Vec<i64>,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match &args.command {
        Command::Detect(detect) => run_detect(detect),
        Command::Convert { input, output } => run_convert(input, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_convert(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading dlib model {:?}...", input);
    let model = load_dlib_model(input)?;
    model.save(output)?;
    info!(
        "Wrote {:?}: {} landmarks, {} cascade stages",
        output,
        model.num_landmarks(),
        model.num_cascade_stages()
    );
    Ok(())
}

fn run_detect(args: &DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if args.model.is_some() {
        config.model = args.model.clone();
    }
    if config.model.is_none() {
        return Err("no landmark model given (use --model or a config file)".into());
    }

    let mut marshaller = FrameMarshaller::new(LandmarkEngine::from_config(&config)?);
    marshaller.set_image_format(args.format_code.unwrap_or_else(|| args.format.code()));

    let data = std::fs::read(&args.frame)?;
    debug!("Read {} bytes from {:?}", data.len(), args.frame);

    let region = match (args.region, &args.detector) {
        (Some(region), _) => region,
        (None, Some(detector)) => find_face(
            &data,
            args,
            marshaller.detector().pixel_format(),
            detector,
        )?
        .ok_or("no face found by the face detector")?,
        (None, None) => return Err("either --region or --detector is required".into()),
    };
    debug!("Region: {}", region);

    let coordinates =
        marshaller.analyze_frame(&data, args.rotation, args.width, args.height, region)?;

    let output = Output {
        frame: args.frame.display().to_string(),
        width: args.width,
        height: args.height,
        rotation: args.rotation,
        region,
        landmark_count: coordinates.len() / 2,
        coordinates,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

/// Locate the highest-scoring face in the oriented luma image.
fn find_face(
    data: &[u8],
    args: &DetectArgs,
    format: PixelFormat,
    detector_path: &Path,
) -> Result<Option<Region>, Box<dyn std::error::Error>> {
    let detector_path = detector_path.to_str().ok_or("Invalid detector path")?;
    let mut detector = rustface::create_detector(detector_path)
        .map_err(|e| format!("Failed to load face detector: {}", e))?;
    detector.set_min_face_size(args.min_face_size);
    detector.set_score_thresh(2.0);
    detector.set_pyramid_scale_factor(0.8);
    detector.set_slide_window_step(4, 4);

    let frame = Frame::new(data, args.rotation, args.width, args.height, Region::default());
    let gray = Orientation::from_hint(args.rotation).apply(frame.luma(format)?);
    let (width, height) = gray.dimensions();
    let faces = detector.detect(&ImageData::new(gray.as_raw(), width, height));
    info!("Face detector found {} face(s)", faces.len());

    let best = faces
        .iter()
        .max_by(|a, b| a.score().total_cmp(&b.score()))
        .map(|face| {
            let bbox = face.bbox();
            Region::new(
                bbox.x(),
                bbox.y(),
                bbox.x() + bbox.width() as i32,
                bbox.y() + bbox.height() as i32,
            )
            .in_bounds(0, 0, width as i32, height as i32)
        });
    Ok(best)
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!(
        "Frame: {} ({}x{}, rotation {})\n",
        output.frame, output.width, output.height, output.rotation
    ));
    s.push_str(&format!("Region: {}\n", output.region));

    if output.coordinates.is_empty() {
        s.push_str("\nNo face found.\n");
        return s;
    }

    s.push_str(&format!("Landmarks: {} points\n\n", output.landmark_count));
    for (i, xy) in output.coordinates.chunks_exact(2).enumerate() {
        s.push_str(&format!("  {:>3}: ({}, {})\n", i, xy[0], xy[1]));
    }

    s
}
