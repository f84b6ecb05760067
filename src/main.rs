//! Gaze Estimation Demo
//!
//! Detects faces in a stream of frames, estimates landmarks, head pose and
//! gaze direction for each face with OpenVINO, and writes annotated frames.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gazecast::config::Config;
use gazecast::engine::{OpenVinoRuntime, PluginPool};
use gazecast::frames::{open_source, DirectorySink, FrameSink};
use gazecast::service::GazePipeline;
use gazecast::utils::overlay::Overlay;

/// Gaze estimation over image frames
#[derive(Parser)]
#[command(name = "gazecast")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input image file or directory of frames
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for annotated frames
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Configuration file (defaults to gazecast.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gaze estimation model
    #[arg(short = 'm', long = "m-gaze")]
    gaze_model: Option<PathBuf>,

    /// Face detection model
    #[arg(long = "m-fd")]
    face_detection_model: Option<PathBuf>,

    /// Head pose estimation model
    #[arg(long = "m-hp")]
    head_pose_model: Option<PathBuf>,

    /// Facial landmarks model
    #[arg(long = "m-lm")]
    landmarks_model: Option<PathBuf>,

    /// Device for gaze estimation
    #[arg(short = 'd', long = "d-gaze")]
    gaze_device: Option<String>,

    /// Device for face detection
    #[arg(long = "d-fd")]
    face_detection_device: Option<String>,

    /// Device for head pose estimation
    #[arg(long = "d-hp")]
    head_pose_device: Option<String>,

    /// Device for facial landmarks
    #[arg(long = "d-lm")]
    landmarks_device: Option<String>,

    /// Face detection confidence threshold
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Reshape the face detector to the frame's aspect ratio
    #[arg(long)]
    fd_reshape: bool,

    /// Enable per-layer performance counters
    #[arg(long = "pc")]
    perf_counters: bool,

    /// Feed eye crops without roll alignment
    #[arg(long)]
    no_roll_align: bool,

    /// Print per-face results
    #[arg(short, long)]
    raw_output: bool,

    /// TrueType font for text labels
    #[arg(long)]
    font: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Increase verbosity
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command line overrides on top of the file configuration
    fn apply(&self, config: &mut Config) {
        let models = &mut config.models;
        let devices = &mut config.devices;

        override_with(&mut models.gaze, &self.gaze_model);
        override_with(&mut models.face_detection, &self.face_detection_model);
        override_with(&mut models.head_pose, &self.head_pose_model);
        override_with(&mut models.landmarks, &self.landmarks_model);

        override_with(&mut devices.gaze, &self.gaze_device);
        override_with(&mut devices.face_detection, &self.face_detection_device);
        override_with(&mut devices.head_pose, &self.head_pose_device);
        override_with(&mut devices.landmarks, &self.landmarks_device);

        override_with(&mut config.inference.detection_threshold, &self.threshold);
        config.inference.enable_reshape |= self.fd_reshape;
        config.inference.perf_counters |= self.perf_counters;
        if self.no_roll_align {
            config.gaze.roll_align = false;
        }
        config.display.raw_output |= self.raw_output;
        if self.font.is_some() {
            config.display.font = self.font.clone();
        }
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    info!("Gaze estimation demo v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load(Config::default_path()).unwrap_or_else(|e| {
            info!("Using default config ({})", e);
            Config::default()
        }),
    };
    cli.apply(&mut config);

    info!("Face detection threshold: {}", config.inference.detection_threshold);
    info!("Face detection reshape: {}", config.inference.enable_reshape);
    info!("Roll alignment: {}", config.gaze.roll_align);

    let runtime = OpenVinoRuntime::new(config.inference.cpu_threads)?;
    let mut pool = PluginPool::create(
        runtime,
        &config.device_model_pairs(),
        config.inference.perf_counters,
    )?;
    let mut pipeline = GazePipeline::build(&config, &mut pool)?;

    let font = config.display.font.as_deref().map(Overlay::load_font).transpose()?;
    let overlay = Overlay::new(font, config.display.marker_options());
    if !overlay.has_font() {
        info!("No font configured, text labels are skipped");
    }

    let mut source = open_source(&cli.input)?;
    let mut sink = DirectorySink::new(&cli.output)?;
    info!("Reading {}", source.describe());

    let mut frame_index = 0u64;
    while cli.max_frames.map_or(true, |max| frame_index < max) {
        let start = Instant::now();
        let Some(mut frame) = source.next_frame()? else {
            break;
        };

        let result = pipeline.process(&frame)?;
        for face in &result.faces {
            if config.display.raw_output {
                println!("{}", face);
            }
            overlay.mark(&mut frame, face);
        }

        let overall_ms = start.elapsed().as_secs_f64() * 1000.0;
        let inference_ms = result.inference_time.as_secs_f64() * 1000.0;
        overlay.put_timing_info(&mut frame, overall_ms, inference_ms);

        sink.write_frame(frame_index, &frame)?;
        info!(
            "Frame {}: {} faces, inference {:.1} ms",
            frame_index,
            result.faces.len(),
            inference_ms
        );
        frame_index += 1;
    }

    info!("Processed {} frames into {}", frame_index, cli.output.display());

    if config.inference.perf_counters {
        pipeline.print_performance_counts();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "gazecast", "-i", "frames", "--m-fd", "fd.xml", "--d-gaze", "GPU", "-t", "0.8",
            "--fd-reshape", "--no-roll-align",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.models.face_detection, PathBuf::from("fd.xml"));
        assert_eq!(config.devices.gaze, "GPU");
        assert_eq!(config.devices.landmarks, "CPU");
        assert_eq!(config.inference.detection_threshold, 0.8);
        assert!(config.inference.enable_reshape);
        assert!(!config.gaze.roll_align);
    }

    #[test]
    fn test_input_required() {
        assert!(Cli::try_parse_from(["gazecast"]).is_err());
    }
}
