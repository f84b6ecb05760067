//! Gaze pipeline configuration
//!
//! Loaded from TOML; every section and field falls back to its default, and
//! command line flags override what the file says.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::utils::overlay::MarkerOptions;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub devices: DevicesConfig,
    pub inference: InferenceConfig,
    pub gaze: GazeConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub face_detection: PathBuf,
    pub head_pose: PathBuf,
    pub landmarks: PathBuf,
    pub gaze: PathBuf,
}

/// Target device per network
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    pub face_detection: String,
    pub head_pose: String,
    pub landmarks: String,
    pub gaze: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub detection_threshold: f32,
    /// Reshape the face detector input to each frame's aspect ratio
    pub enable_reshape: bool,
    pub perf_counters: bool,
    pub cpu_threads: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub roll_align: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub font: Option<PathBuf>,
    pub bounding_box: bool,
    pub landmarks: bool,
    pub head_pose: bool,
    pub gaze: bool,
    /// Print per-face results to stdout
    pub raw_output: bool,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "gazecast.toml"
    }

    /// (device, model) pairs for every network, in pipeline order
    pub fn device_model_pairs(&self) -> [(&str, &Path); 4] {
        [
            (self.devices.face_detection.as_str(), self.models.face_detection.as_path()),
            (self.devices.landmarks.as_str(), self.models.landmarks.as_path()),
            (self.devices.head_pose.as_str(), self.models.head_pose.as_path()),
            (self.devices.gaze.as_str(), self.models.gaze.as_path()),
        ]
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            face_detection: PathBuf::from("models/face-detection-retail-0004.xml"),
            head_pose: PathBuf::from("models/head-pose-estimation-adas-0001.xml"),
            landmarks: PathBuf::from("models/facial-landmarks-35-adas-0002.xml"),
            gaze: PathBuf::from("models/gaze-estimation-adas-0002.xml"),
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            face_detection: "CPU".to_string(),
            head_pose: "CPU".to_string(),
            landmarks: "CPU".to_string(),
            gaze: "CPU".to_string(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.5,
            enable_reshape: false,
            perf_counters: false,
            cpu_threads: None,
        }
    }
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self { roll_align: true }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            font: None,
            bounding_box: true,
            landmarks: true,
            head_pose: true,
            gaze: true,
            raw_output: false,
        }
    }
}

impl DisplayConfig {
    pub fn marker_options(&self) -> MarkerOptions {
        MarkerOptions {
            bounding_box: self.bounding_box,
            landmarks: self.landmarks,
            head_pose: self.head_pose,
            gaze: self.gaze,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [inference]
            detection_threshold = 0.7

            [devices]
            gaze = "GPU"
            "#,
        )
        .unwrap();

        assert_eq!(config.inference.detection_threshold, 0.7);
        assert!(!config.inference.enable_reshape);
        assert_eq!(config.devices.gaze, "GPU");
        assert_eq!(config.devices.face_detection, "CPU");
        assert!(config.gaze.roll_align);
    }

    #[test]
    fn test_pairs_in_pipeline_order() {
        let config = Config::default();
        let pairs = config.device_model_pairs();
        assert_eq!(pairs[0].1, Path::new("models/face-detection-retail-0004.xml"));
        assert_eq!(pairs[3].1, Path::new("models/gaze-estimation-adas-0002.xml"));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/gazecast.toml").is_err());
    }
}
