//! Service layer types

use std::time::Duration;

use crate::results::FaceInferenceResults;

/// Outcome of running one frame through the pipeline
#[derive(Debug, Clone, Default)]
pub struct FrameResult {
    pub faces: Vec<FaceInferenceResults>,
    /// Time spent in detection and estimation, excluding drawing and I/O
    pub inference_time: Duration,
}
