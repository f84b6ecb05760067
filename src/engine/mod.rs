//! Inference engine module
//!
//! Provides OpenVINO-based inference with:
//! - A per-device plugin pool shared by every network
//! - A synchronous single-request wrapper per network
//! - Face detection and the per-face estimator chain

pub mod runtime;
pub mod openvino_runtime;
pub mod pool;
pub mod wrapper;
pub mod preprocess;
pub mod detector;
pub mod estimator;
pub mod landmarks;
pub mod head_pose;
pub mod gaze;

pub use runtime::{BlobDimsInfo, PluginHandle, Runtime, Session};
pub use openvino_runtime::OpenVinoRuntime;
pub use pool::PluginPool;
pub use wrapper::{InferenceWrapper, PerformanceCounts};
pub use detector::FaceDetector;
pub use estimator::Estimator;
pub use landmarks::LandmarksEstimator;
pub use head_pose::HeadPoseEstimator;
pub use gaze::GazeEstimator;
