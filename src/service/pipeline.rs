//! Gaze pipeline
//!
//! frame -> face detector -> landmarks -> head pose -> gaze, one frame at a
//! time, each stage blocking on its own inference request.

use std::time::Instant;

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, info};

use super::types::FrameResult;
use crate::config::Config;
use crate::engine::{
    Estimator, FaceDetector, GazeEstimator, HeadPoseEstimator, InferenceWrapper,
    LandmarksEstimator, PluginPool, Runtime,
};

pub struct GazePipeline {
    detector: FaceDetector,
    estimators: Vec<Box<dyn Estimator>>,
}

impl GazePipeline {
    /// `estimators` run in order on every detected face
    pub fn new(detector: FaceDetector, estimators: Vec<Box<dyn Estimator>>) -> Self {
        Self { detector, estimators }
    }

    /// Load all four networks onto their configured devices
    pub fn build<R: Runtime>(config: &Config, pool: &mut PluginPool<R>) -> Result<Self> {
        let models = &config.models;
        let devices = &config.devices;
        let start = Instant::now();

        let detector = FaceDetector::new(
            InferenceWrapper::new(&models.face_detection, &devices.face_detection, pool)?,
            config.inference.detection_threshold,
            config.inference.enable_reshape,
        )
        .context("Unsupported face detection model")?;

        let landmarks = LandmarksEstimator::new(InferenceWrapper::new(
            &models.landmarks,
            &devices.landmarks,
            pool,
        )?)
        .context("Unsupported landmarks model")?;

        let head_pose = HeadPoseEstimator::new(InferenceWrapper::new(
            &models.head_pose,
            &devices.head_pose,
            pool,
        )?)
        .context("Unsupported head pose model")?;

        let gaze = GazeEstimator::new(
            InferenceWrapper::new(&models.gaze, &devices.gaze, pool)?,
            config.gaze.roll_align,
        )
        .context("Unsupported gaze model")?;

        info!("All networks loaded in {:?}", start.elapsed());

        Ok(Self::new(
            detector,
            vec![Box::new(landmarks), Box::new(head_pose), Box::new(gaze)],
        ))
    }

    /// Detect faces in `frame` and run every estimator on each of them
    pub fn process(&mut self, frame: &RgbImage) -> Result<FrameResult> {
        let start = Instant::now();

        let mut faces = self.detector.detect(frame)?;
        for face in &mut faces {
            for estimator in &mut self.estimators {
                estimator
                    .estimate(frame, face)
                    .with_context(|| format!("{} estimation failed", estimator.name()))?;
            }
        }

        let inference_time = start.elapsed();
        debug!("{} faces processed in {:?}", faces.len(), inference_time);

        Ok(FrameResult { faces, inference_time })
    }

    pub fn print_performance_counts(&self) {
        self.detector.print_performance_counts();
        for estimator in &self.estimators {
            estimator.print_performance_counts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::mock::MockSession;
    use image::Rgb;
    use std::path::Path;

    fn wrapper(name: &str, session: MockSession) -> InferenceWrapper {
        InferenceWrapper::from_session(Path::new(name), Box::new(session))
    }

    fn pipeline() -> GazePipeline {
        let detection = vec![
            0.0, 1.0, 0.95, 0.25, 0.25, 0.75, 0.75, //
            -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        let fd = wrapper(
            "fd.xml",
            MockSession::new([("data", vec![1, 3, 300, 300])], [("detection_out", vec![1, 1, 2, 7])])
                .with_output("detection_out", detection),
        );
        let lm = wrapper(
            "lm.xml",
            MockSession::new([("data", vec![1, 3, 60, 60])], [("align_fc3", vec![1, 8])])
                .with_output("align_fc3", vec![0.2, 0.4, 0.4, 0.4, 0.6, 0.4, 0.8, 0.4]),
        );
        let hp = wrapper(
            "hp.xml",
            MockSession::new(
                [("data", vec![1, 3, 60, 60])],
                [
                    ("angle_y_fc", vec![1, 1]),
                    ("angle_p_fc", vec![1, 1]),
                    ("angle_r_fc", vec![1, 1]),
                ],
            )
            .with_output("angle_y_fc", vec![10.0])
            .with_output("angle_p_fc", vec![0.0])
            .with_output("angle_r_fc", vec![0.0]),
        );
        let gaze = wrapper(
            "gaze.xml",
            MockSession::new(
                [
                    ("left_eye_image", vec![1, 3, 60, 60]),
                    ("right_eye_image", vec![1, 3, 60, 60]),
                    ("head_pose_angles", vec![1, 3]),
                ],
                [("gaze_vector", vec![1, 3])],
            )
            .with_output("gaze_vector", vec![0.0, 0.0, -3.0]),
        );

        GazePipeline::new(
            FaceDetector::new(fd, 0.5, false).unwrap(),
            vec![
                Box::new(LandmarksEstimator::new(lm).unwrap()),
                Box::new(HeadPoseEstimator::new(hp).unwrap()),
                Box::new(GazeEstimator::new(gaze, true).unwrap()),
            ],
        )
    }

    #[test]
    fn test_all_stages_fill_results() {
        let mut pipeline = pipeline();
        let frame = RgbImage::from_pixel(200, 200, Rgb([90, 90, 90]));

        let result = pipeline.process(&frame).unwrap();
        assert_eq!(result.faces.len(), 1);

        let face = &result.faces[0];
        assert_eq!(face.landmarks.len(), 4);
        assert_eq!(face.head_pose.unwrap().yaw, 10.0);
        assert_eq!(face.gaze_vector, Some([0.0, 0.0, -1.0]));
        assert!(face.left_eye_midpoint.is_some());
    }

    #[test]
    fn test_estimators_need_their_predecessors() {
        let mut pipeline = pipeline();
        // Gaze first: no landmarks or head pose yet
        pipeline.estimators.reverse();
        let frame = RgbImage::from_pixel(200, 200, Rgb([90, 90, 90]));

        let err = pipeline.process(&frame).unwrap_err();
        assert!(err.to_string().contains("gaze"));
    }
}
