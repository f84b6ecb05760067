//! Head pose estimator
//!
//! Reads yaw, pitch and roll (degrees) from three single-value outputs.

use anyhow::{ensure, Context, Result};
use image::RgbImage;

use super::estimator::Estimator;
use super::preprocess::crop;
use super::wrapper::InferenceWrapper;
use crate::results::{FaceInferenceResults, HeadPose};

const YAW_OUTPUT: &str = "angle_y_fc";
const PITCH_OUTPUT: &str = "angle_p_fc";
const ROLL_OUTPUT: &str = "angle_r_fc";

pub struct HeadPoseEstimator {
    wrapper: InferenceWrapper,
    input_name: String,
}

impl HeadPoseEstimator {
    pub fn new(wrapper: InferenceWrapper) -> Result<Self> {
        let (input_name, _) = wrapper.first_input()?;
        for name in [YAW_OUTPUT, PITCH_OUTPUT, ROLL_OUTPUT] {
            ensure!(
                wrapper.output_dims().contains_key(name),
                "Head pose network has no {} output",
                name
            );
        }
        Ok(Self { wrapper, input_name })
    }

    fn angle(&self, name: &str) -> Result<f32> {
        self.wrapper
            .output_blob(name)?
            .first()
            .copied()
            .with_context(|| format!("Head pose output {} is empty", name))
    }
}

impl Estimator for HeadPoseEstimator {
    fn name(&self) -> &'static str {
        "head pose"
    }

    fn estimate(&mut self, image: &RgbImage, results: &mut FaceInferenceResults) -> Result<()> {
        let bbox = results.bounding_box;
        let face = crop(image, &bbox).with_context(|| format!("Face box {} is outside the frame", bbox))?;

        self.wrapper.set_image_input(&self.input_name, &face)?;
        self.wrapper.infer()?;

        results.head_pose = Some(HeadPose {
            yaw: self.angle(YAW_OUTPUT)?,
            pitch: self.angle(PITCH_OUTPUT)?,
            roll: self.angle(ROLL_OUTPUT)?,
        });
        Ok(())
    }

    fn print_performance_counts(&self) {
        self.wrapper.print_performance_counts();
    }
}
