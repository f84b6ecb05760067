//! Gaze estimator
//!
//! Feeds both eye crops plus the head pose into the gaze network and stores
//! the resulting unit gaze vector.

use anyhow::{bail, ensure, Context, Result};
use image::RgbImage;

use super::estimator::Estimator;
use super::preprocess::{crop, rotate_about_center};
use super::wrapper::InferenceWrapper;
use crate::results::{BoundingBox, FaceInferenceResults};

const LEFT_EYE_INPUT: &str = "left_eye_image";
const RIGHT_EYE_INPUT: &str = "right_eye_image";
const HEAD_POSE_INPUT: &str = "head_pose_angles";

pub struct GazeEstimator {
    wrapper: InferenceWrapper,
    roll_align: bool,
}

impl GazeEstimator {
    /// With `roll_align` the eye crops are rotated upright before inference
    /// and the gaze vector is rotated back afterwards.
    pub fn new(wrapper: InferenceWrapper, roll_align: bool) -> Result<Self> {
        for name in [LEFT_EYE_INPUT, RIGHT_EYE_INPUT, HEAD_POSE_INPUT] {
            ensure!(
                wrapper.input_dims().contains_key(name),
                "Gaze network has no {} input",
                name
            );
        }
        let (_, output_dims) = wrapper.first_output()?;
        ensure!(
            output_dims.iter().product::<usize>() == 3,
            "Gaze output must be a 3D vector, got {:?}",
            output_dims
        );
        Ok(Self { wrapper, roll_align })
    }
}

impl Estimator for GazeEstimator {
    fn name(&self) -> &'static str {
        "gaze"
    }

    fn estimate(&mut self, image: &RgbImage, results: &mut FaceInferenceResults) -> Result<()> {
        let Some(pose) = results.head_pose else {
            bail!("Gaze estimation needs head pose angles");
        };
        ensure!(
            results.landmarks.len() >= 4,
            "Gaze estimation needs eye corner landmarks, got {}",
            results.landmarks.len()
        );

        let (left_mid, left_rect) = eye_region(results.landmarks[0], results.landmarks[1]);
        let (right_mid, right_rect) = eye_region(results.landmarks[2], results.landmarks[3]);
        results.left_eye_midpoint = Some(left_mid);
        results.right_eye_midpoint = Some(right_mid);

        let mut left_eye = crop(image, &left_rect).context("Left eye is outside the frame")?;
        let mut right_eye = crop(image, &right_rect).context("Right eye is outside the frame")?;

        let mut angles = [pose.yaw, pose.pitch, pose.roll];
        if self.roll_align {
            angles[2] = 0.0;
            left_eye = rotate_about_center(&left_eye, pose.roll);
            right_eye = rotate_about_center(&right_eye, pose.roll);
        }

        self.wrapper.set_vector_input(HEAD_POSE_INPUT, &angles)?;
        self.wrapper.set_image_input(LEFT_EYE_INPUT, &left_eye)?;
        self.wrapper.set_image_input(RIGHT_EYE_INPUT, &right_eye)?;
        self.wrapper.infer()?;

        let raw = self.wrapper.sole_output_blob()?;
        ensure!(raw.len() >= 3, "Gaze output holds {} values", raw.len());
        let mut gaze = [raw[0], raw[1], raw[2]];
        if self.roll_align {
            gaze = rotate_by_roll(gaze, pose.roll);
        }

        let norm = gaze.iter().map(|v| v * v).sum::<f32>().sqrt();
        ensure!(norm > 0.0, "Gaze network returned a zero vector");
        results.gaze_vector = Some(gaze.map(|v| v / norm));
        Ok(())
    }

    fn print_performance_counts(&self) {
        self.wrapper.print_performance_counts();
    }
}

/// Midpoint of two eye corners and the square crop centred on it, as wide
/// as the corners are apart
fn eye_region(a: (i32, i32), b: (i32, i32)) -> ((f32, f32), BoundingBox) {
    let mid = ((a.0 + b.0) as f32 / 2.0, (a.1 + b.1) as f32 / 2.0);
    let side = (((a.0 - b.0).pow(2) + (a.1 - b.1).pow(2)) as f32).sqrt();

    let rect = BoundingBox::new(
        (mid.0 - side / 2.0) as i32,
        (mid.1 - side / 2.0) as i32,
        side as i32,
        side as i32,
    );
    (mid, rect)
}

/// Rotate the x/y part of a gaze vector by the head roll (degrees)
fn rotate_by_roll(gaze: [f32; 3], roll_deg: f32) -> [f32; 3] {
    let (sn, cs) = roll_deg.to_radians().sin_cos();
    [
        gaze[0] * cs + gaze[1] * sn,
        -gaze[0] * sn + gaze[1] * cs,
        gaze[2],
    ]
}
