//! Facial landmarks estimator
//!
//! Regresses normalized (x, y) points inside the face crop and maps them
//! back to frame coordinates.

use anyhow::{ensure, Context, Result};
use image::RgbImage;

use super::estimator::Estimator;
use super::preprocess::crop;
use super::wrapper::InferenceWrapper;
use crate::results::FaceInferenceResults;

pub struct LandmarksEstimator {
    wrapper: InferenceWrapper,
    input_name: String,
    output_name: String,
    num_landmarks: usize,
}

impl LandmarksEstimator {
    pub fn new(wrapper: InferenceWrapper) -> Result<Self> {
        let (input_name, _) = wrapper.first_input()?;
        let (output_name, output_dims) = wrapper.first_output()?;

        let values: usize = output_dims.iter().product();
        ensure!(
            values >= 2 && values % 2 == 0,
            "Landmarks output must hold (x, y) pairs, got {:?}",
            output_dims
        );

        Ok(Self {
            wrapper,
            input_name,
            output_name,
            num_landmarks: values / 2,
        })
    }

    pub fn num_landmarks(&self) -> usize {
        self.num_landmarks
    }
}

impl Estimator for LandmarksEstimator {
    fn name(&self) -> &'static str {
        "landmarks"
    }

    fn estimate(&mut self, image: &RgbImage, results: &mut FaceInferenceResults) -> Result<()> {
        let bbox = results.bounding_box;
        let face = crop(image, &bbox).with_context(|| format!("Face box {} is outside the frame", bbox))?;

        self.wrapper.set_image_input(&self.input_name, &face)?;
        self.wrapper.infer()?;

        let raw = self.wrapper.output_blob(&self.output_name)?;
        let (crop_w, crop_h) = (face.width() as f32, face.height() as f32);

        // Crops are clipped to the frame, so the crop origin may differ from the box's
        let origin_x = bbox.x.max(0) as f32;
        let origin_y = bbox.y.max(0) as f32;

        results.landmarks = raw
            .chunks_exact(2)
            .take(self.num_landmarks)
            .map(|p| {
                (
                    (p[0] * crop_w + origin_x) as i32,
                    (p[1] * crop_h + origin_y) as i32,
                )
            })
            .collect();

        Ok(())
    }

    fn print_performance_counts(&self) {
        self.wrapper.print_performance_counts();
    }
}
