//! Per-face estimators
//!
//! Every stage after detection crops what it needs from the frame, runs its
//! own network and writes its fields into the shared per-face results.

use anyhow::Result;
use image::RgbImage;

use crate::results::FaceInferenceResults;

pub trait Estimator {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fill this estimator's fields of `results` for the face it describes
    fn estimate(&mut self, image: &RgbImage, results: &mut FaceInferenceResults) -> Result<()>;

    fn print_performance_counts(&self);
}
