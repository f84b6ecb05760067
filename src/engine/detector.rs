//! SSD Face Detector
//!
//! Runs an SSD-style face detection network and turns its
//! `[image_id, label, conf, x_min, y_min, x_max, y_max]` rows into
//! adjusted, image-clipped face boxes.

use anyhow::{ensure, Result};
use image::RgbImage;
use tracing::{debug, info};

use super::runtime::BlobDimsInfo;
use super::wrapper::InferenceWrapper;
use crate::results::{BoundingBox, FaceInferenceResults};

/// Values per detection row
const DETECTION_SIZE: usize = 7;

/// Aspect ratios closer than this are treated as equal when deciding to reshape
const ASPECT_RATIO_THRESHOLD: f64 = 0.01;

pub struct FaceDetector {
    wrapper: InferenceWrapper,
    input_name: String,
    input_dims: Vec<usize>,
    output_name: String,
    max_detections: usize,
    confidence_threshold: f32,
    enable_reshape: bool,
}

impl FaceDetector {
    pub fn new(wrapper: InferenceWrapper, confidence_threshold: f32, enable_reshape: bool) -> Result<Self> {
        let (input_name, input_dims) = wrapper.first_input()?;
        ensure!(input_dims.len() == 4, "Face detector input must be NCHW, got {:?}", input_dims);

        let (output_name, output_dims) = wrapper.first_output()?;
        ensure!(
            output_dims.len() == 4 && output_dims[3] == DETECTION_SIZE,
            "Face detector output must be [1, 1, N, 7], got {:?}",
            output_dims
        );

        Ok(Self {
            wrapper,
            input_name,
            input_dims,
            output_name,
            max_detections: output_dims[2],
            confidence_threshold,
            enable_reshape,
        })
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Detect faces in a frame
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceInferenceResults>> {
        if self.enable_reshape {
            self.reshape_to(image.width(), image.height())?;
        }

        self.wrapper.set_image_input(&self.input_name, image)?;
        self.wrapper.infer()?;

        let raw = self.wrapper.output_blob(&self.output_name)?;
        let faces = decode_detections(
            &raw,
            self.max_detections,
            self.confidence_threshold,
            image.width(),
            image.height(),
        );

        debug!("Detected {} faces", faces.len());
        Ok(faces)
    }

    pub fn print_performance_counts(&self) {
        self.wrapper.print_performance_counts();
    }

    /// Widen the network input to the frame's aspect ratio, keeping its height
    fn reshape_to(&mut self, width: u32, height: u32) -> Result<()> {
        let image_ratio = round_ratio(width as f64 / height as f64);
        let network_ratio = round_ratio(self.input_dims[3] as f64 / self.input_dims[2] as f64);

        if (image_ratio - network_ratio).abs() <= ASPECT_RATIO_THRESHOLD {
            return Ok(());
        }

        let mut dims = self.input_dims.clone();
        dims[3] = (dims[2] as f64 * image_ratio) as usize;
        info!("Face detection network is reshaped to {:?}", dims);

        let new_dims: BlobDimsInfo = [(self.input_name.clone(), dims.clone())].into();
        self.wrapper.reshape(&new_dims)?;
        self.input_dims = dims;
        Ok(())
    }
}

fn round_ratio(ratio: f64) -> f64 {
    (ratio * 100.0).round() / 100.0
}

/// Turn raw SSD rows into face results for a `width` x `height` frame
fn decode_detections(
    raw: &[f32],
    max_detections: usize,
    threshold: f32,
    width: u32,
    height: u32,
) -> Vec<FaceInferenceResults> {
    let image_rect = BoundingBox::new(0, 0, width as i32, height as i32);
    let (w, h) = (width as f32, height as f32);

    raw.chunks_exact(DETECTION_SIZE)
        .take(max_detections)
        .take_while(|row| row[0] >= 0.0)
        .filter(|row| row[2] >= threshold)
        .filter_map(|row| {
            let mut bbox = detection_box(row, w, h);
            adjust_bounding_box(&mut bbox);

            let clipped = bbox.intersect(&image_rect);
            if clipped.area() == 0 {
                return None;
            }
            Some(FaceInferenceResults::new(row[2], clipped))
        })
        .collect()
}

/// Pixel box of one detection row. The corner is truncated to whole pixels
/// first and the extent is measured from that corner.
fn detection_box(row: &[f32], w: f32, h: f32) -> BoundingBox {
    let x = (row[3] * w) as i32;
    let y = (row[4] * h) as i32;
    BoundingBox::new(x, y, (row[5] * w - x as f32) as i32, (row[6] * h - y as f32) as i32)
}

/// Grow a raw detection box to cover the whole head and make it square
fn adjust_bounding_box(bbox: &mut BoundingBox) {
    let w = bbox.width as f64;
    let h = bbox.height as f64;

    bbox.x -= (0.067 * w) as i32;
    bbox.y -= (0.028 * h) as i32;

    bbox.width += (0.15 * w) as i32;
    bbox.height += (0.13 * h) as i32;

    if bbox.width < bbox.height {
        let dx = bbox.height - bbox.width;
        bbox.x -= dx / 2;
        bbox.width += dx;
    } else {
        let dy = bbox.width - bbox.height;
        bbox.y -= dy / 2;
        bbox.height += dy;
    }
}
