//! Frame annotation
//!
//! Draws per-face results and the FPS line onto output frames. Text needs a
//! TrueType font; without one only the geometric marks are drawn.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::math::{gaze_arrow_tip, gaze_vector_to_gaze_angles, head_pose_axes};
use crate::results::FaceInferenceResults;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Glyph height in pixels at a font scale of 1.0
const BASE_TEXT_HEIGHT: f32 = 12.0;

/// Which per-face marks to draw
#[derive(Debug, Clone, Copy)]
pub struct MarkerOptions {
    pub bounding_box: bool,
    pub landmarks: bool,
    pub head_pose: bool,
    pub gaze: bool,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            bounding_box: true,
            landmarks: true,
            head_pose: true,
            gaze: true,
        }
    }
}

pub struct Overlay {
    font: Option<FontVec>,
    options: MarkerOptions,
}

impl Overlay {
    pub fn new(font: Option<FontVec>, options: MarkerOptions) -> Self {
        Self { font, options }
    }

    /// Load the label font from a TrueType/OpenType file
    pub fn load_font(path: &Path) -> Result<FontVec> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        FontVec::try_from_vec(bytes).map_err(|_| anyhow!("Invalid font file {}", path.display()))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Overlay the FPS line, sized relative to the frame height
    pub fn put_timing_info(&self, image: &mut RgbImage, overall_ms: f64, inference_ms: f64) {
        let scale = font_scale(image.height());
        let y = 30.0 * scale / 1.6 - BASE_TEXT_HEIGHT * scale;
        self.text(image, &timing_label(overall_ms, inference_ms), 10, y as i32, scale, RED);
    }

    /// Draw everything known about one face
    pub fn mark(&self, image: &mut RgbImage, face: &FaceInferenceResults) {
        let bbox = face.bounding_box;
        if bbox.area() == 0 {
            return;
        }
        let width = bbox.width as f32;
        let scale = 0.002 * width;

        if self.options.bounding_box {
            let rect = Rect::at(bbox.x, bbox.y).of_size(bbox.width as u32, bbox.height as u32);
            draw_hollow_rect_mut(image, rect, WHITE);
            let label = format!("Detector confidence: {:.2}", face.detection_confidence);
            let text_scale = (scale * 2.0).max(0.8);
            let y = bbox.y as f32 - 5.0 - BASE_TEXT_HEIGHT * text_scale;
            self.text(image, &label, bbox.x, y as i32, text_scale, WHITE);
        }

        if self.options.head_pose {
            if let Some(pose) = face.head_pose {
                let center = bbox.center();
                let [right, up, forward] = head_pose_axes(center, 0.4 * width, pose.yaw, pose.pitch, pose.roll);
                thick_line(image, center, right, RED);
                thick_line(image, center, up, GREEN);
                thick_line(image, center, forward, BLUE);
            }
        }

        if self.options.landmarks {
            for &(x, y) in &face.landmarks {
                draw_filled_circle_mut(image, (x, y), 2, YELLOW);
            }
        }

        if self.options.gaze {
            if let Some(gaze) = face.gaze_vector {
                let length = 0.4 * width;
                for eye in [face.left_eye_midpoint, face.right_eye_midpoint].into_iter().flatten() {
                    arrow(image, eye, gaze_arrow_tip(eye, gaze, length), BLUE);
                }

                if let Some((yaw, pitch)) = gaze_vector_to_gaze_angles(gaze) {
                    let label = format!("gaze angles: (h={:.0}, v={:.0})", yaw.round(), pitch.round());
                    let text_scale = (scale * 3.0).max(0.8);
                    self.text(image, &label, bbox.x, bbox.bottom() + 5, text_scale, WHITE);
                }
            }
        }
    }

    fn text(&self, image: &mut RgbImage, text: &str, x: i32, y: i32, scale: f32, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(image, color, x, y, PxScale::from(BASE_TEXT_HEIGHT * scale), font, text);
        }
    }
}

/// Font scale for a frame of `rows` pixels height
pub fn font_scale(rows: u32) -> f32 {
    1.6 * rows as f32 / 640.0
}

pub fn timing_label(overall_ms: f64, inference_ms: f64) -> String {
    format!(
        "Overall FPS: {:.0}, Inference FPS: {:.0}",
        1000.0 / overall_ms,
        1000.0 / inference_ms
    )
}

fn thick_line(image: &mut RgbImage, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
    for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
        draw_line_segment_mut(image, (from.0 + dx, from.1 + dy), (to.0 + dx, to.1 + dy), color);
    }
}

fn arrow(image: &mut RgbImage, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
    thick_line(image, from, to, color);

    let (dx, dy) = (from.0 - to.0, from.1 - to.1);
    let length = (dx * dx + dy * dy).sqrt();
    if length == 0.0 {
        return;
    }
    // Head is a tenth of the shaft, at +-45 degrees
    let tip = 0.1 * length;
    let (ux, uy) = (dx / length * tip, dy / length * tip);
    let (s, c) = std::f32::consts::FRAC_PI_4.sin_cos();
    for sign in [1.0, -1.0] {
        let hx = ux * c - sign * uy * s;
        let hy = sign * ux * s + uy * c;
        thick_line(image, to, (to.0 + hx, to.1 + hy), color);
    }
}
