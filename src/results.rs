//! Per-face inference results
//!
//! Filled in stage by stage as a frame moves through the pipeline.

use std::fmt;

/// Integer pixel rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> i64 {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        self.width as i64 * self.height as i64
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Overlap of two rectangles; empty (zero sized) when they do not touch
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return BoundingBox::default();
        }
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} x {} from ({}, {})]", self.width, self.height, self.x, self.y)
    }
}

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadPose {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Everything the pipeline knows about one face in one frame
#[derive(Debug, Clone, Default)]
pub struct FaceInferenceResults {
    pub detection_confidence: f32,
    pub bounding_box: BoundingBox,
    pub landmarks: Vec<(i32, i32)>,
    pub left_eye_midpoint: Option<(f32, f32)>,
    pub right_eye_midpoint: Option<(f32, f32)>,
    pub head_pose: Option<HeadPose>,
    /// Unit gaze direction in camera coordinates
    pub gaze_vector: Option<[f32; 3]>,
}

impl FaceInferenceResults {
    pub fn new(detection_confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            detection_confidence,
            bounding_box,
            ..Default::default()
        }
    }
}

impl fmt::Display for FaceInferenceResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--Face detection results--")?;
        writeln!(f, "Detection confidence: {:.3}", self.detection_confidence)?;
        writeln!(f, "Bounding box: {}", self.bounding_box)?;

        if !self.landmarks.is_empty() {
            writeln!(f, "--Facial landmarks--")?;
            for (i, (x, y)) in self.landmarks.iter().enumerate() {
                writeln!(f, "{}: ({}, {})", i, x, y)?;
            }
        }

        if let Some(pose) = self.head_pose {
            writeln!(f, "--Head pose angles--")?;
            writeln!(f, "Yaw: {:.2}", pose.yaw)?;
            writeln!(f, "Pitch: {:.2}", pose.pitch)?;
            writeln!(f, "Roll: {:.2}", pose.roll)?;
        }

        if let Some([x, y, z]) = self.gaze_vector {
            writeln!(f, "--Gaze vector--")?;
            writeln!(f, "({:.4}, {:.4}, {:.4})", x, y, z)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_overlapping() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), BoundingBox::new(5, 5, 5, 5));
        assert_eq!(a.intersect(&b).area(), 25);
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(20, 20, 5, 5);
        assert_eq!(a.intersect(&b).area(), 0);
    }

    #[test]
    fn test_display_skips_missing_stages() {
        let face = FaceInferenceResults::new(0.9, BoundingBox::new(1, 2, 3, 4));
        let text = face.to_string();
        assert!(text.contains("Detection confidence: 0.900"));
        assert!(!text.contains("Gaze vector"));
    }
}
