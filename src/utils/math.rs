//! Geometry helpers

use std::f64::consts::{FRAC_PI_2, PI};

/// Convert a gaze vector into (yaw, pitch) angles in degrees.
///
/// yaw = 90 + atan2(z, x), pitch = 90 - acos(y / |v|). A zero vector has no
/// direction and yields `None`.
pub fn gaze_vector_to_gaze_angles(gaze: [f32; 3]) -> Option<(f32, f32)> {
    let [x, y, z] = gaze.map(f64::from);
    let r = (x * x + y * y + z * z).sqrt();
    if r == 0.0 {
        return None;
    }

    let yaw = 180.0 / PI * (FRAC_PI_2 + z.atan2(x));
    let pitch = 180.0 / PI * (FRAC_PI_2 - (y / r).clamp(-1.0, 1.0).acos());
    Some((yaw as f32, pitch as f32))
}

/// End points of the head pose axes drawn from `center`, each `length` long.
///
/// Returns the right, up and forward axis tips for yaw/pitch/roll in degrees.
pub fn head_pose_axes(
    center: (f32, f32),
    length: f32,
    yaw: f32,
    pitch: f32,
    roll: f32,
) -> [(f32, f32); 3] {
    let (sin_y, cos_y) = yaw.to_radians().sin_cos();
    let (sin_p, cos_p) = pitch.to_radians().sin_cos();
    let (sin_r, cos_r) = roll.to_radians().sin_cos();
    let (cx, cy) = center;

    [
        (
            cx + length * (cos_r * cos_y + sin_y * sin_p * sin_r),
            cy + length * cos_p * sin_r,
        ),
        (
            cx + length * (cos_r * sin_y * sin_p + cos_y * sin_r),
            cy - length * cos_p * cos_r,
        ),
        (cx + length * sin_y * cos_p, cy + length * sin_p),
    ]
}

/// Tip of a gaze arrow starting at `origin`. Image y grows downwards, so the
/// vector's y is flipped.
pub fn gaze_arrow_tip(origin: (f32, f32), gaze: [f32; 3], length: f32) -> (f32, f32) {
    (origin.0 + length * gaze[0], origin.1 - length * gaze[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
    }

    #[test]
    fn test_gaze_along_x() {
        let (yaw, pitch) = gaze_vector_to_gaze_angles([1.0, 0.0, 0.0]).unwrap();
        assert_close(yaw, 90.0);
        assert_close(pitch, 0.0);
    }

    #[test]
    fn test_gaze_along_y() {
        let (yaw, pitch) = gaze_vector_to_gaze_angles([0.0, 1.0, 0.0]).unwrap();
        assert_close(yaw, 90.0);
        assert_close(pitch, 90.0);
    }

    #[test]
    fn test_gaze_towards_camera() {
        let (yaw, pitch) = gaze_vector_to_gaze_angles([0.0, 0.0, -1.0]).unwrap();
        assert_close(yaw, 0.0);
        assert_close(pitch, 0.0);
    }

    #[test]
    fn test_gaze_scale_invariant() {
        let a = gaze_vector_to_gaze_angles([0.2, -0.3, -0.9]).unwrap();
        let b = gaze_vector_to_gaze_angles([2.0, -3.0, -9.0]).unwrap();
        assert_close(a.0, b.0);
        assert_close(a.1, b.1);
    }

    #[test]
    fn test_zero_gaze_has_no_angles() {
        assert!(gaze_vector_to_gaze_angles([0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_neutral_head_pose_axes() {
        let [right, up, forward] = head_pose_axes((50.0, 50.0), 10.0, 0.0, 0.0, 0.0);
        assert_eq!(right, (60.0, 50.0));
        assert_eq!(up, (50.0, 40.0));
        assert_eq!(forward, (50.0, 50.0));
    }

    #[test]
    fn test_gaze_arrow_flips_y() {
        assert_eq!(gaze_arrow_tip((10.0, 10.0), [0.5, 0.5, 0.0], 4.0), (12.0, 8.0));
    }
}
