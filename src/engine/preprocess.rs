//! Image preprocessing for the face, head pose and gaze networks

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

use crate::results::BoundingBox;

/// Resize an image to the network's H x W and pack it as a 1x3xHxW tensor.
///
/// The networks take raw BGR pixel values in [0, 255].
pub fn image_to_nchw(image: &RgbImage, width: u32, height: u32) -> Array4<f32> {
    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        resized = imageops::resize(image, width, height, FilterType::Triangle);
        &resized
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in source.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = pixel[2] as f32; // B
        tensor[[0, 1, y, x]] = pixel[1] as f32; // G
        tensor[[0, 2, y, x]] = pixel[0] as f32; // R
    }

    tensor
}

/// Copy out the part of `image` covered by `region`, clipped to the image.
/// Returns `None` when nothing of the region is inside the image.
pub fn crop(image: &RgbImage, region: &BoundingBox) -> Option<RgbImage> {
    let bounds = BoundingBox::new(0, 0, image.width() as i32, image.height() as i32);
    let clipped = region.intersect(&bounds);
    if clipped.area() == 0 {
        return None;
    }

    let view = imageops::crop_imm(
        image,
        clipped.x as u32,
        clipped.y as u32,
        clipped.width as u32,
        clipped.height as u32,
    );
    Some(view.to_image())
}

/// Rotate an image around its centre by `angle_deg` (counter-clockwise on
/// screen), keeping its size. Pixels sampled from outside the source repeat
/// the nearest edge pixel.
pub fn rotate_about_center(image: &RgbImage, angle_deg: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let center = ((w / 2) as f32, (h / 2) as f32);

    let (sin, cos) = angle_deg.to_radians().sin_cos();
    // Forward mapping src -> dst, as a 2x3 affine matrix
    let transform = [
        [cos, sin, (1.0 - cos) * center.0 - sin * center.1],
        [-sin, cos, sin * center.0 + (1.0 - cos) * center.1],
    ];

    apply_affine_transform(image, &transform, w, h)
}

/// Apply an affine transformation with bilinear sampling and replicated borders
fn apply_affine_transform(
    image: &RgbImage,
    transform: &[[f32; 3]; 2],
    out_width: u32,
    out_height: u32,
) -> RgbImage {
    let mut output = ImageBuffer::from_pixel(out_width, out_height, Rgb([0u8, 0, 0]));
    if image.width() == 0 || image.height() == 0 {
        return output;
    }

    // Compute inverse transform for backward mapping
    let det = transform[0][0] * transform[1][1] - transform[0][1] * transform[1][0];
    let inv = [
        [transform[1][1] / det, -transform[0][1] / det],
        [-transform[1][0] / det, transform[0][0] / det],
    ];

    let max_x = (image.width() - 1) as f32;
    let max_y = (image.height() - 1) as f32;

    for y in 0..out_height {
        for x in 0..out_width {
            let dx = x as f32 - transform[0][2];
            let dy = y as f32 - transform[1][2];

            let src_x = (inv[0][0] * dx + inv[0][1] * dy).clamp(0.0, max_x);
            let src_y = (inv[1][0] * dx + inv[1][1] * dy).clamp(0.0, max_y);

            let x0 = src_x.floor() as u32;
            let y0 = src_y.floor() as u32;
            let x1 = (x0 + 1).min(image.width() - 1);
            let y1 = (y0 + 1).min(image.height() - 1);

            let fx = src_x - x0 as f32;
            let fy = src_y - y0 as f32;

            let p00 = image.get_pixel(x0, y0);
            let p01 = image.get_pixel(x0, y1);
            let p10 = image.get_pixel(x1, y0);
            let p11 = image.get_pixel(x1, y1);

            let mut pixel = [0u8; 3];
            for c in 0..3 {
                let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                    + p10[c] as f32 * fx * (1.0 - fy)
                    + p01[c] as f32 * (1.0 - fx) * fy
                    + p11[c] as f32 * fx * fy;

                pixel[c] = v.round().clamp(0.0, 255.0) as u8;
            }

            output.put_pixel(x, y, Rgb(pixel));
        }
    }

    output
}
