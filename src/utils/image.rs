//! Image utility functions

use std::io::Cursor;

use image::{DynamicImage, RgbImage};
use anyhow::Result;

/// Decode a frame from encoded bytes (JPEG, PNG, ...) with EXIF orientation applied
pub fn decode_frame(data: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, image).to_rgb8())
}

/// Apply EXIF orientation to correct image rotation
/// Cameras often store frames with EXIF orientation tags instead of rotating pixels
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1, // No EXIF or error reading, assume normal orientation
    };

    // See: https://exiftool.org/TagNames/EXIF.html (Orientation)
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    #[test]
    fn test_decode_png_without_exif() {
        let frame = RgbImage::from_pixel(3, 2, Rgb([9, 8, 7]));
        let mut buffer = Cursor::new(Vec::new());
        frame.write_to(&mut buffer, ImageFormat::Png).unwrap();

        let decoded = decode_frame(buffer.get_ref()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_frame(b"not an image").is_err());
    }
}
