//! Frame stream abstraction traits
//!
//! The pipeline reads frames from a source and hands annotated frames to a
//! sink. Decoding and encoding stay with the image library.

use anyhow::Result;
use image::RgbImage;

/// A stream of RGB frames
pub trait FrameSource {
    /// Next frame, or `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Destination for annotated frames
pub trait FrameSink {
    /// Store frame number `index` (0-based)
    fn write_frame(&mut self, index: u64, frame: &RgbImage) -> Result<()>;
}
