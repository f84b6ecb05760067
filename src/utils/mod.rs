//! Shared helpers: frame decoding, geometry and drawing

pub mod image;
pub mod math;
pub mod overlay;
