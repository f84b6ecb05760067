//! Frame input and output

pub mod traits;
pub mod files;

pub use traits::{FrameSink, FrameSource};
pub use files::{open_source, DirectorySink, DirectorySource, ImageFileSource};
