//! Service layer
//!
//! Orchestrates detection and the per-face estimators over whole frames.

pub mod pipeline;
pub mod types;

pub use pipeline::GazePipeline;
pub use types::FrameResult;
