//! Gaze Estimation Pipeline Library

pub mod config;
pub mod engine;
pub mod frames;
pub mod results;
pub mod service;
pub mod utils;

pub use config::Config;
pub use results::FaceInferenceResults;
