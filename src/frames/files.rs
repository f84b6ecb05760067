//! File backed frame sources and sinks

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use tracing::{debug, info};

use super::traits::{FrameSink, FrameSource};
use crate::utils::image::decode_frame;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Open `path` as a frame source: a directory yields its image files in
/// name order, a file yields one frame.
pub fn open_source(path: &Path) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        Ok(Box::new(DirectorySource::new(path)?))
    } else if path.is_file() {
        Ok(Box::new(ImageFileSource::new(path)))
    } else {
        bail!("Input {} does not exist", path.display())
    }
}

fn read_frame(path: &Path) -> Result<RgbImage> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    decode_frame(&data).with_context(|| format!("Failed to decode {}", path.display()))
}

/// A single image treated as a one-frame stream
pub struct ImageFileSource {
    path: PathBuf,
    done: bool,
}

impl ImageFileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            done: false,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        read_frame(&self.path).map(Some)
    }

    fn describe(&self) -> String {
        format!("image {}", self.path.display())
    }
}

/// Image files of one directory, sorted by file name
pub struct DirectorySource {
    dir: PathBuf,
    frames: std::vec::IntoIter<PathBuf>,
}

impl DirectorySource {
    pub fn new(dir: &Path) -> Result<Self> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            bail!("No image frames found in {}", dir.display());
        }
        info!("Found {} frames in {}", frames.len(), dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            frames: frames.into_iter(),
        })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.next() {
            Some(path) => {
                debug!("Reading frame {}", path.display());
                read_frame(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("frames in {}", self.dir.display())
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Writes annotated frames as numbered PNG files
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }
}

impl FrameSink for DirectorySink {
    fn write_frame(&mut self, index: u64, frame: &RgbImage) -> Result<()> {
        let path = self.frame_path(index);
        frame
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
