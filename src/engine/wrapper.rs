//! Inference wrapper
//!
//! Binds one loaded network to one device and exposes synchronous
//! request/response access to its blobs.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, ensure, Context, Result};
use image::RgbImage;
use tracing::info;

use super::preprocess::image_to_nchw;
use super::runtime::{BlobDimsInfo, Runtime, Session};
use super::PluginPool;

/// Latency counters of one wrapper
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceCounts {
    pub infer_count: u64,
    pub total: Duration,
    pub last: Duration,
}

impl PerformanceCounts {
    pub fn average(&self) -> Duration {
        if self.infer_count == 0 {
            return Duration::ZERO;
        }
        self.total / self.infer_count as u32
    }

    fn record(&mut self, elapsed: Duration) {
        self.infer_count += 1;
        self.total += elapsed;
        self.last = elapsed;
    }
}

pub struct InferenceWrapper {
    model_path: PathBuf,
    session: Box<dyn Session>,
    counts: PerformanceCounts,
}

impl InferenceWrapper {
    /// Load `model_path` onto `device`, which must already be in the pool
    pub fn new<R: Runtime>(model_path: &Path, device: &str, pool: &mut PluginPool<R>) -> Result<Self> {
        let session = pool
            .load_network(model_path, device)
            .with_context(|| format!("Failed to load {}", model_path.display()))?;
        Ok(Self::from_session(model_path, session))
    }

    pub fn from_session(model_path: &Path, session: Box<dyn Session>) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
            session,
            counts: PerformanceCounts::default(),
        }
    }

    pub fn input_dims(&self) -> &BlobDimsInfo {
        self.session.input_dims()
    }

    pub fn output_dims(&self) -> &BlobDimsInfo {
        self.session.output_dims()
    }

    /// Name and shape of the first input, for single-input networks
    pub fn first_input(&self) -> Result<(String, Vec<usize>)> {
        first_blob(self.input_dims(), "input", &self.model_path)
    }

    /// Name and shape of the first output, for single-output networks
    pub fn first_output(&self) -> Result<(String, Vec<usize>)> {
        first_blob(self.output_dims(), "output", &self.model_path)
    }

    /// Set an image input. The image is resized to the blob's spatial size.
    pub fn set_image_input(&mut self, name: &str, image: &RgbImage) -> Result<()> {
        let dims = self.blob_dims(name)?;
        ensure!(
            dims.len() == 4 && dims[1] == 3,
            "Input {} of {} is not an NCHW color image: {:?}",
            name,
            self.model_path.display(),
            dims
        );

        let tensor = image_to_nchw(image, dims[3] as u32, dims[2] as u32);
        let data = tensor
            .as_slice()
            .context("image tensor is not contiguous")?;
        self.session.set_input(name, &dims, data)
    }

    /// Set a plain vector input. The length must match the blob's size.
    pub fn set_vector_input(&mut self, name: &str, data: &[f32]) -> Result<()> {
        let dims = self.blob_dims(name)?;
        let expected: usize = dims.iter().product();
        ensure!(
            data.len() == expected,
            "Input {} expects {} values, got {}",
            name,
            expected,
            data.len()
        );
        self.session.set_input(name, &dims, data)
    }

    /// Read a named output blob
    pub fn output_blob(&self, name: &str) -> Result<Vec<f32>> {
        ensure!(
            self.output_dims().contains_key(name),
            "{} has no output named {}",
            self.model_path.display(),
            name
        );
        self.session.output(name)
    }

    /// Read the only output blob of a single-output network
    pub fn sole_output_blob(&self) -> Result<Vec<f32>> {
        if self.output_dims().len() != 1 {
            bail!(
                "{} has {} outputs, expected exactly one",
                self.model_path.display(),
                self.output_dims().len()
            );
        }
        let (name, _) = self.first_output()?;
        self.session.output(&name)
    }

    /// Change input shapes ahead of the next inference
    pub fn reshape(&mut self, new_dims: &BlobDimsInfo) -> Result<()> {
        for name in new_dims.keys() {
            ensure!(
                self.input_dims().contains_key(name),
                "Cannot reshape unknown input {} of {}",
                name,
                self.model_path.display()
            );
        }
        info!("Reshaping {} to {:?}", self.model_path.display(), new_dims);
        self.session.reshape(new_dims)
    }

    /// Run the request synchronously
    pub fn infer(&mut self) -> Result<()> {
        let start = Instant::now();
        self.session
            .infer()
            .with_context(|| format!("Inference failed for {}", self.model_path.display()))?;
        self.counts.record(start.elapsed());
        Ok(())
    }

    pub fn performance_counts(&self) -> PerformanceCounts {
        self.counts
    }

    pub fn print_performance_counts(&self) {
        let counts = self.counts;
        info!(
            "Performance counts for {}: {} inferences, total {:?}, average {:?}, last {:?}",
            self.model_path.display(),
            counts.infer_count,
            counts.total,
            counts.average(),
            counts.last
        );
    }

    fn blob_dims(&self, name: &str) -> Result<Vec<usize>> {
        self.input_dims().get(name).cloned().with_context(|| {
            format!("{} has no input named {}", self.model_path.display(), name)
        })
    }
}

fn first_blob(dims: &BlobDimsInfo, kind: &str, model_path: &Path) -> Result<(String, Vec<usize>)> {
    dims.iter()
        .next()
        .map(|(name, shape)| (name.clone(), shape.clone()))
        .with_context(|| format!("{} has no {} blobs", model_path.display(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::mock::MockSession;
    use image::{ImageBuffer, Rgb};

    fn wrapper(session: MockSession) -> InferenceWrapper {
        InferenceWrapper::from_session(Path::new("test.xml"), Box::new(session))
    }

    #[test]
    fn test_image_input_uses_blob_size() {
        let session = MockSession::new([("data", vec![1, 3, 2, 3])], [("out", vec![1, 1])]);
        let log = session.log.clone();
        let mut w = wrapper(session);

        let image = ImageBuffer::from_pixel(10, 10, Rgb([1u8, 2, 3]));
        w.set_image_input("data", &image).unwrap();

        let log = log.borrow();
        let (dims, data) = &log.inputs["data"];
        assert_eq!(dims, &vec![1, 3, 2, 3]);
        assert_eq!(data.len(), 18);
        assert_eq!(data[0], 3.0);
    }

    #[test]
    fn test_vector_input_length_checked() {
        let session = MockSession::new([("angles", vec![1, 3])], [("out", vec![1, 3])]);
        let mut w = wrapper(session);

        assert!(w.set_vector_input("angles", &[1.0, 2.0]).is_err());
        assert!(w.set_vector_input("angles", &[1.0, 2.0, 3.0]).is_ok());
        assert!(w.set_vector_input("missing", &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_sole_output_requires_single_output() {
        let session = MockSession::new(
            [("data", vec![1, 3, 2, 2])],
            [("a", vec![1, 1]), ("b", vec![1, 1])],
        )
        .with_output("a", vec![1.0])
        .with_output("b", vec![2.0]);
        let w = wrapper(session);

        assert!(w.sole_output_blob().is_err());
        assert_eq!(w.output_blob("b").unwrap(), vec![2.0]);
        assert!(w.output_blob("c").is_err());
    }

    #[test]
    fn test_reshape_unknown_input_rejected() {
        let session = MockSession::new([("data", vec![1, 3, 2, 2])], [("out", vec![1, 1])]);
        let log = session.log.clone();
        let mut w = wrapper(session);

        let bad: BlobDimsInfo = [("other".to_string(), vec![1, 3, 4, 4])].into();
        assert!(w.reshape(&bad).is_err());

        let good: BlobDimsInfo = [("data".to_string(), vec![1, 3, 4, 8])].into();
        w.reshape(&good).unwrap();
        assert_eq!(w.input_dims()["data"], vec![1, 3, 4, 8]);
        assert_eq!(log.borrow().reshapes.len(), 1);
    }

    #[test]
    fn test_infer_counts() {
        let session = MockSession::new([("data", vec![1, 3, 2, 2])], [("out", vec![1, 1])]);
        let mut w = wrapper(session);

        w.infer().unwrap();
        w.infer().unwrap();
        assert_eq!(w.performance_counts().infer_count, 2);
    }
}
