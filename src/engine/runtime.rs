//! Inference runtime abstraction
//!
//! The pipeline talks to the inference engine through two traits:
//! a [`Runtime`] that hands out device plugins and loads networks, and a
//! [`Session`] that owns one compiled network plus its single request.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

/// Named tensor slot -> shape, as reported by the loaded model
pub type BlobDimsInfo = BTreeMap<String, Vec<usize>>;

/// Opaque per-device plugin handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginHandle {
    device: String,
}

impl PluginHandle {
    pub fn new(device: impl Into<String>) -> Self {
        Self { device: device.into() }
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

/// Device dispatch and network loading
pub trait Runtime {
    /// Obtain a plugin for a device name
    fn acquire_plugin(&mut self, device: &str) -> Result<PluginHandle>;

    /// Register the CPU-specific extension layers on a plugin
    fn load_cpu_extensions(&mut self, plugin: &PluginHandle) -> Result<()>;

    /// Turn on per-layer performance counting for a plugin
    fn enable_performance_counters(&mut self, plugin: &PluginHandle) -> Result<()>;

    /// Read a network from disk and compile it for a plugin
    fn load_network(&mut self, model_path: &Path, plugin: &PluginHandle) -> Result<Box<dyn Session>>;
}

/// One compiled network bound to one device, with a single infer request.
///
/// Every call mutates the underlying request; there is at most one request
/// in flight per session.
pub trait Session {
    fn input_dims(&self) -> &BlobDimsInfo;

    fn output_dims(&self) -> &BlobDimsInfo;

    /// Change the expected shape of one or more inputs
    fn reshape(&mut self, new_dims: &BlobDimsInfo) -> Result<()>;

    /// Write a dense f32 tensor into a named input
    fn set_input(&mut self, name: &str, dims: &[usize], data: &[f32]) -> Result<()>;

    /// Read a named output as a flat f32 vector
    fn output(&self, name: &str) -> Result<Vec<f32>>;

    fn infer(&mut self) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory runtime used by unit tests

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use anyhow::{anyhow, ensure};

    use super::*;

    /// Calls recorded by [`MockRuntime`]
    #[derive(Debug, Default)]
    pub struct RuntimeLog {
        pub acquired: Vec<String>,
        pub extensions: Vec<String>,
        pub perf_counters: Vec<String>,
        pub loaded: Vec<(String, String)>,
    }

    /// Inputs written and reshapes requested through a [`MockSession`]
    #[derive(Debug, Default)]
    pub struct SessionLog {
        pub inputs: HashMap<String, (Vec<usize>, Vec<f32>)>,
        pub reshapes: Vec<BlobDimsInfo>,
        pub infers: usize,
    }

    #[derive(Default)]
    pub struct MockRuntime {
        pub log: RuntimeLog,
    }

    impl Runtime for MockRuntime {
        fn acquire_plugin(&mut self, device: &str) -> Result<PluginHandle> {
            self.log.acquired.push(device.to_string());
            Ok(PluginHandle::new(device))
        }

        fn load_cpu_extensions(&mut self, plugin: &PluginHandle) -> Result<()> {
            self.log.extensions.push(plugin.device().to_string());
            Ok(())
        }

        fn enable_performance_counters(&mut self, plugin: &PluginHandle) -> Result<()> {
            self.log.perf_counters.push(plugin.device().to_string());
            Ok(())
        }

        fn load_network(&mut self, model_path: &Path, plugin: &PluginHandle) -> Result<Box<dyn Session>> {
            self.log
                .loaded
                .push((model_path.display().to_string(), plugin.device().to_string()));
            Ok(Box::new(MockSession::new(
                [("data", vec![1, 3, 4, 4])],
                [("out", vec![1, 4])],
            )))
        }
    }

    /// Session returning canned outputs
    pub struct MockSession {
        inputs: BlobDimsInfo,
        outputs: BlobDimsInfo,
        values: HashMap<String, Vec<f32>>,
        pub log: Rc<RefCell<SessionLog>>,
    }

    impl MockSession {
        pub fn new<'a>(
            inputs: impl IntoIterator<Item = (&'a str, Vec<usize>)>,
            outputs: impl IntoIterator<Item = (&'a str, Vec<usize>)>,
        ) -> Self {
            Self {
                inputs: inputs.into_iter().map(|(n, d)| (n.to_string(), d)).collect(),
                outputs: outputs.into_iter().map(|(n, d)| (n.to_string(), d)).collect(),
                values: HashMap::new(),
                log: Rc::new(RefCell::new(SessionLog::default())),
            }
        }

        pub fn with_output(mut self, name: &str, data: Vec<f32>) -> Self {
            self.values.insert(name.to_string(), data);
            self
        }
    }

    impl Session for MockSession {
        fn input_dims(&self) -> &BlobDimsInfo {
            &self.inputs
        }

        fn output_dims(&self) -> &BlobDimsInfo {
            &self.outputs
        }

        fn reshape(&mut self, new_dims: &BlobDimsInfo) -> Result<()> {
            for (name, dims) in new_dims {
                self.inputs.insert(name.clone(), dims.clone());
            }
            self.log.borrow_mut().reshapes.push(new_dims.clone());
            Ok(())
        }

        fn set_input(&mut self, name: &str, dims: &[usize], data: &[f32]) -> Result<()> {
            ensure!(self.inputs.contains_key(name), "no input named {}", name);
            self.log
                .borrow_mut()
                .inputs
                .insert(name.to_string(), (dims.to_vec(), data.to_vec()));
            Ok(())
        }

        fn output(&self, name: &str) -> Result<Vec<f32>> {
            self.values
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("no output named {}", name))
        }

        fn infer(&mut self) -> Result<()> {
            self.log.borrow_mut().infers += 1;
            Ok(())
        }
    }
}
