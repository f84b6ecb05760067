//! OpenVINO backed runtime
//!
//! One `openvino::Core` serves every device. A plugin handle is the device
//! selector plus whatever properties were configured on the core for it.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use openvino::prepostprocess::Pipeline;
use openvino::{
    CompiledModel, Core, DeviceType, ElementType, InferRequest, Layout, Model, ResizeAlgorithm, RwPropertyKey,
    Shape, Tensor,
};
use tracing::{debug, info, warn};

use super::runtime::{BlobDimsInfo, PluginHandle, Runtime, Session};

/// Layout of every image input the pipeline feeds
const IMAGE_LAYOUT: &str = "NCHW";

pub struct OpenVinoRuntime {
    core: Rc<RefCell<Core>>,
    cpu_threads: Option<u32>,
}

impl OpenVinoRuntime {
    /// Create the runtime. `cpu_threads` is applied to CPU plugins when their
    /// extensions are loaded.
    pub fn new(cpu_threads: Option<u32>) -> Result<Self> {
        let core = Core::new().context("Failed to initialise OpenVINO core")?;
        Ok(Self {
            core: Rc::new(RefCell::new(core)),
            cpu_threads,
        })
    }
}

impl Runtime for OpenVinoRuntime {
    fn acquire_plugin(&mut self, device: &str) -> Result<PluginHandle> {
        ensure!(!device.trim().is_empty(), "empty device name");
        info!("Loading plugin {}", device);
        Ok(PluginHandle::new(device))
    }

    fn load_cpu_extensions(&mut self, plugin: &PluginHandle) -> Result<()> {
        // The CPU plugin ships its extension layers built in; what is left to
        // configure is the thread budget.
        let Some(threads) = self.cpu_threads else {
            debug!("CPU extensions are built into {}", plugin.device());
            return Ok(());
        };
        let device = DeviceType::from(plugin.device());
        self.core
            .borrow_mut()
            .set_property(&device, &RwPropertyKey::InferenceNumThreads, &threads.to_string())
            .with_context(|| format!("Failed to configure CPU threads on {}", plugin.device()))?;
        info!("{} configured with {} inference threads", plugin.device(), threads);
        Ok(())
    }

    fn enable_performance_counters(&mut self, plugin: &PluginHandle) -> Result<()> {
        let device = DeviceType::from(plugin.device());
        self.core
            .borrow_mut()
            .set_property(&device, &RwPropertyKey::EnableProfiling, "YES")
            .with_context(|| format!("Failed to enable profiling on {}", plugin.device()))?;
        Ok(())
    }

    fn load_network(&mut self, model_path: &Path, plugin: &PluginHandle) -> Result<Box<dyn Session>> {
        let path = model_path
            .to_str()
            .with_context(|| format!("Model path is not valid UTF-8: {}", model_path.display()))?;

        info!("Loading model {} on {}", path, plugin.device());
        let start = Instant::now();

        let model = read_model(&self.core, path)?;

        let mut input_names = Vec::new();
        for i in 0..model.get_inputs_len()? {
            input_names.push(model.get_input_by_index(i)?.get_name()?);
        }
        let mut output_names = Vec::new();
        for i in 0..model.get_outputs_len()? {
            output_names.push(model.get_output_by_index(i)?.get_name()?);
        }

        let (compiled, request) = compile(&self.core, &model, plugin.device())
            .with_context(|| format!("Failed to compile {} for {}", path, plugin.device()))?;

        let inputs = query_dims(&request, &input_names);
        let outputs = query_dims(&request, &output_names);

        info!("Model {} loaded in {:?}", path, start.elapsed());
        debug!("Inputs: {:?}, outputs: {:?}", inputs, outputs);

        Ok(Box::new(OpenVinoSession {
            core: Rc::clone(&self.core),
            model_path: path.to_string(),
            device: plugin.device().to_string(),
            dynamic: model.is_dynamic(),
            _compiled: compiled,
            request,
            inputs,
            outputs,
        }))
    }
}

fn read_model(core: &RefCell<Core>, path: &str) -> Result<Model> {
    core.borrow_mut()
        .read_model_from_file(path, "")
        .with_context(|| format!("Failed to read model {}", path))
}

fn compile(core: &RefCell<Core>, model: &Model, device: &str) -> Result<(CompiledModel, InferRequest)> {
    let mut compiled = core.borrow_mut().compile_model(model, DeviceType::from(device))?;
    let request = compiled.create_infer_request()?;
    Ok((compiled, request))
}

/// Shapes of the request's tensors. Dynamic slots have no tensor until one
/// is set and are reported with an empty shape.
fn query_dims(request: &InferRequest, names: &[String]) -> BlobDimsInfo {
    names
        .iter()
        .map(|name| {
            let dims = match request.get_tensor(name).and_then(|t| t.get_shape()) {
                Ok(shape) => shape.get_dimensions().iter().map(|&d| d as usize).collect(),
                Err(e) => {
                    warn!("Blob {} has no static shape ({})", name, e);
                    Vec::new()
                }
            };
            (name.clone(), dims)
        })
        .collect()
}

/// Reject reshapes of inputs the network does not have, or to non-NCHW shapes
fn check_reshape(inputs: &BlobDimsInfo, new_dims: &BlobDimsInfo) -> Result<()> {
    for (name, dims) in new_dims {
        ensure!(inputs.contains_key(name), "Cannot reshape unknown input {}", name);
        ensure!(
            dims.len() == IMAGE_LAYOUT.len() && dims.iter().all(|&d| d > 0),
            "Input {} can only be reshaped to a non-empty NCHW shape, got {:?}",
            name,
            dims
        );
    }
    Ok(())
}

/// Tensor shape for `dims`, checked against the number of values to copy in
fn tensor_shape(dims: &[usize], len: usize) -> Result<Vec<i64>> {
    let expected: usize = dims.iter().product();
    ensure!(
        expected == len,
        "Tensor of shape {:?} needs {} values, got {}",
        dims,
        expected,
        len
    );
    Ok(dims.iter().map(|&d| d as i64).collect())
}

struct OpenVinoSession {
    core: Rc<RefCell<Core>>,
    model_path: String,
    device: String,
    dynamic: bool,
    _compiled: CompiledModel,
    request: InferRequest,
    inputs: BlobDimsInfo,
    outputs: BlobDimsInfo,
}

impl OpenVinoSession {
    /// Rebuild the network so the given inputs accept tensors of the new
    /// shape, resized on device to what the model was trained for
    fn recompile(&mut self, new_dims: &BlobDimsInfo) -> Result<()> {
        let start = Instant::now();
        let model = read_model(&self.core, &self.model_path)?;
        let pipeline = Pipeline::new(&model)?;

        for (name, dims) in new_dims {
            let dims: Vec<i64> = dims.iter().map(|&d| d as i64).collect();
            let shape = Shape::new(&dims)?;
            let tensor = Tensor::new(ElementType::F32, &shape)?;

            let input = pipeline.get_input_info_by_name(name)?;
            let mut tensor_info = input.get_tensor_info()?;
            tensor_info.set_from(&tensor)?;
            tensor_info.set_layout(Layout::new(IMAGE_LAYOUT)?)?;

            let mut steps = input.get_steps()?;
            steps.resize(ResizeAlgorithm::Linear)?;

            let mut model_info = input.get_model_info()?;
            model_info.set_layout(Layout::new(IMAGE_LAYOUT)?)?;
        }

        let model = pipeline.build_new_model()?;
        let (compiled, request) = compile(&self.core, &model, &self.device)
            .with_context(|| format!("Failed to recompile {} for {}", self.model_path, self.device))?;

        let output_names: Vec<String> = self.outputs.keys().cloned().collect();
        self._compiled = compiled;
        self.request = request;
        self.outputs = query_dims(&self.request, &output_names);

        info!("Model {} recompiled in {:?}", self.model_path, start.elapsed());
        Ok(())
    }
}

impl Session for OpenVinoSession {
    fn input_dims(&self) -> &BlobDimsInfo {
        &self.inputs
    }

    fn output_dims(&self) -> &BlobDimsInfo {
        &self.outputs
    }

    fn reshape(&mut self, new_dims: &BlobDimsInfo) -> Result<()> {
        check_reshape(&self.inputs, new_dims)?;

        // Dynamic inputs take any tensor shape on the next set_input
        if !self.dynamic {
            self.recompile(new_dims)?;
        }
        for (name, dims) in new_dims {
            self.inputs.insert(name.clone(), dims.clone());
        }
        Ok(())
    }

    fn set_input(&mut self, name: &str, dims: &[usize], data: &[f32]) -> Result<()> {
        let shape = Shape::new(&tensor_shape(dims, data.len())?)?;
        let mut tensor = Tensor::new(ElementType::F32, &shape)?;

        let tensor_data = tensor.get_raw_data_mut()?;
        ensure!(
            tensor_data.len() == std::mem::size_of_val(data),
            "Tensor {} holds {} bytes, got {}",
            name,
            tensor_data.len(),
            std::mem::size_of_val(data)
        );
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), tensor_data.as_mut_ptr() as *mut f32, data.len());
        }

        self.request.set_tensor(name, &tensor)?;
        Ok(())
    }

    fn output(&self, name: &str) -> Result<Vec<f32>> {
        let tensor = self.request.get_tensor(name)?;
        read_tensor_f32(&tensor)
    }

    fn infer(&mut self) -> Result<()> {
        self.request.infer()?;
        Ok(())
    }
}

/// Read tensor data as f32 vector
fn read_tensor_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let shape = tensor.get_shape()?;
    let total_elements: i64 = shape.get_dimensions().iter().product();

    let data: Vec<f32> = unsafe {
        let ptr = tensor.get_raw_data()?.as_ptr() as *const f32;
        std::slice::from_raw_parts(ptr, total_elements as usize).to_vec()
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector_inputs() -> BlobDimsInfo {
        [("data".to_string(), vec![1, 3, 300, 300])].into()
    }

    #[test]
    fn test_tensor_shape_matches_data() {
        assert_eq!(tensor_shape(&[1, 3, 2, 2], 12).unwrap(), vec![1, 3, 2, 2]);
    }

    #[test]
    fn test_tensor_shape_rejects_short_data() {
        let err = tensor_shape(&[1, 3, 300, 300], 100).unwrap_err();
        assert!(err.to_string().contains("270000"));
    }

    #[test]
    fn test_tensor_shape_rejects_long_data() {
        assert!(tensor_shape(&[1, 3], 4).is_err());
    }

    #[test]
    fn test_reshape_to_wider_nchw_allowed() {
        let new_dims: BlobDimsInfo = [("data".to_string(), vec![1, 3, 300, 400])].into();
        assert!(check_reshape(&detector_inputs(), &new_dims).is_ok());
    }

    #[test]
    fn test_reshape_unknown_input_rejected() {
        let new_dims: BlobDimsInfo = [("image".to_string(), vec![1, 3, 300, 400])].into();
        assert!(check_reshape(&detector_inputs(), &new_dims).is_err());
    }

    #[test]
    fn test_reshape_needs_four_nonzero_dims() {
        let flat: BlobDimsInfo = [("data".to_string(), vec![1, 270000])].into();
        let empty: BlobDimsInfo = [("data".to_string(), vec![1, 3, 0, 300])].into();
        assert!(check_reshape(&detector_inputs(), &flat).is_err());
        assert!(check_reshape(&detector_inputs(), &empty).is_err());
    }
}
