//! Device plugin pool
//!
//! Built once at startup from the (device, model) pairs on the command line.
//! Each device gets exactly one plugin, which every model on that device
//! shares.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::runtime::{PluginHandle, Runtime, Session};

/// Plugins keyed by device identifier, plus the runtime that created them
pub struct PluginPool<R: Runtime> {
    runtime: R,
    plugins: HashMap<String, PluginHandle>,
}

impl<R: Runtime> PluginPool<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            plugins: HashMap::new(),
        }
    }

    /// Build a pool for every usable (device, model) pair.
    ///
    /// Pairs with an empty device or model are skipped, as are devices that
    /// already have a plugin.
    pub fn create<D, M>(runtime: R, pairs: &[(D, M)], enable_perf_counters: bool) -> Result<Self>
    where
        D: AsRef<str>,
        M: AsRef<Path>,
    {
        let mut pool = Self::new(runtime);
        for (device, model) in pairs {
            let device = device.as_ref();
            if device.is_empty() || model.as_ref().as_os_str().is_empty() {
                continue;
            }
            pool.add_device(device, enable_perf_counters)?;
        }
        Ok(pool)
    }

    /// Acquire and configure a plugin for `device` unless one is pooled already.
    /// Returns whether a new plugin was created.
    pub fn add_device(&mut self, device: &str, enable_perf_counters: bool) -> Result<bool> {
        if self.plugins.contains_key(device) {
            return Ok(false);
        }

        let plugin = self.runtime.acquire_plugin(device)?;

        if device.contains("CPU") {
            self.runtime.load_cpu_extensions(&plugin)?;
        }

        if enable_perf_counters {
            info!("Per-layer performance counters enabled on {}", device);
            self.runtime.enable_performance_counters(&plugin)?;
        }

        self.plugins.insert(device.to_string(), plugin);
        Ok(true)
    }

    pub fn plugin(&self, device: &str) -> Option<&PluginHandle> {
        self.plugins.get(device)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Load a network onto a pooled device
    pub fn load_network(&mut self, model_path: &Path, device: &str) -> Result<Box<dyn Session>> {
        let plugin = self
            .plugins
            .get(device)
            .with_context(|| format!("No plugin loaded for device {}", device))?;
        self.runtime.load_network(model_path, plugin)
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}
