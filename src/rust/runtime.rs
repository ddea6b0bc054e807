use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;
use log::info;
use std::fmt;
use std::sync::OnceLock;

#[cfg(feature = "cuda")]
use log::warn;
#[cfg(feature = "cuda")]
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

/// Device picked when the ONNX environment is first committed. Never changes afterwards.
static DEVICE: OnceLock<Device> = OnceLock::new();

/// Compute device the inference session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
    /// Use an accelerator when one is built in and present at runtime
    pub prefer_accelerator: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
            prefer_accelerator: true,
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
            prefer_accelerator: self.prefer_accelerator,
        }
    }
}

fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

fn select_device(prefer_accelerator: bool) -> Device {
    if !prefer_accelerator {
        return Device::Cpu;
    }

    #[cfg(feature = "cuda")]
    {
        match CUDAExecutionProvider::default().is_available() {
            Ok(true) => return Device::Cuda,
            Ok(false) => info!("CUDA execution provider not available, using CPU"),
            Err(e) => warn!("Failed to probe CUDA execution provider: {}", e),
        }
    }

    Device::Cpu
}

fn init_onnx_environment(device: Device) -> OrtResult<()> {
    let builder = ort::init().with_name("skinsight");
    match device {
        #[cfg(feature = "cuda")]
        Device::Cuda => builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .commit()?,
        _ => builder.commit()?,
    };
    Ok(())
}

/// Commits the ONNX Runtime environment on first use and returns the device it was bound to.
///
/// Later calls return the device chosen by the first one, whatever they prefer.
pub fn ensure_initialized(prefer_accelerator: bool) -> OrtResult<Device> {
    if let Some(device) = DEVICE.get() {
        return Ok(*device);
    }

    let device = select_device(prefer_accelerator);
    init_onnx_environment(device)?;
    let device = *DEVICE.get_or_init(|| device);
    info!("ONNX Runtime initialized on {}", device);
    Ok(device)
}

/// Returns the device selected for this process, if the runtime is initialized.
pub fn selected_device() -> Option<Device> {
    DEVICE.get().copied()
}

pub fn create_session_builder(config: &RuntimeConfig) -> OrtResult<SessionBuilder> {
    ensure_initialized(config.prefer_accelerator)?;
    let mut builder = Session::builder()?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(copy_level(&config.optimization_level))?;

    Ok(builder)
}
