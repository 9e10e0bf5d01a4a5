//! The inference kernel adapter: a single `execute(input, shape) ->
//! (output, shape)` contract that hides the ONNX Runtime session and all
//! `unsafe`/FFI details behind one module. The rest of the core never
//! touches `ort` directly.

use ndarray::{ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use speedreader_common::{Result, SpeedReaderError};

/// Session-construction options, mapped directly onto the kernel FFI
/// surface's `{intra_op_threads, inter_op_threads, enable_profiling}`.
#[derive(Debug, Clone, Copy)]
pub struct KernelOptions {
    pub intra_op_threads: usize,
    pub inter_op_threads: usize,
    pub enable_profiling: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            intra_op_threads: num_cpus::get_physical(),
            inter_op_threads: 1,
            enable_profiling: false,
        }
    }
}

/// Uniform contract over a native model session. Implementations must be
/// `Send + Sync`: the session is shared across worker threads and `execute`
/// may be called concurrently.
pub trait Kernel: Send + Sync {
    fn execute(&self, input_data: &[f32], input_shape: &[usize]) -> Result<(Vec<f32>, Vec<usize>)>;
}

/// The one kernel implementation this core ships: an ONNX Runtime session
/// reached through `ort`. The native session handle is owned by `Session`
/// itself, acquired in `builder()`/`commit_from_*` and released on drop —
/// this wrapper adds no lifecycle of its own.
pub struct OrtKernel {
    session: Session,
    input_name: String,
}

impl OrtKernel {
    /// Loads a session from an in-memory model buffer, per the external
    /// interface's requirement to support embedding weights in the binary.
    pub fn from_memory(model_bytes: &[u8], options: KernelOptions) -> Result<Self> {
        let mut builder = Session::builder()
            .map_err(|e| SpeedReaderError::resource(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SpeedReaderError::resource(format!("optimization level: {e}")))?
            .with_intra_threads(options.intra_op_threads)
            .map_err(|e| SpeedReaderError::resource(format!("intra threads: {e}")))?
            .with_inter_threads(options.inter_op_threads)
            .map_err(|e| SpeedReaderError::resource(format!("inter threads: {e}")))?;
        if options.enable_profiling {
            builder = builder
                .with_profiling("speedreader-profile")
                .map_err(|e| SpeedReaderError::resource(format!("profiling: {e}")))?;
        }
        let session = builder
            .commit_from_memory(model_bytes)
            .map_err(|e| SpeedReaderError::resource(format!("load model: {e}")))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| SpeedReaderError::resource("model has no declared inputs"))?;

        Ok(Self {
            session,
            input_name,
        })
    }

    pub fn from_file(path: &std::path::Path, options: KernelOptions) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| SpeedReaderError::resource(format!("read model file: {e}")))?;
        Self::from_memory(&bytes, options)
    }
}

impl Kernel for OrtKernel {
    fn execute(
        &self,
        input_data: &[f32],
        input_shape: &[usize],
    ) -> Result<(Vec<f32>, Vec<usize>)> {
        let array = ArrayD::from_shape_vec(IxDyn(input_shape), input_data.to_vec())
            .map_err(|e| SpeedReaderError::inference(format!("invalid input shape: {e}")))?;
        let input_value = Value::from_array(array)
            .map_err(|e| SpeedReaderError::inference(format!("tensor conversion: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| SpeedReaderError::inference(format!("session run: {e}")))?;

        let (_, first_output) = outputs
            .iter()
            .next()
            .ok_or_else(|| SpeedReaderError::inference("model produced no outputs"))?;

        let tensor = first_output
            .try_extract_tensor::<f32>()
            .map_err(|e| SpeedReaderError::inference(format!("output extraction: {e}")))?;
        let shape: Vec<usize> = tensor.shape().iter().map(|&d| d as usize).collect();
        let data: Vec<f32> = tensor.iter().copied().collect();

        Ok((data, shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::EchoKernel;

    #[test]
    fn echo_kernel_round_trips() {
        let kernel = EchoKernel;
        let (data, shape) = kernel.execute(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(shape, vec![2, 2]);
    }
}
