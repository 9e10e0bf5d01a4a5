//! Test-only fixtures shared across this crate's `#[cfg(test)]` modules:
//! deterministic stand-in `Kernel` implementations that let engine,
//! executor, and pipeline tests run without real model weights.

use crate::kernel::Kernel;
use speedreader_common::{Result, SpeedReaderError};

/// Returns its input unchanged.
pub struct EchoKernel;

impl Kernel for EchoKernel {
    fn execute(&self, input_data: &[f32], input_shape: &[usize]) -> Result<(Vec<f32>, Vec<usize>)> {
        Ok((input_data.to_vec(), input_shape.to_vec()))
    }
}

/// Always returns the same output, ignoring its input. Useful for standing
/// in for a detection or recognition model with a known, fixed response.
pub struct ConstantKernel {
    pub output_data: Vec<f32>,
    pub output_shape: Vec<usize>,
}

impl Kernel for ConstantKernel {
    fn execute(&self, _input_data: &[f32], _input_shape: &[usize]) -> Result<(Vec<f32>, Vec<usize>)> {
        Ok((self.output_data.clone(), self.output_shape.clone()))
    }
}

/// Always fails, simulating a kernel-side inference fault.
pub struct FailingKernel;

impl Kernel for FailingKernel {
    fn execute(&self, _input_data: &[f32], _input_shape: &[usize]) -> Result<(Vec<f32>, Vec<usize>)> {
        Err(SpeedReaderError::inference("synthetic kernel failure"))
    }
}
