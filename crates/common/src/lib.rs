//! Shared types and error kinds for the SpeedReader inference core.

pub mod error;
pub mod image;
pub mod tensor;

pub use error::{Result, SpeedReaderError};
pub use image::Image;
pub use tensor::TensorBuffer;
