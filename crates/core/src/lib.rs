//! The SpeedReader inference orchestration core: a bounded, adaptively
//! tuned inference engine; detection and recognition stages built on it; an
//! ordered, backpressured OCR pipeline composing the two; a subprocess-
//! backed video frame source; and the geometry/CTC algorithms that turn raw
//! tensors into typed results.
//!
//! Leaves-first module order mirrors the dependency graph: geometry and ctc
//! have no internal dependencies; kernel, executor, and sensor are
//! independent primitives; tuner and engine compose them; detection and
//! recognition build on engine; pipeline composes both stages; video is
//! independent of everything except `speedreader_common::Image`.

pub mod boundary;
pub mod config;
pub mod ctc;
pub mod detection;
pub mod engine;
pub mod executor;
pub mod geometry;
pub mod kernel;
pub mod metrics;
pub mod pipeline;
pub mod recognition;
pub mod sensor;
pub mod tuner;
pub mod types;
pub mod video;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SpeedReaderConfig;
pub use detection::DetectionStage;
pub use engine::InferenceEngine;
pub use kernel::{Kernel, KernelOptions, OrtKernel};
pub use pipeline::OcrPipeline;
pub use recognition::RecognitionStage;
pub use types::{BoundingBox, DetectionResult, OcrResult, RecognitionResult};
pub use video::{DecoderState, FrameDimensions, VideoFrameSource};
