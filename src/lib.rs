//! SpeedReader: wires the detection engine, recognition engine, and OCR
//! pipeline from `speedreader-core` into a single facade that loads model
//! weights and a character dictionary and exposes `read_one`/`read_many`.
//!
//! Construction wires every component in; dropping the `SpeedReader`
//! cancels the shared token via its `Drop` impl, which tears down the
//! adaptive tuners and any in-flight video frame sources. No state outlives
//! the instance.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::Stream;
use tokio_util::sync::CancellationToken;

use speedreader_common::Image;
use speedreader_core::config::SpeedReaderConfig;
use speedreader_core::detection::DetectionStage;
use speedreader_core::engine::InferenceEngine;
use speedreader_core::kernel::{Kernel, KernelOptions, OrtKernel};
use speedreader_core::pipeline::{OcrJob, OcrPipeline};
use speedreader_core::recognition::RecognitionStage;
use speedreader_core::types::OcrResult;

/// Model weights and dictionary for both networks, as in-memory buffers so
/// callers can embed them in the binary rather than reading from disk at
/// startup.
pub struct ModelBundle {
    pub detection_model: Vec<u8>,
    pub recognition_model: Vec<u8>,
    /// 1-based index -> character; index 0 (the CTC blank) is never stored.
    pub dictionary: Vec<String>,
}

impl ModelBundle {
    /// Reads the three assets from disk; the dictionary file is one
    /// character (or character group) per line.
    pub fn from_files(
        detection_model_path: impl AsRef<std::path::Path>,
        recognition_model_path: impl AsRef<std::path::Path>,
        dictionary_path: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        let detection_model = std::fs::read(detection_model_path.as_ref())
            .with_context(|| format!("reading detection model from {:?}", detection_model_path.as_ref()))?;
        let recognition_model = std::fs::read(recognition_model_path.as_ref())
            .with_context(|| format!("reading recognition model from {:?}", recognition_model_path.as_ref()))?;
        let dictionary = std::fs::read_to_string(dictionary_path.as_ref())
            .with_context(|| format!("reading dictionary from {:?}", dictionary_path.as_ref()))?
            .lines()
            .map(str::to_string)
            .collect();
        Ok(Self {
            detection_model,
            recognition_model,
            dictionary,
        })
    }
}

/// The composed OCR pipeline: detection engine + recognition engine +
/// pipeline fan-out/fan-in, all sharing one cancellation token.
pub struct SpeedReader {
    pipeline: OcrPipeline,
    cancellation: CancellationToken,
}

impl SpeedReader {
    /// Builds a detection engine and a recognition engine (each with its
    /// own kernel session, executor, sensor, and optional tuner) and
    /// composes them into an `OcrPipeline`. A `ResourceFault` here is
    /// unrecoverable: construction fails rather than yielding a half-wired
    /// pipeline.
    pub fn new(bundle: ModelBundle, config: SpeedReaderConfig) -> Result<Self> {
        let cancellation = CancellationToken::new();

        let detection_kernel: Arc<dyn Kernel> = Arc::new(
            OrtKernel::from_memory(&bundle.detection_model, KernelOptions::default())
                .context("loading detection model")?,
        );
        let recognition_kernel: Arc<dyn Kernel> = Arc::new(
            OrtKernel::from_memory(&bundle.recognition_model, KernelOptions::default())
                .context("loading recognition model")?,
        );

        let detection_engine = Arc::new(InferenceEngine::without_metrics(
            detection_kernel,
            config.pipeline.max_parallelism,
            Some(config.tuner),
            config.sensor.retention_window_multiple,
            cancellation.clone(),
        ));
        let recognition_engine = Arc::new(InferenceEngine::without_metrics(
            recognition_kernel,
            config.pipeline.max_parallelism,
            Some(config.tuner),
            config.sensor.retention_window_multiple,
            cancellation.clone(),
        ));

        let detection = Arc::new(DetectionStage::new(detection_engine, config.detection));
        let recognition = Arc::new(RecognitionStage::new(
            recognition_engine,
            config.recognition,
            Arc::new(bundle.dictionary),
        ));

        let pipeline = OcrPipeline::new(detection, recognition, config.pipeline, cancellation.clone());

        Ok(Self {
            pipeline,
            cancellation,
        })
    }

    /// Outer future resolves on admission; the returned `OcrJob` resolves
    /// with the assembled result (or the first faulting stage's error).
    pub async fn read_one(&self, image: Image) -> speedreader_common::Result<OcrJob> {
        self.pipeline.read_one(image).await
    }

    /// Emits exactly one result per input image, in submission order.
    pub fn read_many<S>(&self, images: S) -> impl Stream<Item = speedreader_common::Result<OcrResult>>
    where
        S: Stream<Item = Image> + Send + 'static,
    {
        self.pipeline.read_many(images)
    }

    /// Cancels every in-flight component: tuners exit at their next wait,
    /// in-flight inference jobs run to completion but their results may be
    /// discarded, and any video frame source sharing this token terminates
    /// its subprocess.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

impl Drop for SpeedReader {
    /// `CancellationToken` cancellation doesn't propagate from a dropped
    /// clone, so teardown is driven explicitly here rather than relying on
    /// the token's own `Drop` (it has none).
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}
