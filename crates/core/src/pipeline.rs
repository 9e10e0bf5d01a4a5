//! The OCR pipeline: fans an image through detection and recognition,
//! assembling an `OcrResult`. Exposes the same outer/inner future split as
//! the managed executor, gated by a capacity semaphore sized per §4.11, and
//! a `read_many` stream that preserves submission order over internally
//! concurrent jobs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use speedreader_common::{Image, Result, SpeedReaderError};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::detection::DetectionStage;
use crate::geometry::RotatedRectangle;
use crate::recognition::RecognitionStage;
use crate::types::OcrResult;

/// The inner future of `read_one`: resolves once detection and recognition
/// (or the first faulting stage) have run for the admitted image.
pub struct OcrJob {
    handle: JoinHandle<Result<OcrResult>>,
}

impl Future for OcrJob {
    type Output = Result<OcrResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_err)) if join_err.is_cancelled() => {
                Poll::Ready(Err(SpeedReaderError::Cancelled))
            }
            Poll::Ready(Err(join_err)) => Poll::Ready(Err(SpeedReaderError::inference(format!(
                "pipeline job task panicked: {join_err}"
            )))),
        }
    }
}

/// Detection and recognition composed into a single per-image job, gated by
/// a capacity semaphore of `max_parallelism * max_batch_size *
/// capacity_multiplier` permits (§4.11). A permit is acquired in the outer
/// future and released in the job's terminal branch, success or failure.
pub struct OcrPipeline {
    detection: Arc<DetectionStage>,
    recognition: Arc<RecognitionStage>,
    capacity: Arc<Semaphore>,
    config: PipelineConfig,
    cancellation: CancellationToken,
}

impl OcrPipeline {
    pub fn new(
        detection: Arc<DetectionStage>,
        recognition: Arc<RecognitionStage>,
        config: PipelineConfig,
        cancellation: CancellationToken,
    ) -> Self {
        let capacity = Arc::new(Semaphore::new(config.capacity_permits()));
        Self {
            detection,
            recognition,
            capacity,
            config,
            cancellation,
        }
    }

    pub fn capacity_permits(&self) -> usize {
        self.config.capacity_permits()
    }

    /// The outer future resolves once a capacity permit is acquired; the
    /// returned `OcrJob` (the inner future) resolves once the job body has
    /// run to completion or fault.
    pub async fn read_one(&self, image: Image) -> Result<OcrJob> {
        let permit = tokio::select! {
            _ = self.cancellation.cancelled() => return Err(SpeedReaderError::Cancelled),
            res = self.capacity.clone().acquire_owned() => {
                res.map_err(|_| SpeedReaderError::Cancelled)?
            }
        };

        let detection = self.detection.clone();
        let recognition = self.recognition.clone();

        let handle = tokio::spawn(async move {
            let result = run_job(detection, recognition, image).await;
            drop(permit);
            result
        });

        Ok(OcrJob { handle })
    }

    /// Emits exactly one result per input image, in submission order.
    /// Internally: a producer task iterates `images`, admits each one via
    /// the same capacity semaphore as `read_one`, and writes the resulting
    /// inner future into a bounded FIFO; the returned stream awaits each
    /// inner future in turn. A per-job fault surfaces only as that item;
    /// cancellation ends the stream with one final `Cancelled` item.
    pub fn read_many<S>(&self, images: S) -> impl Stream<Item = Result<OcrResult>>
    where
        S: Stream<Item = Image> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<OcrJob>(self.config.pending_queue_depth);
        let detection = self.detection.clone();
        let recognition = self.recognition.clone();
        let capacity = self.capacity.clone();
        let cancellation = self.cancellation.clone();

        tokio::spawn(async move {
            tokio::pin!(images);
            while let Some(image) = images.next().await {
                let permit = tokio::select! {
                    _ = cancellation.cancelled() => break,
                    res = capacity.clone().acquire_owned() => match res {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let det = detection.clone();
                let rec = recognition.clone();
                let handle = tokio::spawn(async move {
                    let result = run_job(det, rec, image).await;
                    drop(permit);
                    result
                });
                debug!("pipeline admitted image into read_many FIFO");
                if tx.send(OcrJob { handle }).await.is_err() {
                    break;
                }
            }
        });

        ocr_job_stream(rx, self.cancellation.clone())
    }
}

/// Wraps a channel of pending inner futures into a stream that awaits each
/// one in turn. Cancellation is checked before every receive so a signal
/// fired while the channel is empty still resolves the stream promptly.
fn ocr_job_stream(
    rx: mpsc::Receiver<OcrJob>,
    cancellation: CancellationToken,
) -> impl Stream<Item = Result<OcrResult>> {
    futures::stream::unfold(
        (rx, cancellation, false),
        |(mut rx, cancellation, terminated)| async move {
            if terminated {
                return None;
            }
            tokio::select! {
                _ = cancellation.cancelled() => {
                    Some((Err(SpeedReaderError::Cancelled), (rx, cancellation, true)))
                }
                maybe_job = rx.recv() => match maybe_job {
                    Some(job) => {
                        let result = job.await;
                        Some((result, (rx, cancellation, false)))
                    }
                    None => None,
                },
            }
        },
    )
}

/// Detection, then recognition of every detected region, then assembly.
/// Recognition is skipped entirely for an image with no detections.
async fn run_job(
    detection: Arc<DetectionStage>,
    recognition: Arc<RecognitionStage>,
    image: Image,
) -> Result<OcrResult> {
    let detections = detection.detect(&image).await?;
    if detections.is_empty() {
        return Ok(OcrResult::empty(image));
    }

    let regions: Vec<RotatedRectangle> = detections.iter().map(|b| b.rotated_rectangle).collect();
    let recognition_results = recognition.recognize_all(&image, &regions).await;

    let mut recognitions = Vec::with_capacity(recognition_results.len());
    for result in recognition_results {
        match result {
            Ok(r) => recognitions.push(r),
            Err(fault) => {
                warn!(?fault, "recognition faulted for one region; failing the whole job");
                return Err(fault);
            }
        }
    }

    Ok(OcrResult {
        image,
        detections,
        recognitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectionConfig, RecognitionConfig};
    use crate::testutil::ConstantKernel;
    use crate::engine::InferenceEngine;
    use futures::stream;

    fn blank_image(w: u32, h: u32) -> Image {
        Image::new(w, h, vec![255u8; w as usize * h as usize * 3]).unwrap()
    }

    fn empty_pipeline(cancellation: CancellationToken) -> OcrPipeline {
        let det_config = DetectionConfig::default();
        let plane = det_config.input_height as usize * det_config.input_width as usize;
        let det_kernel = ConstantKernel {
            output_data: vec![0.0f32; plane],
            output_shape: vec![det_config.input_height as usize, det_config.input_width as usize],
        };
        let det_engine = Arc::new(InferenceEngine::without_metrics(
            Arc::new(det_kernel),
            2,
            None,
            4.0,
            cancellation.clone(),
        ));
        let detection = Arc::new(DetectionStage::new(det_engine, det_config));

        let rec_config = RecognitionConfig::default();
        let rec_kernel = ConstantKernel {
            output_data: vec![10.0, 0.0],
            output_shape: vec![1, 2],
        };
        let rec_engine = Arc::new(InferenceEngine::without_metrics(
            Arc::new(rec_kernel),
            2,
            None,
            4.0,
            cancellation.clone(),
        ));
        let recognition = Arc::new(RecognitionStage::new(
            rec_engine,
            rec_config,
            Arc::new(vec!["a".to_string()]),
        ));

        OcrPipeline::new(detection, recognition, PipelineConfig::default(), cancellation)
    }

    #[tokio::test]
    async fn read_one_on_empty_image_yields_zero_detections() {
        let pipeline = empty_pipeline(CancellationToken::new());
        let inner = pipeline.read_one(blank_image(640, 640)).await.unwrap();
        let result = inner.await.unwrap();
        assert!(result.detections.is_empty());
        assert!(result.recognitions.is_empty());
    }

    #[tokio::test]
    async fn read_many_emits_exactly_n_results_in_submission_order() {
        let pipeline = empty_pipeline(CancellationToken::new());
        let images = vec![blank_image(640, 640), blank_image(640, 640), blank_image(640, 640)];
        let stream = pipeline.read_many(stream::iter(images.clone()));
        let results: Vec<_> = stream.collect().await;
        assert_eq!(results.len(), images.len());
        for result in results {
            assert!(result.unwrap().detections.is_empty());
        }
    }

    #[tokio::test]
    async fn cancellation_resolves_read_many_promptly() {
        let cancellation = CancellationToken::new();
        let pipeline = empty_pipeline(cancellation.clone());
        cancellation.cancel();
        let stream = pipeline.read_many(stream::pending());
        tokio::pin!(stream);
        let first = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .expect("stream should resolve promptly after cancellation");
        assert!(matches!(first, Some(Err(SpeedReaderError::Cancelled))));
    }
}
