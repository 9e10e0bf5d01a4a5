//! End-to-end smoke tests driving the public crate surface across the
//! detection/recognition/pipeline seam with synthetic kernels standing in
//! for real ONNX models. No model weights or video fixtures required, so
//! these run unconditionally (unlike the `#[ignore]`d asset-backed tests).

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use speedreader_common::{Image, Result};
use speedreader_core::config::{DetectionConfig, PipelineConfig, RecognitionConfig};
use speedreader_core::detection::DetectionStage;
use speedreader_core::engine::InferenceEngine;
use speedreader_core::kernel::Kernel;
use speedreader_core::pipeline::OcrPipeline;
use speedreader_core::recognition::RecognitionStage;
use tokio_util::sync::CancellationToken;

/// A kernel that always returns the same output buffer/shape regardless of
/// input, so the detection/recognition stages can be exercised without a
/// real ONNX Runtime session.
struct ConstantKernel {
    output_data: Vec<f32>,
    output_shape: Vec<usize>,
}

impl Kernel for ConstantKernel {
    fn execute(&self, _input_data: &[f32], _input_shape: &[usize]) -> Result<(Vec<f32>, Vec<usize>)> {
        Ok((self.output_data.clone(), self.output_shape.clone()))
    }
}

fn blank_image(w: u32, h: u32) -> Image {
    Image::new(w, h, vec![255u8; w as usize * h as usize * 3]).unwrap()
}

/// Wires a detection stage whose kernel always reports one foreground blob
/// and a recognition stage whose kernel always reports an all-blank CTC
/// output, so every detected region recognizes to the empty string.
fn pipeline_with_one_detection_per_image(cancellation: CancellationToken) -> OcrPipeline {
    let det_config = DetectionConfig::default();
    let w = det_config.input_width as usize;
    let h = det_config.input_height as usize;
    let mut plane = vec![0.0f32; w * h];
    for y in 100..140 {
        for x in 100..200 {
            plane[y * w + x] = 1.0;
        }
    }
    let det_kernel = ConstantKernel {
        output_data: plane,
        output_shape: vec![h, w],
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
async fn detections_and_recognitions_stay_aligned_by_position() {
    let pipeline = pipeline_with_one_detection_per_image(CancellationToken::new());
    let job = pipeline
        .read_one(blank_image(640, 640))
        .await
        .expect("admission should succeed with free capacity");
    let result = job.await.expect("job should complete without fault");

    assert_eq!(result.detections.len(), result.recognitions.len());
    assert_eq!(result.detections.len(), 1);
    for corner in result.detections[0].rotated_rectangle.corners() {
        assert!(corner.x >= -1.0 && corner.x <= 640.0 + 1.0);
        assert!(corner.y >= -1.0 && corner.y <= 640.0 + 1.0);
    }
}

#[tokio::test]
async fn read_many_over_a_batch_of_images_preserves_count_and_order() {
    let pipeline = pipeline_with_one_detection_per_image(CancellationToken::new());
    let images: Vec<Image> = (0..5).map(|_| blank_image(640, 640)).collect();
    let results: Vec<_> = pipeline.read_many(stream::iter(images.clone())).collect().await;

    assert_eq!(results.len(), images.len());
    for result in results {
        let ocr_result = result.expect("synthetic pipeline should not fault");
        assert_eq!(ocr_result.detections.len(), 1);
        assert_eq!(ocr_result.recognitions.len(), 1);
    }
}

#[tokio::test]
async fn cancelling_the_shared_token_stops_admission_of_new_jobs() {
    let cancellation = CancellationToken::new();
    let pipeline = pipeline_with_one_detection_per_image(cancellation.clone());
    cancellation.cancel();

    let outcome = pipeline.read_one(blank_image(640, 640)).await;
    assert!(outcome.is_err(), "admission after cancellation must not succeed");
}
