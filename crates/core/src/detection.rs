//! Detection stage: resize/normalize an image, run the detection engine,
//! then trace/simplify/dilate/scale the resulting probability map into
//! typed `BoundingBox`es.

use std::sync::Arc;

use image::imageops::{resize, FilterType};
use speedreader_common::{Image, Result, TensorBuffer};

use crate::boundary::{binarize, trace_boundaries};
use crate::config::DetectionConfig;
use crate::engine::InferenceEngine;
use crate::types::{BoundingBox, DetectionResult};

pub struct DetectionStage {
    engine: Arc<InferenceEngine>,
    config: DetectionConfig,
}

impl DetectionStage {
    pub fn new(engine: Arc<InferenceEngine>, config: DetectionConfig) -> Self {
        Self { engine, config }
    }

    pub async fn detect(&self, image: &Image) -> Result<DetectionResult> {
        let tensor = self.preprocess(image)?;
        let admitted = self.engine.run(tensor).await?;
        let prob_map = admitted.await??;
        self.postprocess(&prob_map, image.width(), image.height())
    }

    /// Resizes `image` to the configured model input size, preserving
    /// aspect ratio and padding with the configured neutral value, then
    /// converts HWC -> CHW and applies per-channel ImageNet normalization.
    fn preprocess(&self, image: &Image) -> Result<TensorBuffer> {
        let target_w = self.config.input_width;
        let target_h = self.config.input_height;

        let scale = (target_w as f64 / image.width() as f64)
            .min(target_h as f64 / image.height() as f64);
        let new_w = ((image.width() as f64 * scale).round() as u32).max(1);
        let new_h = ((image.height() as f64 * scale).round() as u32).max(1);

        let resized = resize(image.as_rgb_image(), new_w, new_h, FilterType::Triangle);

        let pad = self.config.pad_value;
        let mut hwc = vec![pad; target_w as usize * target_h as usize * 3];
        for y in 0..new_h {
            for x in 0..new_w {
                let pixel = resized.get_pixel(x, y).0;
                let base = (y as usize * target_w as usize + x as usize) * 3;
                hwc[base] = pixel[0] as f32;
                hwc[base + 1] = pixel[1] as f32;
                hwc[base + 2] = pixel[2] as f32;
            }
        }

        let plane_size = target_w as usize * target_h as usize;
        let mut chw = vec![0f32; plane_size * 3];
        for y in 0..target_h as usize {
            for x in 0..target_w as usize {
                for c in 0..3 {
                    let raw = hwc[(y * target_w as usize + x) * 3 + c];
                    let normalized = (raw - self.config.normalize_mean[c])
                        / self.config.normalize_std[c];
                    chw[c * plane_size + y * target_w as usize + x] = normalized;
                }
            }
        }

        TensorBuffer::new(chw, vec![3, target_h as usize, target_w as usize])
    }

    /// Binarizes, traces, simplifies, dilates, scales, and clamps the
    /// model's probability map into image-space `BoundingBox`es.
    fn postprocess(
        &self,
        prob_map: &TensorBuffer,
        image_w: u32,
        image_h: u32,
    ) -> Result<DetectionResult> {
        let shape = prob_map.shape();
        let (model_h, model_w) = match shape {
            [h, w] => (*h, *w),
            other => {
                return Err(speedreader_common::SpeedReaderError::preprocessing(format!(
                    "detection probability map must be 2-D, got shape {:?}",
                    other
                )))
            }
        };

        let binary = binarize(prob_map.data(), self.config.binarize_threshold);
        let polygons = trace_boundaries(&binary, model_w, model_h, self.config.min_boundary_pixels);

        let scale_factor = (image_w as f64 / self.config.input_width as f64)
            .max(image_h as f64 / self.config.input_height as f64);

        let mut boxes = Vec::new();
        for polygon in polygons {
            let epsilon = polygon.perimeter() * self.config.simplify_epsilon_ratio;
            let simplified = polygon.simplify(epsilon);
            let mut scaled = simplified.dilate(self.config.dilation_ratio);
            scaled.scale(scale_factor);
            scaled.clamp(image_w as f64, image_h as f64);

            if scaled.len() < self.config.min_polygon_points {
                continue;
            }
            boxes.push(BoundingBox::from_polygon(scaled));
        }
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ConstantKernel;
    use tokio_util::sync::CancellationToken;

    fn blank_image(w: u32, h: u32) -> Image {
        Image::new(w, h, vec![255u8; w as usize * h as usize * 3]).unwrap()
    }

    #[tokio::test]
    async fn empty_probability_map_yields_no_detections() {
        let config = DetectionConfig::default();
        let plane = config.input_height as usize * config.input_width as usize;
        let kernel = ConstantKernel {
            output_data: vec![0.0f32; plane],
            output_shape: vec![config.input_height as usize, config.input_width as usize],
        };
        let engine = Arc::new(crate::engine::InferenceEngine::without_metrics(
            Arc::new(kernel),
            2,
            None,
            4.0,
            CancellationToken::new(),
        ));
        let stage = DetectionStage::new(engine, config);
        let detections = stage.detect(&blank_image(720, 640)).await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn single_foreground_blob_yields_one_detection_inside_bounds() {
        let config = DetectionConfig::default();
        let w = config.input_width as usize;
        let h = config.input_height as usize;
        let mut plane = vec![0.0f32; w * h];
        for y in 100..140 {
            for x in 100..200 {
                plane[y * w + x] = 1.0;
            }
        }
        let kernel = ConstantKernel {
            output_data: plane,
            output_shape: vec![h, w],
        };
        let engine = Arc::new(crate::engine::InferenceEngine::without_metrics(
            Arc::new(kernel),
            2,
            None,
            4.0,
            CancellationToken::new(),
        ));
        let image = blank_image(w as u32, h as u32);
        let stage = DetectionStage::new(engine, config);
        let detections = stage.detect(&image).await.unwrap();
        assert_eq!(detections.len(), 1);
        let bbox = &detections[0];
        for corner in bbox.rotated_rectangle.corners() {
            assert!(corner.x >= -1.0 && corner.x <= image.width() as f64 + 1.0);
            assert!(corner.y >= -1.0 && corner.y <= image.height() as f64 + 1.0);
        }
    }
}
