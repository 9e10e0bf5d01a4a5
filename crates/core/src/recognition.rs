//! Recognition stage: crop each detected region out of the source image
//! along its own rotated axes (never re-rotating the whole image), resize
//! and normalize the crop, then CTC-decode the recognition engine's output.

use std::sync::Arc;

use futures::future::join_all;
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use speedreader_common::{Image, Result, TensorBuffer};

use crate::config::RecognitionConfig;
use crate::ctc::greedy_decode;
use crate::engine::InferenceEngine;
use crate::geometry::RotatedRectangle;
use crate::types::RecognitionResult;

pub struct RecognitionStage {
    engine: Arc<InferenceEngine>,
    config: RecognitionConfig,
    dictionary: Arc<Vec<String>>,
}

impl RecognitionStage {
    pub fn new(
        engine: Arc<InferenceEngine>,
        config: RecognitionConfig,
        dictionary: Arc<Vec<String>>,
    ) -> Self {
        Self {
            engine,
            config,
            dictionary,
        }
    }

    /// Recognizes every region independently; the executor's pool provides
    /// whatever parallelism it has available. One output per input region,
    /// in input order, regardless of which job finishes first.
    pub async fn recognize_all(
        &self,
        image: &Image,
        regions: &[RotatedRectangle],
    ) -> Vec<Result<RecognitionResult>> {
        let futures = regions.iter().map(|region| self.recognize_one(image, region));
        join_all(futures).await
    }

    async fn recognize_one(
        &self,
        image: &Image,
        region: &RotatedRectangle,
    ) -> Result<RecognitionResult> {
        let tensor = self.preprocess(image, region)?;
        let admitted = self.engine.run(tensor).await?;
        let logits = admitted.await??;
        let (text, confidence) = greedy_decode(&logits, &self.dictionary)?;
        Ok(RecognitionResult { text, confidence })
    }

    /// Crops `region` out of `image` via bilinear sampling along the
    /// rectangle's own local axes, resizes to the configured crop size with
    /// aspect-preserving scale and symmetric mid-gray padding, converts
    /// HWC -> CHW, and normalizes to `[-1, 1]`.
    fn preprocess(&self, image: &Image, region: &RotatedRectangle) -> Result<TensorBuffer> {
        let crop = crop_rotated_region(image, region, self.config.pad_value);

        let target_w = self.config.crop_width;
        let target_h = self.config.crop_height;
        let scale = (target_w as f64 / crop.width().max(1) as f64)
            .min(target_h as f64 / crop.height().max(1) as f64);
        let new_w = ((crop.width() as f64 * scale).round() as u32).max(1);
        let new_h = ((crop.height() as f64 * scale).round() as u32).max(1);

        let resized = image::imageops::resize(&crop, new_w, new_h, image::imageops::FilterType::Triangle);

        let pad = self.config.pad_value;
        let mut hwc = vec![pad; target_w as usize * target_h as usize * 3];
        let x_offset = (target_w - new_w) / 2;
        let y_offset = (target_h - new_h) / 2;
        for y in 0..new_h {
            for x in 0..new_w {
                let pixel = resized.get_pixel(x, y).0;
                let base = ((y + y_offset) as usize * target_w as usize + (x + x_offset) as usize) * 3;
                hwc[base] = pixel[0] as f32;
                hwc[base + 1] = pixel[1] as f32;
                hwc[base + 2] = pixel[2] as f32;
            }
        }

        let plane_size = target_w as usize * target_h as usize;
        let mut chw = vec![0f32; plane_size * 3];
        for i in 0..plane_size {
            for c in 0..3 {
                chw[c * plane_size + i] = (hwc[i * 3 + c] / 127.5) - 1.0;
            }
        }

        TensorBuffer::new(chw, vec![3, target_h as usize, target_w as usize])
    }
}

/// Crops `region` out of `image` by bilinear-sampling along the rectangle's
/// local `(u, v)` axes into a new `region.width x region.height` image.
/// Never rotates the whole source image: the sampling is a single affine
/// warp confined to the region's bounding parallelogram.
fn crop_rotated_region(image: &Image, region: &RotatedRectangle, pad_value: f32) -> RgbImage {
    let out_w = region.width.round().max(1.0) as u32;
    let out_h = region.height.round().max(1.0) as u32;

    let corners = region.corners();
    let output_corners = [(0.0, 0.0), (out_w as f32, 0.0), (out_w as f32, out_h as f32), (0.0, out_h as f32)];
    let input_corners = [
        (corners[0].x as f32, corners[0].y as f32),
        (corners[1].x as f32, corners[1].y as f32),
        (corners[2].x as f32, corners[2].y as f32),
        (corners[3].x as f32, corners[3].y as f32),
    ];

    let default = Rgb([pad_value.round() as u8, pad_value.round() as u8, pad_value.round() as u8]);
    let mut out = RgbImage::from_pixel(out_w, out_h, default);

    if let Some(projection) = Projection::from_control_points(output_corners, input_corners) {
        warp_into(
            image.as_rgb_image(),
            &projection,
            Interpolation::Bilinear,
            default,
            &mut out,
        );
    }
    out
}
