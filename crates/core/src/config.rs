//! Defaults for every tunable constant the original design calls out as
//! configurable rather than law: dilation ratio, boundary-tracing threshold,
//! tuner hill-climb parameters, detection/recognition preprocessing sizes,
//! and pipeline/video capacity multipliers.

use serde::{Deserialize, Serialize};

/// Detection-stage preprocessing and postprocessing knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub input_height: u32,
    pub input_width: u32,
    /// Per-channel ImageNet means applied to raw 0-255 pixel floats.
    pub normalize_mean: [f32; 3],
    /// Per-channel ImageNet standard deviations.
    pub normalize_std: [f32; 3],
    /// Padding value used when the aspect-preserving resize leaves a gap,
    /// mid-gray on the raw 0-255 scale.
    pub pad_value: f32,
    /// Binarization threshold applied to the model's probability map.
    pub binarize_threshold: f32,
    /// Minimum traced-boundary pixel count; shorter boundaries are dropped.
    pub min_boundary_pixels: usize,
    /// Douglas-Peucker epsilon as a fraction of a polygon's own perimeter.
    pub simplify_epsilon_ratio: f64,
    /// Dilation ratio `r` in `D = area * r / perimeter`. 1.5 reverses the
    /// shrink DBNet-class models apply during training; model-specific, not
    /// a hard-coded constant.
    pub dilation_ratio: f64,
    /// Polygons with fewer than this many points after dilation/clamp are
    /// discarded.
    pub min_polygon_points: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            input_height: 640,
            input_width: 640,
            normalize_mean: [123.675, 116.28, 103.53],
            normalize_std: [58.395, 57.12, 57.375],
            pad_value: 127.5,
            binarize_threshold: 0.2,
            min_boundary_pixels: 4,
            simplify_epsilon_ratio: 0.01,
            dilation_ratio: 1.5,
            min_polygon_points: 4,
        }
    }
}

/// Recognition-stage crop/resize/normalize knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecognitionConfig {
    pub crop_height: u32,
    pub crop_width: u32,
    /// Padding value used when the aspect-preserving resize leaves a gap,
    /// mid-gray on the raw 0-255 scale.
    pub pad_value: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            crop_height: 48,
            crop_width: 160,
            pad_value: 127.5,
        }
    }
}

/// Adaptive-tuner hill-climb parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Measurement window length as a multiple of the average job duration.
    pub window_multiple: f64,
    /// Relative-throughput-change threshold that continues a hill-climb
    /// direction vs. reversing it.
    pub throughput_threshold: f64,
    /// Poll interval used while waiting for the first completed job.
    pub poll_interval_ms: u64,
    /// Floor below which parallelism is never decremented.
    pub decrement_floor: usize,
    /// Over-provisioned trigger: decrement whenever
    /// `avg_parallelism < current_max - over_provision_margin`.
    pub over_provision_margin: f64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            window_multiple: 8.0,
            throughput_threshold: 0.05,
            poll_interval_ms: 20,
            decrement_floor: 1,
            over_provision_margin: 2.0,
        }
    }
}

/// Throughput-sensor retention knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Records older than `retention_window_multiple * current_window` are
    /// pruned.
    pub retention_window_multiple: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            retention_window_multiple: 4.0,
        }
    }
}

/// OCR pipeline composition knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub max_parallelism: usize,
    pub max_batch_size: usize,
    /// Multiplier applied to `max_parallelism * max_batch_size` to size the
    /// pipeline's capacity semaphore.
    pub capacity_multiplier: usize,
    /// Depth of the bounded FIFO of pending inner futures used by
    /// `read_many`.
    pub pending_queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: num_cpus::get(),
            max_batch_size: 8,
            capacity_multiplier: 2,
            pending_queue_depth: 32,
        }
    }
}

impl PipelineConfig {
    pub fn capacity_permits(&self) -> usize {
        self.max_parallelism * self.max_batch_size * self.capacity_multiplier
    }
}

/// Video frame source knobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VideoConfig {
    pub frame_queue_capacity: usize,
    pub sample_rate: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            frame_queue_capacity: 1,
            sample_rate: 1,
        }
    }
}

/// Aggregate configuration for the whole inference core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct SpeedReaderConfig {
    pub detection: DetectionConfig,
    pub recognition: RecognitionConfig,
    pub tuner: TunerConfig,
    pub sensor: SensorConfig,
    pub pipeline: PipelineConfig,
    pub video: VideoConfig,
}
