//! The result types that flow out of the detection, recognition, and OCR
//! pipeline stages.

use crate::geometry::{convex_hull, AxisAlignedRectangle, Polygon, RotatedRectangle};
use serde::{Deserialize, Serialize};
use speedreader_common::Image;

/// Three consistent representations of the same text region: the AA rect
/// bounds the rotated rect bounds the polygon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub polygon: PolygonDto,
    pub rotated_rectangle: RotatedRectangle,
    pub axis_aligned_rectangle: AxisAlignedRectangle,
}

/// Serializable point list; `Polygon` itself only derives `PartialEq`/`Clone`
/// so results crossing a process boundary go through this shape.
pub type PolygonDto = Vec<crate::geometry::Point>;

impl BoundingBox {
    /// Derives the rotated and axis-aligned rectangles from a polygon via
    /// the convex hull and rotating calipers.
    pub fn from_polygon(polygon: Polygon) -> Self {
        let hull = convex_hull(polygon.points());
        let rotated_rectangle = RotatedRectangle::min_area_from_convex_hull(&hull);
        let axis_aligned_rectangle = rotated_rectangle.axis_aligned_bounds();
        Self {
            polygon: polygon.into_points(),
            rotated_rectangle,
            axis_aligned_rectangle,
        }
    }
}

/// A list of bounding boxes detected in one image.
pub type DetectionResult = Vec<BoundingBox>;

/// Recognized text and its confidence, in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    pub confidence: f64,
}

/// The assembled result of running the OCR pipeline on one image.
/// `detections.len() == recognitions.len()` by position.
pub struct OcrResult {
    pub image: Image,
    pub detections: DetectionResult,
    pub recognitions: Vec<RecognitionResult>,
}

impl OcrResult {
    pub fn empty(image: Image) -> Self {
        Self {
            image,
            detections: Vec::new(),
            recognitions: Vec::new(),
        }
    }
}
