use super::point::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// The smallest axis-aligned box covering a set of points. `width, height >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisAlignedRectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AxisAlignedRectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Bounding box of an arbitrary point set. Returns a zero-sized box at
    /// the origin for an empty set.
    pub fn from_points<'a, I: IntoIterator<Item = &'a Point>>(points: I) -> Self {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut any = false;
        for p in points {
            any = true;
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        if !any {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether `p` lies inside this rectangle, inflated by `tolerance` on
    /// every side.
    pub fn contains_with_tolerance(&self, p: &Point, tolerance: f64) -> bool {
        p.x >= self.x - tolerance
            && p.x <= self.right() + tolerance
            && p.y >= self.y - tolerance
            && p.y <= self.bottom() + tolerance
    }

    pub fn clamp_to(&mut self, max_x: f64, max_y: f64) {
        let right = self.right().min(max_x).max(0.0);
        let bottom = self.bottom().min(max_y).max(0.0);
        self.x = self.x.max(0.0).min(max_x);
        self.y = self.y.max(0.0).min(max_y);
        self.width = (right - self.x).max(0.0);
        self.height = (bottom - self.y).max(0.0);
    }
}

/// A rectangle with a counter-clockwise rotation. `(x, y)` is the origin
/// corner after orientation detection; `Corners()` derives the remaining
/// three deterministically from `width`, `height`, and `angle_radians`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle_radians: f64,
}

impl RotatedRectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64, angle_radians: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
            angle_radians,
        }
    }

    /// The four corners, starting at `(x, y)` and proceeding counter-clockwise
    /// along `width` then `height`.
    pub fn corners(&self) -> [Point; 4] {
        let (sin_a, cos_a) = self.angle_radians.sin_cos();
        let dir_w = Point::new(cos_a, sin_a);
        let dir_h = Point::new(-sin_a, cos_a);
        let origin = Point::new(self.x, self.y);
        let c1 = Point::new(
            origin.x + dir_w.x * self.width,
            origin.y + dir_w.y * self.width,
        );
        let c2 = Point::new(c1.x + dir_h.x * self.height, c1.y + dir_h.y * self.height);
        let c3 = Point::new(
            origin.x + dir_h.x * self.height,
            origin.y + dir_h.y * self.height,
        );
        [origin, c1, c2, c3]
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn axis_aligned_bounds(&self) -> AxisAlignedRectangle {
        let corners = self.corners();
        AxisAlignedRectangle::from_points(corners.iter())
    }

    /// The minimum-area enclosing rotated rectangle of a convex hull (points
    /// in counter-clockwise order, length >= 3), found via rotating
    /// calipers: for each hull edge, compute the bounding box aligned to
    /// that edge, and keep the smallest. Ties broken by lowest angle
    /// magnitude.
    pub fn min_area_from_convex_hull(hull: &[Point]) -> Self {
        if hull.len() < 3 {
            let bounds = AxisAlignedRectangle::from_points(hull.iter());
            return Self::new(bounds.x, bounds.y, bounds.width, bounds.height, 0.0);
        }

        let mut best_angle = 0.0_f64;
        let mut best_area = f64::MAX;

        let n = hull.len();
        for i in 0..n {
            let a = hull[i];
            let b = hull[(i + 1) % n];
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            if dx == 0.0 && dy == 0.0 {
                continue;
            }
            let angle = dy.atan2(dx);
            let (_, width, height) = Self::project_at_angle(hull, angle);
            let area = width * height;
            if area < best_area - 1e-9 {
                best_area = area;
                best_angle = angle;
            }
        }

        let primary = Self::normalize_half_pi(best_angle);
        let secondary = Self::normalize_half_pi(primary + PI / 2.0);

        let chosen_angle = if secondary.abs() + 1e-12 < primary.abs() {
            secondary
        } else {
            primary
        };

        let (origin, width, height) = Self::project_at_angle(hull, chosen_angle);
        Self::new(origin.x, origin.y, width, height, chosen_angle)
    }

    /// Projects `points` onto the axes at `angle`, returning the rotated-back
    /// origin corner along with the resulting width and height.
    fn project_at_angle(points: &[Point], angle: f64) -> (Point, f64, f64) {
        let (sin_a, cos_a) = angle.sin_cos();
        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for p in points {
            let u = p.x * cos_a + p.y * sin_a;
            let v = -p.x * sin_a + p.y * cos_a;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let origin_x = min_u * cos_a - min_v * sin_a;
        let origin_y = min_u * sin_a + min_v * cos_a;
        (
            Point::new(origin_x, origin_y),
            max_u - min_u,
            max_v - min_v,
        )
    }

    fn normalize_half_pi(angle: f64) -> f64 {
        let mut a = angle % PI;
        if a > PI / 2.0 {
            a -= PI;
        }
        if a <= -PI / 2.0 {
            a += PI;
        }
        a
    }
}
