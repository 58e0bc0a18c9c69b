use image::DynamicImage;
use imageproc::geometry;
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};

/// A point in floating-point image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// `x + y`, smallest at the top-left corner.
    pub fn sum(&self) -> f32 {
        self.x + self.y
    }

    /// `y - x`, smallest at the top-right corner.
    pub fn diff(&self) -> f32 {
        self.y - self.x
    }
}

/// Closed polygonal boundary of a region in the edge map.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed area (shoelace formula), always non-negative.
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Length of the closed boundary, including the closing segment.
    pub fn perimeter(&self) -> f64 {
        geometry::arc_length(&pixel_points(&self.points), true)
    }

    /// Simplify the closed boundary with Douglas-Peucker.
    ///
    /// The curve is split at two mutually distant points so that both survive
    /// as vertices, each half is simplified independently and the halves are
    /// joined again. For a convex quadrilateral those split points are opposite
    /// corners, which keeps the result independent of where tracing started.
    pub fn approximate_polygon(&self, epsilon: f64) -> Vec<Point> {
        let points = &self.points;
        if points.len() <= 3 {
            return points.clone();
        }

        let first = farthest_from(points, 0);
        let second = farthest_from(points, first);
        let (a, b) = (first.min(second), first.max(second));
        if a == b {
            // every point coincides
            return vec![points[a]];
        }

        let upper: Vec<Point> = points[a..=b].to_vec();
        let lower: Vec<Point> = points[b..].iter().chain(points[..=a].iter()).copied().collect();

        let mut result = douglas_peucker(&upper, epsilon);
        result.pop();
        result.extend(douglas_peucker(&lower, epsilon));
        result.pop();

        result.dedup();
        if result.len() > 1 && result.first() == result.last() {
            result.pop();
        }
        result
    }
}

/// Four corners in canonical `[top-left, top-right, bottom-right, bottom-left]` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    corners: [Point; 4],
}

impl Quad {
    /// Wrap corners that are already in canonical order.
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[3]
    }

    /// Longer of the top and bottom edges.
    pub fn width(&self) -> f32 {
        let top = self.top_left().distance(&self.top_right());
        let bottom = self.bottom_left().distance(&self.bottom_right());
        top.max(bottom)
    }

    /// Longer of the left and right edges.
    pub fn height(&self) -> f32 {
        let left = self.top_left().distance(&self.bottom_left());
        let right = self.top_right().distance(&self.bottom_right());
        left.max(right)
    }

    pub fn aspect_ratio(&self) -> f32 {
        let h = self.height();
        if h == 0.0 {
            return 0.0;
        }
        self.width() / h
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.corners)
    }
}

/// A rectified crop together with the quad it was cut from.
#[derive(Debug, Clone)]
pub struct Crop {
    pub image: DynamicImage,
    pub quad: Quad,
    /// Position of the source contour in the area-descending contour list.
    pub contour_index: usize,
}

impl Crop {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

fn pixel_points(points: &[Point]) -> Vec<PixelPoint<f32>> {
    points.iter().map(|p| PixelPoint::new(p.x, p.y)).collect()
}

fn polygon_area(points: &[Point]) -> f64 {
    geometry::contour_area(&pixel_points(points))
}

fn farthest_from(points: &[Point], origin: usize) -> usize {
    let anchor = points[origin];
    let mut best = origin;
    let mut best_dist = 0.0;
    for (i, p) in points.iter().enumerate() {
        let d = anchor.distance(p);
        if d > best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Open-curve Douglas-Peucker; both endpoints are always kept.
fn douglas_peucker(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = point_to_line_distance(&points[i], &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn point_to_line_distance(point: &Point, line_start: &Point, line_end: &Point) -> f64 {
    let (px, py) = (point.x as f64, point.y as f64);
    let (sx, sy) = (line_start.x as f64, line_start.y as f64);
    let (ex, ey) = (line_end.x as f64, line_end.y as f64);

    let a = ey - sy;
    let b = sx - ex;
    let c = ex * sy - sx * ey;

    let denominator = (a * a + b * b).sqrt();
    if denominator == 0.0 {
        return (px - sx).hypot(py - sy);
    }
    (a * px + b * py + c).abs() / denominator
}
