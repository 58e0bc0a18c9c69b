use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point as PixelPoint;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::detection::preprocessing;
use crate::models::{Contour, Point};

/// Run the edge pipeline and return the outer contours, largest first.
pub fn extract_contours(img: &DynamicImage, config: &DetectionConfig) -> Vec<Contour> {
    let edges = edge_map(img, config);
    find_outer_contours(&edges)
}

/// Grayscale, bilateral smoothing, Canny and morphological closing.
pub fn edge_map(img: &DynamicImage, config: &DetectionConfig) -> GrayImage {
    let gray = preprocessing::to_grayscale(img);
    let smoothed = preprocessing::bilateral_filter(
        &gray,
        config.blur_diameter,
        config.blur_sigma_color,
        config.blur_sigma_space,
    );
    let edges = preprocessing::detect_edges(
        &smoothed,
        config.edge_low_threshold,
        config.edge_high_threshold,
    );
    preprocessing::close_edges(&edges, config.morph_radius())
}

/// Outermost borders of the white regions in a binary map, sorted by area descending.
///
/// Holes and borders nested inside another region are dropped. Each border is
/// compressed to the points where the tracing direction changes.
pub fn find_outer_contours(edges: &GrayImage) -> Vec<Contour> {
    let traced = find_contours::<i32>(edges);
    let total = traced.len();

    let mut contours: Vec<(f64, Contour)> = traced
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour::new(compress_chain(&c.points)))
        .filter(|c| !c.is_empty())
        .map(|c| (c.area(), c))
        .collect();

    contours.sort_by(|a, b| b.0.total_cmp(&a.0));

    debug!(traced = total, outer = contours.len(), "contours extracted");

    contours.into_iter().map(|(_, c)| c).collect()
}

/// Drop points that continue in the same direction as the previous step.
fn compress_chain(points: &[PixelPoint<i32>]) -> Vec<Point> {
    let n = points.len();
    let to_point = |p: &PixelPoint<i32>| Point::new(p.x as f32, p.y as f32);
    if n < 3 {
        return points.iter().map(to_point).collect();
    }

    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            (cur.x - prev.x, cur.y - prev.y) != (next.x - cur.x, next.y - cur.y)
        })
        .map(|i| to_point(&points[i]))
        .collect()
}
