use tracing::debug;

use crate::config::DetectionConfig;
use crate::models::{Contour, Point, Quad};

/// Order four corners as `[top-left, top-right, bottom-right, bottom-left]`.
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right has
/// the smallest `y - x`, bottom-left the largest. On exact ties the first point
/// encountered wins. This assumes the quad is rotated less than roughly 45°
/// from axis-aligned; beyond that two roles can land on the same point.
pub fn order_points(points: [Point; 4]) -> [Point; 4] {
    let pick = |key: fn(&Point) -> f32, want_max: bool| -> Point {
        let mut best = points[0];
        for p in &points[1..] {
            let better = if want_max { key(p) > key(&best) } else { key(p) < key(&best) };
            if better {
                best = *p;
            }
        }
        best
    };

    [
        pick(Point::sum, false),
        pick(Point::diff, false),
        pick(Point::sum, true),
        pick(Point::diff, true),
    ]
}

/// Apply the area, vertex-count and aspect-ratio filters to one contour.
pub fn select_quad(contour: &Contour, image_area: f64, config: &DetectionConfig) -> Option<Quad> {
    let area = contour.area();
    if area < config.min_area_fraction * image_area {
        return None;
    }

    let epsilon = config.approx_epsilon_fraction * contour.perimeter();
    let approx = contour.approximate_polygon(epsilon);
    let corners: [Point; 4] = approx.as_slice().try_into().ok()?;

    let quad = Quad::new(order_points(corners));
    let aspect = quad.aspect_ratio() as f64;
    if !(config.min_aspect_ratio..=config.max_aspect_ratio).contains(&aspect) {
        debug!(area, aspect, "quad rejected by aspect ratio");
        return None;
    }

    Some(quad)
}

/// Quads that pass every filter, in input order.
pub fn select_quads(contours: &[Contour], image_area: f64, config: &DetectionConfig) -> Vec<Quad> {
    select_indexed_quads(contours, image_area, config)
        .into_iter()
        .map(|(_, quad)| quad)
        .collect()
}

/// Like [`select_quads`], keeping the index of the contour each quad came from.
pub fn select_indexed_quads(
    contours: &[Contour],
    image_area: f64,
    config: &DetectionConfig,
) -> Vec<(usize, Quad)> {
    let quads: Vec<(usize, Quad)> = contours
        .iter()
        .enumerate()
        .filter_map(|(i, c)| select_quad(c, image_area, config).map(|q| (i, q)))
        .collect();

    debug!(contours = contours.len(), quads = quads.len(), "quads selected");
    quads
}
