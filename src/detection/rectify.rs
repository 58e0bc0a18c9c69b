use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into_with, Interpolation, Projection};
use tracing::{debug, warn};

use crate::error::{CropError, Result};
use crate::models::{Crop, Quad};

/// Corners closer than this are treated as coincident.
const MIN_CORNER_SEPARATION: f32 = 1e-3;

/// Source coordinates this far outside the outermost pixel centres still sample the edge pixel.
const EDGE_TOLERANCE: f32 = 0.5;

/// Keeps snapped coordinates strictly left of / above the last pixel centre,
/// so bilinear sampling always has a right and bottom neighbour.
const EDGE_INSET: f32 = 1e-3;

/// Output size of the rectified crop: the longer of each pair of opposite edges, rounded.
pub fn target_dimensions(quad: &Quad) -> (i64, i64) {
    let [tl, tr, br, bl] = *quad.corners();
    let width = br.distance(&bl).max(tr.distance(&tl));
    let height = tr.distance(&br).max(tl.distance(&bl));
    (width.round() as i64, height.round() as i64)
}

/// Warp the quad to a top-down, axis-aligned view.
///
/// The four corners map to `(0, 0)`, `(w - 1, 0)`, `(w - 1, h - 1)` and
/// `(0, h - 1)`. Pixels are sampled bilinearly; anything that maps outside
/// the source is filled with `border_value`.
pub fn rectify(img: &DynamicImage, quad: &Quad, border_value: u8) -> Result<DynamicImage> {
    let (width, height) = target_dimensions(quad);
    if width <= 0 || height <= 0 {
        return Err(CropError::degenerate(format!(
            "quad resolves to {}x{} pixels",
            width, height
        )));
    }

    let corners = *quad.corners();
    for i in 0..4 {
        for j in (i + 1)..4 {
            if corners[i].distance(&corners[j]) < MIN_CORNER_SEPARATION {
                return Err(CropError::degenerate(format!(
                    "corners {} and {} coincide at ({}, {})",
                    i, j, corners[i].x, corners[i].y
                )));
            }
        }
    }

    let (w, h) = (width as u32, height as u32);
    let src = corners.map(|p| (p.x, p.y));
    let dst = [
        (0.0, 0.0),
        ((w - 1) as f32, 0.0),
        ((w - 1) as f32, (h - 1) as f32),
        (0.0, (h - 1) as f32),
    ];

    let projection = Projection::from_control_points(src, dst)
        .ok_or_else(|| CropError::degenerate("no projective transform maps the quad to a rectangle"))?;

    let inverse = projection.invert();
    let (src_w, src_h) = (img.width(), img.height());
    let pre_image = |x: f32, y: f32| {
        let (sx, sy) = inverse * (x, y);
        (snap_to_frame(sx, src_w), snap_to_frame(sy, src_h))
    };

    let v = border_value;
    let warped = match img {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = GrayImage::new(w, h);
            warp_into_with(gray, &pre_image, Interpolation::Bilinear, Luma([v]), &mut out);
            DynamicImage::ImageLuma8(out)
        }
        DynamicImage::ImageRgb8(rgb) => {
            let mut out = RgbImage::new(w, h);
            warp_into_with(rgb, &pre_image, Interpolation::Bilinear, Rgb([v, v, v]), &mut out);
            DynamicImage::ImageRgb8(out)
        }
        other => {
            let rgba = other.to_rgba8();
            let mut out = RgbaImage::new(w, h);
            warp_into_with(&rgba, &pre_image, Interpolation::Bilinear, Rgba([v, v, v, 255]), &mut out);
            DynamicImage::ImageRgba8(out)
        }
    };

    debug!(width = w, height = h, "quad rectified");
    Ok(warped)
}

/// Pull a source coordinate that lies on the image but outside the span of
/// pixel centres onto the outermost row or column. Anything farther out (or
/// NaN) is returned unchanged so the sampler falls back to the border value.
fn snap_to_frame(v: f32, extent: u32) -> f32 {
    let last = extent as f32 - 1.0;
    if v >= -EDGE_TOLERANCE && v <= last + EDGE_TOLERANCE {
        v.clamp(0.0, (last - EDGE_INSET).max(0.0))
    } else {
        v
    }
}

/// Rectify every quad, skipping degenerate candidates instead of failing the image.
pub fn rectify_all(img: &DynamicImage, quads: &[(usize, Quad)], border_value: u8) -> Vec<Crop> {
    let mut crops = Vec::with_capacity(quads.len());
    for (contour_index, quad) in quads {
        match rectify(img, quad, border_value) {
            Ok(image) => crops.push(Crop {
                image,
                quad: *quad,
                contour_index: *contour_index,
            }),
            Err(e) => warn!(contour_index, error = %e, "skipping quad"),
        }
    }
    crops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    fn quad(points: [(f32, f32); 4]) -> Quad {
        Quad::new(points.map(|(x, y)| Point::new(x, y)))
    }

    #[test]
    fn dimensions_use_longer_opposite_edges() {
        let q = quad([(0.0, 0.0), (80.0, 0.0), (100.0, 50.0), (-10.0, 50.0)]);
        assert_eq!(target_dimensions(&q), (110, 54));
    }

    #[test]
    fn coincident_corners_are_degenerate() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(20, 20));
        let q = quad([(2.0, 2.0), (2.0, 2.0), (15.0, 15.0), (2.0, 15.0)]);
        let err = rectify(&img, &q, 0).unwrap_err();
        assert!(matches!(err, CropError::DegenerateQuad { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn collapsed_quad_is_degenerate() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(20, 20));
        let p = (5.0, 5.0);
        assert!(rectify(&img, &quad([p, p, p, p]), 0).is_err());
    }

    #[test]
    fn identity_quad_keeps_uniform_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([10, 200, 90])));
        let q = quad([(0.0, 0.0), (31.0, 0.0), (31.0, 23.0), (0.0, 23.0)]);
        let crop = rectify(&img, &q, 0).unwrap();
        assert_eq!((crop.width(), crop.height()), (31, 23));
        let rgb = crop.to_rgb8();
        for y in 0..23 {
            for x in 0..31 {
                let got = rgb.get_pixel(x, y).0;
                for (g, want) in got.iter().zip([10u8, 200, 90]) {
                    assert!(g.abs_diff(want) <= 1, "pixel ({}, {}) = {:?}", x, y, got);
                }
            }
        }
    }

    #[test]
    fn pixel_format_preserved() {
        let q = quad([(1.0, 1.0), (10.0, 1.0), (10.0, 8.0), (1.0, 8.0)]);
        let gray = DynamicImage::ImageLuma8(GrayImage::new(12, 10));
        assert!(matches!(rectify(&gray, &q, 0).unwrap(), DynamicImage::ImageLuma8(_)));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(12, 10));
        assert!(matches!(rectify(&rgba, &q, 0).unwrap(), DynamicImage::ImageRgba8(_)));
    }

    #[test]
    fn outside_pixels_take_border_value() {
        // Quad extends past the right edge of a 10x10 image
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([50])));
        let q = quad([(0.0, 0.0), (29.0, 0.0), (29.0, 9.0), (0.0, 9.0)]);
        let crop = rectify(&img, &q, 255).unwrap().to_luma8();
        assert!(crop.get_pixel(2, 4)[0].abs_diff(50) <= 1);
        assert_eq!(crop.get_pixel(25, 4)[0], 255);
    }

    #[test]
    fn frame_touching_quad_samples_edge_pixels() {
        // Left column dark, right column light; both must survive the warp
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(20, 12, |x, _| match x {
            0 => Luma([10]),
            19 => Luma([240]),
            _ => Luma([120]),
        }));
        let q = quad([(0.0, 0.0), (19.0, 0.0), (19.0, 11.0), (0.0, 11.0)]);
        let crop = rectify(&img, &q, 77).unwrap().to_luma8();
        assert_eq!(crop.dimensions(), (19, 11));
        assert!(crop.pixels().all(|p| p[0] != 77));
        for y in 0..11 {
            assert!(crop.get_pixel(0, y)[0].abs_diff(10) <= 1);
            assert!(crop.get_pixel(18, y)[0].abs_diff(240) <= 1);
        }
    }

    #[test]
    fn snapping_only_within_half_a_pixel() {
        assert_eq!(snap_to_frame(-0.3, 10), 0.0);
        assert!(snap_to_frame(9.4, 10) < 9.0 && snap_to_frame(9.4, 10) > 8.99);
        assert_eq!(snap_to_frame(4.25, 10), 4.25);
        assert_eq!(snap_to_frame(-0.6, 10), -0.6);
        assert_eq!(snap_to_frame(9.6, 10), 9.6);
        assert!(snap_to_frame(f32::NAN, 10).is_nan());
    }

    #[test]
    fn rectify_all_skips_degenerate() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(40, 40, Luma([80])));
        let good = quad([(2.0, 2.0), (30.0, 2.0), (30.0, 20.0), (2.0, 20.0)]);
        let bad = quad([(5.0, 5.0), (5.0, 5.0), (20.0, 20.0), (5.0, 20.0)]);
        let crops = rectify_all(&img, &[(0, good), (1, bad), (2, good)], 0);
        let indices: Vec<usize> = crops.iter().map(|c| c.contour_index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!((crops[0].width(), crops[0].height()), (28, 18));
    }
}
