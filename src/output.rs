//! Writing crops and annotated overlays to disk.

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::info;

use crate::error::{CropError, Result};
use crate::models::{Crop, Quad};

const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OVERLAY_THICKNESS: i32 = 3;

/// File name used for a crop: `crop_{contour_index}.jpg`.
pub fn crop_file_name(crop: &Crop) -> String {
    format!("crop_{}.jpg", crop.contour_index)
}

/// Save every crop into `dir` (created if missing) and return the written paths.
pub fn save_crops(crops: &[Crop], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(crops.len());
    for crop in crops {
        let path = dir.join(crop_file_name(crop));
        save_jpeg(&crop.image, &path)?;
        info!(path = %path.display(), width = crop.width(), height = crop.height(), "saved crop");
        written.push(path);
    }
    Ok(written)
}

/// Copy of `img` with every quad outlined in green.
pub fn draw_quads(img: &DynamicImage, quads: &[Quad]) -> RgbImage {
    let mut canvas = img.to_rgb8();
    let half = OVERLAY_THICKNESS / 2;

    for quad in quads {
        let corners = quad.corners();
        for i in 0..4 {
            let a = corners[i];
            let b = corners[(i + 1) % 4];
            for dy in -half..=half {
                for dx in -half..=half {
                    let (ox, oy) = (dx as f32, dy as f32);
                    draw_line_segment_mut(
                        &mut canvas,
                        (a.x + ox, a.y + oy),
                        (b.x + ox, b.y + oy),
                        OVERLAY_COLOR,
                    );
                }
            }
        }
    }

    canvas
}

/// Draw the quads over `img` and write the result to `path`.
pub fn save_overlay(img: &DynamicImage, quads: &[Quad], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let overlay = draw_quads(img, quads);
    overlay.save(path).map_err(|source| CropError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn save_jpeg(img: &DynamicImage, path: &Path) -> Result<()> {
    // JPEG has no alpha channel and no 16-bit support
    let encodable = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    encodable.save(path).map_err(|source| CropError::ImageWrite {
        path: path.to_path_buf(),
        source,
    })
}
