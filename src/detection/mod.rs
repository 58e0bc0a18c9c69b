pub mod preprocessing;
pub mod contours;
pub mod quads;
pub mod rectify;
pub mod steps;

use std::path::Path;

use image::{DynamicImage, ImageReader};
use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::error::{CropError, Result};
use crate::models::{Contour, Crop, Quad};

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| CropError::ImageLoad {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .with_guessed_format()
        .map_err(|e| CropError::ImageLoad {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?;

    reader.decode().map_err(|source| CropError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Find every card-like quadrilateral in `img` and return a rectified crop of each.
///
/// The configuration is validated before any pixel is touched. An image with
/// no acceptable quads yields an empty vector.
pub fn find_quads_and_crop(img: &DynamicImage, config: &DetectionConfig) -> Result<Vec<Crop>> {
    QuadDetector::new(config.clone())?.detect(img)
}

/// Contour extraction, quad selection and rectification with one configuration.
#[derive(Debug, Clone)]
pub struct QuadDetector {
    config: DetectionConfig,
}

impl QuadDetector {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run the full detection pipeline on an image
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<Crop>> {
        let quads = self.get_indexed_quads(img);
        let crops = rectify::rectify_all(img, &quads, self.config.border_value);

        info!(
            width = img.width(),
            height = img.height(),
            quads = quads.len(),
            crops = crops.len(),
            "detection finished"
        );
        Ok(crops)
    }

    /// Outer contours, largest first (for debugging)
    pub fn get_contours(&self, img: &DynamicImage) -> Vec<Contour> {
        contours::extract_contours(img, &self.config)
    }

    /// Accepted quads paired with their contour index
    pub fn get_indexed_quads(&self, img: &DynamicImage) -> Vec<(usize, Quad)> {
        let all_contours = self.get_contours(img);
        let image_area = img.width() as f64 * img.height() as f64;
        debug!(contours = all_contours.len(), image_area, "selecting quads");
        quads::select_indexed_quads(&all_contours, image_area, &self.config)
    }

    /// Accepted quads (for debugging and overlays)
    pub fn get_quads(&self, img: &DynamicImage) -> Vec<Quad> {
        self.get_indexed_quads(img).into_iter().map(|(_, q)| q).collect()
    }
}

/// Build the step-by-step pipeline equivalent of [`QuadDetector::detect`].
pub fn build_standard_pipeline(config: &DetectionConfig) -> crate::pipeline::Pipeline {
    use crate::detection::steps::*;
    use crate::pipeline::Pipeline;
    use std::sync::Arc;

    Pipeline::new()
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(BilateralFilterStep {
            diameter: config.blur_diameter,
            sigma_color: config.blur_sigma_color,
            sigma_space: config.blur_sigma_space,
        }))
        .add_step(Arc::new(EdgeDetectionStep {
            low_threshold: config.edge_low_threshold,
            high_threshold: config.edge_high_threshold,
        }))
        .add_step(Arc::new(MorphologyStep {
            radius: config.morph_radius(),
        }))
        .add_step(Arc::new(ContourExtractionStep))
        .add_step(Arc::new(QuadSelectionStep {
            config: config.clone(),
        }))
        .add_step(Arc::new(RectifyStep {
            border_value: config.border_value,
        }))
}
