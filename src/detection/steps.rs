use crate::config::DetectionConfig;
use crate::detection::{contours, preprocessing, quads, rectify};
use crate::error::CropError;
use crate::pipeline::{MetadataValue, PipelineContext, PipelineData, PipelineStep};
use anyhow::Result;
use image::DynamicImage;
use tracing::warn;

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let gray = preprocessing::to_grayscale(&item.image);
                item.with_image(DynamicImage::ImageLuma8(gray))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Edge-preserving bilateral smoothing
pub struct BilateralFilterStep {
    pub diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

impl PipelineStep for BilateralFilterStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let gray = item.image.to_luma8();
                let smoothed = preprocessing::bilateral_filter(&gray, self.diameter, self.sigma_color, self.sigma_space);
                item.with_image(DynamicImage::ImageLuma8(smoothed))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Bilateral Filter"
    }
}

/// Detect edges using Canny
pub struct EdgeDetectionStep {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

impl PipelineStep for EdgeDetectionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let gray = item.image.to_luma8();
                let edges = preprocessing::detect_edges(&gray, self.low_threshold, self.high_threshold);
                item.with_image(DynamicImage::ImageLuma8(edges))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Edge Detection"
    }
}

/// Morphological closing followed by one dilation
pub struct MorphologyStep {
    pub radius: u8,
}

impl PipelineStep for MorphologyStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let edges = item.image.to_luma8();
                let closed = preprocessing::close_edges(&edges, self.radius);
                item.with_image(DynamicImage::ImageLuma8(closed))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Morphological Closing"
    }
}

/// Find outer contours in the edge map - splits one image into many candidates, largest first
pub struct ContourExtractionStep;

impl PipelineStep for ContourExtractionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let edges = item.image.to_luma8();
            let found = contours::find_outer_contours(&edges);
            let (img_width, img_height) = (item.original.width(), item.original.height());

            for (index, contour) in found.into_iter().enumerate() {
                // Preview image: bounding box of the contour cut from the original
                let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
                let (mut max_x, mut max_y) = (0.0f32, 0.0f32);
                for p in &contour.points {
                    min_x = min_x.min(p.x);
                    min_y = min_y.min(p.y);
                    max_x = max_x.max(p.x);
                    max_y = max_y.max(p.y);
                }
                let x = (min_x.max(0.0) as u32).min(img_width.saturating_sub(1));
                let y = (min_y.max(0.0) as u32).min(img_height.saturating_sub(1));
                let w = ((max_x as u32).min(img_width.saturating_sub(1)) - x) + 1;
                let h = ((max_y as u32).min(img_height.saturating_sub(1)) - y) + 1;
                let preview = item.original.crop_imm(x, y, w, h);

                let area = contour.area();
                let candidate = PipelineData::from_contour(preview, item.original.clone(), contour)
                    .with_metadata("contour_index", MetadataValue::Int(index as i64))
                    .with_metadata("contour_area", MetadataValue::Float(area));
                result.push(candidate);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Contour Extraction"
    }
}

/// Keep only contours that simplify to a quad of acceptable size and aspect ratio
pub struct QuadSelectionStep {
    pub config: DetectionConfig,
}

impl PipelineStep for QuadSelectionStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let contour = item
                .contour
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Quad selection needs contour candidates"))?;
            let image_area = item.original.width() as f64 * item.original.height() as f64;

            if let Some(quad) = quads::select_quad(contour, image_area, &self.config) {
                let mut new_item = item
                    .clone()
                    .with_metadata("aspect_ratio", MetadataValue::Float(quad.aspect_ratio() as f64))
                    .with_metadata("quad_width", MetadataValue::Float(quad.width() as f64))
                    .with_metadata("quad_height", MetadataValue::Float(quad.height() as f64));
                new_item.quad = Some(quad);
                result.push(new_item);
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Quad Selection"
    }
}

/// Warp each selected quad to a flat crop; degenerate quads are dropped
pub struct RectifyStep {
    pub border_value: u8,
}

impl PipelineStep for RectifyStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::new();

        for item in data {
            let quad = item
                .quad
                .ok_or_else(|| anyhow::anyhow!("Rectify needs selected quads"))?;

            match rectify::rectify(&item.original, &quad, self.border_value) {
                Ok(crop) => result.push(item.with_image(crop)),
                Err(e @ CropError::DegenerateQuad { .. }) => {
                    warn!(error = %e, "skipping quad");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "Rectify"
    }
}
