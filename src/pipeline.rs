use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::models::{Contour, Crop, Quad};

/// Data that flows through the pipeline
/// Each PipelineData is either the whole image or one candidate region with its geometry
#[derive(Clone)]
pub struct PipelineData {
    /// The working image (full-frame intermediate, region preview or final crop)
    pub image: DynamicImage,

    /// Reference to the original image (shared efficiently via Arc)
    pub original: Arc<DynamicImage>,

    /// Contour this item was split from, if any
    pub contour: Option<Contour>,

    /// Accepted quad, set by quad selection
    pub quad: Option<Quad>,

    /// Metadata for tracking properties (e.g., "contour_index", "aspect_ratio")
    pub metadata: HashMap<String, MetadataValue>,
}

/// Metadata value types
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Float(f64),
    Int(i64),
}

impl PipelineData {
    /// Create PipelineData for a full image
    pub fn from_image(image: DynamicImage) -> Self {
        let original = Arc::new(image.clone());
        Self {
            image,
            original,
            contour: None,
            quad: None,
            metadata: HashMap::new(),
        }
    }

    /// Create PipelineData for one contour of an image
    pub fn from_contour(image: DynamicImage, original: Arc<DynamicImage>, contour: Contour) -> Self {
        Self {
            image,
            original,
            contour: Some(contour),
            quad: None,
            metadata: HashMap::new(),
        }
    }

    /// Same region and metadata, different working image
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            original: self.original.clone(),
            contour: self.contour.clone(),
            quad: self.quad,
            metadata: self.metadata.clone(),
        }
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get metadata as float
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get metadata as integer
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key) {
            Some(MetadataValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Convert a finished item into a crop (requires a quad)
    pub fn into_crop(self) -> Option<Crop> {
        let quad = self.quad?;
        let contour_index = self.get_int("contour_index").unwrap_or(0) as usize;
        Some(Crop {
            image: self.image,
            quad,
            contour_index,
        })
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to all pipeline steps
#[derive(Clone, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

/// Trait that all pipeline steps must implement
pub trait PipelineStep: Send + Sync {
    /// Process data and return transformed data
    /// Steps can split data (1 → many), filter (many → fewer), or transform (many → many)
    fn process(&self, data: Vec<PipelineData>, context: &PipelineContext) -> Result<Vec<PipelineData>>;

    /// Human-readable name for this step (used in logs and debug directory names)
    fn name(&self) -> &str;
}

/// Composable pipeline builder
pub struct Pipeline {
    steps: Vec<Arc<dyn PipelineStep>>,
    context: PipelineContext,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            context: PipelineContext::default(),
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Add a processing step to the pipeline
    pub fn add_step(mut self, step: Arc<dyn PipelineStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step sequentially on an input image
    pub fn run(&self, input: DynamicImage) -> Result<Vec<PipelineData>> {
        self.run_partial(input, self.steps.len())
    }

    /// Run the pipeline but stop after `num_steps` steps (useful for debugging)
    pub fn run_partial(&self, input: DynamicImage, num_steps: usize) -> Result<Vec<PipelineData>> {
        if let Some(debug_config) = &self.context.debug {
            save_images(&debug_config.output_dir.join("00_input"), std::slice::from_ref(&input))?;
            debug!("saved 00_input/01.png");
        }

        let mut data = vec![PipelineData::from_image(input)];

        for (step_idx, step) in self.steps.iter().take(num_steps).enumerate() {
            let step_name = step.name();
            debug!(step = step_name, items = data.len(), "running step");

            data = step
                .process(data, &self.context)
                .with_context(|| format!("step '{}' failed", step_name))?;

            if let Some(debug_config) = &self.context.debug {
                let step_dir_name = format!("{:02}_{}", step_idx + 1,
                    step_name.to_lowercase().replace(' ', "_"));
                let images: Vec<DynamicImage> = data.iter().map(|d| d.image.clone()).collect();
                save_images(&debug_config.output_dir.join(&step_dir_name), &images)?;
                debug!(dir = %step_dir_name, count = images.len(), "saved debug images");
            }

            debug!(step = step_name, items = data.len(), "step finished");
        }

        info!(items = data.len(), "pipeline finished");
        Ok(data)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Write images as `01.png`, `02.png`, ... into `dir`
fn save_images(dir: &Path, images: &[DynamicImage]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for (idx, image) in images.iter().enumerate() {
        let output_path = dir.join(format!("{:02}.png", idx + 1));
        image.save(&output_path)
            .with_context(|| format!("Failed to save debug image {}", output_path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    struct InvertStep;

    impl PipelineStep for InvertStep {
        fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
            Ok(data
                .into_iter()
                .map(|item| {
                    let mut gray = item.image.to_luma8();
                    image::imageops::invert(&mut gray);
                    item.with_image(DynamicImage::ImageLuma8(gray))
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Invert"
        }
    }

    struct SplitStep(usize);

    impl PipelineStep for SplitStep {
        fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
            Ok(data
                .into_iter()
                .flat_map(|item| {
                    (0..self.0).map(move |i| item.clone().with_metadata("part", MetadataValue::Int(i as i64)))
                })
                .collect())
        }

        fn name(&self) -> &str {
            "Split Parts"
        }
    }

    fn input() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([10])))
    }

    #[test]
    fn steps_run_in_order() {
        let pipeline = Pipeline::new()
            .add_step(Arc::new(InvertStep))
            .add_step(Arc::new(SplitStep(3)));
        assert_eq!(pipeline.step_names(), vec!["Invert", "Split Parts"]);

        let out = pipeline.run(input()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].get_int("part"), Some(2));
        assert_eq!(out[0].image.to_luma8().get_pixel(0, 0)[0], 245);
        // original is untouched
        assert_eq!(out[0].original.to_luma8().get_pixel(0, 0)[0], 10);
    }

    #[test]
    fn partial_run_stops_early() {
        let pipeline = Pipeline::new()
            .add_step(Arc::new(InvertStep))
            .add_step(Arc::new(SplitStep(5)));
        assert_eq!(pipeline.run_partial(input(), 1).unwrap().len(), 1);
    }

    #[test]
    fn debug_mode_writes_step_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let out_dir = dir.path().join("debug");
        let pipeline = Pipeline::new()
            .with_debug(out_dir.clone())
            .unwrap()
            .add_step(Arc::new(InvertStep))
            .add_step(Arc::new(SplitStep(2)));
        pipeline.run(input()).unwrap();

        assert!(out_dir.join("00_input/01.png").exists());
        assert!(out_dir.join("01_invert/01.png").exists());
        assert!(out_dir.join("02_split_parts/02.png").exists());
    }

    #[test]
    fn debug_dir_must_be_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("leftover.txt"), "x").unwrap();
        assert!(Pipeline::new().with_debug(dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn metadata_accessors_check_type() {
        let item = PipelineData::from_image(input())
            .with_metadata("area", MetadataValue::Float(2.5))
            .with_metadata("contour_index", MetadataValue::Int(4));
        assert_eq!(item.get_float("area"), Some(2.5));
        assert_eq!(item.get_int("area"), None);
        assert_eq!(item.get_int("contour_index"), Some(4));
        assert_eq!(item.get_float("contour_index"), None);
        assert!(item.into_crop().is_none());
    }
}
