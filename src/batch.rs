//! Processing many images independently.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::DetectionConfig;
use crate::detection::{load_image, QuadDetector};
use crate::error::{CropError, Result};
use crate::models::Crop;
use crate::output;

/// Crops found in one image, plus where they were written.
#[derive(Debug)]
pub struct ImageReport {
    pub crops: Vec<Crop>,
    pub saved: Vec<PathBuf>,
}

/// Result for a single input path.
#[derive(Debug)]
pub struct ImageOutcome {
    pub path: PathBuf,
    /// Per-image directory name under the output root, unique within the batch.
    pub name: String,
    pub result: Result<ImageReport>,
}

impl ImageOutcome {
    pub fn crop_count(&self) -> usize {
        self.result.as_ref().map(|r| r.crops.len()).unwrap_or(0)
    }
}

/// Detect and crop quads in every image in parallel.
///
/// An invalid configuration fails the whole batch before any image is read.
/// Per-image failures (unreadable files, write errors) are reported in that
/// image's outcome and do not stop the others. When `output_dir` is given,
/// crops of each image go to `output_dir/<name>/crop_N.jpg`, where `name`
/// comes from [`output_names`].
pub fn process_batch(
    paths: &[PathBuf],
    config: &DetectionConfig,
    output_dir: Option<&Path>,
) -> Result<Vec<ImageOutcome>> {
    let detector = QuadDetector::new(config.clone())?;
    let names = output_names(paths);

    let outcomes: Vec<ImageOutcome> = paths
        .par_iter()
        .zip(names)
        .map(|(path, name)| {
            let image_dir = output_dir.map(|dir| dir.join(&name));
            ImageOutcome {
                path: path.clone(),
                result: process_one(&detector, path, image_dir.as_deref()),
                name,
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(images = outcomes.len(), failed, "batch finished");
    Ok(outcomes)
}

fn process_one(detector: &QuadDetector, path: &Path, image_dir: Option<&Path>) -> Result<ImageReport> {
    let img = load_image(path).inspect_err(|e| warn!(error = %e, "skipping image"))?;
    let crops = detector.detect(&img)?;

    let saved = match image_dir {
        Some(dir) => output::save_crops(&crops, dir)?,
        None => Vec::new(),
    };

    info!(path = %path.display(), crops = crops.len(), "image processed");
    Ok(ImageReport { crops, saved })
}

/// Directory-safe name for an input image.
pub fn image_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Directory name for each input, in input order.
///
/// A file stem is used as is when no other input shares it. Inputs whose
/// stems collide get `<stem>_<position>` (1-based), bumped further if that
/// name is already taken.
pub fn output_names(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|p| image_stem(p)).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    let mut taken: HashSet<String> = stems
        .iter()
        .filter(|s| counts[s.as_str()] == 1)
        .cloned()
        .collect();

    stems
        .iter()
        .enumerate()
        .map(|(i, stem)| {
            if counts[stem.as_str()] == 1 {
                return stem.clone();
            }
            let mut n = i + 1;
            loop {
                let candidate = format!("{}_{}", stem, n);
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Whether every outcome is an image-load failure.
pub fn all_failed_to_load(outcomes: &[ImageOutcome]) -> bool {
    !outcomes.is_empty()
        && outcomes
            .iter()
            .all(|o| matches!(o.result, Err(CropError::ImageLoad { .. })))
}
