use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CropError, Result};

/// Tuning parameters for contour extraction, quad selection and rectification.
///
/// Every field has a default, so a TOML file only needs to name the values it
/// changes. The defaults suit photographed cards and table pages; document
/// pages usually want a larger `min_area_fraction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Minimum contour area as a fraction of the image area.
    pub min_area_fraction: f64,
    /// Polygon simplification tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_fraction: f64,
    /// Accepted width/height bounds for a candidate quad.
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Bilateral filter window diameter in pixels.
    pub blur_diameter: u32,
    pub blur_sigma_color: f32,
    pub blur_sigma_space: f32,
    /// Canny hysteresis thresholds.
    pub edge_low_threshold: f32,
    pub edge_high_threshold: f32,
    /// Side length of the square structuring element used for closing and dilation.
    pub morph_kernel_size: u32,
    /// Fill value for rectified pixels that map outside the source image.
    pub border_value: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_area_fraction: 0.05,
            approx_epsilon_fraction: 0.04,
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 2.0,
            blur_diameter: 11,
            blur_sigma_color: 17.0,
            blur_sigma_space: 17.0,
            edge_low_threshold: 30.0,
            edge_high_threshold: 200.0,
            morph_kernel_size: 7,
            border_value: 0,
        }
    }
}

impl DetectionConfig {
    /// Parse a (possibly partial) TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CropError::config(format!("failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CropError::config(format!("failed to serialize config: {}", e)))
    }

    /// Chebyshev radius of the structuring element (`morph_kernel_size` 7 gives 3).
    pub fn morph_radius(&self) -> u8 {
        ((self.morph_kernel_size.saturating_sub(1)) / 2).min(u8::MAX as u32) as u8
    }

    /// Reject out-of-range parameters before any image is processed.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("min_area_fraction", self.min_area_fraction),
            ("approx_epsilon_fraction", self.approx_epsilon_fraction),
            ("min_aspect_ratio", self.min_aspect_ratio),
            ("max_aspect_ratio", self.max_aspect_ratio),
            ("blur_sigma_color", self.blur_sigma_color as f64),
            ("blur_sigma_space", self.blur_sigma_space as f64),
            ("edge_low_threshold", self.edge_low_threshold as f64),
            ("edge_high_threshold", self.edge_high_threshold as f64),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(CropError::config(format!("{} must be finite, got {}", name, value)));
            }
        }

        if !(0.0..=1.0).contains(&self.min_area_fraction) {
            return Err(CropError::config(format!(
                "min_area_fraction must be within [0, 1], got {}",
                self.min_area_fraction
            )));
        }
        if self.approx_epsilon_fraction < 0.0 {
            return Err(CropError::config(format!(
                "approx_epsilon_fraction must not be negative, got {}",
                self.approx_epsilon_fraction
            )));
        }
        if self.min_aspect_ratio <= 0.0 || self.max_aspect_ratio <= 0.0 {
            return Err(CropError::config("aspect ratio bounds must be positive"));
        }
        if self.min_aspect_ratio > self.max_aspect_ratio {
            return Err(CropError::config(format!(
                "min_aspect_ratio ({}) exceeds max_aspect_ratio ({})",
                self.min_aspect_ratio, self.max_aspect_ratio
            )));
        }
        if self.blur_diameter == 0 {
            return Err(CropError::config("blur_diameter must be at least 1"));
        }
        if self.blur_sigma_color <= 0.0 || self.blur_sigma_space <= 0.0 {
            return Err(CropError::config("blur sigmas must be positive"));
        }
        if self.edge_low_threshold < 0.0 || self.edge_high_threshold < 0.0 {
            return Err(CropError::config("edge thresholds must not be negative"));
        }
        if self.edge_low_threshold > self.edge_high_threshold {
            return Err(CropError::config(format!(
                "edge_low_threshold ({}) exceeds edge_high_threshold ({})",
                self.edge_low_threshold, self.edge_high_threshold
            )));
        }
        if !(1..=511).contains(&self.morph_kernel_size) {
            return Err(CropError::config(format!(
                "morph_kernel_size must be within 1..=511, got {}",
                self.morph_kernel_size
            )));
        }

        Ok(())
    }
}
