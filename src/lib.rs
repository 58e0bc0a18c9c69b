pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod output;
pub mod pipeline;

pub use config::DetectionConfig;
pub use detection::{build_standard_pipeline, find_quads_and_crop, load_image, QuadDetector};
pub use detection::contours::extract_contours;
pub use detection::quads::{order_points, select_quads};
pub use detection::rectify::{rectify, rectify_all};
pub use error::CropError;
pub use models::{Contour, Crop, Point, Quad};
pub use pipeline::{MetadataValue, Pipeline, PipelineContext, PipelineData, PipelineStep};
