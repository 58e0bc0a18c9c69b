use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cardcrop::batch;
use cardcrop::{build_standard_pipeline, load_image, output, DetectionConfig, Quad};

#[derive(Parser)]
#[command(name = "cardcrop")]
#[command(about = "Find card and table shaped regions in photos and crop them flat")]
struct Cli {
    /// Input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// TOML file with detection parameters
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write crops to DIR/<image stem>/crop_N.jpg (shared stems get a numeric suffix)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Save per-step debug images and a quad overlay to DIR/<image stem>/ (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    min_area_fraction: Option<f64>,

    #[arg(long)]
    approx_epsilon_fraction: Option<f64>,

    #[arg(long)]
    min_aspect_ratio: Option<f64>,

    #[arg(long)]
    max_aspect_ratio: Option<f64>,

    #[arg(long)]
    edge_low_threshold: Option<f32>,

    #[arg(long)]
    edge_high_threshold: Option<f32>,

    #[arg(long)]
    morph_kernel_size: Option<u32>,
}

impl Cli {
    fn detection_config(&self) -> anyhow::Result<DetectionConfig> {
        let mut config = match &self.config {
            Some(path) => DetectionConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => DetectionConfig::default(),
        };

        if let Some(v) = self.min_area_fraction {
            config.min_area_fraction = v;
        }
        if let Some(v) = self.approx_epsilon_fraction {
            config.approx_epsilon_fraction = v;
        }
        if let Some(v) = self.min_aspect_ratio {
            config.min_aspect_ratio = v;
        }
        if let Some(v) = self.max_aspect_ratio {
            config.max_aspect_ratio = v;
        }
        if let Some(v) = self.edge_low_threshold {
            config.edge_low_threshold = v;
        }
        if let Some(v) = self.edge_high_threshold {
            config.edge_high_threshold = v;
        }
        if let Some(v) = self.morph_kernel_size {
            config.morph_kernel_size = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "cardcrop=debug" } else { "cardcrop=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Step-by-step run of one image with every intermediate written to `image_dir`.
fn write_debug_output(path: &Path, config: &DetectionConfig, image_dir: &Path) -> anyhow::Result<()> {
    let img = load_image(path)?;

    let pipeline = build_standard_pipeline(config).with_debug(image_dir.join("steps"))?;
    debug!(steps = ?pipeline.step_names(), "running debug pipeline");
    let items = pipeline.run(img.clone())?;

    let quads: Vec<Quad> = items.iter().filter_map(|item| item.quad).collect();
    output::save_overlay(&img, &quads, &image_dir.join("quads.jpg"))?;

    info!(path = %path.display(), crops = items.len(), dir = %image_dir.display(), "debug output written");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = args.detection_config()?;

    let outcomes = batch::process_batch(&args.images, &config, args.output_dir.as_deref())?;

    println!("\n=== Card Detection Results ===");
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                println!("{}: {} crop(s)", outcome.path.display(), report.crops.len());
                for crop in &report.crops {
                    let tl = crop.quad.top_left();
                    println!("  #{} at ({:.0}, {:.0}) -> {}x{}",
                            crop.contour_index, tl.x, tl.y, crop.width(), crop.height());
                }
                for saved in &report.saved {
                    println!("  Saved: {}", saved.display());
                }
            }
            Err(e) => println!("{}: error: {}", outcome.path.display(), e),
        }
    }

    if let Some(debug_dir) = &args.debug_out {
        for outcome in outcomes.iter().filter(|o| o.result.is_ok()) {
            let image_dir = debug_dir.join(&outcome.name);
            if let Err(e) = write_debug_output(&outcome.path, &config, &image_dir) {
                warn!(path = %outcome.path.display(), error = %e, "debug output failed");
            }
        }
    }

    if batch::all_failed_to_load(&outcomes) {
        anyhow::bail!("none of the {} input image(s) could be loaded", outcomes.len());
    }

    Ok(())
}
