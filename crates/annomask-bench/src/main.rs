//! annomask-bench: CLI tool for extraction parameter experimentation
//! and diagnostics.
//!
//! Runs the mask extraction pipeline on a given mask image with
//! configurable parameters, printing detailed per-stage diagnostics.
//! Useful for:
//!
//! - Tuning the binarization threshold and morphology kernels
//! - Comparing polygon and RLE representations on real masks
//! - Measuring per-stage durations to identify bottlenecks
//! - Understanding how the simplification tolerance affects point counts
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin annomask-bench -- [OPTIONS] <MASK_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use annomask_pipeline::{SegmentationConfig, SegmentationKind, extract_segmentations_diagnosed};

/// Extraction parameter experimentation and diagnostics for annomask.
///
/// Runs the mask extraction pipeline on a given mask image with
/// configurable parameters and prints detailed per-stage timing and
/// count diagnostics.
#[derive(Parser)]
#[command(name = "annomask-bench", version)]
struct Cli {
    /// Path to the input mask image (PNG, JPEG, BMP, WebP).
    mask_path: PathBuf,

    /// Binarization threshold 0-255; negative selects Otsu's automatic
    /// threshold.
    #[arg(long, default_value_t = -1)]
    threshold: i32,

    /// Morphological opening kernel size (0 disables).
    #[arg(long, default_value_t = SegmentationConfig::DEFAULT_MORPH_OPEN)]
    morph_open: u32,

    /// Morphological closing kernel size (0 disables).
    #[arg(long, default_value_t = SegmentationConfig::DEFAULT_MORPH_CLOSE)]
    morph_close: u32,

    /// Minimum instance area in pixels to include (0 keeps everything).
    #[arg(long, default_value_t = SegmentationConfig::DEFAULT_MIN_AREA)]
    min_area: u64,

    /// Output segmentation representation.
    #[arg(long, value_enum, default_value_t = Representation::Polygon)]
    segmentation_type: Representation,

    /// Polygon simplification tolerance as a fraction of the contour
    /// perimeter (0 keeps every traced point).
    #[arg(long, default_value_t = SegmentationConfig::DEFAULT_APPROX_EPSILON)]
    approx_epsilon: f64,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full extraction config as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored. The JSON
    /// must be a valid `SegmentationConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Segmentation representation selection.
#[derive(Clone, Copy, ValueEnum)]
enum Representation {
    /// Outer-contour polygon outlines (degenerate contours fall back
    /// to RLE).
    Polygon,
    /// Run-length encoded masks (preserves holes).
    Rle,
}

/// Build a [`SegmentationConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags; a negative `--threshold`
/// becomes `None` (Otsu).
fn config_from_cli(cli: &Cli) -> Result<SegmentationConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let threshold = if cli.threshold < 0 {
        None
    } else {
        Some(
            u8::try_from(cli.threshold)
                .map_err(|_| format!("--threshold must be 0-255, got {}", cli.threshold))?,
        )
    };

    Ok(SegmentationConfig {
        threshold,
        morph_open: cli.morph_open,
        morph_close: cli.morph_close,
        min_area: cli.min_area,
        approx_epsilon: cli.approx_epsilon,
        kind: match cli.segmentation_type {
            Representation::Polygon => SegmentationKind::Polygon,
            Representation::Rle => SegmentationKind::Mask,
        },
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mask = match image::open(&cli.mask_path) {
        Ok(img) => img.to_luma8(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.mask_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Mask: {} ({}x{})",
        cli.mask_path.display(),
        mask.width(),
        mask.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (segmentations, diagnostics) = extract_segmentations_diagnosed(&mask, &config);

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Per-instance summary on the first run only.
        if run == 0 && !cli.json {
            for (index, segmentation) in segmentations.iter().enumerate() {
                let description = match segmentation {
                    annomask_pipeline::Segmentation::Polygon(mp) => {
                        let points: usize = mp.polygons().iter().map(|p| p.len()).sum();
                        format!("polygon ({} ring(s), {points} points)", mp.len())
                    }
                    annomask_pipeline::Segmentation::Mask(rle_mask) => {
                        format!("rle mask ({} px)", rle_mask.area())
                    }
                };
                match segmentation.bounding_box() {
                    Ok(bbox) => eprintln!(
                        "  instance {index}: {description}, bbox ({:.1}, {:.1}, {:.1}, {:.1})",
                        bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax,
                    ),
                    Err(_) => eprintln!("  instance {index}: {description}, no bbox"),
                }
            }
        }
    }

    ExitCode::SUCCESS
}
