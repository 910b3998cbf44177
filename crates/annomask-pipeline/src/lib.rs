//! annomask-pipeline: pure binary-mask geometry and codec engine (sans-IO).
//!
//! Converts raster instance masks between representations:
//! grayscale -> binarization -> connected-component labeling ->
//! per-instance polygon outlines (contour tracing + simplification)
//! or run-length encoded masks with bounding boxes.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! rasters and returns structured data. File reading and format
//! (de)serialization live in the annotation adapters and the bench
//! binary.
//!
//! All operations are synchronous pure functions over owned buffers:
//! no shared mutable state crosses calls, so callers may fan out over
//! different images from a worker pool without synchronization.

pub mod binarize;
pub mod components;
pub mod contour;
pub mod diagnostics;
pub mod rle;
pub mod segmentation;
pub mod simplify;
pub mod types;

use std::time::Instant;

use diagnostics::{PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics};

pub use segmentation::{MaskSegmentation, RleRecord, Segmentation};
pub use types::{
    BoundingBox, GrayImage, MaskError, MultiPolygon, Point, Polygon, SegmentationConfig,
    SegmentationKind,
};

/// Binarize a grayscale mask image and split it into per-instance
/// binary masks.
///
/// # Pipeline steps
///
/// 1. Threshold (fixed or Otsu)
/// 2. Morphological open, then close (each optional)
/// 3. 8-connected component labeling
/// 4. Minimum-area filter (instances below [`SegmentationConfig::min_area`]
///    pixels are dropped; `0` keeps all)
///
/// An image with no foreground after binarization yields an empty
/// vector.
#[must_use = "returns the per-instance masks"]
pub fn extract_instances(image: &GrayImage, config: &SegmentationConfig) -> Vec<GrayImage> {
    let binary = binarize::binarize(image, config.threshold);
    let binary = binarize::morph_open(&binary, config.morph_open);
    let binary = binarize::morph_close(&binary, config.morph_close);
    let instances = components::extract_instances(&binary);
    if config.min_area == 0 {
        return instances;
    }
    instances
        .into_iter()
        .filter(|instance| foreground_count(instance) >= config.min_area)
        .collect()
}

/// Run the full extraction pipeline on a grayscale mask image.
///
/// # Pipeline steps
///
/// 1. Threshold (fixed or Otsu)
/// 2. Morphological open, then close (each optional)
/// 3. 8-connected component labeling + minimum-area filter
/// 4. Per instance: outer-contour trace + simplification, or RLE
///    encoding, per [`SegmentationConfig::kind`]
///
/// Instances whose traced contour is degenerate (fewer than 3 points)
/// fall back to the RLE representation rather than disappearing; empty
/// and near-empty instances are expected at the margins of real
/// datasets.
#[must_use = "returns the extracted segmentations"]
pub fn extract_segmentations(image: &GrayImage, config: &SegmentationConfig) -> Vec<Segmentation> {
    extract_instances(image, config)
        .iter()
        .map(|instance| represent_instance(instance, config))
        .collect()
}

/// Run the full extraction pipeline, collecting per-stage diagnostics.
///
/// Produces the same segmentations as [`extract_segmentations`] plus a
/// [`PipelineDiagnostics`] with per-stage durations and counts.
#[must_use = "returns the segmentations and their diagnostics"]
pub fn extract_segmentations_diagnosed(
    image: &GrayImage,
    config: &SegmentationConfig,
) -> (Vec<Segmentation>, PipelineDiagnostics) {
    let run_start = Instant::now();

    // 1. Threshold.
    let stage_start = Instant::now();
    let threshold = config
        .threshold
        .unwrap_or_else(|| binarize::otsu_threshold(image));
    let binary = binarize::binarize(image, Some(threshold));
    let binarize_stage = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Binarize {
            width: image.width(),
            height: image.height(),
            threshold,
            foreground_pixels: foreground_count(&binary),
        },
    };

    // 2. Morphology, only when a kernel is configured.
    let stage_start = Instant::now();
    let (binary, morphology_stage) = if config.morph_open > 0 || config.morph_close > 0 {
        let opened = binarize::morph_open(&binary, config.morph_open);
        let closed = binarize::morph_close(&opened, config.morph_close);
        let metrics = StageMetrics::Morphology {
            kernel_open: config.morph_open,
            kernel_close: config.morph_close,
            foreground_pixels: foreground_count(&closed),
        };
        (
            closed,
            Some(StageDiagnostics {
                duration: stage_start.elapsed(),
                metrics,
            }),
        )
    } else {
        (binary, None)
    };

    // 3. Connected components + minimum-area filter.
    let stage_start = Instant::now();
    let labeled = components::extract_instances(&binary);
    let labeled_count = labeled.len();
    let instances: Vec<GrayImage> = if config.min_area == 0 {
        labeled
    } else {
        labeled
            .into_iter()
            .filter(|instance| foreground_count(instance) >= config.min_area)
            .collect()
    };
    let components_stage = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Components {
            instance_count: instances.len(),
            skipped_count: labeled_count - instances.len(),
        },
    };

    // 4. Per-instance representation.
    let stage_start = Instant::now();
    let segmentations: Vec<Segmentation> = instances
        .iter()
        .map(|instance| represent_instance(instance, config))
        .collect();
    let polygon_count = segmentations
        .iter()
        .filter(|s| matches!(s, Segmentation::Polygon(_)))
        .count();
    let mask_count = segmentations.len() - polygon_count;
    let total_points: usize = segmentations
        .iter()
        .map(|s| match s {
            Segmentation::Polygon(mp) => mp.polygons().iter().map(Polygon::len).sum::<usize>(),
            Segmentation::Mask(_) => 0,
        })
        .sum();
    let represent_stage = StageDiagnostics {
        duration: stage_start.elapsed(),
        metrics: StageMetrics::Represent {
            polygon_count,
            mask_count,
            total_points,
        },
    };

    let diagnostics = PipelineDiagnostics {
        binarize: binarize_stage,
        morphology: morphology_stage,
        components: components_stage,
        represent: represent_stage,
        total_duration: run_start.elapsed(),
        summary: PipelineSummary {
            pixel_count: u64::from(image.width()) * u64::from(image.height()),
            instance_count: segmentations.len(),
            polygon_count,
            mask_count,
        },
    };

    (segmentations, diagnostics)
}

/// Represent one instance mask per the configured kind, falling back
/// to RLE when a polygon trace degenerates.
fn represent_instance(instance: &GrayImage, config: &SegmentationConfig) -> Segmentation {
    match config.kind {
        SegmentationKind::Polygon => {
            let polygons = contour::mask_to_multipolygon(instance, config.approx_epsilon);
            if polygons.is_empty() {
                Segmentation::Mask(MaskSegmentation::from_mask(instance))
            } else {
                Segmentation::Polygon(polygons)
            }
        }
        SegmentationKind::Mask => Segmentation::Mask(MaskSegmentation::from_mask(instance)),
    }
}

/// Count the foreground pixels of a binary mask.
fn foreground_count(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Grayscale image with two bright 3x3 blocks on a dark field.
    fn two_block_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, y| {
            let in_first = x < 3 && y < 3;
            let in_second = (5..8).contains(&x) && (5..8).contains(&y);
            image::Luma([if in_first || in_second { 220 } else { 30 }])
        })
    }

    #[test]
    fn otsu_pipeline_extracts_both_blocks_as_polygons() {
        let config = SegmentationConfig::default();
        let segmentations = extract_segmentations(&two_block_image(), &config);
        assert_eq!(segmentations.len(), 2);
        for segmentation in &segmentations {
            assert!(matches!(segmentation, Segmentation::Polygon(_)));
            let bbox = segmentation.bounding_box().unwrap();
            assert!(bbox.is_ordered());
        }
    }

    #[test]
    fn mask_kind_produces_rle_segmentations() {
        let config = SegmentationConfig {
            kind: SegmentationKind::Mask,
            ..SegmentationConfig::default()
        };
        let segmentations = extract_segmentations(&two_block_image(), &config);
        assert_eq!(segmentations.len(), 2);
        for segmentation in &segmentations {
            let Segmentation::Mask(mask) = segmentation else {
                unreachable!("mask kind must produce Mask segmentations");
            };
            assert_eq!(mask.area(), 9);
            assert_eq!(mask.width(), 10);
            assert_eq!(mask.height(), 10);
        }
    }

    #[test]
    fn degenerate_instances_fall_back_to_rle() {
        // A single bright pixel cannot be outlined.
        let image = GrayImage::from_fn(6, 6, |x, y| {
            image::Luma([if x == 3 && y == 3 { 255 } else { 0 }])
        });
        let config = SegmentationConfig {
            threshold: Some(128),
            ..SegmentationConfig::default()
        };
        let segmentations = extract_segmentations(&image, &config);
        assert_eq!(segmentations.len(), 1);
        let Segmentation::Mask(mask) = &segmentations[0] else {
            unreachable!("degenerate contour must fall back to the RLE representation");
        };
        assert_eq!(mask.area(), 1);
    }

    #[test]
    fn min_area_drops_small_instances() {
        // Both blocks are 9 pixels; the speck below is 1.
        let image = GrayImage::from_fn(10, 10, |x, y| {
            let in_block = x < 3 && y < 3;
            let speck = x == 8 && y == 8;
            image::Luma([if in_block || speck { 255 } else { 0 }])
        });
        let config = SegmentationConfig {
            threshold: Some(128),
            min_area: 2,
            ..SegmentationConfig::default()
        };

        let instances = extract_instances(&image, &config);
        assert_eq!(instances.len(), 1);
        assert_eq!(foreground_count(&instances[0]), 9);

        let (_, diagnostics) = extract_segmentations_diagnosed(&image, &config);
        assert!(matches!(
            diagnostics.components.metrics,
            StageMetrics::Components {
                instance_count: 1,
                skipped_count: 1,
            },
        ));

        // A cutoff equal to the instance area keeps the instance.
        let config = SegmentationConfig {
            min_area: 9,
            ..config
        };
        assert_eq!(extract_instances(&image, &config).len(), 1);
    }

    #[test]
    fn uniform_dark_image_extracts_nothing() {
        let image = GrayImage::from_pixel(8, 8, image::Luma([10]));
        let config = SegmentationConfig {
            threshold: Some(128),
            ..SegmentationConfig::default()
        };
        assert!(extract_segmentations(&image, &config).is_empty());
    }

    #[test]
    fn diagnosed_run_matches_the_plain_run() {
        let config = SegmentationConfig::default();
        let image = two_block_image();
        let plain = extract_segmentations(&image, &config);
        let (diagnosed, diagnostics) = extract_segmentations_diagnosed(&image, &config);

        assert_eq!(plain, diagnosed);
        assert_eq!(diagnostics.summary.instance_count, 2);
        assert_eq!(diagnostics.summary.polygon_count, 2);
        assert_eq!(diagnostics.summary.mask_count, 0);
        assert_eq!(diagnostics.summary.pixel_count, 100);
        assert!(diagnostics.morphology.is_none());
    }

    #[test]
    fn diagnosed_run_reports_the_morphology_stage() {
        let config = SegmentationConfig {
            threshold: Some(128),
            morph_open: 3,
            ..SegmentationConfig::default()
        };
        // Speckle noise plus a solid block: opening keeps the block.
        let image = GrayImage::from_fn(12, 12, |x, y| {
            let in_block = (4..9).contains(&x) && (4..9).contains(&y);
            let speckle = (x == 1 && y == 1) || (x == 10 && y == 2);
            image::Luma([if in_block || speckle { 255 } else { 0 }])
        });

        let (segmentations, diagnostics) = extract_segmentations_diagnosed(&image, &config);
        assert_eq!(segmentations.len(), 1);
        let morphology = diagnostics.morphology.unwrap();
        assert!(matches!(
            morphology.metrics,
            StageMetrics::Morphology {
                kernel_open: 3,
                kernel_close: 0,
                foreground_pixels: 25,
            },
        ));
    }
}
