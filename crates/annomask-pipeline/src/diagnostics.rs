//! Pipeline diagnostics: timing and counts for each extraction stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation (threshold, morphology kernels,
//! simplification tolerance). Every call to
//! [`extract_segmentations_diagnosed`](crate::extract_segmentations_diagnosed)
//! collects them alongside the pipeline results.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single extraction run.
///
/// The morphology stage is `None` when both kernel sizes are zero and
/// the stage was skipped entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: thresholding into a binary mask.
    pub binarize: StageDiagnostics,
    /// Stage 2: morphological open/close (only when a kernel is set).
    pub morphology: Option<StageDiagnostics>,
    /// Stage 3: connected-component labeling.
    pub components: StageDiagnostics,
    /// Stage 4: per-instance representation (trace/simplify or encode).
    pub represent: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Thresholding metrics.
    Binarize {
        /// Input width in pixels.
        width: u32,
        /// Input height in pixels.
        height: u32,
        /// Threshold applied (supplied or computed by Otsu's method).
        threshold: u8,
        /// Foreground pixel count after thresholding.
        foreground_pixels: u64,
    },
    /// Morphology metrics.
    Morphology {
        /// Opening kernel size (0 = skipped).
        kernel_open: u32,
        /// Closing kernel size (0 = skipped).
        kernel_close: u32,
        /// Foreground pixel count after both operations.
        foreground_pixels: u64,
    },
    /// Connected-component metrics.
    Components {
        /// Number of extracted instances after the minimum-area filter.
        instance_count: usize,
        /// Components dropped by the minimum-area filter.
        skipped_count: usize,
    },
    /// Representation metrics.
    Represent {
        /// Instances represented as polygons.
        polygon_count: usize,
        /// Instances represented as RLE masks (including degenerate
        /// contour fallbacks).
        mask_count: usize,
        /// Total polygon points across all instances.
        total_points: usize,
    },
}

/// Summary counts for a full extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Total pixel count of the input (`width * height`).
    pub pixel_count: u64,
    /// Number of extracted instances.
    pub instance_count: usize,
    /// Instances represented as polygons.
    pub polygon_count: usize,
    /// Instances represented as RLE masks.
    pub mask_count: usize,
}

impl PipelineDiagnostics {
    /// Render a human-readable per-stage report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Extraction Diagnostics Report\n{}", "=".repeat(60)));
        if let StageMetrics::Binarize { width, height, .. } = self.binarize.metrics {
            lines.push(format!(
                "Image: {width}x{height} ({} pixels)",
                self.summary.pixel_count,
            ));
        }
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        // Per-stage breakdown.
        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);

        let stages: Vec<(&str, &StageDiagnostics)> = {
            let mut s = vec![("Binarize", &self.binarize)];
            if let Some(ref morphology) = self.morphology {
                s.push(("Morphology", morphology));
            }
            s.push(("Components", &self.components));
            s.push(("Represent", &self.represent));
            s
        };

        for (name, stage) in &stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Instances: {}  |  Polygons: {}  |  RLE masks: {}",
            self.summary.instance_count, self.summary.polygon_count, self.summary.mask_count,
        ));

        lines.join("\n")
    }
}

/// Duration in fractional milliseconds for display.
fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// One-line details string for a stage's metrics.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Binarize {
            width,
            height,
            threshold,
            foreground_pixels,
        } => format!("{width}x{height}, threshold {threshold}, {foreground_pixels} fg px"),
        StageMetrics::Morphology {
            kernel_open,
            kernel_close,
            foreground_pixels,
        } => format!("open {kernel_open}, close {kernel_close}, {foreground_pixels} fg px"),
        StageMetrics::Components {
            instance_count,
            skipped_count,
        } => format!("{instance_count} instance(s), {skipped_count} below min area"),
        StageMetrics::Represent {
            polygon_count,
            mask_count,
            total_points,
        } => format!("{polygon_count} polygon(s), {mask_count} mask(s), {total_points} points"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> PipelineDiagnostics {
        PipelineDiagnostics {
            binarize: StageDiagnostics {
                duration: Duration::from_millis(2),
                metrics: StageMetrics::Binarize {
                    width: 10,
                    height: 8,
                    threshold: 128,
                    foreground_pixels: 18,
                },
            },
            morphology: None,
            components: StageDiagnostics {
                duration: Duration::from_micros(500),
                metrics: StageMetrics::Components {
                    instance_count: 2,
                    skipped_count: 0,
                },
            },
            represent: StageDiagnostics {
                duration: Duration::from_micros(750),
                metrics: StageMetrics::Represent {
                    polygon_count: 2,
                    mask_count: 0,
                    total_points: 24,
                },
            },
            total_duration: Duration::from_millis(4),
            summary: PipelineSummary {
                pixel_count: 80,
                instance_count: 2,
                polygon_count: 2,
                mask_count: 0,
            },
        }
    }

    #[test]
    fn durations_serialize_as_fractional_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        let total = json.get("total_duration").unwrap().as_f64().unwrap();
        assert!((total - 0.004).abs() < 1e-12);
    }

    #[test]
    fn diagnostics_serde_round_trip() {
        let diagnostics = sample();
        let json = serde_json::to_string(&diagnostics).unwrap();
        let deserialized: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.total_duration, diagnostics.total_duration);
        assert_eq!(deserialized.summary.instance_count, 2);
        assert!(deserialized.morphology.is_none());
        assert!(matches!(
            deserialized.binarize.metrics,
            StageMetrics::Binarize {
                threshold: 128,
                foreground_pixels: 18,
                ..
            },
        ));
    }

    #[test]
    fn report_names_every_stage() {
        let report = sample().report();
        assert!(report.contains("Binarize"));
        assert!(report.contains("Components"));
        assert!(report.contains("Represent"));
        assert!(report.contains("Instances: 2"));
        assert!(!report.contains("Morphology"), "skipped stage must not appear");
    }

    #[test]
    fn negative_duration_seconds_fail_to_deserialize() {
        let result: Result<StageDiagnostics, _> = serde_json::from_str(
            r#"{"duration": -1.0, "metrics": {"Components": {"instance_count": 0, "skipped_count": 0}}}"#,
        );
        assert!(result.is_err());
    }
}
