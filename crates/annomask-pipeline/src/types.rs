//! Shared types for the annomask mask processing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference raster
/// masks without depending on `image` directly.
///
/// Binary masks use the convention: 255 = foreground, 0 = background.
/// Functions consuming masks treat any nonzero pixel as foreground.
pub use image::GrayImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An axis-aligned bounding box in pixel coordinates (not normalized).
///
/// Stored in XYXY form. Construction does **not** enforce
/// `xmin <= xmax` / `ymin <= ymax`: malformed boxes coming from
/// upstream annotation files must stay representable so that callers
/// can detect and report them. Use [`is_ordered`](Self::is_ordered)
/// to check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x coordinate (left edge).
    pub xmin: f64,
    /// Minimum y coordinate (top edge).
    pub ymin: f64,
    /// Maximum x coordinate (right edge).
    pub xmax: f64,
    /// Maximum y coordinate (bottom edge).
    pub ymax: f64,
}

impl BoundingBox {
    /// Create a bounding box from XYXY corner coordinates.
    #[must_use]
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Create a bounding box from XYWH (top-left corner plus size),
    /// the form used by COCO annotations.
    #[must_use]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Return the box as `(x, y, width, height)`.
    #[must_use]
    pub fn to_xywh(self) -> (f64, f64, f64, f64) {
        (self.xmin, self.ymin, self.width(), self.height())
    }

    /// Create a bounding box from CXCYWH (center plus size), the form
    /// used by YOLO label files.
    #[must_use]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Return the box as `(center_x, center_y, width, height)`.
    #[must_use]
    pub fn to_cxcywh(self) -> (f64, f64, f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
            self.width(),
            self.height(),
        )
    }

    /// Width of the box. Negative when the box is malformed.
    #[must_use]
    pub fn width(self) -> f64 {
        self.xmax - self.xmin
    }

    /// Height of the box. Negative when the box is malformed.
    #[must_use]
    pub fn height(self) -> f64 {
        self.ymax - self.ymin
    }

    /// Whether `min <= max` holds on both axes.
    #[must_use]
    pub fn is_ordered(self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }
}

/// An ordered ring of points outlining one part of an instance.
///
/// Coordinates are pixel units, not normalized. The first point is not
/// repeated at the end; consumers close the ring implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a polygon from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Parse a flat coordinate array `[x0, y0, x1, y1, ...]`, the form
    /// used by COCO-style segmentation records.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::OddPolygonCoordinates`] if the array length
    /// is odd.
    pub fn from_flat_coords(coords: &[f64]) -> Result<Self, MaskError> {
        if coords.len() % 2 != 0 {
            return Err(MaskError::OddPolygonCoordinates { len: coords.len() });
        }
        Ok(Self(
            coords
                .chunks_exact(2)
                .map(|pair| Point::new(pair[0], pair[1]))
                .collect(),
        ))
    }

    /// Flatten the ring into `[x0, y0, x1, y1, ...]`.
    #[must_use]
    pub fn to_flat_coords(&self) -> Vec<f64> {
        self.0.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    /// Returns `true` if the polygon has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polygon.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Perimeter of the closed ring, including the implicit segment
    /// from the last point back to the first.
    #[must_use]
    pub fn closed_perimeter(&self) -> f64 {
        if self.0.len() < 2 {
            return 0.0;
        }
        let wrap = match (self.0.last(), self.0.first()) {
            (Some(&last), Some(&first)) => last.distance(first),
            _ => 0.0,
        };
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum::<f64>() + wrap
    }
}

/// One or more independent closed rings describing an instance outline.
///
/// Ring order is significant (insertion order). Each ring stands on its
/// own: there is no implicit hole relationship between rings. Instances
/// whose shape needs holes are represented via RLE instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPolygon(Vec<Polygon>);

impl MultiPolygon {
    /// Create a multipolygon from a vector of rings.
    #[must_use]
    pub const fn new(polygons: Vec<Polygon>) -> Self {
        Self(polygons)
    }

    /// Returns `true` if there are no rings.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of rings.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all rings.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon] {
        &self.0
    }

    /// Consumes the multipolygon and returns the underlying rings.
    #[must_use]
    pub fn into_polygons(self) -> Vec<Polygon> {
        self.0
    }

    /// Bounding box over every point of every ring.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::EmptyGeometry`] when there are no rings.
    pub fn bounding_box(&self) -> Result<BoundingBox, MaskError> {
        let mut points = self.0.iter().flat_map(|ring| ring.points().iter());
        let Some(first) = points.next() else {
            return Err(MaskError::EmptyGeometry);
        };
        let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);
        for p in points {
            bbox.xmin = bbox.xmin.min(p.x);
            bbox.ymin = bbox.ymin.min(p.y);
            bbox.xmax = bbox.xmax.max(p.x);
            bbox.ymax = bbox.ymax.max(p.y);
        }
        Ok(bbox)
    }
}

/// Which representation to produce for each extracted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentationKind {
    /// Trace the outer contour into a polygon outline. Instances whose
    /// contour degenerates (fewer than 3 points) fall back to
    /// [`Mask`](Self::Mask).
    #[default]
    Polygon,
    /// Keep the full raster as a run-length encoded mask. Preserves
    /// holes, which polygon tracing cannot.
    Mask,
}

/// Configuration for the mask extraction pipeline.
///
/// All parameters have defaults matching the plain
/// `binarize -> label -> trace` flow with no morphology and no
/// simplification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Binarization threshold (`pixel > threshold` is foreground).
    /// `None` selects Otsu's automatic threshold.
    pub threshold: Option<u8>,

    /// Kernel size for morphological opening (noise removal) applied
    /// after thresholding. Coerced to odd; `0` disables.
    pub morph_open: u32,

    /// Kernel size for morphological closing (hole filling) applied
    /// after opening. Coerced to odd; `0` disables.
    pub morph_close: u32,

    /// Minimum foreground pixel count for an instance to be kept.
    /// Smaller components are dropped after labeling. `0` keeps every
    /// instance.
    pub min_area: u64,

    /// Polygon simplification tolerance as a fraction of the contour
    /// perimeter. `0.0` keeps every traced point.
    pub approx_epsilon: f64,

    /// Which representation to produce per instance.
    pub kind: SegmentationKind,
}

impl SegmentationConfig {
    /// Default opening kernel size (disabled).
    pub const DEFAULT_MORPH_OPEN: u32 = 0;
    /// Default closing kernel size (disabled).
    pub const DEFAULT_MORPH_CLOSE: u32 = 0;
    /// Default minimum instance area (keep every instance).
    pub const DEFAULT_MIN_AREA: u64 = 0;
    /// Default simplification tolerance (keep all points).
    pub const DEFAULT_APPROX_EPSILON: f64 = 0.0;
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            morph_open: Self::DEFAULT_MORPH_OPEN,
            morph_close: Self::DEFAULT_MORPH_CLOSE,
            min_area: Self::DEFAULT_MIN_AREA,
            approx_epsilon: Self::DEFAULT_APPROX_EPSILON,
            kind: SegmentationKind::default(),
        }
    }
}

/// Errors produced by the codec and geometry operations.
///
/// Contour tracing and simplification do not appear here: a degenerate
/// or empty shape is a normal, representable result at dataset margins,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum MaskError {
    /// Run lengths do not sum to the target `width * height`. Raised
    /// eagerly by every decode and RLE-based construction instead of
    /// silently truncating or padding. Negative run lengths are
    /// unrepresentable (`u64`).
    #[error("run lengths sum to {actual} but the {expected}-pixel target requires an exact cover")]
    RleSumMismatch {
        /// Pixel count implied by the target dimensions.
        expected: u64,
        /// Actual sum of the supplied run lengths.
        actual: u64,
    },

    /// A bounding box was requested for geometry with no extent: an
    /// empty multipolygon, or an RLE with no foreground run.
    #[error("cannot compute a bounding box of empty geometry")]
    EmptyGeometry,

    /// A flat polygon coordinate array has an odd number of values.
    #[error("flat polygon coordinate array has odd length {len}")]
    OddPolygonCoordinates {
        /// Length of the offending array.
        len: usize,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    // --- BoundingBox tests ---

    #[test]
    fn bbox_xywh_conversion() {
        let bbox = BoundingBox::from_xywh(10.0, 20.0, 90.0, 60.0);
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 100.0, 80.0));
        assert_eq!(bbox.to_xywh(), (10.0, 20.0, 90.0, 60.0));
    }

    #[test]
    fn bbox_cxcywh_conversion() {
        let bbox = BoundingBox::from_cxcywh(50.0, 40.0, 20.0, 10.0);
        assert_eq!(bbox, BoundingBox::new(40.0, 35.0, 60.0, 45.0));
        assert_eq!(bbox.to_cxcywh(), (50.0, 40.0, 20.0, 10.0));
    }

    #[test]
    fn bbox_ordering_is_reported_not_enforced() {
        let flipped = BoundingBox::new(100.0, 80.0, 10.0, 20.0);
        assert!(!flipped.is_ordered());
        assert!(flipped.width() < 0.0);

        let ordered = BoundingBox::new(10.0, 20.0, 100.0, 80.0);
        assert!(ordered.is_ordered());
    }

    // --- Polygon tests ---

    #[test]
    fn polygon_flat_coords_round_trip() {
        let coords = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let polygon = Polygon::from_flat_coords(&coords).unwrap();
        assert_eq!(polygon.len(), 3);
        assert_eq!(polygon.points()[1], Point::new(3.0, 4.0));
        assert_eq!(polygon.to_flat_coords(), coords);
    }

    #[test]
    fn polygon_odd_flat_coords_is_an_error() {
        let result = Polygon::from_flat_coords(&[1.0, 2.0, 3.0]);
        assert_eq!(result, Err(MaskError::OddPolygonCoordinates { len: 3 }));
    }

    #[test]
    fn polygon_closed_perimeter_includes_wrap_segment() {
        // Unit square: 4 sides of length 1.
        let square = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ]);
        assert!((square.closed_perimeter() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn polygon_perimeter_of_tiny_rings() {
        assert!(Polygon::new(vec![]).closed_perimeter().abs() < f64::EPSILON);
        let single = Polygon::new(vec![Point::new(2.0, 3.0)]);
        assert!(single.closed_perimeter().abs() < f64::EPSILON);
    }

    // --- MultiPolygon tests ---

    #[test]
    fn multipolygon_bounding_box_spans_all_rings() {
        let mp = MultiPolygon::new(vec![
            Polygon::new(vec![Point::new(1.0, 2.0), Point::new(4.0, 3.0)]),
            Polygon::new(vec![Point::new(-1.0, 7.0), Point::new(2.0, 0.5)]),
        ]);
        let bbox = mp.bounding_box().unwrap();
        assert_eq!(bbox, BoundingBox::new(-1.0, 0.5, 4.0, 7.0));
    }

    #[test]
    fn empty_multipolygon_bounding_box_is_an_error() {
        let mp = MultiPolygon::new(vec![]);
        assert_eq!(mp.bounding_box(), Err(MaskError::EmptyGeometry));
    }

    // --- Config tests ---

    #[test]
    fn config_defaults() {
        let config = SegmentationConfig::default();
        assert_eq!(config.threshold, None);
        assert_eq!(config.morph_open, 0);
        assert_eq!(config.morph_close, 0);
        assert_eq!(config.min_area, 0);
        assert!(config.approx_epsilon.abs() < f64::EPSILON);
        assert_eq!(config.kind, SegmentationKind::Polygon);
    }

    // --- Error display tests ---

    #[test]
    fn rle_sum_mismatch_display() {
        let err = MaskError::RleSumMismatch {
            expected: 20,
            actual: 19,
        };
        assert_eq!(
            err.to_string(),
            "run lengths sum to 19 but the 20-pixel target requires an exact cover",
        );
    }

    #[test]
    fn empty_geometry_display() {
        assert_eq!(
            MaskError::EmptyGeometry.to_string(),
            "cannot compute a bounding box of empty geometry",
        );
    }

    // --- Serde round-trip tests ---

    #[test]
    fn bbox_serde_round_trip() {
        let bbox = BoundingBox::new(1.5, 2.5, 10.0, 20.0);
        let json = serde_json::to_string(&bbox).unwrap();
        let deserialized: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(bbox, deserialized);
    }

    #[test]
    fn multipolygon_serde_round_trip() {
        let mp = MultiPolygon::new(vec![Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.5, 2.5),
            Point::new(3.0, 0.0),
        ])]);
        let json = serde_json::to_string(&mp).unwrap();
        let deserialized: MultiPolygon = serde_json::from_str(&json).unwrap();
        assert_eq!(mp, deserialized);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = SegmentationConfig {
            threshold: Some(128),
            morph_open: 3,
            morph_close: 5,
            min_area: 10,
            approx_epsilon: 0.01,
            kind: SegmentationKind::Mask,
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SegmentationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
