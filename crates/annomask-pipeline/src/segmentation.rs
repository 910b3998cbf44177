//! Segmentation data model: validated RLE masks, interchange records,
//! and the polygon-or-mask union used by format adapters.
//!
//! A [`MaskSegmentation`] owns its row-major run-length encoding and
//! bounding box exclusively; it is immutable once constructed and
//! every constructor taking runs validates the pixel-count invariant
//! up front.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::rle;
use crate::types::{BoundingBox, MaskError, MultiPolygon};

/// A binary mask stored as a row-major run-length encoding with its
/// bounding box.
///
/// Invariant: the runs sum to `width * height` (checked at
/// construction). The bounding box of an all-background mask falls
/// back to the unit box `(0, 0, 1, 1)` so that empty instances stay
/// representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSegmentation {
    width: u32,
    height: u32,
    rle_row_major: Vec<u64>,
    bounding_box: BoundingBox,
}

impl MaskSegmentation {
    /// Encode a binary mask, computing its bounding box by pixel scan.
    ///
    /// Any nonzero pixel counts as foreground.
    #[must_use]
    pub fn from_mask(mask: &GrayImage) -> Self {
        let bounding_box = bounding_box_of_mask(mask).unwrap_or_else(unit_box);
        Self::from_mask_with_bounding_box(mask, bounding_box)
    }

    /// Encode a binary mask with a caller-supplied bounding box.
    ///
    /// Annotation files usually carry a box next to the mask; this
    /// keeps it instead of recomputing one.
    #[must_use]
    pub fn from_mask_with_bounding_box(mask: &GrayImage, bounding_box: BoundingBox) -> Self {
        let (width, height) = mask.dimensions();
        Self {
            width,
            height,
            rle_row_major: rle::encode_row_major(mask),
            bounding_box,
        }
    }

    /// Build a segmentation directly from row-major runs, deriving the
    /// bounding box from the runs.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::RleSumMismatch`] if the runs do not sum to
    /// `width * height`.
    pub fn from_rle(rle_row_major: Vec<u64>, width: u32, height: u32) -> Result<Self, MaskError> {
        let bounding_box = match rle::bounding_box_from_rle(&rle_row_major, width, height) {
            Ok(bbox) => bbox,
            Err(MaskError::EmptyGeometry) => unit_box(),
            Err(err) => return Err(err),
        };
        Ok(Self {
            width,
            height,
            rle_row_major,
            bounding_box,
        })
    }

    /// Build a segmentation from row-major runs and a caller-supplied
    /// bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::RleSumMismatch`] if the runs do not sum to
    /// `width * height`.
    pub fn from_rle_with_bounding_box(
        rle_row_major: Vec<u64>,
        width: u32,
        height: u32,
        bounding_box: BoundingBox,
    ) -> Result<Self, MaskError> {
        rle::expect_exact_cover(&rle_row_major, width, height)?;
        Ok(Self {
            width,
            height,
            rle_row_major,
            bounding_box,
        })
    }

    /// Decode a COCO-style column-major record.
    ///
    /// The bounding box is taken from `bounding_box` when the caller
    /// has one (COCO annotations do), otherwise computed by pixel
    /// scan.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::RleSumMismatch`] if the record's counts do
    /// not sum to its `size`.
    pub fn from_record(
        record: &RleRecord,
        bounding_box: Option<BoundingBox>,
    ) -> Result<Self, MaskError> {
        let mask = rle::decode_column_major(&record.counts, record.width(), record.height())?;
        Ok(match bounding_box {
            Some(bbox) => Self::from_mask_with_bounding_box(&mask, bbox),
            None => Self::from_mask(&mask),
        })
    }

    /// Re-encode as a COCO-style column-major record.
    ///
    /// Column-major counts are recomputed from the decoded mask; the
    /// stored row-major runs cannot be transformed directly.
    #[must_use]
    pub fn to_record(&self) -> RleRecord {
        RleRecord {
            counts: rle::encode_column_major(&self.to_mask()),
            size: [self.height, self.width],
        }
    }

    /// Decode the stored runs back into a binary mask (255 foreground).
    #[must_use]
    pub fn to_mask(&self) -> GrayImage {
        let width = self.width;
        rle::fill_mask(&self.rle_row_major, width, self.height, |index| {
            #[allow(clippy::cast_possible_truncation)]
            let x = (index % u64::from(width)) as u32;
            #[allow(clippy::cast_possible_truncation)]
            let y = (index / u64::from(width)) as u32;
            (x, y)
        })
    }

    /// Mask width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The associated bounding box.
    #[must_use]
    pub const fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// The row-major run lengths.
    #[must_use]
    pub fn rle_row_major(&self) -> &[u64] {
        &self.rle_row_major
    }

    /// Number of foreground pixels, summed from the runs.
    #[must_use]
    pub fn area(&self) -> u64 {
        rle::rle_area(&self.rle_row_major)
    }
}

/// COCO-style interchange record for an RLE mask:
/// `{"counts": [...], "size": [height, width]}` with column-major
/// counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleRecord {
    /// Column-major run lengths, starting with background.
    pub counts: Vec<u64>,
    /// `[height, width]`, in that order.
    pub size: [u32; 2],
}

impl RleRecord {
    /// Mask height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.size[0]
    }

    /// Mask width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.size[1]
    }
}

/// An instance segmentation in one of the two supported
/// representations.
///
/// Format adapters match on this to decide how to serialize an
/// instance (e.g. COCO "crowd" annotations use the RLE form, simple
/// instances the polygon form).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segmentation {
    /// Outer-boundary polygon ring(s). Cannot represent holes.
    Polygon(MultiPolygon),
    /// Full raster as a run-length encoded mask.
    Mask(MaskSegmentation),
}

impl Segmentation {
    /// Bounding box of the instance in either representation.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::EmptyGeometry`] for a polygon segmentation
    /// with no rings.
    pub fn bounding_box(&self) -> Result<BoundingBox, MaskError> {
        match self {
            Self::Polygon(multipolygon) => multipolygon.bounding_box(),
            Self::Mask(mask) => Ok(mask.bounding_box()),
        }
    }
}

/// Bounding box of a mask by pixel scan, exclusive max. `None` when
/// there is no foreground pixel.
fn bounding_box_of_mask(mask: &GrayImage) -> Option<BoundingBox> {
    let mut extremes: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] != 0 {
            let (xmin, ymin, xmax, ymax) = extremes.unwrap_or((x, y, x, y));
            extremes = Some((xmin.min(x), ymin.min(y), xmax.max(x), ymax.max(y)));
        }
    }
    extremes.map(|(xmin, ymin, xmax, ymax)| {
        BoundingBox::new(
            f64::from(xmin),
            f64::from(ymin),
            f64::from(xmax + 1),
            f64::from(ymax + 1),
        )
    })
}

/// Fallback box for all-background masks.
fn unit_box() -> BoundingBox {
    BoundingBox::from_xywh(0.0, 0.0, 1.0, 1.0)
}
