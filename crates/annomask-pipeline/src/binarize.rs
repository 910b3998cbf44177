//! Grayscale-to-binary conversion with optional morphological cleanup.
//!
//! Thresholding keeps pixels strictly above the threshold as
//! foreground (255). When no threshold is given, Otsu's method picks
//! one automatically by maximizing the between-class intensity
//! variance over the 256-bin histogram.
//!
//! Morphological opening (erosion then dilation) removes speckle
//! noise; closing (dilation then erosion) fills pinholes. Both use a
//! square structuring element via [`imageproc::morphology`] with the
//! `LInf` norm, with the kernel size coerced to odd. A kernel size of
//! zero disables the operation.

use image::GrayImage;
use imageproc::distance_transform::Norm;

/// Threshold a grayscale image into a binary mask.
///
/// Pixels strictly greater than the threshold become foreground (255).
/// With `None`, the threshold is computed by [`otsu_threshold`].
#[must_use = "returns the binary mask"]
pub fn binarize(image: &GrayImage, threshold: Option<u8>) -> GrayImage {
    let t = threshold.unwrap_or_else(|| otsu_threshold(image));
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        image::Luma([if image.get_pixel(x, y).0[0] > t { 255 } else { 0 }])
    })
}

/// Compute Otsu's automatic threshold.
///
/// Builds the 256-bin histogram, then for each candidate `t` evaluates
/// the between-class variance `(mu_total * omega - mu)^2 / (omega * (1 - omega))`
/// from the cumulative weight `omega` and cumulative mean `mu`,
/// skipping candidates whose denominator is zero. The first maximum
/// wins. An image with a single intensity (or no pixels) has no valid
/// candidate and yields 0.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#[must_use]
pub fn otsu_threshold(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[usize::from(pixel.0[0])] += 1;
    }
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 0;
    }
    let total = total as f64;
    let mu_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum::<f64>()
        / total;

    let mut omega = 0.0;
    let mut mu = 0.0;
    let mut best_threshold: u8 = 0;
    let mut best_variance = f64::NEG_INFINITY;

    for (value, &count) in histogram.iter().enumerate() {
        let probability = count as f64 / total;
        omega += probability;
        mu += value as f64 * probability;

        let denominator = omega * (1.0 - omega);
        if denominator <= 0.0 {
            continue;
        }
        let variance = (mu_total.mul_add(omega, -mu)).powi(2) / denominator;
        if variance > best_variance {
            best_variance = variance;
            best_threshold = value as u8;
        }
    }
    best_threshold
}

/// Morphological opening: erosion followed by dilation.
///
/// Removes foreground regions smaller than the structuring element.
/// `kernel_size` is coerced to odd; `0` (or a coerced radius of zero)
/// returns the mask unchanged.
#[must_use = "returns the opened mask"]
pub fn morph_open(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    morph_radius(kernel_size).map_or_else(
        || mask.clone(),
        |radius| imageproc::morphology::open(mask, Norm::LInf, radius),
    )
}

/// Morphological closing: dilation followed by erosion.
///
/// Fills background holes smaller than the structuring element.
/// `kernel_size` is coerced to odd; `0` (or a coerced radius of zero)
/// returns the mask unchanged.
#[must_use = "returns the closed mask"]
pub fn morph_close(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    morph_radius(kernel_size).map_or_else(
        || mask.clone(),
        |radius| imageproc::morphology::close(mask, Norm::LInf, radius),
    )
}

/// Structuring element radius for an odd-coerced kernel size.
///
/// A kernel of size `2r + 1` maps to an `LInf` ball of radius `r`.
/// Returns `None` when the operation is a no-op (size 0 or 1).
fn morph_radius(kernel_size: u32) -> Option<u8> {
    if kernel_size == 0 {
        return None;
    }
    let odd = if kernel_size % 2 == 1 {
        kernel_size
    } else {
        kernel_size + 1
    };
    let radius = odd / 2;
    if radius == 0 {
        None
    } else {
        Some(u8::try_from(radius).unwrap_or(u8::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_from_rows(rows: &[&[u8]]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([rows[y as usize][x as usize]])
        })
    }

    fn foreground_count(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] != 0).count()
    }

    #[test]
    fn fixed_threshold_keeps_strictly_brighter_pixels() {
        let image = gray_from_rows(&[&[100, 200], &[50, 150]]);
        let mask = binarize(&image, Some(100));
        let expected = gray_from_rows(&[&[0, 255], &[0, 255]]);
        assert_eq!(mask, expected);
    }

    #[test]
    fn otsu_splits_a_bimodal_image() {
        let image = gray_from_rows(&[&[50, 50], &[200, 200]]);
        assert_eq!(otsu_threshold(&image), 50);

        let mask = binarize(&image, None);
        let expected = gray_from_rows(&[&[0, 0], &[255, 255]]);
        assert_eq!(mask, expected);
    }

    #[test]
    fn otsu_of_uniform_image_is_zero() {
        let image = GrayImage::from_pixel(4, 4, image::Luma([77]));
        assert_eq!(otsu_threshold(&image), 0);
    }

    #[test]
    fn otsu_of_empty_image_is_zero() {
        assert_eq!(otsu_threshold(&GrayImage::new(0, 0)), 0);
    }

    #[test]
    fn opening_removes_isolated_pixels() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, image::Luma([255]));
        let opened = morph_open(&mask, 3);
        assert_eq!(foreground_count(&opened), 0);
    }

    #[test]
    fn opening_preserves_blocks_larger_than_the_kernel() {
        let mask = GrayImage::from_fn(9, 9, |x, y| {
            image::Luma([if (2..7).contains(&x) && (2..7).contains(&y) {
                255
            } else {
                0
            }])
        });
        let opened = morph_open(&mask, 3);
        assert_eq!(opened, mask);
    }

    #[test]
    fn closing_fills_a_pinhole() {
        let mut mask = GrayImage::from_fn(9, 9, |x, y| {
            image::Luma([if (2..7).contains(&x) && (2..7).contains(&y) {
                255
            } else {
                0
            }])
        });
        mask.put_pixel(4, 4, image::Luma([0]));
        let closed = morph_close(&mask, 3);
        assert_eq!(closed.get_pixel(4, 4).0[0], 255);
        assert_eq!(foreground_count(&closed), 25);
    }

    #[test]
    fn even_kernel_sizes_are_coerced_to_odd() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, image::Luma([255]));
        // Kernel 2 behaves like kernel 3.
        let opened = morph_open(&mask, 2);
        assert_eq!(foreground_count(&opened), 0);
    }

    #[test]
    fn zero_kernel_disables_morphology() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, image::Luma([255]));
        assert_eq!(morph_open(&mask, 0), mask);
        assert_eq!(morph_close(&mask, 0), mask);
    }
}
