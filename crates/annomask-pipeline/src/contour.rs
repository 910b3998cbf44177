//! Contour tracing: extract the outer boundary of an instance mask.
//!
//! A pixel is a boundary pixel when it is foreground and at least one
//! of its 4-neighbors is background (out-of-bounds counts as
//! background). Tracing walks the Moore neighborhood clockwise from
//! the lexicographically smallest `(row, col)` boundary pixel and ends
//! on the second return to the start. The first return is not a stop
//! condition: thin shapes re-enter the start while there is still
//! boundary left to walk on the other side.
//!
//! Only the outer boundary is produced. Masks with interior holes are
//! not represented faithfully by a traced ring; such instances belong
//! in the RLE representation instead.

use image::GrayImage;

use crate::simplify;
use crate::types::{MultiPolygon, Point, Polygon};

/// The 8 compass directions `(dy, dx)` in clockwise order starting
/// east. After stepping in direction `d`, the incoming direction is
/// `(d + 4) % 8` and the next scan starts at `(incoming + 1) % 8`.
const DIRECTIONS: [(i64, i64); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

/// Incoming-direction seed for the first step.
const START_DIRECTION: usize = 6;

/// Trace the outer boundary of a mask into an ordered point sequence.
///
/// Points are pixel centers in visit order. An all-background mask
/// produces an empty sequence; a sequence of fewer than 3 points marks
/// a region too small to outline (callers treat it as "no usable
/// polygon", not an error). The walk is bounded by a constant factor
/// of the boundary pixel count, so pathological inputs cannot loop
/// forever.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#[must_use = "returns the traced boundary points"]
pub fn trace_outer_contour(mask: &GrayImage) -> Vec<Point> {
    let (width, height) = mask.dimensions();
    let boundary = boundary_pixels(mask);
    let boundary_count = boundary.iter().filter(|&&b| b).count();
    let Some(start_index) = boundary.iter().position(|&b| b) else {
        return Vec::new();
    };
    let start_x = i64::from(start_index as u32 % width);
    let start_y = i64::from(start_index as u32 / width);

    let is_boundary = |x: i64, y: i64| {
        x >= 0
            && y >= 0
            && x < i64::from(width)
            && y < i64::from(height)
            && boundary[y as usize * width as usize + x as usize]
    };

    let mut contour = Vec::new();
    let (mut x, mut y) = (start_x, start_y);
    let mut prev_direction = START_DIRECTION;
    let mut visited_start = false;
    let max_steps = 10 * boundary_count + 10;

    for _ in 0..max_steps {
        contour.push(Point::new(x as f64, y as f64));

        let mut moved = false;
        for k in 0..DIRECTIONS.len() {
            let direction = (prev_direction + 1 + k) % 8;
            let (dy, dx) = DIRECTIONS[direction];
            if is_boundary(x + dx, y + dy) {
                x += dx;
                y += dy;
                prev_direction = (direction + 4) % 8;
                moved = true;
                break;
            }
        }

        if !moved {
            break;
        }
        if x == start_x && y == start_y {
            if visited_start {
                break;
            }
            visited_start = true;
        }
    }

    contour
}

/// Trace a mask's outer boundary into a single-ring multipolygon,
/// optionally simplified.
///
/// `approx_epsilon` is a fraction of the ring perimeter; a positive
/// value simplifies the traced ring with a Ramer-Douglas-Peucker
/// tolerance of `approx_epsilon * max(perimeter, 1.0)`. A degenerate
/// trace (fewer than 3 points) produces an empty multipolygon so that
/// callers can fall back to the RLE representation.
#[must_use = "returns the traced multipolygon"]
pub fn mask_to_multipolygon(mask: &GrayImage, approx_epsilon: f64) -> MultiPolygon {
    let contour = trace_outer_contour(mask);
    if contour.len() < 3 {
        return MultiPolygon::new(Vec::new());
    }

    let mut ring = Polygon::new(contour);
    if approx_epsilon > 0.0 {
        let epsilon = approx_epsilon * ring.closed_perimeter().max(1.0);
        ring = simplify::simplify(&ring, epsilon);
    }
    MultiPolygon::new(vec![ring])
}

/// Flag the boundary pixels of a mask.
///
/// Returned row-major: `true` where the pixel is foreground and at
/// least one 4-neighbor is background or outside the image.
fn boundary_pixels(mask: &GrayImage) -> Vec<bool> {
    let (width, height) = mask.dimensions();
    let foreground = |x: u32, y: u32| x < width && y < height && mask.get_pixel(x, y).0[0] != 0;

    let mut boundary = vec![false; width as usize * height as usize];
    for y in 0..height {
        for x in 0..width {
            if !foreground(x, y) {
                continue;
            }
            let exposed = y == 0
                || x == 0
                || !foreground(x, y - 1)
                || !foreground(x, y + 1)
                || !foreground(x - 1, y)
                || !foreground(x + 1, y);
            boundary[y as usize * width as usize + x as usize] = exposed;
        }
    }
    boundary
}
