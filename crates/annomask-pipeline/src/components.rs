//! Connected-component labeling with 8-connectivity.
//!
//! Splits a binary mask into one mask per connected foreground region
//! using a two-pass raster scan over a union-find label arena: the
//! first pass assigns provisional labels from the already-visited
//! neighbors and records label equivalences, the second resolves every
//! pixel to its root and remaps roots to dense ids in raster order.
//! The label grid and the arena live only for the duration of a call.

use image::GrayImage;

/// Offsets `(dy, dx)` of the 8-neighbors already visited when scanning
/// in raster order: up, up-left, up-right, left.
const PRIOR_NEIGHBORS: [(i64, i64); 4] = [(-1, 0), (-1, -1), (-1, 1), (0, -1)];

/// Split a binary mask into its 8-connected foreground components.
///
/// Returns one full-size binary mask per component, each containing at
/// least one foreground pixel, ordered by the raster position of the
/// component's first pixel. The returned masks are pairwise disjoint
/// and their union is exactly the input foreground set. An
/// all-background mask yields an empty vector.
#[must_use = "returns the per-instance masks"]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub fn extract_instances(mask: &GrayImage) -> Vec<GrayImage> {
    let (width, height) = mask.dimensions();
    let mut labels = vec![0u32; width as usize * height as usize];
    let mut forest = UnionFind::new();

    // First pass: provisional labels + equivalences.
    for y in 0..height {
        for x in 0..width {
            if mask.get_pixel(x, y).0[0] == 0 {
                continue;
            }

            let mut neighbor_labels = [0u32; 4];
            let mut count = 0;
            for (dy, dx) in PRIOR_NEIGHBORS {
                let ny = i64::from(y) + dy;
                let nx = i64::from(x) + dx;
                if ny < 0 || nx < 0 || nx >= i64::from(width) {
                    continue;
                }
                let label = labels[ny as usize * width as usize + nx as usize];
                if label != 0 {
                    neighbor_labels[count] = label;
                    count += 1;
                }
            }

            let index = y as usize * width as usize + x as usize;
            if count == 0 {
                labels[index] = forest.make_label();
            } else {
                let minimum = neighbor_labels[..count]
                    .iter()
                    .copied()
                    .min()
                    .unwrap_or_default();
                labels[index] = minimum;
                for &label in &neighbor_labels[..count] {
                    if label != minimum {
                        forest.union(minimum, label);
                    }
                }
            }
        }
    }

    // Second pass: resolve roots and remap to dense ids in raster
    // order of first occurrence.
    let mut dense_of_root = std::collections::HashMap::new();
    let mut instances: Vec<GrayImage> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let label = labels[y as usize * width as usize + x as usize];
            if label == 0 {
                continue;
            }
            let root = forest.find(label);
            let dense = *dense_of_root.entry(root).or_insert_with(|| {
                instances.push(GrayImage::new(width, height));
                instances.len() - 1
            });
            instances[dense].put_pixel(x, y, image::Luma([255]));
        }
    }

    instances
}

/// Union-find over a flat arena of parent indices.
///
/// Label 0 is reserved for background and never unioned.
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        Self { parent: vec![0] }
    }

    /// Allocate a fresh label that is its own root.
    fn make_label(&mut self) -> u32 {
        let label = u32::try_from(self.parent.len()).unwrap_or(u32::MAX);
        self.parent.push(label);
        label
    }

    /// Find the root of `label` with path halving.
    fn find(&mut self, mut label: u32) -> u32 {
        while self.parent[label as usize] != label {
            self.parent[label as usize] = self.parent[self.parent[label as usize] as usize];
            label = self.parent[label as usize];
        }
        label
    }

    /// Merge the sets containing `a` and `b`.
    fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_b as usize] = root_a;
        }
    }
}
