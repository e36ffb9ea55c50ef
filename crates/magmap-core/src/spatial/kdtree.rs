//! 2-D kd-tree for nearest-sample queries
//!
//! The tree is implicit: points are permuted in place so that every
//! subrange `[lo, hi)` is split at its median along alternating axes.
//! Ranges no larger than `leaf_size` are scanned linearly.
//! It answers:
//! - nearest neighbour (with distance)
//! - k nearest neighbours
//! - all points within a radius

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Configuration for kd-tree construction
#[derive(Clone, Debug)]
pub struct KdTreeConfig {
    /// Ranges at or below this size are scanned linearly (default: 16)
    pub leaf_size: usize,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self { leaf_size: 16 }
    }
}

/// An axis-aligned 2-D bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl BoundingBox {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    /// Create an empty (invalid) bounding box
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    /// Check if the bounding box is empty/invalid
    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    /// Expand to include a point
    pub fn expand_to_include(&mut self, point: [f64; 2]) {
        for (i, &p) in point.iter().enumerate() {
            self.min[i] = self.min[i].min(p);
            self.max[i] = self.max[i].max(p);
        }
    }

    /// Check if a point is contained
    pub fn contains_point(&self, point: [f64; 2]) -> bool {
        (0..2).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    /// Squared distance from a point to the nearest point on the box
    pub fn distance_sq_to_point(&self, point: [f64; 2]) -> f64 {
        let mut dist_sq = 0.0;
        for (i, &p) in point.iter().enumerate() {
            if p < self.min[i] {
                dist_sq += (self.min[i] - p).powi(2);
            } else if p > self.max[i] {
                dist_sq += (p - self.max[i]).powi(2);
            }
        }
        dist_sq
    }
}

#[inline]
fn dist_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Static kd-tree over 2-D points
#[derive(Clone, Debug)]
pub struct KdTree {
    /// Points in tree order
    points: Vec<[f64; 2]>,
    /// Original index of each point in tree order
    indices: Vec<usize>,
    config: KdTreeConfig,
    bounds: BoundingBox,
}

impl KdTree {
    /// Build a kd-tree from a set of points
    pub fn build(points: &[[f64; 2]]) -> Self {
        Self::build_with_config(points, KdTreeConfig::default())
    }

    /// Build a kd-tree with custom configuration
    pub fn build_with_config(points: &[[f64; 2]], config: KdTreeConfig) -> Self {
        let mut items: Vec<([f64; 2], usize)> =
            points.iter().copied().enumerate().map(|(i, p)| (p, i)).collect();

        let mut bounds = BoundingBox::empty();
        for &(p, _) in &items {
            bounds.expand_to_include(p);
        }

        let leaf_size = config.leaf_size.max(1);
        split(&mut items, 0, leaf_size);

        let (points, indices) = items.into_iter().unzip();
        Self {
            points,
            indices,
            config: KdTreeConfig { leaf_size },
            bounds,
        }
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box of all points
    pub fn bounds(&self) -> Option<BoundingBox> {
        (!self.is_empty()).then_some(self.bounds)
    }

    /// Nearest point to `query` as `(index, distance)`
    pub fn nearest(&self, query: [f64; 2]) -> Option<(usize, f64)> {
        if self.is_empty() {
            return None;
        }
        let mut best = (usize::MAX, f64::INFINITY);
        self.nearest_recursive(0, self.len(), 0, query, &mut best);
        self.indices
            .get(best.0)
            .map(|&index| (index, best.1.sqrt()))
    }

    fn nearest_recursive(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        query: [f64; 2],
        best: &mut (usize, f64),
    ) {
        if hi - lo <= self.config.leaf_size {
            for slot in lo..hi {
                let d = dist_sq(self.points[slot], query);
                if d < best.1 {
                    *best = (slot, d);
                }
            }
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let axis = depth % 2;
        let d = dist_sq(self.points[mid], query);
        if d < best.1 {
            *best = (mid, d);
        }

        let diff = query[axis] - self.points[mid][axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.nearest_recursive(near.0, near.1, depth + 1, query, best);
        if diff * diff < best.1 {
            self.nearest_recursive(far.0, far.1, depth + 1, query, best);
        }
    }

    /// Find the k nearest points, closest first, as `(index, distance)`
    pub fn knn(&self, query: [f64; 2], k: usize) -> Vec<(usize, f64)> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        let mut results: Vec<(usize, f64)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, self.len(), 0, query, k, &mut results);
        results
            .into_iter()
            .map(|(slot, d)| (self.indices[slot], d.sqrt()))
            .collect()
    }

    fn knn_recursive(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        query: [f64; 2],
        k: usize,
        results: &mut Vec<(usize, f64)>,
    ) {
        let offer = |slot: usize, results: &mut Vec<(usize, f64)>| {
            let d = dist_sq(self.points[slot], query);
            if results.len() < k || d < results[results.len() - 1].1 {
                let pos = results.partition_point(|&(_, other)| other <= d);
                results.insert(pos, (slot, d));
                results.truncate(k);
            }
        };

        if hi - lo <= self.config.leaf_size {
            for slot in lo..hi {
                offer(slot, results);
            }
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let axis = depth % 2;
        offer(mid, results);

        let diff = query[axis] - self.points[mid][axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.knn_recursive(near.0, near.1, depth + 1, query, k, results);

        let worst = if results.len() < k {
            f64::INFINITY
        } else {
            results[results.len() - 1].1
        };
        if diff * diff < worst {
            self.knn_recursive(far.0, far.1, depth + 1, query, k, results);
        }
    }

    /// Indices of all points within `radius` of `query` (unordered)
    pub fn within_radius(&self, query: [f64; 2], radius: f64) -> Vec<usize> {
        let mut results = Vec::new();
        if !self.is_empty() && radius >= 0.0 {
            self.radius_recursive(0, self.len(), 0, query, radius * radius, &mut results);
        }
        results
    }

    fn radius_recursive(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        query: [f64; 2],
        radius_sq: f64,
        results: &mut Vec<usize>,
    ) {
        if hi - lo <= self.config.leaf_size {
            results.extend(
                (lo..hi)
                    .filter(|&slot| dist_sq(self.points[slot], query) <= radius_sq)
                    .map(|slot| self.indices[slot]),
            );
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let axis = depth % 2;
        if dist_sq(self.points[mid], query) <= radius_sq {
            results.push(self.indices[mid]);
        }

        let diff = query[axis] - self.points[mid][axis];
        if diff <= 0.0 || diff * diff <= radius_sq {
            self.radius_recursive(lo, mid, depth + 1, query, radius_sq, results);
        }
        if diff >= 0.0 || diff * diff <= radius_sq {
            self.radius_recursive(mid + 1, hi, depth + 1, query, radius_sq, results);
        }
    }

    /// Distance from each query to its nearest point (`INFINITY` if empty)
    pub fn nearest_distances(&self, queries: &[[f64; 2]]) -> Vec<f64> {
        let distance = |q: &[f64; 2]| self.nearest(*q).map_or(f64::INFINITY, |(_, d)| d);

        #[cfg(feature = "parallel")]
        {
            queries.par_iter().map(distance).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            queries.iter().map(distance).collect()
        }
    }
}

/// Arrange `items` so each range is split at its median along `depth % 2`
fn split(items: &mut [([f64; 2], usize)], depth: usize, leaf_size: usize) {
    if items.len() <= leaf_size {
        return;
    }
    let mid = items.len() / 2;
    let axis = depth % 2;
    items.select_nth_unstable_by(mid, |a, b| a.0[axis].total_cmp(&b.0[axis]));

    let (left, rest) = items.split_at_mut(mid);
    split(left, depth + 1, leaf_size);
    split(&mut rest[1..], depth + 1, leaf_size);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_nearest(points: &[[f64; 2]], q: [f64; 2]) -> f64 {
        points
            .iter()
            .map(|&p| dist_sq(p, q).sqrt())
            .fold(f64::INFINITY, f64::min)
    }

    fn scattered(n: usize) -> Vec<[f64; 2]> {
        // Deterministic pseudo-random layout
        (0..n)
            .map(|i| {
                let t = i as f64;
                [(t * 37.7).sin() * 100.0, (t * 13.3).cos() * 80.0 + t * 0.1]
            })
            .collect()
    }

    #[test]
    fn test_bounding_box_basics() {
        let mut bbox = BoundingBox::empty();
        assert!(bbox.is_empty());
        bbox.expand_to_include([0.0, 0.0]);
        bbox.expand_to_include([10.0, 5.0]);

        assert!(bbox.contains_point([5.0, 5.0]));
        assert!(!bbox.contains_point([15.0, 5.0]));
        assert_eq!(bbox.distance_sq_to_point([12.0, 5.0]), 4.0);
        assert_eq!(bbox.distance_sq_to_point([5.0, 2.0]), 0.0);
    }

    #[test]
    fn test_kdtree_build() {
        let tree = KdTree::build(&scattered(100));
        assert_eq!(tree.len(), 100);
        assert!(tree.bounds().is_some());
        assert!(KdTree::build(&[]).bounds().is_none());
    }

    #[test]
    fn test_nearest_small() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [10.0, 0.0]];
        let tree = KdTree::build(&points);

        let (index, dist) = tree.nearest([9.0, 0.0]).unwrap();
        assert_eq!(index, 3);
        assert!((dist - 1.0).abs() < 1e-12);
        assert!(KdTree::build(&[]).nearest([0.0, 0.0]).is_none());
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = scattered(500);
        let tree = KdTree::build_with_config(&points, KdTreeConfig { leaf_size: 4 });

        for q in scattered(50).iter().map(|p| [p[0] * 0.9 + 3.0, p[1] * 1.1 - 2.0]) {
            let (index, dist) = tree.nearest(q).unwrap();
            assert!((dist - brute_nearest(&points, q)).abs() < 1e-9);
            assert!((dist_sq(points[index], q).sqrt() - dist).abs() < 1e-9);
        }
    }

    #[test]
    fn test_knn() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [10.0, 0.0]];
        let tree = KdTree::build(&points);

        let results = tree.knn([0.4, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
        assert_eq!(tree.knn([0.0, 0.0], 10).len(), 4);
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let points = scattered(300);
        let tree = KdTree::build_with_config(&points, KdTreeConfig { leaf_size: 2 });
        let q = [5.0, -7.0];

        let mut expected: Vec<f64> = points.iter().map(|&p| dist_sq(p, q).sqrt()).collect();
        expected.sort_by(|a, b| a.total_cmp(b));

        let got: Vec<f64> = tree.knn(q, 8).into_iter().map(|(_, d)| d).collect();
        for (g, e) in got.iter().zip(&expected[..8]) {
            assert!((g - e).abs() < 1e-9);
        }
    }

    #[test]
    fn test_within_radius() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [10.0, 0.0]];
        let tree = KdTree::build_with_config(&points, KdTreeConfig { leaf_size: 1 });

        let mut results = tree.within_radius([0.0, 0.0], 1.5);
        results.sort_unstable();
        assert_eq!(results, vec![0, 1]);
    }

    #[test]
    fn test_duplicate_points() {
        let points = vec![[1.0, 1.0]; 40];
        let tree = KdTree::build_with_config(&points, KdTreeConfig { leaf_size: 3 });
        let (_, dist) = tree.nearest([1.0, 2.0]).unwrap();
        assert!((dist - 1.0).abs() < 1e-12);
        assert_eq!(tree.within_radius([1.0, 1.0], 0.0).len(), 40);
    }

    #[test]
    fn test_nearest_distances() {
        let tree = KdTree::build(&[[0.0, 0.0], [3.0, 4.0]]);
        let d = tree.nearest_distances(&[[0.0, 0.0], [3.0, 0.0], [6.0, 8.0]]);
        assert_eq!(d, vec![0.0, 3.0, 5.0]);
    }
}
