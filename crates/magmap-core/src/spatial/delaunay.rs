//! Planar Delaunay triangulation
//!
//! Bowyer-Watson incremental insertion inside a super-triangle. Geometry
//! tests run on coordinates shifted to the centroid of the bounding box and
//! scaled by its larger side, so results do not depend on survey units.
//! Exact duplicate locations collapse onto the first occurrence.

use std::collections::HashMap;

/// Half-width of the super-triangle in normalized units
const SUPER_TRIANGLE_SCALE: f64 = 100.0;

/// Barycentric slack when deciding that a point lies inside a triangle
const INSIDE_EPS: f64 = 1e-10;

/// Triangle and barycentric weights of a located point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub triangle: usize,
    /// Weights of the triangle's three vertices; they sum to 1
    pub weights: [f64; 3],
}

/// A Delaunay triangulation of scattered points
#[derive(Clone, Debug, Default)]
pub struct Triangulation {
    /// Vertex coordinates in input units
    points: Vec<[f64; 2]>,
    /// Vertex coordinates in normalized units
    unit: Vec<[f64; 2]>,
    /// Normalization: `unit = (p - center) / scale`
    center: [f64; 2],
    scale: f64,
    /// Input index each vertex came from
    source: Vec<usize>,
    /// Counter-clockwise vertex triples
    triangles: Vec<[usize; 3]>,
    /// Neighbour across edge `(t[k], t[(k + 1) % 3])`
    neighbors: Vec<[Option<usize>; 3]>,
    /// One triangle incident to each vertex
    vertex_triangle: Vec<Option<usize>>,
}

impl Triangulation {
    /// Triangulate a point set
    ///
    /// Non-finite points are skipped. Fewer than three distinct,
    /// non-collinear points give an empty triangulation.
    pub fn new(input: &[[f64; 2]]) -> Self {
        let mut order: Vec<usize> = (0..input.len())
            .filter(|&i| input[i][0].is_finite() && input[i][1].is_finite())
            .collect();
        order.sort_by(|&a, &b| {
            input[a][0]
                .total_cmp(&input[b][0])
                .then(input[a][1].total_cmp(&input[b][1]))
                .then(a.cmp(&b))
        });
        order.dedup_by(|b, a| input[*a] == input[*b]);

        let points: Vec<[f64; 2]> = order.iter().map(|&i| input[i]).collect();
        let n = points.len();
        if n < 3 {
            return Self {
                points,
                source: order,
                vertex_triangle: vec![None; n],
                ..Default::default()
            };
        }

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &points {
            min_x = min_x.min(p[0]);
            max_x = max_x.max(p[0]);
            min_y = min_y.min(p[1]);
            max_y = max_y.max(p[1]);
        }
        let cx = 0.5 * (min_x + max_x);
        let cy = 0.5 * (min_y + max_y);
        let mut scale = (max_x - min_x).max(max_y - min_y);
        if scale <= 0.0 {
            scale = 1.0;
        }

        let mut unit: Vec<[f64; 2]> = points
            .iter()
            .map(|p| [(p[0] - cx) / scale, (p[1] - cy) / scale])
            .collect();

        // Super-triangle vertices at indices n, n+1, n+2 (counter-clockwise)
        let s = SUPER_TRIANGLE_SCALE;
        unit.push([-s, -s]);
        unit.push([s, -s]);
        unit.push([0.0, s]);

        let mut triangles: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

        for i in 0..n {
            let p = unit[i];

            let bad: Vec<bool> = triangles
                .iter()
                .map(|t| in_circumcircle(unit[t[0]], unit[t[1]], unit[t[2]], p))
                .collect();

            // Directed boundary edges of the cavity
            let mut edge_count: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
            for (t, _) in triangles.iter().zip(&bad).filter(|(_, b)| **b) {
                for k in 0..3 {
                    let (a, b) = (t[k], t[(k + 1) % 3]);
                    let entry = edge_count.entry(normalize_edge(a, b)).or_insert((0, 0));
                    entry.0 += 1;
                    entry.1 = a;
                }
            }

            let mut kept = Vec::with_capacity(triangles.len() + 2);
            kept.extend(
                triangles
                    .iter()
                    .zip(&bad)
                    .filter(|(_, b)| !**b)
                    .map(|(t, _)| *t),
            );
            for ((lo, hi), (count, from)) in edge_count {
                if count == 1 {
                    let to = if from == lo { hi } else { lo };
                    kept.push([from, to, i]);
                }
            }
            triangles = kept;
        }

        // Drop the super-triangle and any zero-area slivers
        triangles.retain(|t| {
            t.iter().all(|&v| v < n) && orient(unit[t[0]], unit[t[1]], unit[t[2]]) > 0.0
        });
        unit.truncate(n);

        let neighbors = build_neighbors(&triangles);
        let mut vertex_triangle = vec![None; n];
        for (ti, t) in triangles.iter().enumerate() {
            for &v in t {
                vertex_triangle[v].get_or_insert(ti);
            }
        }

        tracing::debug!(
            "Triangulated {} vertices into {} triangles",
            n,
            triangles.len()
        );

        Self {
            points,
            unit,
            center: [cx, cy],
            scale,
            source: order,
            triangles,
            neighbors,
            vertex_triangle,
        }
    }

    /// Number of triangles
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the triangulation has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Number of distinct vertices
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Counter-clockwise vertex triples
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Vertex coordinates in input units
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Input index of each vertex
    pub fn sources(&self) -> &[usize] {
        &self.source
    }

    /// Some triangle touching vertex `v`
    pub fn vertex_triangle(&self, v: usize) -> Option<usize> {
        self.vertex_triangle.get(v).copied().flatten()
    }

    /// Vertices sharing an edge with each vertex
    pub fn vertex_neighbors(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.points.len()];
        for t in &self.triangles {
            for k in 0..3 {
                let (a, b) = (t[k], t[(k + 1) % 3]);
                if !adjacency[a].contains(&b) {
                    adjacency[a].push(b);
                }
                if !adjacency[b].contains(&a) {
                    adjacency[b].push(a);
                }
            }
        }
        adjacency
    }

    fn to_unit(&self, p: [f64; 2]) -> [f64; 2] {
        [
            (p[0] - self.center[0]) / self.scale,
            (p[1] - self.center[1]) / self.scale,
        ]
    }

    /// Barycentric weights of `p` in triangle `t` (normalized units)
    fn weights(&self, t: usize, p: [f64; 2]) -> [f64; 3] {
        let [ia, ib, ic] = self.triangles[t];
        let (a, b, c) = (self.unit[ia], self.unit[ib], self.unit[ic]);
        let d = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
        let la = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / d;
        let lb = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / d;
        [la, lb, 1.0 - la - lb]
    }

    /// Find the triangle containing `p`
    ///
    /// Walks from `hint` (or triangle 0) towards the point, falling back to
    /// a full scan if the walk stalls. Returns `None` outside the hull.
    pub fn locate(&self, p: [f64; 2], hint: Option<usize>) -> Option<Location> {
        if self.is_empty() || !(p[0].is_finite() && p[1].is_finite()) {
            return None;
        }
        let q = self.to_unit(p);

        let mut current = hint.filter(|&t| t < self.len()).unwrap_or(0);
        for _ in 0..self.len() {
            let w = self.weights(current, q);
            let (k, min) = w
                .iter()
                .copied()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((0, 0.0));
            if min >= -INSIDE_EPS {
                return Some(Location {
                    triangle: current,
                    weights: w,
                });
            }
            // Cross the edge opposite the most negative weight
            match self.neighbors[current][(k + 1) % 3] {
                Some(next) => current = next,
                None => break,
            }
        }

        self.scan(q)
    }

    fn scan(&self, q: [f64; 2]) -> Option<Location> {
        (0..self.len()).find_map(|t| {
            let w = self.weights(t, q);
            w.iter().all(|&l| l >= -INSIDE_EPS).then_some(Location {
                triangle: t,
                weights: w,
            })
        })
    }
}

fn normalize_edge(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Twice the signed area of `abc` (positive when counter-clockwise)
fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Strict in-circle test for the counter-clockwise triangle `abc`
fn in_circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> bool {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    let det = adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx);
    det > 0.0
}

fn build_neighbors(triangles: &[[usize; 3]]) -> Vec<[Option<usize>; 3]> {
    let mut edge_to_triangle: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    for (ti, t) in triangles.iter().enumerate() {
        for k in 0..3 {
            edge_to_triangle
                .entry(normalize_edge(t[k], t[(k + 1) % 3]))
                .or_default()
                .push((ti, k));
        }
    }

    let mut neighbors = vec![[None; 3]; triangles.len()];
    for shared in edge_to_triangle.values() {
        if let [(t1, k1), (t2, k2)] = shared[..] {
            neighbors[t1][k1] = Some(t2);
            neighbors[t2][k2] = Some(t1);
        }
    }
    neighbors
}
