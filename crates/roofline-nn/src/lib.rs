//! roofline-nn — neighbour indices for 3D (exact uniform grid).

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use roofline_core::CloudView;
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Neighbor { pub idx: usize, pub dist2: f32 }

pub type Neighbors = SmallVec<[Neighbor; 64]>;

/// Geometry-first neighbourhood queries.
pub trait NeighborIndex3: Sync {
    /// Number of indexed points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Up to `k` nearest indexed points to `query`, closest first, ties broken
    /// by index. A point coincident with `query` is included.
    fn knn(&self, query: [f32; 3], k: usize) -> Neighbors;
}

/// Uniform grid hash. Owns a copy of the coordinates it was built from, so
/// the source cloud stays free to change while the index is alive.
/// Points with a non-finite coordinate are never bucketed and never returned.
pub struct GridIndex {
    pts: Vec<[f32; 3]>,
    cell: f32,
    bucketed: usize,
    buckets: HashMap<[i32; 3], Vec<usize>>,
    lo: [i32; 3],
    hi: [i32; 3],
}

impl GridIndex {
    pub fn build(view: CloudView<'_>, cell: f32) -> Self {
        let cell = if cell.is_finite() { cell.max(1e-6) } else { 1.0 };
        let inv = 1.0 / cell;
        let mut pts = Vec::with_capacity(view.len());
        let mut buckets: HashMap<[i32; 3], Vec<usize>> = HashMap::new();
        let mut lo = [i32::MAX; 3];
        let mut hi = [i32::MIN; 3];
        let mut bucketed = 0;
        for i in 0..view.len() {
            let p = [view.x[i], view.y[i], view.z[i]];
            pts.push(p);
            if !is_finite(p) { continue; }
            bucketed += 1;
            let key = key_of(p, inv);
            for a in 0..3 {
                lo[a] = lo[a].min(key[a]);
                hi[a] = hi[a].max(key[a]);
            }
            match buckets.entry(key) {
                Entry::Vacant(v) => { v.insert(vec![i]); }
                Entry::Occupied(mut o) => o.get_mut().push(i),
            }
        }
        Self { pts, cell, bucketed, buckets, lo, hi }
    }

    /// Builds with a cell size derived from the cloud's extent and density.
    pub fn build_auto(view: CloudView<'_>) -> Self {
        let cell = estimate_cell(view);
        Self::build(view, cell)
    }

    pub fn cell(&self) -> f32 { self.cell }

    fn push_bucket(&self, key: [i32; 3], q: [f32; 3], out: &mut Neighbors) {
        if let Some(bin) = self.buckets.get(&key) {
            for &j in bin {
                let p = self.pts[j];
                let d2 = (p[0]-q[0]).powi(2) + (p[1]-q[1]).powi(2) + (p[2]-q[2]).powi(2);
                out.push(Neighbor { idx: j, dist2: d2 });
            }
        }
    }
}

impl NeighborIndex3 for GridIndex {
    fn len(&self) -> usize { self.pts.len() }

    fn knn(&self, query: [f32; 3], k: usize) -> Neighbors {
        let mut out = Neighbors::new();
        // A non-finite query has no finite distances to stop the shell walk.
        if k == 0 || self.bucketed == 0 || !is_finite(query) {
            return out;
        }
        let base = key_of(query, 1.0 / self.cell);
        // Past this shell every cell lies outside the occupied key range.
        let max_layer = (0..3)
            .map(|a| (base[a] as i64 - self.lo[a] as i64).abs().max((self.hi[a] as i64 - base[a] as i64).abs()))
            .max()
            .unwrap_or(0);

        let mut layer: i64 = 0;
        while layer <= max_layer {
            let range = |a: usize| {
                let from = (base[a] as i64 - layer).max(self.lo[a] as i64);
                let to = (base[a] as i64 + layer).min(self.hi[a] as i64);
                from..=to
            };
            for kx in range(0) {
                for ky in range(1) {
                    for kz in range(2) {
                        let cheb = (kx - base[0] as i64).abs()
                            .max((ky - base[1] as i64).abs())
                            .max((kz - base[2] as i64).abs());
                        if cheb != layer { continue; }
                        self.push_bucket([kx as i32, ky as i32, kz as i32], query, &mut out);
                    }
                }
            }

            if out.len() >= k {
                out.sort_by(|a, b| a.dist2.total_cmp(&b.dist2).then(a.idx.cmp(&b.idx)));
                // Unvisited cells are at least `layer * cell` away from the query.
                let reach = layer as f32 * self.cell;
                if out[k - 1].dist2 < reach * reach {
                    break;
                }
            }
            layer += 1;
        }

        out.sort_by(|a, b| a.dist2.total_cmp(&b.dist2).then(a.idx.cmp(&b.idx)));
        out.truncate(k);
        out
    }
}

#[inline]
fn is_finite(p: [f32; 3]) -> bool { p.iter().all(|v| v.is_finite()) }

#[inline]
fn key_of(p: [f32; 3], inv: f32) -> [i32; 3] {
    [
        (p[0] * inv).floor() as i32,
        (p[1] * inv).floor() as i32,
        (p[2] * inv).floor() as i32,
    ]
}

/// Cell edge giving a handful of points per occupied cell.
pub fn estimate_cell(view: CloudView<'_>) -> f32 {
    if view.len() < 2 { return 1.0; }
    let diag = view.bounds().map(|b| b.diagonal()).unwrap_or(1.0);
    (diag / (view.len() as f32).cbrt()).max(1e-3)
}
