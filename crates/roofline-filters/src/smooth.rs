use nalgebra::Point3;
use roofline_core::config::{SmoothingConfig, SmoothingMode};
use roofline_core::{report, Cloud, Error, Progress, Result};
use roofline_features::{best_fit_plane, gather};
use roofline_nn::NeighborIndex3;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmoothStats {
    /// Points whose coordinates changed.
    pub moved: usize,
    /// Points left in place because their neighbourhood has no plane.
    pub degenerate: usize,
    /// Largest projection distance.
    pub max_shift: f64,
}

impl SmoothStats {
    fn record(&mut self, p: &Point3<f64>, q: Option<Point3<f64>>) -> Option<Point3<f64>> {
        match q {
            Some(q) => {
                let shift = (q - *p).norm();
                if shift > 0.0 { self.moved += 1; }
                self.max_shift = self.max_shift.max(shift);
                Some(q)
            }
            None => {
                self.degenerate += 1;
                None
            }
        }
    }
}

/// Projects every point onto the best-fit plane of its `cfg.neighbours`
/// nearest neighbours, in cloud order.
///
/// Neighbour membership comes from `index`; neighbour coordinates are read
/// according to `cfg.mode`. Points whose neighbourhood is degenerate keep
/// their coordinates.
pub fn smooth_cloud(
    cloud: &mut Cloud,
    index: &dyn NeighborIndex3,
    cfg: &SmoothingConfig,
    progress: &dyn Progress,
) -> Result<SmoothStats> {
    cfg.validate()?;
    if cloud.is_empty() {
        return Err(Error::EmptyCloud);
    }
    cloud.check_finite()?;

    let total = cloud.len();
    let mut stats = SmoothStats::default();
    match cfg.mode {
        SmoothingMode::Sequential => {
            for i in 0..total {
                let p = cloud.point(i);
                let q = project_onto_local_plane(cloud, index, &p, cfg.neighbours);
                if let Some(q) = stats.record(&p, q) {
                    cloud.set_point(i, &q);
                }
                report(progress, i + 1, total);
            }
        }
        SmoothingMode::Snapshot => {
            let snapshot = Cloud { x: cloud.x.clone(), y: cloud.y.clone(), z: cloud.z.clone(), ..Default::default() };
            let mut projected: Vec<Option<Point3<f64>>> = Vec::with_capacity(total);
            for i in 0..total {
                let p = snapshot.point(i);
                let q = project_onto_local_plane(&snapshot, index, &p, cfg.neighbours);
                projected.push(stats.record(&p, q));
                report(progress, i + 1, total);
            }
            for (i, q) in projected.into_iter().enumerate() {
                if let Some(q) = q {
                    cloud.set_point(i, &q);
                }
            }
        }
    }

    if stats.degenerate > 0 {
        log::warn!("smoothing: {} points kept in place (degenerate neighbourhood)", stats.degenerate);
    }
    log::info!(
        "smoothing ({:?}): {} of {} points moved, max shift {:.4}",
        cfg.mode, stats.moved, total, stats.max_shift
    );
    Ok(stats)
}

/// Projection of `p` onto the plane through its `k` nearest neighbours, with
/// neighbour coordinates read from `src`.
fn project_onto_local_plane(
    src: &Cloud,
    index: &dyn NeighborIndex3,
    p: &Point3<f64>,
    k: usize,
) -> Option<Point3<f64>> {
    let query = [p.x as f32, p.y as f32, p.z as f32];
    let neighbours = gather(src, &index.knn(query, k));
    best_fit_plane(&neighbours).map(|plane| plane.project(p))
}
