//! Building segmentation by minimum-label propagation.
//!
//! Every sweep reads the label layer as committed by the previous sweep,
//! computes all new labels into a separate buffer, and commits the buffer
//! only when the sweep is complete. Labels therefore move at most one
//! neighbourhood hop per sweep, and the result does not depend on the order
//! in which points are visited.

use std::collections::BTreeSet;

use roofline_core::config::SegmentationConfig;
use roofline_core::{report, Cloud, Error, Progress, Result};
use roofline_nn::NeighborIndex3;

use crate::roofs::NOT_ROOF;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentStats {
    pub sweeps: usize,
    /// Labels rewritten by the final sweep; zero means the layer had settled.
    pub changed_last: usize,
    /// Roof points whose neighbourhood held no roof label, summed over sweeps.
    pub isolated: usize,
    /// Distinct building ids after the final sweep.
    pub buildings: usize,
}

/// One synchronous sweep over `snapshot`.
///
/// A labelled point takes the smallest nonzero label among its `k` nearest
/// neighbours (itself included when the index returns it). A labelled point
/// with no labelled neighbour keeps its label. Unlabelled points stay
/// [`NOT_ROOF`].
pub fn propagate_sweep(cloud: &Cloud, snapshot: &[f32], index: &dyn NeighborIndex3, k: usize) -> Vec<f32> {
    sweep(cloud, snapshot, index, k, &mut |_| {}).0
}

fn sweep(
    cloud: &Cloud,
    snapshot: &[f32],
    index: &dyn NeighborIndex3,
    k: usize,
    on_point: &mut dyn FnMut(usize),
) -> (Vec<f32>, usize) {
    let mut isolated = 0;
    let mut next = Vec::with_capacity(snapshot.len());
    for (i, &label) in snapshot.iter().enumerate() {
        if label == NOT_ROOF {
            next.push(NOT_ROOF);
        } else {
            let lowest = index
                .knn(cloud.xyz(i), k)
                .iter()
                .map(|n| snapshot[n.idx])
                .filter(|&l| l != NOT_ROOF)
                .min_by(|a, b| a.total_cmp(b));
            if lowest.is_none() {
                isolated += 1;
            }
            next.push(lowest.unwrap_or(label));
        }
        on_point(i);
    }
    (next, isolated)
}

/// Runs `cfg.sweeps` sweeps over the `layer` scalar layer of `cloud`,
/// committing each sweep to the layer before starting the next.
pub fn segment_buildings(
    cloud: &mut Cloud,
    index: &dyn NeighborIndex3,
    layer: &str,
    cfg: &SegmentationConfig,
    progress: &dyn Progress,
) -> Result<SegmentStats> {
    cfg.validate()?;
    if cloud.is_empty() {
        return Err(Error::EmptyCloud);
    }
    cloud.check_finite()?;
    cloud.layer(layer)?;

    let n = cloud.len();
    let total = cfg.sweeps * n;
    let mut stats = SegmentStats::default();
    for s in 0..cfg.sweeps {
        let (next, changed, isolated) = {
            let snapshot = cloud.layer(layer)?;
            let (next, isolated) = sweep(cloud, snapshot, index, cfg.neighbours, &mut |i| {
                report(progress, s * n + i + 1, total)
            });
            let changed = next.iter().zip(snapshot).filter(|(a, b)| a.to_bits() != b.to_bits()).count();
            (next, changed, isolated)
        };
        cloud.set_layer(layer, next)?;
        log::debug!("sweep {}/{}: {} labels changed", s + 1, cfg.sweeps, changed);
        stats.sweeps += 1;
        stats.changed_last = changed;
        stats.isolated += isolated;
    }

    stats.buildings = building_ids(cloud.layer(layer)?).len();
    if stats.changed_last > 0 {
        log::info!(
            "segmentation: {} labels still changing after {} sweeps; patches may carry several ids",
            stats.changed_last, stats.sweeps
        );
    }
    log::info!("segmentation: {} building ids after {} sweeps", stats.buildings, stats.sweeps);
    Ok(stats)
}

/// Distinct nonzero labels in ascending order.
pub fn building_ids(labels: &[f32]) -> Vec<f32> {
    let ids: BTreeSet<u32> = labels
        .iter()
        .filter(|&&l| l != NOT_ROOF && l.is_finite() && l > 0.0)
        .map(|l| l.to_bits())
        .collect();
    // positive finite floats order the same as their bit patterns
    ids.into_iter().map(f32::from_bits).collect()
}
