use roofline_core::config::PipelineConfig;
use roofline_core::{Cloud, Error, Progress, Result};
use roofline_filters::{smooth_cloud, SmoothStats};
use roofline_nn::GridIndex;

use crate::propagate::{segment_buildings, SegmentStats};
use crate::roofs::{classify_roofs, reference_plane, RoofStats};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildingReport {
    pub smoothing: SmoothStats,
    pub roofs: RoofStats,
    pub segmentation: SegmentStats,
}

/// Maps one stage's `[0, 1]` onto its slice of the whole run.
struct StageProgress<'a> {
    inner: &'a dyn Progress,
    stage: usize,
    stages: usize,
}

impl Progress for StageProgress<'_> {
    fn update(&self, fraction: f32) -> bool {
        self.inner.update((self.stage as f32 + fraction) / self.stages as f32)
    }
}

/// Smooths `cloud`, classifies roof candidates and segments them into
/// buildings. Building ids end up in the `cfg.roofs.layer` scalar layer.
///
/// Everything the stages validate is checked before the cloud is touched.
pub fn detect_buildings(cloud: &mut Cloud, cfg: &PipelineConfig, progress: &dyn Progress) -> Result<BuildingReport> {
    cfg.validate()?;
    reference_plane(&cfg.roofs.reference_points)?;
    if cloud.is_empty() {
        return Err(Error::EmptyCloud);
    }
    cloud.check_finite()?;
    let stage = |stage| StageProgress { inner: progress, stage, stages: 3 };

    let index = GridIndex::build_auto((&*cloud).into());
    log::debug!("grid index: {} points, cell {:.3}", cloud.len(), index.cell());
    let smoothing = smooth_cloud(cloud, &index, &cfg.smoothing, &stage(0))?;

    // Smoothing moved the points; the old buckets no longer hold.
    let index = GridIndex::build_auto((&*cloud).into());
    let roofs = classify_roofs(cloud, &index, &cfg.roofs, &stage(1))?;
    let segmentation = segment_buildings(cloud, &index, &cfg.roofs.layer, &cfg.segmentation, &stage(2))?;

    Ok(BuildingReport { smoothing, roofs, segmentation })
}
