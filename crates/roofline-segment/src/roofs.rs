use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use roofline_core::config::RoofConfig;
use roofline_core::{report, Cloud, Error, Plane, Progress, Result};
use roofline_features::{best_fit_plane, gather};
use roofline_nn::NeighborIndex3;

/// Label of points that are not roof candidates. Never used as a building id.
pub const NOT_ROOF: f32 = 0.0;

/// Largest count of distinct labels an `f32` layer numbers without gaps.
const MAX_EXACT_LABEL: usize = 1 << 24;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoofStats {
    pub candidates: usize,
    /// Points labelled [`NOT_ROOF`] because their neighbourhood has no plane.
    pub degenerate: usize,
}

/// Best-fit plane through the calibration points, with its normal turned
/// toward +z so that positive distances are above the surveyed ground.
pub fn reference_plane(points: &[[f64; 3]]) -> Result<Plane> {
    let pts: Vec<Point3<f64>> = points.iter().map(|&p| Point3::from(p)).collect();
    best_fit_plane(&pts)
        .map(Plane::facing_up)
        .ok_or(Error::DegenerateReferencePlane)
}

/// A roof candidate has a local surface within `tolerance` of horizontal
/// (normal pointing up or down) and lies above the reference plane.
pub fn is_roof_candidate(local: &Plane, height_above_reference: f64, tolerance: f64) -> bool {
    let angle = local.angle_to(&Vector3::z());
    (angle < tolerance || angle > PI - tolerance) && height_above_reference > 0.0
}

/// Labels roof candidates `1, 2, 3, …` in cloud order and everything else
/// [`NOT_ROOF`], then writes the labels to the `cfg.layer` scalar layer.
pub fn classify_roofs(
    cloud: &mut Cloud,
    index: &dyn NeighborIndex3,
    cfg: &RoofConfig,
    progress: &dyn Progress,
) -> Result<RoofStats> {
    cfg.validate()?;
    if cloud.is_empty() {
        return Err(Error::EmptyCloud);
    }
    cloud.check_finite()?;
    let reference = reference_plane(&cfg.reference_points)?;
    log::debug!(
        "reference plane: normal ({:.4}, {:.4}, {:.4}), offset {:.4}",
        reference.normal.x, reference.normal.y, reference.normal.z, reference.offset
    );

    let total = cloud.len();
    let done = AtomicUsize::new(0);
    let src: &Cloud = cloud;

    // Candidate tests are independent; numbering below is not.
    let verdicts: Vec<Option<bool>> = (0..total)
        .into_par_iter()
        .map(|i| {
            let neighbours = gather(src, &index.knn(src.xyz(i), cfg.neighbours));
            let p = src.point(i);
            let verdict = best_fit_plane(&neighbours).map(|local| {
                is_roof_candidate(&local, reference.signed_distance(&p), cfg.angle_tolerance)
            });
            report(progress, done.fetch_add(1, Ordering::Relaxed) + 1, total);
            verdict
        })
        .collect();

    let (labels, stats) = number_candidates(&verdicts)?;
    if stats.degenerate > 0 {
        log::warn!("roofs: {} points without a local plane", stats.degenerate);
    }
    log::info!("roofs: {} candidates among {} points", stats.candidates, total);
    cloud.set_layer(&cfg.layer, labels)?;
    Ok(stats)
}

/// Numbers candidates `1, 2, 3, …` in order. Past [`MAX_EXACT_LABEL`]
/// consecutive labels would round onto each other and merge buildings.
fn number_candidates(verdicts: &[Option<bool>]) -> Result<(Vec<f32>, RoofStats)> {
    let count = verdicts.iter().filter(|v| **v == Some(true)).count();
    if count > MAX_EXACT_LABEL {
        return Err(Error::TooManyLabels { count, max: MAX_EXACT_LABEL });
    }

    let mut stats = RoofStats::default();
    let mut labels = Vec::with_capacity(verdicts.len());
    for verdict in verdicts {
        match verdict {
            Some(true) => {
                stats.candidates += 1;
                labels.push(stats.candidates as f32);
            }
            Some(false) => labels.push(NOT_ROOF),
            None => {
                stats.degenerate += 1;
                labels.push(NOT_ROOF);
            }
        }
    }
    Ok((labels, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roofline_core::NoProgress;
    use roofline_nn::GridIndex;

    fn horizontal(c: &mut Cloud, x0: f32, y0: f32, z: f32, n: i32) {
        for i in 0..n {
            for j in 0..n {
                c.push(x0 + i as f32, y0 + j as f32, z);
            }
        }
    }

    fn ground_plane_cfg() -> RoofConfig {
        RoofConfig {
            neighbours: 9,
            reference_points: vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [10.0, 10.0, 0.0]],
            ..Default::default()
        }
    }

    #[test]
    fn reference_plane_faces_up() {
        let down = reference_plane(&[[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 0.0, 1.0]]).unwrap();
        assert!(down.normal.z > 0.0);
        assert!(down.signed_distance(&Point3::new(0.3, 0.3, 2.0)) > 0.0);
    }

    #[test]
    fn collinear_reference_points_are_rejected() {
        let err = reference_plane(&[[0.0; 3], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]).unwrap_err();
        assert!(matches!(err, Error::DegenerateReferencePlane));
    }

    #[test]
    fn flat_patch_above_reference_is_numbered_from_one() {
        let mut c = Cloud::default();
        horizontal(&mut c, 0.0, 0.0, 5.0, 6);
        let index = GridIndex::build_auto((&c).into());
        let stats = classify_roofs(&mut c, &index, &ground_plane_cfg(), &NoProgress).unwrap();
        assert_eq!(stats.candidates, 36);
        let labels = c.layer("buildings").unwrap();
        let expected: Vec<f32> = (1..=36).map(|v| v as f32).collect();
        assert_eq!(labels, &expected[..]);
    }

    #[test]
    fn flat_patch_below_reference_is_not_roof() {
        let mut c = Cloud::default();
        horizontal(&mut c, 0.0, 0.0, -5.0, 6);
        let index = GridIndex::build_auto((&c).into());
        let stats = classify_roofs(&mut c, &index, &ground_plane_cfg(), &NoProgress).unwrap();
        assert_eq!(stats.candidates, 0);
        assert!(c.layer("buildings").unwrap().iter().all(|&l| l == NOT_ROOF));
    }

    #[test]
    fn vertical_wall_is_not_roof() {
        let mut c = Cloud::default();
        for i in 0..6 {
            for k in 0..6 {
                c.push(i as f32, 2.0, 1.0 + k as f32);
            }
        }
        let index = GridIndex::build_auto((&c).into());
        let stats = classify_roofs(&mut c, &index, &ground_plane_cfg(), &NoProgress).unwrap();
        assert_eq!(stats.candidates, 0);
        assert_eq!(stats.degenerate, 0);
    }

    #[test]
    fn collinear_neighbourhoods_are_labelled_not_roof() {
        let mut c = Cloud::from_points((0..6).map(|i| [i as f32, 2.0 * i as f32, 5.0]));
        let index = GridIndex::build_auto((&c).into());
        let cfg = RoofConfig { neighbours: 4, ..ground_plane_cfg() };
        let stats = classify_roofs(&mut c, &index, &cfg, &NoProgress).unwrap();
        assert_eq!(stats.degenerate, 6);
        assert_eq!(stats.candidates, 0);
        assert!(c.layer("buildings").unwrap().iter().all(|&l| l == NOT_ROOF));
    }

    #[test]
    fn numbering_skips_rejected_and_degenerate_points() {
        let (labels, stats) = number_candidates(&[Some(true), None, Some(false), Some(true)]).unwrap();
        assert_eq!(labels, vec![1.0, NOT_ROOF, NOT_ROOF, 2.0]);
        assert_eq!(stats, RoofStats { candidates: 2, degenerate: 1 });
    }

    #[test]
    fn numbering_refuses_labels_f32_cannot_tell_apart() {
        assert_eq!((MAX_EXACT_LABEL + 1) as f32, MAX_EXACT_LABEL as f32);
        let verdicts = vec![Some(true); MAX_EXACT_LABEL + 1];
        let err = number_candidates(&verdicts).unwrap_err();
        assert!(matches!(err, Error::TooManyLabels { count, .. } if count == MAX_EXACT_LABEL + 1));
    }

    #[test]
    fn default_calibration_separates_roofs_from_ground() {
        // The default reference plane sits around z = -90 near the origin.
        let mut c = Cloud::default();
        horizontal(&mut c, 0.0, 0.0, -70.0, 5);
        horizontal(&mut c, 40.0, 0.0, -95.0, 5);
        let index = GridIndex::build_auto((&c).into());
        let cfg = RoofConfig { neighbours: 9, ..Default::default() };
        classify_roofs(&mut c, &index, &cfg, &NoProgress).unwrap();
        let labels = c.layer("buildings").unwrap();
        assert!(labels[..25].iter().all(|&l| l != NOT_ROOF));
        assert!(labels[25..].iter().all(|&l| l == NOT_ROOF));
    }

    #[test]
    fn tilted_roof_within_tolerance_counts() {
        let slope = 0.2f64.tan() as f32;
        let mut c = Cloud::default();
        for i in 0..6 {
            for j in 0..6 {
                c.push(i as f32, j as f32, 3.0 + slope * i as f32);
            }
        }
        let index = GridIndex::build_auto((&c).into());
        let stats = classify_roofs(&mut c, &index, &ground_plane_cfg(), &NoProgress).unwrap();
        assert_eq!(stats.candidates, 36);

        let steep = RoofConfig { angle_tolerance: 0.1, ..ground_plane_cfg() };
        let stats = classify_roofs(&mut c, &index, &steep, &NoProgress).unwrap();
        assert_eq!(stats.candidates, 0);
    }
}
