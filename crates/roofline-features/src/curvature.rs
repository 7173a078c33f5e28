use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use roofline_core::config::{CurvatureConfig, CurvatureOutput};
use roofline_core::{report, Cloud, Error, Progress, Result};
use roofline_nn::NeighborIndex3;

use crate::gather;
use crate::sphere::SphereFitter;

/// Fits a sphere to the `cfg.neighbours` nearest points of every point and
/// writes the radius (or its inverse) into the `cfg.layer` scalar layer.
///
/// Points are independent, so the pass runs in parallel over a read-only
/// view of the cloud. The layer is written once, after every point is done.
pub fn estimate_curvature(
    cloud: &mut Cloud,
    index: &dyn NeighborIndex3,
    cfg: &CurvatureConfig,
    progress: &dyn Progress,
) -> Result<()> {
    cfg.validate()?;
    if cloud.is_empty() {
        return Err(Error::EmptyCloud);
    }
    cloud.check_finite()?;

    let fitter = SphereFitter::from(cfg);
    let total = cloud.len();
    let done = AtomicUsize::new(0);
    let src: &Cloud = cloud;

    let values: Vec<f32> = (0..total)
        .into_par_iter()
        .map(|i| {
            let neighbours = gather(src, &index.knn(src.xyz(i), cfg.neighbours));
            let r = fitter.fit_radius(&src.point(i), &neighbours);
            report(progress, done.fetch_add(1, Ordering::Relaxed) + 1, total);
            match cfg.output {
                CurvatureOutput::Radius => r as f32,
                CurvatureOutput::InverseRadius => (1.0 / r) as f32,
            }
        })
        .collect();

    let non_finite = values.iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        log::warn!("{non_finite} of {total} curvature values are not finite");
    }
    log::info!("curvature: {} points, k={}, layer `{}`", total, cfg.neighbours, cfg.layer);

    cloud.set_layer(&cfg.layer, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use roofline_core::NoProgress;
    use roofline_nn::GridIndex;

    fn sphere_cloud(radius: f32, n: usize) -> Cloud {
        let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
        Cloud::from_points((0..n).map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
            let ring = (1.0 - y * y).sqrt();
            let th = golden * i as f32;
            [ring * th.cos() * radius, y * radius, ring * th.sin() * radius]
        }))
    }

    #[test]
    fn writes_one_value_per_point() {
        let mut c = sphere_cloud(1.0, 120);
        let index = GridIndex::build_auto((&c).into());
        let cfg = CurvatureConfig { neighbours: 12, ..Default::default() };
        estimate_curvature(&mut c, &index, &cfg, &NoProgress).unwrap();
        let layer = c.layer("Curvatures").unwrap();
        assert_eq!(layer.len(), 120);
        assert!(layer.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn inverse_output_is_reciprocal_of_radius() {
        let mut c = sphere_cloud(2.0, 80);
        let index = GridIndex::build_auto((&c).into());
        let radius_cfg = CurvatureConfig { neighbours: 10, layer: "r".into(), ..Default::default() };
        let inverse_cfg = CurvatureConfig {
            output: CurvatureOutput::InverseRadius,
            layer: "k".into(),
            ..radius_cfg.clone()
        };
        estimate_curvature(&mut c, &index, &radius_cfg, &NoProgress).unwrap();
        estimate_curvature(&mut c, &index, &inverse_cfg, &NoProgress).unwrap();
        let r = c.layer("r").unwrap().to_vec();
        let k = c.layer("k").unwrap();
        for (r, k) in r.iter().zip(k) {
            assert_abs_diff_eq!(r * k, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn whole_sphere_neighbourhood_recovers_radius() {
        let mut c = sphere_cloud(1.5, 64);
        let index = GridIndex::build_auto((&c).into());
        let cfg = CurvatureConfig { neighbours: 64, ..Default::default() };
        estimate_curvature(&mut c, &index, &cfg, &NoProgress).unwrap();
        // Anchors sit on the surface here; the fit still lands on the sphere.
        let mean = c.layer("Curvatures").unwrap().iter().sum::<f32>() / 64.0;
        assert_abs_diff_eq!(mean, 1.5, epsilon = 5e-2);
    }

    #[test]
    fn zero_neighbours_fails_before_touching_the_cloud() {
        let mut c = sphere_cloud(1.0, 10);
        let index = GridIndex::build_auto((&c).into());
        let cfg = CurvatureConfig { neighbours: 0, ..Default::default() };
        assert!(estimate_curvature(&mut c, &index, &cfg, &NoProgress).is_err());
        assert!(!c.has_layer("Curvatures"));
    }

    #[test]
    fn nan_coordinate_is_rejected() {
        let mut c = sphere_cloud(1.0, 10);
        c.y[4] = f32::NAN;
        let index = GridIndex::build_auto((&c).into());
        let err = estimate_curvature(&mut c, &index, &CurvatureConfig::default(), &NoProgress).unwrap_err();
        assert!(matches!(err, Error::NonFiniteCoordinate { index: 4 }));
        assert!(!c.has_layer("Curvatures"));
    }
}
