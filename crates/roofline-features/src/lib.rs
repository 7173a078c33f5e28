//! roofline-features — local surface descriptors: best-fit planes and
//! sphere-fit curvature.

mod curvature;
mod plane;
pub mod sphere;

pub use curvature::estimate_curvature;
pub use plane::best_fit_plane;
pub use sphere::{Sphere, SphereFitter};

use nalgebra::Point3;
use roofline_core::Cloud;
use roofline_nn::Neighbors;

/// Coordinates of `hits`, read from `cloud`.
pub fn gather(cloud: &Cloud, hits: &Neighbors) -> Vec<Point3<f64>> {
    hits.iter().map(|n| cloud.point(n.idx)).collect()
}
