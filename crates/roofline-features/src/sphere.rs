//! Sphere fitting by online gradient descent.
//!
//! The loss for one sample `q` is `(|c - q| - r)^2`. Parameters are updated
//! after every sample, in neighbour order, for a fixed number of epochs. No
//! randomness is involved, so identical inputs give identical radii.

use nalgebra::{Point3, Vector3};
use roofline_core::config::CurvatureConfig;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl Sphere {
    /// Starting sphere: centre at `anchor - (offset, offset, offset)`.
    pub fn around(anchor: &Point3<f64>, offset: f64, radius: f64) -> Self {
        Self { center: *anchor - Vector3::repeat(offset), radius }
    }

    /// Squared distance between `q` and the sphere surface.
    pub fn loss(&self, q: &Point3<f64>) -> f64 {
        let d = (self.center - *q).norm();
        (d - self.radius).powi(2)
    }

    /// Partial derivatives of [`Sphere::loss`] with respect to the centre and
    /// the radius.
    ///
    /// At `q == center` the centre gradient is undefined; it is taken as zero
    /// so that such a sample only moves the radius.
    pub fn gradient(&self, q: &Point3<f64>) -> (Vector3<f64>, f64) {
        let delta = self.center - *q;
        let d = delta.norm();
        let residual = d - self.radius;
        let dc = if d > 0.0 { delta * (2.0 * residual / d) } else { Vector3::zeros() };
        (dc, -2.0 * residual)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SphereFitter {
    pub epochs: usize,
    pub xyz_learning_rate: f64,
    pub r_learning_rate: f64,
    pub initial_offset: f64,
    pub initial_radius: f64,
}

impl Default for SphereFitter {
    fn default() -> Self { Self::from(&CurvatureConfig::default()) }
}

impl From<&CurvatureConfig> for SphereFitter {
    fn from(cfg: &CurvatureConfig) -> Self {
        Self {
            epochs: cfg.epochs,
            xyz_learning_rate: cfg.xyz_learning_rate,
            r_learning_rate: cfg.r_learning_rate,
            initial_offset: cfg.initial_offset,
            initial_radius: cfg.initial_radius,
        }
    }
}

impl SphereFitter {
    /// Fits a sphere to `neighbours`, starting next to `anchor`.
    pub fn fit(&self, anchor: &Point3<f64>, neighbours: &[Point3<f64>]) -> Sphere {
        let mut sphere = Sphere::around(anchor, self.initial_offset, self.initial_radius);
        for _ in 0..self.epochs {
            for q in neighbours {
                let (dc, dr) = sphere.gradient(q);
                sphere.center -= dc * self.xyz_learning_rate;
                sphere.radius -= dr * self.r_learning_rate;
            }
        }
        sphere
    }

    pub fn fit_radius(&self, anchor: &Point3<f64>, neighbours: &[Point3<f64>]) -> f64 {
        self.fit(anchor, neighbours).radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Evenly spread points on a sphere (golden-angle spiral).
    fn on_sphere(center: Point3<f64>, radius: f64, n: usize) -> Vec<Point3<f64>> {
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
                let ring = (1.0 - y * y).sqrt();
                let th = golden * i as f64;
                center + Vector3::new(ring * th.cos(), y, ring * th.sin()) * radius
            })
            .collect()
    }

    #[test]
    fn converges_to_known_radius() {
        let center = Point3::new(1.0, -2.0, 0.5);
        let fitter = SphereFitter::default();
        for radius in [0.5, 1.0, 2.0] {
            let pts = on_sphere(center, radius, 64);
            for shift in [0.0, 0.1, 0.3] {
                let anchor = center + Vector3::new(shift, 0.0, 0.0);
                let fitted = fitter.fit(&anchor, &pts);
                assert_abs_diff_eq!(fitted.radius, radius, epsilon = 1e-2);
                assert_abs_diff_eq!((fitted.center - center).norm(), 0.0, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn is_deterministic() {
        let pts = on_sphere(Point3::new(0.0, 0.0, 0.0), 1.3, 40);
        let anchor = pts[7];
        let fitter = SphereFitter::default();
        let a = fitter.fit_radius(&anchor, &pts);
        let b = fitter.fit_radius(&anchor, &pts);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let s = Sphere { center: Point3::new(0.3, -0.2, 0.1), radius: 0.7 };
        let q = Point3::new(1.0, 0.5, -0.4);
        let (dc, dr) = s.gradient(&q);
        let h = 1e-6;
        for axis in 0..3 {
            let mut plus = s;
            let mut minus = s;
            plus.center[axis] += h;
            minus.center[axis] -= h;
            let numeric = (plus.loss(&q) - minus.loss(&q)) / (2.0 * h);
            assert_abs_diff_eq!(dc[axis], numeric, epsilon = 1e-6);
        }
        let numeric_r = (Sphere { radius: s.radius + h, ..s }.loss(&q)
            - Sphere { radius: s.radius - h, ..s }.loss(&q)) / (2.0 * h);
        assert_abs_diff_eq!(dr, numeric_r, epsilon = 1e-6);
    }

    #[test]
    fn sample_at_centre_stays_finite() {
        // The starting centre is anchor - 0.01 on every axis; put a sample there.
        let anchor = Point3::new(0.01, 0.01, 0.01);
        let pts = [Point3::origin(), Point3::new(0.2, 0.0, 0.0), Point3::new(0.0, 0.2, 0.0)];
        let fitted = SphereFitter::default().fit(&anchor, &pts);
        assert!(fitted.radius.is_finite());
        assert!(fitted.center.iter().all(|v| v.is_finite()));

        let (dc, dr) = Sphere { center: Point3::origin(), radius: 0.15 }.gradient(&Point3::origin());
        assert_eq!(dc, Vector3::zeros());
        assert_abs_diff_eq!(dr, 0.3, epsilon = 1e-15);
    }

    #[test]
    fn empty_neighbourhood_keeps_initial_radius() {
        let r = SphereFitter::default().fit_radius(&Point3::new(4.0, 5.0, 6.0), &[]);
        assert_eq!(r, 0.15);
    }
}
