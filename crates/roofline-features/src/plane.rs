use nalgebra::{Matrix3, Point3, Unit, Vector3};
use roofline_core::Plane;

/// Ratio of middle to largest covariance eigenvalue below which the points
/// are treated as collinear.
const COLLINEAR_RATIO: f64 = 1e-10;

/// Least-squares plane through `points` (PCA: the normal is the eigenvector
/// of the smallest covariance eigenvalue, the plane passes through the mean).
///
/// Returns `None` for fewer than 3 points, coincident or collinear points,
/// and non-finite input.
pub fn best_fit_plane(points: &[Point3<f64>]) -> Option<Plane> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len() as f64;
    let mean = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    if !mean.iter().all(|v| v.is_finite()) {
        return None;
    }

    let mut c = Matrix3::<f64>::zeros();
    for p in points {
        let v = p.coords - mean;
        c += v * v.transpose();
    }
    c /= n;

    let eig = c.symmetric_eigen();
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let middle = eig.eigenvalues[order[1]];
    let largest = eig.eigenvalues[order[2]];
    if !(largest > 0.0) || middle <= COLLINEAR_RATIO * largest {
        return None;
    }

    let normal = Unit::try_new(eig.eigenvectors.column(order[0]).into_owned(), 1e-12)?;
    Some(Plane::from_point_normal(&Point3::from(mean), normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(f: impl Fn(f64, f64) -> f64) -> Vec<Point3<f64>> {
        let mut pts = Vec::new();
        for i in -3..=3 {
            for j in -3..=3 {
                let (x, y) = (i as f64 * 0.5, j as f64 * 0.5);
                pts.push(Point3::new(x, y, f(x, y)));
            }
        }
        pts
    }

    #[test]
    fn recovers_tilted_plane() {
        let pts = grid(|x, y| 0.5 * x - 0.25 * y + 2.0);
        let plane = best_fit_plane(&pts).unwrap();
        let expected = Vector3::new(0.5, -0.25, -1.0).normalize();
        assert_abs_diff_eq!(plane.normal.dot(&expected).abs(), 1.0, epsilon = 1e-9);
        for p in &pts {
            assert_abs_diff_eq!(plane.signed_distance(p), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn horizontal_grid_has_vertical_normal() {
        let plane = best_fit_plane(&grid(|_, _| -80.0)).unwrap();
        assert_abs_diff_eq!(plane.normal.z.abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_inputs_have_no_plane() {
        let two = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        assert!(best_fit_plane(&two).is_none());

        let line: Vec<_> = (0..10).map(|i| Point3::new(i as f64, 2.0 * i as f64, 1.0)).collect();
        assert!(best_fit_plane(&line).is_none());

        let same = [Point3::new(1.0, 1.0, 1.0); 5];
        assert!(best_fit_plane(&same).is_none());

        let nan = [Point3::new(f64::NAN, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert!(best_fit_plane(&nan).is_none());
    }
}
