use nalgebra::{Point3, Unit, Vector3};

/// Plane `normal · p + offset = 0` with a unit normal.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Unit<Vector3<f64>>,
    pub offset: f64,
}

impl Plane {
    /// Plane through `point` with the given normal.
    pub fn from_point_normal(point: &Point3<f64>, normal: Unit<Vector3<f64>>) -> Self {
        let offset = -normal.dot(&point.coords);
        Self { normal, offset }
    }

    /// Positive on the side the normal points to.
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) + self.offset
    }

    /// Orthogonal projection of `p` onto the plane.
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Point3<f64> {
        *p - self.normal.into_inner() * self.signed_distance(p)
    }

    /// Same plane with the normal flipped so that its z component is non-negative.
    pub fn facing_up(self) -> Self {
        if self.normal.z < 0.0 {
            Self { normal: -self.normal, offset: -self.offset }
        } else {
            self
        }
    }

    /// Angle in radians between the plane normal and `axis`, in `[0, π]`.
    pub fn angle_to(&self, axis: &Vector3<f64>) -> f64 {
        let n = axis.norm();
        if n == 0.0 { return 0.0; }
        (self.normal.dot(axis) / n).clamp(-1.0, 1.0).acos()
    }
}
