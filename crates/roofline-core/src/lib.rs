//! roofline-core — point cloud data model, scalar layers and shared types.

use std::collections::HashMap;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

pub mod config;
mod error;
mod geometry;
mod progress;

pub use error::{Error, Result};
pub use geometry::Plane;
pub use progress::{report, NoProgress, Progress};

/// Structure-of-Arrays point cloud.
/// Coordinates are kept in tight columns; per-point scalar layers live in a
/// name→column map and always have the same length as the coordinates.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct Cloud {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,

    /// Named scalar layers, e.g. "Curvatures", "buildings".
    /// Names are case-sensitive.
    pub layers: HashMap<String, Vec<f32>>,
}

impl Cloud {
    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    /// Appends a point. Existing layers are not extended; push all points
    /// before attaching layers.
    pub fn push(&mut self, px: f32, py: f32, pz: f32) {
        self.x.push(px); self.y.push(py); self.z.push(pz);
    }

    pub fn reserve(&mut self, n: usize) {
        self.x.reserve(n); self.y.reserve(n); self.z.reserve(n);
        for v in self.layers.values_mut() { v.reserve(n); }
    }

    pub fn from_points<I: IntoIterator<Item = [f32; 3]>>(points: I) -> Self {
        let mut c = Cloud::default();
        for [px, py, pz] in points {
            c.push(px, py, pz);
        }
        c
    }

    #[inline]
    pub fn xyz(&self, i: usize) -> [f32; 3] { [self.x[i], self.y[i], self.z[i]] }

    /// Point `i` widened to double precision.
    #[inline]
    pub fn point(&self, i: usize) -> Point3<f64> {
        Point3::new(self.x[i] as f64, self.y[i] as f64, self.z[i] as f64)
    }

    /// Overwrites the coordinates of point `i`.
    #[inline]
    pub fn set_point(&mut self, i: usize, p: &Point3<f64>) {
        self.x[i] = p.x as f32;
        self.y[i] = p.y as f32;
        self.z[i] = p.z as f32;
    }

    pub fn has_layer(&self, name: &str) -> bool { self.layers.contains_key(name) }

    /// Reads a scalar layer, checking that it is aligned with the points.
    pub fn layer(&self, name: &str) -> Result<&[f32]> {
        let col = self
            .layers
            .get(name)
            .ok_or_else(|| Error::MissingLayer(name.to_string()))?;
        if col.len() != self.len() {
            return Err(Error::LayerLength {
                name: name.to_string(),
                expected: self.len(),
                actual: col.len(),
            });
        }
        Ok(col)
    }

    /// Creates or fully replaces a scalar layer.
    pub fn set_layer(&mut self, name: &str, values: Vec<f32>) -> Result<()> {
        if values.len() != self.len() {
            return Err(Error::LayerLength {
                name: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.layers.insert(name.to_string(), values);
        Ok(())
    }

    /// Layer names sorted alphabetically.
    pub fn layer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.layers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn bounds(&self) -> Option<Aabb> { CloudView::from(self).bounds() }

    /// Fails on the first point with a NaN or infinite coordinate.
    pub fn check_finite(&self) -> Result<()> {
        match (0..self.len()).find(|&i| self.xyz(i).iter().any(|v| !v.is_finite())) {
            Some(index) => Err(Error::NonFiniteCoordinate { index }),
            None => Ok(()),
        }
    }
}

/// Zero-copy view into a Cloud (slice-of-SoA).
#[derive(Copy, Clone)]
pub struct CloudView<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub z: &'a [f32],
}

impl<'a> From<&'a Cloud> for CloudView<'a> {
    fn from(c: &'a Cloud) -> Self { Self { x: &c.x, y: &c.y, z: &c.z } }
}

impl<'a> CloudView<'a> {
    pub fn len(&self) -> usize { self.x.len() }
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    pub fn bounds(&self) -> Option<Aabb> {
        if self.is_empty() { return None; }
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for i in 0..self.len() {
            let p = [self.x[i], self.y[i], self.z[i]];
            for a in 0..3 {
                min[a] = min[a].min(p[a]);
                max[a] = max[a].max(p[a]);
            }
        }
        Some(Aabb { min, max })
    }
}

/// Simple AABB
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb { pub min: [f32;3], pub max: [f32;3] }

impl Aabb {
    pub fn contains(&self, p: [f32;3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    pub fn diagonal(&self) -> f32 {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        (dx*dx + dy*dy + dz*dz).sqrt()
    }
}
