//! Tunables for every pipeline stage.
//!
//! Each struct deserializes with defaults for missing fields and is checked
//! with `validate()` before any algorithm touches the cloud.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn at_least_one(name: &'static str, v: usize) -> Result<()> {
    if v < 1 {
        return Err(Error::invalid(name, format!("must be at least 1, got {v}")));
    }
    Ok(())
}

fn positive(name: &'static str, v: f64) -> Result<()> {
    if !(v.is_finite() && v > 0.0) {
        return Err(Error::invalid(name, format!("must be finite and positive, got {v}")));
    }
    Ok(())
}

/// What the curvature layer stores for each fitted sphere.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurvatureOutput {
    /// Fitted radius.
    #[default]
    Radius,
    /// `1 / radius`.
    InverseRadius,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurvatureConfig {
    /// Neighbours per sphere fit.
    pub neighbours: usize,
    /// Full passes over the neighbour set.
    pub epochs: usize,
    pub xyz_learning_rate: f64,
    pub r_learning_rate: f64,
    /// Initial centre is the anchor shifted by `-initial_offset` on each axis.
    pub initial_offset: f64,
    pub initial_radius: f64,
    pub output: CurvatureOutput,
    pub layer: String,
}

impl Default for CurvatureConfig {
    fn default() -> Self {
        Self {
            neighbours: 20,
            epochs: 30,
            xyz_learning_rate: 0.05,
            r_learning_rate: 0.25,
            initial_offset: 0.01,
            initial_radius: 0.15,
            output: CurvatureOutput::Radius,
            layer: "Curvatures".into(),
        }
    }
}

impl CurvatureConfig {
    pub fn validate(&self) -> Result<()> {
        at_least_one("curvature.neighbours", self.neighbours)?;
        at_least_one("curvature.epochs", self.epochs)?;
        positive("curvature.xyz_learning_rate", self.xyz_learning_rate)?;
        positive("curvature.r_learning_rate", self.r_learning_rate)?;
        positive("curvature.initial_radius", self.initial_radius)?;
        if !self.initial_offset.is_finite() {
            return Err(Error::invalid("curvature.initial_offset", "must be finite"));
        }
        if self.layer.is_empty() {
            return Err(Error::invalid("curvature.layer", "layer name is empty"));
        }
        Ok(())
    }
}

/// How the smoother reads neighbour coordinates while it rewrites the cloud.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Neighbours are read from the live cloud, so points later in cloud
    /// order see coordinates already projected earlier in the same pass.
    #[default]
    Sequential,
    /// Neighbours are read from a copy taken before the pass; all projections
    /// are committed together at the end. Output is independent of order.
    Snapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub neighbours: usize,
    pub mode: SmoothingMode,
}

impl Default for SmoothingConfig {
    fn default() -> Self { Self { neighbours: 25, mode: SmoothingMode::Sequential } }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<()> {
        at_least_one("smoothing.neighbours", self.neighbours)
    }
}

/// Calibration points of the original capture site. The reference plane is
/// the best-fit plane through them.
pub const DEFAULT_REFERENCE_POINTS: [[f64; 3]; 4] = [
    [-22.6403, 11.2198, -90.7701],
    [-35.1771, -27.5203, -92.5725],
    [-1.0683, -30.5571, -91.7308],
    [23.9246, 0.1567, -88.2513],
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoofConfig {
    pub neighbours: usize,
    /// A local normal within this many radians of vertical (either
    /// direction) counts as a horizontal surface.
    pub angle_tolerance: f64,
    pub reference_points: Vec<[f64; 3]>,
    pub layer: String,
}

impl Default for RoofConfig {
    fn default() -> Self {
        Self {
            neighbours: 25,
            angle_tolerance: 0.2618,
            reference_points: DEFAULT_REFERENCE_POINTS.to_vec(),
            layer: "buildings".into(),
        }
    }
}

impl RoofConfig {
    pub fn validate(&self) -> Result<()> {
        at_least_one("roofs.neighbours", self.neighbours)?;
        let tol = self.angle_tolerance;
        if !(tol.is_finite() && tol > 0.0 && tol < std::f64::consts::FRAC_PI_2) {
            return Err(Error::invalid("roofs.angle_tolerance", format!("must be in (0, π/2), got {tol}")));
        }
        if self.reference_points.len() < 3 {
            return Err(Error::invalid(
                "roofs.reference_points",
                format!("need at least 3 points, got {}", self.reference_points.len()),
            ));
        }
        if self.reference_points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::invalid("roofs.reference_points", "coordinates must be finite"));
        }
        if self.layer.is_empty() {
            return Err(Error::invalid("roofs.layer", "layer name is empty"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub neighbours: usize,
    pub sweeps: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self { Self { neighbours: 100, sweeps: 30 } }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        at_least_one("segmentation.neighbours", self.neighbours)?;
        at_least_one("segmentation.sweeps", self.sweeps)
    }
}

/// Horizontal disc filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PancakeConfig {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Default for PancakeConfig {
    fn default() -> Self { Self { center: [0.0, 0.0], radius: 50.0 } }
}

impl PancakeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius >= 1.0) {
            return Err(Error::invalid("pancake.radius", format!("must be at least 1, got {}", self.radius)));
        }
        if self.center.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid("pancake.center", "coordinates must be finite"));
        }
        Ok(())
    }
}

/// Smoothing → roof classification → label propagation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub smoothing: SmoothingConfig,
    pub roofs: RoofConfig,
    pub segmentation: SegmentationConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.roofs.validate()?;
        self.segmentation.validate()
    }
}
