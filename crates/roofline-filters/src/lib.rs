//! roofline-filters — plane-projection smoothing and spatial cuts.

mod pancake;
mod smooth;

pub use pancake::pancake_cut;
pub use smooth::{smooth_cloud, SmoothStats};
