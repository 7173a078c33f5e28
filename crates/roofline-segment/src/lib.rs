//! roofline-segment — roof candidate classification and building
//! segmentation by minimum-label propagation.

mod pipeline;
mod propagate;
mod roofs;

pub use pipeline::{detect_buildings, BuildingReport};
pub use propagate::{building_ids, propagate_sweep, segment_buildings, SegmentStats};
pub use roofs::{classify_roofs, is_roof_candidate, reference_plane, RoofStats, NOT_ROOF};
