//! Representativeness analysis and seed detection for raster segmentation
//!
//! - **annulus**: Ring-shaped neighborhood offset tables
//! - **pyramid**: Block-sum pyramid and fast local variance estimation
//! - **representativeness**: Per-cell representativeness and the two-pass driver
//! - **seeds**: Local extrema detection with clustering suppression

pub mod annulus;
pub mod pyramid;
pub mod representativeness;
pub mod seeds;

pub use annulus::AnnulusTable;
pub use pyramid::VariancePyramid;
pub use representativeness::{
    fast_representativeness, generalize, representativeness_at, roughness,
    FastRepresentativenessOutput, FastRepresentativenessParams,
};
pub use seeds::detect_seeds;
