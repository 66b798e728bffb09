//! # repseed Algorithms
//!
//! Neighborhood statistics for raster segmentation seeding: a
//! multi-resolution representativeness estimator over 2D grids, after the
//! fast representativeness approach of Boehner & Selige.
//!
//! The engine consumes an in-memory raster (values, no-data mask, cell
//! size) and produces a representativeness raster, a generalized
//! coarse-resolution copy and a binary seed-point raster for downstream
//! region growing.

pub mod segmentation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::segmentation::{
        fast_representativeness, roughness, AnnulusTable, FastRepresentativenessOutput,
        FastRepresentativenessParams, VariancePyramid,
    };
    pub use repseed_core::prelude::*;
}
