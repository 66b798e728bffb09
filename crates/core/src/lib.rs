//! # repseed Core
//!
//! Core types and I/O for the repseed representativeness toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type with no-data handling
//! - `GeoTransform`: Affine transformation for georeferencing
//! - Native GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement, RasterStatistics};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
}
