//! Fast representativeness analysis
//!
//! Estimates, for every cell, how "typical" its value is for the
//! surrounding terrain: the RMS deviation at the finest scale divided by
//! the average growth of deviation across scales (and halved). Smooth
//! neighborhoods score long representativeness lengths, rough ones short.
//! Deviations are estimated per scale from the block-sum pyramid, so each
//! pixel costs a constant amount of work per pyramid level.
//!
//! The two-pass driver (Boehner & Selige's segmentation seeding scheme)
//! runs the analysis at full resolution, re-runs it on a generalized
//! (down-sampled) copy of the input, smooths the coarse result and marks
//! local extrema as seed points for downstream region growing.

use ndarray::Array2;
use rayon::prelude::*;
use repseed_core::raster::Raster;
use repseed_core::{Error, Result};

use super::annulus::AnnulusTable;
use super::pyramid::VariancePyramid;
use super::seeds::detect_seeds;

/// Annulus sampled per pyramid level beyond the first
const LEVEL_RADIUS: usize = 4;

/// Half-width of the box filter applied to the generalized roughness
const SMOOTH_RADIUS: usize = 3;

/// Half-width of the local extrema search window
const EXTREMA_RADIUS: usize = 2;

/// Parameters for the two-pass representativeness analysis
#[derive(Debug, Clone)]
pub struct FastRepresentativenessParams {
    /// Down-sampling factor for the coarse pass (>= 1)
    pub level_of_generalization: f64,
    /// Number of annulus radii in the offset table
    pub max_radius: usize,
    /// Offset table size for the coarse pass; `None` reuses `max_radius`
    pub coarse_max_radius: Option<usize>,
}

impl Default for FastRepresentativenessParams {
    fn default() -> Self {
        Self {
            level_of_generalization: 16.0,
            max_radius: AnnulusTable::DEFAULT_MAX_RADIUS,
            coarse_max_radius: None,
        }
    }
}

/// Output rasters of the two-pass analysis
#[derive(Debug)]
pub struct FastRepresentativenessOutput {
    /// Representativeness length at full resolution (NaN = undefined)
    pub roughness: Raster<f64>,
    /// Smoothed representativeness of the generalized grid
    pub generalized: Raster<f64>,
    /// Seed points at the generalized resolution: 1.0 at extrema, NaN elsewhere
    pub seeds: Raster<f64>,
}

/// Representativeness length of one cell, or `None` where undefined.
///
/// Accumulates the annulus deviation estimates level by level (ring 1 at
/// level 0, then ring 4 at each coarser level), normalizes them to RMS
/// deviations and fits an inverse-distance weighted average slope of
/// deviation versus spatial scale. A zero slope (flat surface, or no valid
/// neighbor at any scale) has no defined representativeness.
pub fn representativeness_at(
    pyramid: &VariancePyramid,
    table: &AnnulusTable,
    row: usize,
    col: usize,
) -> Option<f64> {
    if pyramid.center_value(row, col).is_nan() {
        return None;
    }

    let depth = pyramid.depth();
    let cell_size = pyramid.cell_size();
    let mut v = vec![0.0; depth];
    let mut z = vec![0.0; depth];

    let (v0, z0) = pyramid.ring_variance(table, row, col, 1, 0);
    v[0] = v0;
    z[0] = z0;

    for level in 1..depth {
        let (dv, dz) = pyramid.ring_variance(table, row, col, LEVEL_RADIUS, level - 1);
        v[level] = v[level - 1] + dv;
        z[level] = z[level - 1] + dz;
    }

    // RMS deviation per level; +1 in the denominator guards empty rings
    for level in 0..depth {
        v[level] = (v[level] / (z[level] + 1.0)).sqrt();
    }

    let mut weighted_slope = 0.0;
    let mut weight_total = 0.0;
    for level in 0..depth {
        let slope = if level == 0 {
            v[0] / cell_size
        } else {
            (v[level] - v[level - 1]) / (cell_size * (1u64 << level) as f64)
        };
        weighted_slope += slope * pyramid.weights()[level];
        weight_total += pyramid.weights()[level];
    }

    let slope = weighted_slope / weight_total;
    if slope == 0.0 {
        return None;
    }

    Some(v[depth - 1] / slope / 2.0)
}

/// One full-grid representativeness sweep.
///
/// Builds the pyramid and the annulus table, then evaluates every cell.
/// Rows are processed in parallel; the pyramid and table are shared
/// read-only. Undefined cells come out as NaN.
pub fn roughness(input: &Raster<f64>, max_radius: usize) -> Result<Raster<f64>> {
    if max_radius < LEVEL_RADIUS {
        return Err(Error::InvalidParameter {
            name: "max_radius",
            value: max_radius.to_string(),
            reason: format!("must cover the per-level sampling radius {LEVEL_RADIUS}"),
        });
    }

    let pyramid = VariancePyramid::build(input)?;
    let table = AnnulusTable::new(max_radius);
    let (rows, cols) = input.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    representativeness_at(&pyramid, &table, row, col).unwrap_or(f64::NAN)
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut output = input.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Down-sample the input by `factor` with anchor (nearest) resampling.
///
/// The generalized grid has `ceil(n / factor) + 1` cells per axis at
/// `factor` times the cell size, anchored at the same origin.
pub fn generalize(input: &Raster<f64>, factor: f64) -> Raster<f64> {
    let (rows, cols) = input.shape();
    let out_rows = (rows as f64 / factor).ceil() as usize + 1;
    let out_cols = (cols as f64 / factor).ceil() as usize + 1;

    let mut output = input.with_same_meta::<f64>(out_rows, out_cols);
    output.set_transform(input.transform().scaled(factor));
    output.set_nodata(Some(f64::NAN));

    for r in 0..out_rows {
        let src_r = ((r as f64 * factor) as usize).min(rows - 1);
        for c in 0..out_cols {
            let src_c = ((c as f64 * factor) as usize).min(cols - 1);
            let v = unsafe { input.get_unchecked(src_r, src_c) };
            let v = if input.is_nodata(v) { f64::NAN } else { v };
            unsafe { output.set_unchecked(r, c, v) };
        }
    }

    output
}

/// Box-filter with a variable-count average: out-of-grid and NaN neighbors
/// are skipped, an all-NaN window stays NaN.
fn box_smooth(input: &Raster<f64>, radius: usize) -> Result<Raster<f64>> {
    let (rows, cols) = input.shape();
    let r = radius as isize;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                let mut count = 0usize;

                for dr in -r..=r {
                    for dc in -r..=r {
                        let nr = row as isize + dr;
                        let nc = col as isize + dc;
                        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                            continue;
                        }
                        let v = unsafe { input.get_unchecked(nr as usize, nc as usize) };
                        if !v.is_nan() {
                            sum += v;
                            count += 1;
                        }
                    }
                }

                if count > 0 {
                    *out = sum / count as f64;
                }
            }

            row_data
        })
        .collect();

    let mut output = input.like(f64::NAN);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Two-pass representativeness analysis with seed detection.
///
/// Runs [`roughness`] at full resolution, again on a generalized copy of
/// the input, smooths the coarse result with a 7x7 box filter and marks
/// local extrema of the smoothed surface as segmentation seeds. Each pass
/// is a pure function of its own input grid.
pub fn fast_representativeness(
    input: &Raster<f64>,
    params: FastRepresentativenessParams,
) -> Result<FastRepresentativenessOutput> {
    if !(params.level_of_generalization >= 1.0) {
        return Err(Error::InvalidParameter {
            name: "level_of_generalization",
            value: params.level_of_generalization.to_string(),
            reason: "must be >= 1".into(),
        });
    }

    let fine = roughness(input, params.max_radius)?;

    let coarse_input = generalize(input, params.level_of_generalization);
    let coarse_radius = params.coarse_max_radius.unwrap_or(params.max_radius);
    let coarse = roughness(&coarse_input, coarse_radius)?;

    let smoothed = box_smooth(&coarse, SMOOTH_RADIUS)?;
    let seeds = detect_seeds(&smoothed, EXTREMA_RADIUS);

    Ok(FastRepresentativenessOutput {
        roughness: fine,
        generalized: smoothed,
        seeds,
    })
}
