//! Block-sum image pyramid for fast local variance estimation
//!
//! The pyramid stores, per level, the block sums and block sums-of-squares
//! of a standardized, mirror-padded copy of the input raster. Summing a
//! handful of block-aggregated cells over an annulus then yields the local
//! sum of squared deviations without revisiting the original pixels, which
//! keeps the per-pixel work constant per level regardless of the spatial
//! radius it represents.

use ndarray::Array2;
use repseed_core::raster::Raster;
use repseed_core::{Error, Result};

use super::annulus::AnnulusTable;

/// Epsilon guarding `log2` against false rounding at exact powers of two
const POW2_EPSILON: f64 = 1e-6;

/// Multi-resolution sum / sum-of-squares pyramid over one raster.
///
/// Level 0 is the standardized padded grid itself; each further level sums
/// disjoint 2x2 blocks of the previous one, halving both dimensions. A
/// cell is NaN at level `k+1` iff any of its four contributing cells at
/// level `k` is NaN. All levels are owned by the pyramid and freed with it.
#[derive(Debug)]
pub struct VariancePyramid {
    sum: Vec<Array2<f64>>,
    qsum: Vec<Array2<f64>>,
    /// Inverse-distance weight per level: `1 / (cell_size * 2^level)`
    weights: Vec<f64>,
    cell_size: f64,
}

impl VariancePyramid {
    /// Build the pyramid for an input raster.
    ///
    /// Fails with [`Error::InvalidDimensions`] for an empty raster and
    /// [`Error::InvalidParameter`] for a non-positive cell size.
    pub fn build(input: &Raster<f64>) -> Result<Self> {
        let (rows, cols) = input.shape();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let cell_size = input.cell_size();
        if cell_size <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "cell_size",
                value: cell_size.to_string(),
                reason: "must be positive".into(),
            });
        }

        let mut padded = mirror_pad(input);
        standardize(&mut padded);

        let max_dim = padded.nrows().max(padded.ncols());
        let depth = (max_dim.ilog2() as usize).saturating_sub(1).max(1);

        let qsum0 = padded.mapv(|v| v * v);
        let mut sum = Vec::with_capacity(depth);
        let mut qsum = Vec::with_capacity(depth);
        sum.push(padded);
        qsum.push(qsum0);

        for level in 1..depth {
            sum.push(halve(&sum[level - 1]));
            qsum.push(halve(&qsum[level - 1]));
        }

        let weights = (0..depth)
            .map(|level| 1.0 / (cell_size * (1u64 << level) as f64))
            .collect();

        Ok(Self {
            sum,
            qsum,
            weights,
            cell_size,
        })
    }

    /// Number of pyramid levels
    pub fn depth(&self) -> usize {
        self.sum.len()
    }

    /// Cell size of the source raster (map units per level-0 cell)
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Inverse-distance weights, one per level
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Dimensions (rows, cols) of a pyramid level
    pub fn level_shape(&self, level: usize) -> (usize, usize) {
        self.sum[level].dim()
    }

    /// Standardized value of a level-0 cell (NaN = no-data)
    pub fn center_value(&self, row: usize, col: usize) -> f64 {
        self.sum[0][(row, col)]
    }

    /// Block sum at a pyramid level (test/diagnostic access)
    pub fn sum_at(&self, level: usize, row: usize, col: usize) -> f64 {
        self.sum[level][(row, col)]
    }

    /// Estimate the local sum of squared deviations around a level-0 cell.
    ///
    /// Sums block aggregates over the annulus `radius` of `table`, with
    /// offsets applied at `level` resolution. Out-of-bounds and no-data
    /// blocks are skipped. Returns `(sum_sq_dev, weighted_count)` where
    /// the count weighs each block by its `4^level` source pixels. The
    /// deviation estimate expands `sum((v - z)^2)` from the first and
    /// second block moments and is clamped to zero against floating-point
    /// negatives.
    pub fn ring_variance(
        &self,
        table: &AnnulusTable,
        row: usize,
        col: usize,
        radius: usize,
        level: usize,
    ) -> (f64, f64) {
        let z = self.sum[0][(row, col)];
        let (level_rows, level_cols) = self.sum[level].dim();
        let block = ((1u64 << level) * (1u64 << level)) as f64;
        let center_row = (row >> level) as isize;
        let center_col = (col >> level) as isize;

        let mut n = 0.0;
        let mut s = 0.0;
        let mut q = 0.0;

        for &(dc, dr) in table.ring(radius) {
            let r = center_row + dr;
            let c = center_col + dc;
            if r < 0 || c < 0 || r >= level_rows as isize || c >= level_cols as isize {
                continue;
            }

            let sv = self.sum[level][(r as usize, c as usize)];
            if sv.is_nan() {
                continue;
            }

            n += block;
            s += sv;
            q += self.qsum[level][(r as usize, c as usize)];
        }

        let sum_sq_dev = (q + z * (n * z - 2.0 * s)).max(0.0);
        (sum_sq_dev, n)
    }
}

/// Round up to the next power of two, with an epsilon so that exact powers
/// of two are not inflated by `log2` rounding
fn next_power_of_two(n: usize) -> usize {
    let exp = ((n as f64).log2() - POW2_EPSILON).ceil().max(0.0) as u32;
    1usize << exp
}

/// Copy the input into a power-of-two grid, reflecting edge rows/columns
/// beyond the original extent. No-data cells become NaN.
fn mirror_pad(input: &Raster<f64>) -> Array2<f64> {
    let (rows, cols) = input.shape();
    let padded_rows = next_power_of_two(rows);
    let padded_cols = next_power_of_two(cols);

    Array2::from_shape_fn((padded_rows, padded_cols), |(r, c)| {
        let src_r = if r < rows { r } else { 2 * rows - r - 1 };
        let src_c = if c < cols { c } else { 2 * cols - c - 1 };
        let v = unsafe { input.get_unchecked(src_r, src_c) };
        if input.is_nodata(v) {
            f64::NAN
        } else {
            v
        }
    })
}

/// Mean-center and unit-variance scale the valid cells in place
fn standardize(grid: &mut Array2<f64>) {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0usize;

    for &v in grid.iter() {
        if !v.is_nan() {
            sum += v;
            sum_sq += v * v;
            count += 1;
        }
    }

    if count == 0 {
        return;
    }

    let mean = sum / count as f64;
    let std_dev = (sum_sq / count as f64 - mean * mean).max(0.0).sqrt();

    if std_dev > 0.0 {
        grid.mapv_inplace(|v| (v - mean) / std_dev);
    } else {
        grid.mapv_inplace(|v| v - mean);
    }
}

/// Sum disjoint 2x2 blocks, halving both dimensions (floor at 1). A result
/// cell is NaN if any of its four source cells is NaN or out of bounds.
fn halve(level: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = level.dim();
    let out_rows = rows.div_ceil(2);
    let out_cols = cols.div_ceil(2);

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let mut total = 0.0;
        for dr in 0..2 {
            for dc in 0..2 {
                let sr = 2 * r + dr;
                let sc = 2 * c + dc;
                if sr >= rows || sc >= cols {
                    return f64::NAN;
                }
                total += level[(sr, sc)];
            }
        }
        total
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repseed_core::GeoTransform;

    fn raster_from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut r = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r.set_nodata(Some(f64::NAN));
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        r
    }

    fn checkerboard(size: usize) -> Raster<f64> {
        raster_from_fn(size, size, |r, c| ((r + c) % 2) as f64)
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(2), 2);
        assert_eq!(next_power_of_two(5), 8);
        assert_eq!(next_power_of_two(8), 8);
        assert_eq!(next_power_of_two(100), 128);
        assert_eq!(next_power_of_two(1024), 1024);
    }

    #[test]
    fn test_mirror_padding_symmetry() {
        let input = raster_from_fn(5, 6, |r, c| (r * 10 + c) as f64);
        let padded = mirror_pad(&input);

        assert_eq!(padded.dim(), (8, 8));

        // x-overflow mirrors across the right edge
        for r in 0..5 {
            for c in 6..8 {
                assert_eq!(padded[(r, c)], padded[(r, 2 * 6 - c - 1)]);
            }
        }
        // y-overflow mirrors across the bottom edge
        for r in 5..8 {
            for c in 0..6 {
                assert_eq!(padded[(r, c)], padded[(2 * 5 - r - 1, c)]);
            }
        }
        // corner overflow mirrors across both axes
        for r in 5..8 {
            for c in 6..8 {
                assert_eq!(padded[(r, c)], padded[(2 * 5 - r - 1, 2 * 6 - c - 1)]);
            }
        }
    }

    #[test]
    fn test_standardize_zero_mean_unit_variance() {
        let input = raster_from_fn(16, 16, |r, c| (r * 16 + c) as f64);
        let mut padded = mirror_pad(&input);
        standardize(&mut padded);

        let n = padded.len() as f64;
        let mean = padded.iter().sum::<f64>() / n;
        let var = padded.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        assert!(mean.abs() < 1e-10, "mean {mean}");
        assert!((var - 1.0).abs() < 1e-10, "variance {var}");
    }

    #[test]
    fn test_level_dimensions_halve() {
        let input = raster_from_fn(100, 60, |r, c| (r + c) as f64);
        let pyramid = VariancePyramid::build(&input).unwrap();

        // padded to 128 x 64, depth = log2(128) - 1 = 6
        assert_eq!(pyramid.depth(), 6);
        assert_eq!(pyramid.level_shape(0), (128, 64));

        for level in 1..pyramid.depth() {
            let (ph, pw) = pyramid.level_shape(level - 1);
            assert_eq!(pyramid.level_shape(level), (ph.div_ceil(2), pw.div_ceil(2)));
        }
    }

    #[test]
    fn test_nodata_propagates_through_levels() {
        let mut input = raster_from_fn(8, 8, |_, _| 1.0);
        input.set(2, 3, f64::NAN).unwrap();
        // Break the flat surface so standardization keeps distinct values
        input.set(0, 0, 5.0).unwrap();

        let pyramid = VariancePyramid::build(&input).unwrap();

        // Level 1 block containing (2,3) is NaN, its neighbors are not
        assert!(pyramid.sum_at(1, 1, 1).is_nan());
        assert!(!pyramid.sum_at(1, 1, 0).is_nan());
        assert!(!pyramid.sum_at(1, 2, 1).is_nan());
    }

    #[test]
    fn test_block_sums_match_direct_summation() {
        let input = raster_from_fn(16, 16, |r, c| (r * 16 + c) as f64);
        let pyramid = VariancePyramid::build(&input).unwrap();

        // Level 2 cell (0,0) aggregates the 4x4 block of level-0 cells
        let mut expected = 0.0;
        for r in 0..4 {
            for c in 0..4 {
                expected += pyramid.center_value(r, c);
            }
        }
        assert!((pyramid.sum_at(2, 0, 0) - expected).abs() < 1e-10);
    }

    #[test]
    fn test_ring_variance_non_negative() {
        // Nearly identical values stress the moment expansion
        let input = raster_from_fn(16, 16, |r, c| 1000.0 + ((r * 16 + c) as f64) * 1e-12);
        let pyramid = VariancePyramid::build(&input).unwrap();
        let table = AnnulusTable::new(12);

        for row in 0..16 {
            for col in 0..16 {
                for level in 0..pyramid.depth() {
                    let (v, _) = pyramid.ring_variance(&table, row, col, 4, level);
                    assert!(v >= 0.0, "negative variance at ({row},{col}) level {level}");
                }
            }
        }
    }

    #[test]
    fn test_checkerboard_ring_variance() {
        let input = checkerboard(4);
        let pyramid = VariancePyramid::build(&input).unwrap();
        let table = AnnulusTable::new(4);

        // Standardized checkerboard alternates -1 / +1; every rook
        // neighbor of an interior cell has the opposite value, so the
        // sum of squared deviations over ring 1 is 4 * (2)^2 = 16.
        let (v, n) = pyramid.ring_variance(&table, 1, 1, 1, 0);
        assert_eq!(n, 4.0);
        assert!((v - 16.0).abs() < 1e-10, "got {v}");

        // A corner cell only sees its in-bounds neighbors
        let (v, n) = pyramid.ring_variance(&table, 0, 0, 1, 0);
        assert_eq!(n, 2.0);
        assert!((v - 8.0).abs() < 1e-10, "got {v}");
    }

    #[test]
    fn test_empty_input_rejected() {
        let input: Raster<f64> = Raster::new(0, 10);
        assert!(VariancePyramid::build(&input).is_err());
    }
}
