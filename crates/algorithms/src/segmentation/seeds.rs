//! Local extrema detection for segmentation seeds
//!
//! Seeds are cells of the smoothed, generalized representativeness raster
//! that are local maxima or minima of their surrounding window. A seed
//! already placed inside the window suppresses further candidates, which
//! keeps seeds from clustering. The scan is row-major, so suppression is
//! deterministic: among equal-valued adjacent extrema the first in scan
//! order wins.

use repseed_core::raster::Raster;

/// Mark local extrema of `input` as seed cells.
///
/// A cell qualifies when it is valid, has at least one valid neighbor in
/// the `(2*radius+1)^2` window, no neighbor exceeds it (maximum) or none
/// undercuts it (minimum), and no seed has been placed inside the window
/// yet. Only cells with a margin of `radius` to the grid edge are
/// examined. Seed cells hold 1.0, all others NaN.
pub fn detect_seeds(input: &Raster<f64>, radius: usize) -> Raster<f64> {
    let (rows, cols) = input.shape();
    let mut seeds = input.like(f64::NAN);
    seeds.set_nodata(Some(f64::NAN));

    if rows <= 2 * radius || cols <= 2 * radius {
        return seeds;
    }

    let r = radius as isize;

    for row in radius..rows - radius {
        for col in radius..cols - radius {
            let center = unsafe { input.get_unchecked(row, col) };
            if center.is_nan() {
                continue;
            }

            let mut is_max = true;
            let mut is_min = true;
            let mut has_seed = false;
            let mut valid_neighbors = 0usize;

            for dr in -r..=r {
                for dc in -r..=r {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = (row as isize + dr) as usize;
                    let nc = (col as isize + dc) as usize;

                    if unsafe { seeds.get_unchecked(nr, nc) } == 1.0 {
                        has_seed = true;
                    }

                    let v = unsafe { input.get_unchecked(nr, nc) };
                    if v.is_nan() {
                        continue;
                    }
                    valid_neighbors += 1;

                    if v > center {
                        is_max = false;
                    }
                    if v < center {
                        is_min = false;
                    }
                }
            }

            if valid_neighbors > 0 && !has_seed && (is_max || is_min) {
                unsafe { seeds.set_unchecked(row, col, 1.0) };
            }
        }
    }

    seeds
}
