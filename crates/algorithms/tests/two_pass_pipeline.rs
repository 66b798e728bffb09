//! Integration tests running the full two-pass representativeness
//! pipeline on synthetic surfaces.

use repseed_algorithms::segmentation::{
    fast_representativeness, generalize, roughness, FastRepresentativenessParams,
};
use repseed_core::{GeoTransform, Raster};

/// Rolling synthetic terrain with enough relief for defined
/// representativeness everywhere.
fn rolling_surface(rows: usize, cols: usize, cell_size: f64) -> Raster<f64> {
    let mut grid = Raster::new(rows, cols);
    grid.set_transform(GeoTransform::new(0.0, rows as f64 * cell_size, cell_size, -cell_size));
    grid.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let z = (row as f64 * 0.11).sin() * 25.0
                + (col as f64 * 0.07).cos() * 18.0
                + ((row * 3 + col * 5) % 17) as f64 * 0.4;
            grid.set(row, col, z).unwrap();
        }
    }
    grid
}

#[test]
fn full_pipeline_output_contract() {
    let input = rolling_surface(100, 100, 30.0);

    let params = FastRepresentativenessParams {
        level_of_generalization: 10.0,
        ..Default::default()
    };
    let output = fast_representativeness(&input, params).unwrap();

    // Fine roughness keeps the input footprint
    assert_eq!(output.roughness.shape(), (100, 100));
    assert!((output.roughness.cell_size() - 30.0).abs() < 1e-10);

    // Generalized outputs: ceil(100/10)+1 cells per axis at 10x cell size
    assert_eq!(output.generalized.shape(), (11, 11));
    assert_eq!(output.seeds.shape(), (11, 11));
    assert!((output.generalized.cell_size() - 300.0).abs() < 1e-10);

    // Seeds are binary
    for &v in output.seeds.data().iter() {
        assert!(v.is_nan() || v == 1.0);
    }

    // The varied surface has defined roughness over most of the grid
    let finite = output
        .roughness
        .data()
        .iter()
        .filter(|v| v.is_finite())
        .count();
    assert!(finite > 9000, "only {finite} defined cells");
}

#[test]
fn passes_are_pure_functions_of_their_input() {
    let input = rolling_surface(64, 64, 1.0);

    let first = roughness(&input, 12).unwrap();
    let second = roughness(&input, 12).unwrap();

    for (a, b) in first.data().iter().zip(second.data().iter()) {
        assert!((a.is_nan() && b.is_nan()) || a == b, "{a} vs {b}");
    }
}

#[test]
fn coarse_pass_matches_manual_generalization() {
    let input = rolling_surface(80, 80, 5.0);

    let coarse_input = generalize(&input, 8.0);
    assert_eq!(coarse_input.shape(), (11, 11));
    assert!((coarse_input.cell_size() - 40.0).abs() < 1e-10);

    // The coarse grid feeds the second pass unchanged
    let coarse_rough = roughness(&coarse_input, 12).unwrap();
    assert_eq!(coarse_rough.shape(), coarse_input.shape());
    assert!((coarse_rough.cell_size() - 40.0).abs() < 1e-10);
}

#[test]
fn nodata_regions_propagate_to_all_outputs() {
    let mut input = rolling_surface(64, 64, 1.0);
    for row in 20..28 {
        for col in 20..28 {
            input.set(row, col, f64::NAN).unwrap();
        }
    }

    let output =
        fast_representativeness(&input, FastRepresentativenessParams::default()).unwrap();

    // Cells inside the hole have no representativeness
    for row in 20..28 {
        for col in 20..28 {
            assert!(output.roughness.get(row, col).unwrap().is_nan());
        }
    }
}

#[test]
fn constant_surface_yields_no_seeds_or_roughness() {
    let mut input: Raster<f64> = Raster::filled(64, 64, 5.0);
    input.set_transform(GeoTransform::new(0.0, 64.0, 1.0, -1.0));
    input.set_nodata(Some(f64::NAN));

    let output =
        fast_representativeness(&input, FastRepresentativenessParams::default()).unwrap();

    assert!(output.roughness.data().iter().all(|v| v.is_nan()));
    assert!(output.seeds.data().iter().all(|v| v.is_nan()));
}
