//! repseed CLI - representativeness analysis and segmentation seeding

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use repseed_algorithms::segmentation::{fast_representativeness, FastRepresentativenessParams};
use repseed_core::io::{read_geotiff, write_geotiff};
use repseed_core::Raster;

#[derive(Parser)]
#[command(name = "repseed")]
#[command(author, version, about = "Fast representativeness analysis for raster segmentation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Two-pass representativeness analysis with seed detection
    Representativeness {
        /// Input raster file
        input: PathBuf,
        /// Output file for the full-resolution representativeness raster
        #[arg(short, long)]
        roughness: PathBuf,
        /// Output file for the smoothed generalized representativeness raster
        #[arg(short, long)]
        generalized: PathBuf,
        /// Output file for the binary seed-point raster
        #[arg(short, long)]
        seeds: PathBuf,
        /// Down-sampling factor for the coarse pass
        #[arg(short, long, default_value = "16.0")]
        level_of_generalization: f64,
        /// Number of annulus radii in the offset table
        #[arg(short, long, default_value = "12")]
        max_radius: usize,
        /// Offset table size for the coarse pass (defaults to --max-radius)
        #[arg(long)]
        coarse_max_radius: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Representativeness {
            input,
            roughness,
            generalized,
            seeds,
            level_of_generalization,
            max_radius,
            coarse_max_radius,
        } => cmd_representativeness(
            &input,
            &roughness,
            &generalized,
            &seeds,
            FastRepresentativenessParams {
                level_of_generalization,
                max_radius,
                coarse_max_radius,
            },
        ),
    }
}

fn load_raster(path: &PathBuf) -> Result<Raster<f64>> {
    info!("reading {}", path.display());
    read_geotiff::<f64, _>(path).with_context(|| format!("failed to read {}", path.display()))
}

fn cmd_info(input: &PathBuf) -> Result<()> {
    let raster = load_raster(input)?;
    let (rows, cols) = raster.shape();
    let (min_x, min_y, max_x, max_y) = raster.bounds();
    let stats = raster.statistics();

    println!("File:      {}", input.display());
    println!("Size:      {} cols x {} rows", cols, rows);
    println!("Cell size: {}", raster.cell_size());
    println!("Bounds:    ({min_x}, {min_y}) - ({max_x}, {max_y})");
    println!(
        "Values:    min={:?} max={:?} mean={:?} std={:?}",
        stats.min, stats.max, stats.mean, stats.std_dev
    );
    println!(
        "Cells:     {} valid, {} no-data",
        stats.valid_count, stats.nodata_count
    );

    Ok(())
}

fn cmd_representativeness(
    input: &PathBuf,
    roughness_path: &PathBuf,
    generalized_path: &PathBuf,
    seeds_path: &PathBuf,
    params: FastRepresentativenessParams,
) -> Result<()> {
    let raster = load_raster(input)?;

    info!(
        "running two-pass representativeness (LoG={}, max_radius={})",
        params.level_of_generalization, params.max_radius
    );
    let start = Instant::now();
    let output = fast_representativeness(&raster, params)
        .context("representativeness analysis failed")?;
    info!("analysis finished in {:.2?}", start.elapsed());

    write_geotiff(&output.roughness, roughness_path)
        .with_context(|| format!("failed to write {}", roughness_path.display()))?;
    write_geotiff(&output.generalized, generalized_path)
        .with_context(|| format!("failed to write {}", generalized_path.display()))?;
    write_geotiff(&output.seeds, seeds_path)
        .with_context(|| format!("failed to write {}", seeds_path.display()))?;

    let seed_count = output.seeds.data().iter().filter(|&&v| v == 1.0).count();
    info!(
        "wrote {} seed points at {}x generalization",
        seed_count, output.generalized.cell_size() / raster.cell_size()
    );

    Ok(())
}
