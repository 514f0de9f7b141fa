//! GeoRisk CLI - multi-hazard risk assessment

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use georisk_algorithms::classify::{classify, ClassScheme};
use georisk_algorithms::integrate::HazardWeights;
use georisk_algorithms::terrain::{terrain_features, TerrainParams};
use georisk_algorithms::vectorize::{vectorize, Connectivity, VectorizeOptions};
use georisk_core::io::{read_geotiff, write_geotiff};
use georisk_core::{CancellationToken, Raster};
use georisk_pipeline::{
    run_all, run_exposure, run_flood, run_landslide, run_multi_hazard, ExposureRequest, FloodRequest, HazardConfig,
    LandslideOutputs, LandslideRequest, MultiHazardRequest, PipelineOutputs, PipelineReport,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "georisk")]
#[command(author, version, about = "Multi-hazard risk assessment", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Landslide susceptibility from terrain and a landslide inventory
    Landslide {
        /// Train a new model from the inventory instead of loading the stored one
        #[arg(long)]
        train: bool,
        #[arg(long)]
        dem: Option<PathBuf>,
        #[arg(long)]
        landcover: Option<PathBuf>,
        #[arg(long)]
        rainfall: Option<PathBuf>,
        #[arg(long)]
        inventory: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Flood extent from SAR backscatter
    Flood {
        /// Water threshold in dB
        #[arg(short, long, allow_hyphen_values = true)]
        threshold: Option<f64>,
        /// Derive the threshold with Otsu's method (true/false)
        #[arg(long)]
        auto_threshold: Option<bool>,
        #[arg(long)]
        sar: Option<PathBuf>,
        #[arg(long)]
        dem: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Exposure of structures and population on a hazard grid
    Exposure {
        /// Hazard grid defining the output lattice
        hazard: PathBuf,
        #[arg(long)]
        buildings: Option<PathBuf>,
        #[arg(long)]
        population: Option<PathBuf>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Weighted composite of hazard grids
    MultiHazard {
        /// Landslide probability grid
        landslide: PathBuf,
        /// Flood extent grid
        flood: PathBuf,
        /// Exposure density grid
        #[arg(long)]
        exposure: Option<PathBuf>,
        /// Hazard weight as name=value, repeatable (e.g. -w flood=0.5)
        #[arg(short, long = "weight")]
        weights: Vec<String>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Landslide and flood, then exposure, then the composite
    RunAll {
        #[arg(long)]
        train: bool,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Write slope, aspect and curvature of a DEM
    Terrain {
        /// Input DEM file
        input: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Z-factor for unit conversion
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
    },
    /// Classify a continuous grid by ascending breakpoints
    Classify {
        input: PathBuf,
        output: PathBuf,
        /// Comma-separated breakpoints (default: 0.2,0.4,0.6,0.8)
        #[arg(short, long, value_delimiter = ',')]
        breakpoints: Option<Vec<f64>>,
        /// Comma-separated class labels, one more than the breakpoints
        #[arg(short, long, value_delimiter = ',')]
        labels: Option<Vec<String>>,
    },
    /// Convert a classified grid into GeoJSON zones
    Polygonize {
        /// Classified (u8) grid
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Comma-separated class labels (default: the five-class labels)
        #[arg(short, long, value_delimiter = ',')]
        labels: Option<Vec<String>>,
        /// Join diagonal neighbours into one zone
        #[arg(long)]
        eight: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set default subscriber")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn load_config(path: Option<&Path>) -> Result<HazardConfig> {
    match path {
        Some(p) => HazardConfig::from_file(p).with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(HazardConfig::default()),
    }
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...")?;
    let raster: Raster<f64> = read_geotiff(path).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_raster<T: georisk_core::RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...")?;
    write_geotiff(raster, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_weights(pairs: &[String]) -> Result<Option<HazardWeights>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut weights = HazardWeights::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("Weight must be name=value, got '{}'", pair))?;
        let value: f64 = value.trim().parse().with_context(|| format!("Invalid weight '{}'", value))?;
        weights.set(name.trim(), value);
    }
    Ok(Some(weights))
}

/// Run a pipeline behind a spinner, print its report and fail on error
fn run_pipeline<O, F>(name: &'static str, f: F) -> Result<()>
where
    O: PipelineOutputs,
    F: FnOnce() -> georisk_pipeline::Result<O>,
{
    let pb = spinner(&format!("Running {} pipeline...", name))?;
    let start = Instant::now();
    let result = f();
    pb.finish_and_clear();

    let report = PipelineReport::from_result(name, &result);
    println!("{}", report.to_json());
    info!("{} finished in {:.2?}", name, start.elapsed());
    if !report.is_success() {
        bail!("{} pipeline failed: {}", name, report.message);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;
    let cancel = CancellationToken::new();

    match cli.command {
        // ── Pipelines ────────────────────────────────────────────────
        Commands::Landslide {
            train,
            dem,
            landcover,
            rainfall,
            inventory,
            output_dir,
        } => {
            let request = LandslideRequest {
                train_model: train,
                dem,
                landcover,
                rainfall,
                inventory,
                output_dir,
            };
            run_pipeline("landslide", || run_landslide(&config, &request, &cancel))?;
        }

        Commands::Flood {
            threshold,
            auto_threshold,
            sar,
            dem,
            output_dir,
        } => {
            let request = FloodRequest {
                threshold,
                use_auto_threshold: auto_threshold,
                sar,
                dem,
                output_dir,
            };
            run_pipeline("flood", || run_flood(&config, &request, &cancel))?;
        }

        Commands::Exposure {
            hazard,
            buildings,
            population,
            output_dir,
        } => {
            let request = ExposureRequest {
                hazard_grid_path: hazard,
                buildings,
                population,
                output_dir,
            };
            run_pipeline("exposure", || run_exposure(&config, &request, &cancel))?;
        }

        Commands::MultiHazard {
            landslide,
            flood,
            exposure,
            weights,
            output_dir,
        } => {
            let request = MultiHazardRequest {
                landslide,
                flood,
                exposure,
                weights: parse_weights(&weights)?,
                output_dir,
            };
            run_pipeline("multi-hazard", || run_multi_hazard(&config, &request, &cancel))?;
        }

        Commands::RunAll { train, output_dir } => {
            let pb = spinner("Running all pipelines...")?;
            let start = Instant::now();
            let result = run_all(&config, train, output_dir, &cancel);
            pb.finish_and_clear();

            match result {
                Ok(outputs) => {
                    println!("{}", PipelineReport::from_result("landslide", &Ok(outputs.landslide)).to_json());
                    println!("{}", PipelineReport::from_result("flood", &Ok(outputs.flood)).to_json());
                    println!("{}", PipelineReport::from_result("exposure", &Ok(outputs.exposure)).to_json());
                    println!(
                        "{}",
                        PipelineReport::from_result("multi-hazard", &Ok(outputs.multi_hazard)).to_json()
                    );
                    info!("All pipelines finished in {:.2?}", start.elapsed());
                }
                Err(e) => {
                    let report = PipelineReport::from_result::<LandslideOutputs>("run-all", &Err(e));
                    println!("{}", report.to_json());
                    bail!("run-all failed: {}", report.message);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Building blocks ──────────────────────────────────────────
        Commands::Terrain {
            input,
            output_dir,
            z_factor,
        } => {
            let dem = read_raster(&input)?;
            let start = Instant::now();
            let features =
                terrain_features(&dem, TerrainParams { z_factor }).context("Failed to derive terrain features")?;
            let elapsed = start.elapsed();

            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            for (name, grid) in [
                ("slope", &features.slope),
                ("aspect", &features.aspect),
                ("curvature", &features.curvature),
            ] {
                let path = output_dir.join(format!("{}.tif", name));
                write_raster(grid, &path)?;
                done(name, &path, elapsed);
            }
        }

        Commands::Classify {
            input,
            output,
            breakpoints,
            labels,
        } => {
            let scheme = match (breakpoints, labels) {
                (None, None) => ClassScheme::default(),
                (Some(b), Some(l)) => ClassScheme::new(b, l).context("Invalid class scheme")?,
                (Some(b), None) => {
                    let labels = (1..=b.len() + 1).map(|i| format!("class_{}", i)).collect();
                    ClassScheme::new(b, labels).context("Invalid class scheme")?
                }
                (None, Some(_)) => bail!("--labels requires --breakpoints"),
            };
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let result = classify(&raster, &scheme).context("Failed to classify")?;
            let elapsed = start.elapsed();
            write_raster(&result, &output)?;
            done("Classes", &output, elapsed);
        }

        Commands::Polygonize {
            input,
            output,
            labels,
            eight,
        } => {
            let labels = labels.unwrap_or_else(|| ClassScheme::default().labels);
            let pb = spinner("Reading raster...")?;
            let raster: Raster<u8> =
                read_geotiff(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            pb.finish_and_clear();

            let options = VectorizeOptions {
                connectivity: if eight { Connectivity::Eight } else { Connectivity::Four },
                classes: None,
            };
            let start = Instant::now();
            let zones = vectorize(&raster, &labels, &options, &cancel).context("Failed to polygonize")?;
            let elapsed = start.elapsed();
            zones
                .write(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} zones", zones.len());
            done("Zones", &output, elapsed);
        }

        Commands::Config => {
            println!("{}", config.to_json().context("Failed to serialize config")?);
        }
    }

    Ok(())
}
