//! PoroVox CLI - Pore-scale core-sample analysis

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use porovox_algorithms::clustering::{
    cluster_pores, cluster_sizes, size_distribution, ClusterParams, ClusteringStrategy,
};
use porovox_algorithms::morphology::{denoise, open, DenoiseParams, OpenParams};
use porovox_backend::{num_cpus, CpuBackend, MorphologyBackend, ProcessingMode};
use porovox_colormap::{
    auto_params, diameter_layer, segmentation_layer, ColorScheme, SOLID,
};
use porovox_core::io::{read_volume, write_volume};
use porovox_core::volume::{LayerImage, Position, Rgba};
use porovox_core::{Image, NullProgress, ProgressAdapter};

#[cfg(feature = "accel")]
use porovox_backend::{WgpuBackend, WgpuContext};
#[cfg(feature = "accel")]
use std::sync::Arc;

/// Pore pixel for phase rendering
const PORE: Rgba = [232, 232, 236, 255];

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "porovox")]
#[command(author, version, about = "Pore-scale core-sample analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a volume file
    Info {
        /// Input volume file
        input: PathBuf,
    },
    /// Generate a synthetic grain-pack volume
    Synth {
        /// Output volume file
        output: PathBuf,
        /// Volume width in voxels
        #[arg(long, default_value = "64")]
        width: i32,
        /// Volume height in voxels
        #[arg(long, default_value = "64")]
        height: i32,
        /// Volume depth in voxels
        #[arg(long, default_value = "64")]
        depth: i32,
        /// Target porosity (pore fraction)
        #[arg(short, long, default_value = "0.35")]
        porosity: f64,
        /// Grain radius range as "min,max"
        #[arg(long, default_value = "3,7")]
        grain_radius: String,
        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Remove thin solid speckle by erode-dilate
    Denoise {
        /// Input volume file
        input: PathBuf,
        /// Output volume file
        output: PathBuf,
        /// Structuring element diameter
        #[arg(short, long, default_value = "3")]
        diameter: i32,
        /// Run single-threaded
        #[arg(long)]
        sequential: bool,
        /// Worker threads for parallel passes
        #[arg(short, long)]
        threads: Option<usize>,
        /// Morphology backend: cpu or gpu
        #[arg(short, long, default_value = "cpu")]
        backend: String,
    },
    /// Run the maximal-ball opener
    Open {
        /// Input volume file
        input: PathBuf,
        /// Output volume file
        output: PathBuf,
        /// Stop after this ball diameter
        #[arg(short, long)]
        max_diameter: Option<i8>,
        /// Denoise at this diameter before opening
        #[arg(long)]
        denoise: Option<i32>,
        /// Run single-threaded
        #[arg(long)]
        sequential: bool,
        /// Worker threads for parallel passes
        #[arg(short, long)]
        threads: Option<usize>,
        /// Morphology backend: cpu or gpu
        #[arg(short, long, default_value = "cpu")]
        backend: String,
    },
    /// Cluster pore voxels into bodies
    Cluster {
        /// Input volume file (must be opened first)
        input: PathBuf,
        /// Output volume file
        output: PathBuf,
        /// Strategy: ball or watershed
        #[arg(short, long, default_value = "ball")]
        strategy: String,
        /// Watershed search radius cap
        #[arg(long, default_value = "4")]
        radius_cap: i32,
        /// Run single-threaded
        #[arg(long)]
        sequential: bool,
        /// Worker threads for parallel passes
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Render one z-slice to a TIFF image
    Render {
        /// Input volume file
        input: PathBuf,
        /// Output TIFF file
        output: PathBuf,
        /// Slice depth
        #[arg(short, long, default_value = "0")]
        z: i32,
        /// Field to render: phase, diameter, cluster
        #[arg(short, long, default_value = "phase")]
        field: String,
        /// Color scheme for diameter rendering
        #[arg(long, default_value = "blue-red")]
        scheme: String,
        /// Ramp low end (defaults to the observed minimum)
        #[arg(long)]
        min: Option<f64>,
        /// Ramp high end (defaults to the observed maximum)
        #[arg(long)]
        max: Option<f64>,
    },
    /// Print analysis statistics, optionally as JSON
    Stats {
        /// Input volume file
        input: PathBuf,
        /// Write JSON to this file instead of a text report
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Progress bar adapter for engine passes
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressAdapter for BarProgress {
    fn set_range(&mut self, steps: usize) {
        if self.bar.is_hidden() {
            self.bar.set_style(
                ProgressStyle::default_bar()
                    .template("{bar:32.cyan/blue} {pos}/{len} {msg}")
                    .unwrap(),
            );
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        self.bar.set_length(steps as u64);
        self.bar.set_position(0);
    }

    fn update(&mut self, step: usize, message: &str) {
        self.bar.set_position(step as u64);
        self.bar.set_message(message.to_string());
    }
}

fn read_image(path: &PathBuf) -> Result<Image> {
    let pb = spinner("Reading volume...");
    let image = read_volume(path, &mut NullProgress)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    let dims = image.dims();
    info!("Input: {} x {} x {}", dims.width, dims.height, dims.depth);
    Ok(image)
}

fn write_image(image: &Image, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing volume...");
    write_volume(image, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn write_tiff(layer: &LayerImage, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing image...");
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut encoder = tiff::encoder::TiffEncoder::new(file).context("TIFF encoder error")?;
    encoder
        .write_image::<tiff::encoder::colortype::RGBA8>(
            layer.width() as u32,
            layer.height() as u32,
            &layer.as_rgba_bytes(),
        )
        .context("Failed to encode TIFF")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn processing_mode(sequential: bool, threads: Option<usize>) -> ProcessingMode {
    match (sequential, threads) {
        (true, _) => ProcessingMode::Sequential,
        (false, Some(n)) => ProcessingMode::ParallelWith(n),
        (false, None) => {
            info!("Using {} worker threads", num_cpus());
            ProcessingMode::Parallel
        }
    }
}

fn parse_backend(name: &str, mode: ProcessingMode) -> Result<Box<dyn MorphologyBackend>> {
    match name.to_lowercase().as_str() {
        "cpu" => Ok(Box::new(CpuBackend::new(mode))),
        #[cfg(feature = "accel")]
        "gpu" | "wgpu" => {
            let context =
                Arc::new(WgpuContext::request().context("No compute adapter available")?);
            Ok(Box::new(WgpuBackend::new(context)?))
        }
        #[cfg(not(feature = "accel"))]
        "gpu" | "wgpu" => {
            anyhow::bail!("This build has no accelerator support; rebuild with --features accel")
        }
        _ => anyhow::bail!("Unknown backend: {}. Use cpu or gpu.", name),
    }
}

fn parse_strategy(s: &str) -> Result<ClusteringStrategy> {
    match s.to_lowercase().as_str() {
        "ball" | "balls" | "maximal-ball" => Ok(ClusteringStrategy::BallGrouping),
        "watershed" | "ws" => Ok(ClusteringStrategy::Watershed),
        _ => anyhow::bail!("Unknown strategy: {}. Use ball or watershed.", s),
    }
}

fn parse_scheme(s: &str) -> Result<ColorScheme> {
    let lower = s.to_lowercase();
    for scheme in ColorScheme::ALL {
        if scheme.name() == lower {
            return Ok(*scheme);
        }
    }
    let names: Vec<&str> = ColorScheme::ALL.iter().map(|s| s.name()).collect();
    anyhow::bail!("Unknown scheme: {}. Use one of: {}.", s, names.join(", "))
}

fn parse_radius_range(s: &str) -> Result<(i32, i32)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("Grain radius must be 'min,max', got: {}", s);
    }
    let min: i32 = parts[0].trim().parse().context("Invalid minimum radius")?;
    let max: i32 = parts[1].trim().parse().context("Invalid maximum radius")?;
    if min < 1 || max < min {
        anyhow::bail!("Grain radius range must satisfy 1 <= min <= max");
    }
    Ok((min, max))
}

/// Stamp random solid spheres until the pore fraction drops to the target.
///
/// Grains overlap freely, so the achieved porosity lands close to but not
/// exactly on the target; the last grain may overshoot by its own volume.
fn synthesize(
    width: i32,
    height: i32,
    depth: i32,
    porosity: f64,
    radii: (i32, i32),
    seed: u64,
) -> Result<Image> {
    if !(0.0..=1.0).contains(&porosity) {
        anyhow::bail!("Porosity must lie in [0, 1], got {}", porosity);
    }
    let mut image = Image::new(width, height, depth)?;
    let total = image.dims().voxel_count();
    let target_solid = ((1.0 - porosity) * total as f64).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut solid = 0usize;

    // Stamping stalls once the pack saturates, so a fixed attempt cap
    // bounds the loop for extreme targets.
    let mut attempts = 0usize;
    while solid < target_solid && attempts < 65536 {
        attempts += 1;
        let r = rng.gen_range(radii.0..=radii.1);
        let cx = rng.gen_range(0..width);
        let cy = rng.gen_range(0..height);
        let cz = rng.gen_range(0..depth);
        let rr = r * r;
        for z in (cz - r).max(0)..=(cz + r).min(depth - 1) {
            for y in (cy - r).max(0)..=(cy + r).min(height - 1) {
                for x in (cx - r).max(0)..=(cx + r).min(width - 1) {
                    let (dx, dy, dz) = (x - cx, y - cy, z - cz);
                    if dx * dx + dy * dy + dz * dz > rr {
                        continue;
                    }
                    let p = Position::new(x, y, z);
                    if !image.get(p)? {
                        image.set(p, true)?;
                        solid += 1;
                    }
                }
            }
        }
    }
    Ok(image)
}

// ─── Stats report ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatsReport {
    width: i32,
    height: i32,
    depth: i32,
    voxels: usize,
    pore_voxels: u64,
    porosity: f64,
    opened: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_diameter: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pore_bodies: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diameter_histogram: Option<BTreeMap<i8, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    largest_bodies: Option<Vec<(i32, u64)>>,
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let image = read_image(&input)?;
            let dims = image.dims();

            println!("File: {}", input.display());
            println!(
                "Dimensions: {} x {} x {} ({} voxels)",
                dims.width,
                dims.height,
                dims.depth,
                dims.voxel_count()
            );
            println!(
                "Pore voxels: {} ({:.1}% porosity)",
                image.black_voxels(),
                100.0 * image.porosity()
            );
            println!("Opened: {}", if image.is_opened() { "yes" } else { "no" });
            if image.is_opened() {
                println!("Max ball diameter: {}", image.pore_map().max_diameter());
                let diameters: Vec<String> =
                    image.processed().keys().map(|d| d.to_string()).collect();
                if !diameters.is_empty() {
                    println!("Retained snapshots: d = {}", diameters.join(", "));
                }
                let sizes = cluster_sizes(&image)?;
                println!("Distinct cluster ids: {}", sizes.len());
            }
        }

        // ── Synth ────────────────────────────────────────────────────
        Commands::Synth {
            output,
            width,
            height,
            depth,
            porosity,
            grain_radius,
            seed,
        } => {
            let radii = parse_radius_range(&grain_radius)?;
            let start = Instant::now();
            let image = synthesize(width, height, depth, porosity, radii, seed)?;
            let elapsed = start.elapsed();
            info!("Achieved porosity: {:.3}", image.porosity());
            write_image(&image, &output)?;
            done("Synthetic volume", &output, elapsed);
        }

        // ── Denoise ──────────────────────────────────────────────────
        Commands::Denoise {
            input,
            output,
            diameter,
            sequential,
            threads,
            backend,
        } => {
            let mode = processing_mode(sequential, threads);
            let backend = parse_backend(&backend, mode)?;
            let mut image = read_image(&input)?;
            let mut progress = BarProgress::new();
            let start = Instant::now();
            denoise(
                &mut image,
                backend.as_ref(),
                &DenoiseParams { diameter, mode },
                &mut progress,
            )
            .context("Failed to denoise")?;
            let elapsed = start.elapsed();
            progress.finish();
            write_image(&image, &output)?;
            done("Denoise", &output, elapsed);
        }

        // ── Open ─────────────────────────────────────────────────────
        Commands::Open {
            input,
            output,
            max_diameter,
            denoise: pre_denoise,
            sequential,
            threads,
            backend,
        } => {
            let mode = processing_mode(sequential, threads);
            let backend = parse_backend(&backend, mode)?;
            let mut image = read_image(&input)?;
            let mut progress = BarProgress::new();
            let start = Instant::now();
            if let Some(diameter) = pre_denoise {
                denoise(
                    &mut image,
                    backend.as_ref(),
                    &DenoiseParams { diameter, mode },
                    &mut progress,
                )
                .context("Failed to denoise")?;
            }
            let report = open(
                &mut image,
                backend.as_ref(),
                &OpenParams { mode, max_diameter },
                &mut progress,
            )
            .context("Failed to open")?;
            let elapsed = start.elapsed();
            progress.finish();
            info!(
                "Opened {} pore voxels in {} rounds, max diameter {}",
                report.pore_voxels, report.rounds, report.max_diameter
            );
            write_image(&image, &output)?;
            done("Opening", &output, elapsed);
        }

        // ── Cluster ──────────────────────────────────────────────────
        Commands::Cluster {
            input,
            output,
            strategy,
            radius_cap,
            sequential,
            threads,
        } => {
            let strategy = parse_strategy(&strategy)?;
            let mode = processing_mode(sequential, threads);
            let mut image = read_image(&input)?;
            let mut progress = BarProgress::new();
            let params = ClusterParams {
                strategy,
                mode,
                watershed_radius_cap: radius_cap,
            };
            let start = Instant::now();
            let report =
                cluster_pores(&mut image, &params, &mut progress).context("Failed to cluster")?;
            let elapsed = start.elapsed();
            progress.finish();
            println!("Pore bodies: {}", report.clusters);
            println!(
                "  {} passes, {} merges ({:?})",
                report.passes, report.merges, report.strategy
            );
            write_image(&image, &output)?;
            done("Clustering", &output, elapsed);
        }

        // ── Render ───────────────────────────────────────────────────
        Commands::Render {
            input,
            output,
            z,
            field,
            scheme,
            min,
            max,
        } => {
            let image = read_image(&input)?;
            let start = Instant::now();
            let layer = match field.to_lowercase().as_str() {
                "phase" | "binary" => image.layer(z, PORE, SOLID)?,
                "diameter" | "diam" => {
                    let scheme = parse_scheme(&scheme)?;
                    let mut params = auto_params(&image, scheme);
                    if let Some(lo) = min {
                        params.min = lo;
                    }
                    if let Some(hi) = max {
                        params.max = hi;
                    }
                    diameter_layer(&image, z, &params)?
                }
                "cluster" | "bodies" => segmentation_layer(&image, z, SOLID)?,
                _ => anyhow::bail!("Unknown field: {}. Use phase, diameter, or cluster.", field),
            };
            let elapsed = start.elapsed();
            write_tiff(&layer, &output)?;
            done("Slice", &output, elapsed);
        }

        // ── Stats ────────────────────────────────────────────────────
        Commands::Stats { input, json } => {
            let image = read_image(&input)?;
            let dims = image.dims();
            let mut report = StatsReport {
                width: dims.width,
                height: dims.height,
                depth: dims.depth,
                voxels: dims.voxel_count(),
                pore_voxels: image.black_voxels(),
                porosity: image.porosity(),
                opened: image.is_opened(),
                max_diameter: None,
                pore_bodies: None,
                diameter_histogram: None,
                largest_bodies: None,
            };
            if image.is_opened() {
                report.max_diameter = Some(image.pore_map().max_diameter());
                let sizes = cluster_sizes(&image)?;
                report.pore_bodies = Some(sizes.len());
                report.largest_bodies = Some(sizes.into_iter().take(10).collect());
                report.diameter_histogram = Some(size_distribution(&image)?);
            }

            match json {
                Some(path) => {
                    let text = serde_json::to_string_pretty(&report)?;
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Statistics saved to: {}", path.display());
                }
                None => {
                    println!("File: {}", input.display());
                    println!(
                        "Dimensions: {} x {} x {}",
                        report.width, report.height, report.depth
                    );
                    println!(
                        "Porosity: {:.2}% ({} of {} voxels)",
                        100.0 * report.porosity,
                        report.pore_voxels,
                        report.voxels
                    );
                    if let Some(d) = report.max_diameter {
                        println!("Max ball diameter: {}", d);
                    }
                    if let Some(n) = report.pore_bodies {
                        println!("Pore bodies: {}", n);
                    }
                    if let Some(hist) = &report.diameter_histogram {
                        println!("\nDiameter histogram:");
                        for (d, count) in hist {
                            println!("  {:>3}: {}", d, count);
                        }
                    }
                    if let Some(bodies) = &report.largest_bodies {
                        println!("\nLargest bodies:");
                        for (id, size) in bodies {
                            println!("  #{}: {} voxels", id, size);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
