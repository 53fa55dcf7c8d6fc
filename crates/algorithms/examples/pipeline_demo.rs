//! Full pore-analysis pipeline on a synthetic core sample.
//!
//! Builds a 64x64x64 volume with:
//! - A loose packing of spherical solid grains (radius 6..=10)
//! - Isolated single-voxel solid specks in the pore space, mimicking
//!   scanner noise
//!
//! Then runs every stage and reports the results:
//!   1. denoise  - one erosion/dilation pass strips the specks
//!   2. open     - maximal-ball opening assigns per-voxel diameters
//!   3. cluster  - ball grouping, then watershed, segment the pore space
//!   4. render   - middle slice as diameter and cluster images
//!   5. save     - the analyzed volume in the native format
//!
//! Slice images are written as raw RGBA bytes next to the volume; the
//! printed width and height let them be loaded elsewhere.
//!
//! Run:
//!   cargo run -p porovox-algorithms --example pipeline_demo

use std::fs;
use std::path::Path;

use porovox_algorithms::clustering::{
    cluster_pores, cluster_sizes, ClusterParams, ClusteringStrategy,
};
use porovox_algorithms::morphology::{denoise, open, DenoiseParams, OpenParams};
use porovox_backend::{CpuBackend, ProcessingMode};
use porovox_colormap::{auto_params, diameter_layer, segmentation_layer, ColorScheme, SOLID};
use porovox_core::io::write_volume;
use porovox_core::volume::Position;
use porovox_core::{Image, NullProgress};

const EDGE: i32 = 64;

fn main() {
    let out_dir = Path::new("output/pipeline_demo");
    fs::create_dir_all(out_dir).expect("Cannot create output directory");

    // --- 1. Build the synthetic sample ---
    let (mut image, specks) = build_synthetic_volume();
    println!("Synthetic sample: {}x{}x{} voxels", EDGE, EDGE, EDGE);
    print_stats("  input", &image);

    let backend = CpuBackend::new(ProcessingMode::Parallel);

    // --- 2. Denoise (removes the specks) ---
    let params = DenoiseParams {
        diameter: 3,
        mode: ProcessingMode::Parallel,
    };
    denoise(&mut image, &backend, &params, &mut NullProgress).expect("denoise failed");
    print_stats("  denoised", &image);
    let remaining = specks
        .iter()
        .filter(|&&p| image.is_solid(p).unwrap_or(false))
        .count();
    println!(
        "    specks still solid: {} of {} (expected 0)",
        remaining,
        specks.len()
    );

    // --- 3. Maximal-ball opening ---
    let params = OpenParams {
        mode: ProcessingMode::Parallel,
        max_diameter: Some(15),
    };
    let report = open(&mut image, &backend, &params, &mut NullProgress).expect("opening failed");
    println!(
        "\nOpened in {} rounds: largest inscribed ball d={}, {} pore voxels, {} snapshots",
        report.rounds, report.max_diameter, report.pore_voxels, report.retained_snapshots
    );

    // --- 4. Cluster, both strategies ---
    let params = ClusterParams {
        strategy: ClusteringStrategy::BallGrouping,
        mode: ProcessingMode::Parallel,
        ..ClusterParams::default()
    };
    let grouped = cluster_pores(&mut image, &params, &mut NullProgress).expect("clustering failed");
    println!(
        "\nBall grouping: {} bodies, {} merges over {} diameter levels",
        grouped.clusters, grouped.merges, grouped.passes
    );
    let sizes = cluster_sizes(&image).expect("cluster stats failed");
    for (id, count) in sizes.iter().take(3) {
        println!("    body {:>8}: {:>7} voxels", id, count);
    }

    let params = ClusterParams {
        strategy: ClusteringStrategy::Watershed,
        mode: ProcessingMode::Parallel,
        ..ClusterParams::default()
    };
    let shed = cluster_pores(&mut image, &params, &mut NullProgress).expect("watershed failed");
    println!(
        "Watershed:     {} bodies, {} adoptions over {} flood rounds",
        shed.clusters, shed.merges, shed.passes
    );

    // --- 5. Render the middle slice ---
    let z = EDGE / 2;
    let ramp = auto_params(&image, ColorScheme::BlueRed);
    let diam = diameter_layer(&image, z, &ramp).expect("diameter render failed");
    write_bytes(out_dir, "diameter.raw", &diam.as_rgba_bytes());
    let seg = segmentation_layer(&image, z, SOLID).expect("cluster render failed");
    write_bytes(out_dir, "clusters.raw", &seg.as_rgba_bytes());
    println!(
        "\nSlice z={} rendered: {}x{} RGBA (diameter.raw, clusters.raw)",
        z,
        diam.width(),
        diam.height()
    );

    // --- 6. Save the analyzed volume ---
    let path = out_dir.join("analyzed.pvx");
    write_volume(&image, &path).expect("volume save failed");
    println!("Volume with analysis state written to {}", path.display());
}

/// Stamp grains and specks into an all-pore volume. Returns the image and
/// the speck positions, so the denoise stage can be checked against them.
fn build_synthetic_volume() -> (Image, Vec<Position>) {
    let mut image = Image::new(EDGE, EDGE, EDGE).expect("valid dimensions");

    // Deterministic positions via a small LCG, stable across runs
    let mut seed: u64 = 42;
    for _ in 0..10 {
        let center = Position::new(
            (lcg_next(&mut seed) % EDGE as u64) as i32,
            (lcg_next(&mut seed) % EDGE as u64) as i32,
            (lcg_next(&mut seed) % EDGE as u64) as i32,
        );
        let radius = 6 + (lcg_next(&mut seed) % 5) as i32;
        stamp_ball(&mut image, center, radius);
    }

    // Specks only land where the whole 3x3x3 neighborhood is pore, so the
    // erosion removes every one and no grain can dilate back over them.
    let mut specks = Vec::new();
    let mut attempts = 0;
    seed = 137;
    while specks.len() < 60 && attempts < 4096 {
        attempts += 1;
        let p = Position::new(
            (lcg_next(&mut seed) % EDGE as u64) as i32,
            (lcg_next(&mut seed) % EDGE as u64) as i32,
            (lcg_next(&mut seed) % EDGE as u64) as i32,
        );
        if neighborhood_is_pore(&image, p) {
            image.set(p, true).expect("in bounds");
            specks.push(p);
        }
    }

    (image, specks)
}

fn lcg_next(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    *seed >> 33
}

fn stamp_ball(image: &mut Image, center: Position, radius: i32) {
    for dz in -radius..=radius {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy + dz * dz > radius * radius {
                    continue;
                }
                let p = Position::new(center.x + dx, center.y + dy, center.z + dz);
                if image.dims().contains(p) {
                    image.set(p, true).expect("in bounds");
                }
            }
        }
    }
}

fn neighborhood_is_pore(image: &Image, p: Position) -> bool {
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let q = Position::new(p.x + dx, p.y + dy, p.z + dz);
                if !image.dims().contains(q) || image.is_solid(q).expect("in bounds") {
                    return false;
                }
            }
        }
    }
    true
}

fn print_stats(label: &str, image: &Image) {
    println!(
        "{:<12} porosity={:>5.1}%  pore voxels={:>7}",
        label,
        image.porosity() * 100.0,
        image.black_voxels()
    );
}

fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) {
    let path = dir.join(name);
    fs::write(&path, bytes)
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", path.display(), e));
}
