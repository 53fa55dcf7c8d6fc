//! Benchmarks for volume morphology and clustering

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use porovox_algorithms::clustering::{cluster_pores, ClusterParams, ClusteringStrategy};
use porovox_algorithms::morphology::{classify_fronts, open, OpenParams, Phase, SphereElement};
use porovox_backend::{CpuBackend, MorphologyBackend, ProcessingMode};
use porovox_core::{Image, NullProgress};

fn create_test_image(size: i32) -> Image {
    let mut image = Image::new(size, size, size).unwrap();
    // Scattered grains with some structure
    for i in (0..image.dims().voxel_count()).step_by(97) {
        let p = image.dims().position_of(i);
        image.set(p, true).unwrap();
    }
    image
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/classify_fronts");
    for size in [32, 48, 64] {
        let image = create_test_image(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                classify_fronts(
                    black_box(image.raw()),
                    Phase::Solid,
                    ProcessingMode::Sequential,
                )
            })
        });
    }
    group.finish();
}

fn bench_dilate(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/dilate");
    let backend = CpuBackend::new(ProcessingMode::Sequential);
    let element = SphereElement::build(5).unwrap();
    for size in [32, 48, 64] {
        let image = create_test_image(size);
        let fronts = classify_fronts(image.raw(), Phase::Solid, ProcessingMode::Sequential);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter_batched(
                || image.raw().clone(),
                |mut volume| {
                    backend
                        .dilate(&mut volume, &fronts, element.surface(), element.corner())
                        .unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/open");
    group.sample_size(10);
    for size in [24, 32, 48] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || create_test_image(size),
                |mut image| {
                    let backend = CpuBackend::new(ProcessingMode::Parallel);
                    let params = OpenParams {
                        mode: ProcessingMode::Parallel,
                        max_diameter: Some(9),
                    };
                    open(&mut image, &backend, &params, &mut NullProgress).unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_open_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("morphology/open_modes");
    group.sample_size(10);
    let modes = [
        ("sequential", ProcessingMode::Sequential),
        ("parallel", ProcessingMode::Parallel),
    ];
    for (name, mode) in modes {
        group.bench_with_input(BenchmarkId::new("mode", name), &mode, |b, &mode| {
            b.iter_batched(
                || create_test_image(32),
                |mut image| {
                    let backend = CpuBackend::new(mode);
                    let params = OpenParams {
                        mode,
                        max_diameter: Some(9),
                    };
                    open(&mut image, &backend, &params, &mut NullProgress).unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_cluster_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering/strategies");
    group.sample_size(10);
    let strategies = [
        ("ball_grouping", ClusteringStrategy::BallGrouping),
        ("watershed", ClusteringStrategy::Watershed),
    ];
    for (name, strategy) in strategies {
        group.bench_with_input(BenchmarkId::new("strategy", name), &strategy, |b, &strategy| {
            b.iter_batched(
                || {
                    let mut image = create_test_image(32);
                    let backend = CpuBackend::new(ProcessingMode::Parallel);
                    let params = OpenParams {
                        mode: ProcessingMode::Parallel,
                        max_diameter: Some(9),
                    };
                    open(&mut image, &backend, &params, &mut NullProgress).unwrap();
                    image
                },
                |mut image| {
                    let params = ClusterParams {
                        strategy,
                        mode: ProcessingMode::Parallel,
                        watershed_radius_cap: 4,
                    };
                    cluster_pores(&mut image, &params, &mut NullProgress).unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_dilate,
    bench_open,
    bench_open_modes,
    bench_cluster_strategies,
);
criterion_main!(benches);
