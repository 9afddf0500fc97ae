use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lactrs::{CurveFitter, LactateAnalyzer, StepTest, ThresholdAnalyzer, ThresholdConfig};

/// Performance benchmarks for curve fitting and threshold detection
///
/// Step tests grow from a typical 7-stage protocol to long ramp tests with
/// many samples.

fn create_step_test(stages: usize) -> StepTest {
    let pairs: Vec<(f64, f64)> = (0..stages)
        .map(|i| {
            let load = 50.0 + 300.0 * i as f64 / (stages - 1) as f64;
            // Exponential-like lactate response with a small deterministic wobble
            let lactate = 0.9 + 0.02 * (load / 25.0).exp() + 0.05 * ((i % 3) as f64 - 1.0);
            (load, lactate.max(0.5))
        })
        .collect();
    StepTest::from_pairs(&pairs).expect("benchmark data is valid")
}

fn bench_curve_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("Curve Fit");

    for &stages in &[7, 20, 100, 1000] {
        let test = create_step_test(stages);

        group.throughput(Throughput::Elements(stages as u64));
        group.bench_with_input(BenchmarkId::new("fit", stages), &test, |b, test| {
            b.iter(|| CurveFitter::fit(black_box(test)))
        });
    }

    group.finish();
}

fn bench_curve_sampling(c: &mut Criterion) {
    let test = create_step_test(7);
    let model = CurveFitter::fit(&test).expect("fit succeeds");

    let mut group = c.benchmark_group("Curve Sampling");

    for &resolution in &[100, 1000, 10_000] {
        group.throughput(Throughput::Elements(resolution as u64 + 1));
        group.bench_with_input(
            BenchmarkId::new("sample_curve", resolution),
            &resolution,
            |b, &resolution| {
                b.iter(|| CurveFitter::sample_curve(black_box(&model), 50.0, 350.0, resolution))
            },
        );
    }

    group.finish();
}

fn bench_thresholds(c: &mut Criterion) {
    let test = create_step_test(7);
    let model = CurveFitter::fit(&test).expect("fit succeeds");
    let curve = CurveFitter::sample_curve(&model, 50.0, 350.0, 1000).expect("valid range");
    let config = ThresholdConfig::default();

    let mut group = c.benchmark_group("Threshold Detection");

    group.bench_function("dmax", |b| {
        b.iter(|| ThresholdAnalyzer::compute_dmax(black_box(&curve)))
    });
    group.bench_function("dmax_mod", |b| {
        b.iter(|| ThresholdAnalyzer::compute_dmax_mod(black_box(&test), black_box(&curve), 0.4))
    });
    group.bench_function("fixed_concentration", |b| {
        b.iter(|| {
            ThresholdAnalyzer::compute_fixed_concentration_threshold(
                black_box(&model),
                4.0,
                50.0,
                350.0,
                1e-3,
            )
        })
    });
    group.bench_function("all", |b| {
        b.iter(|| ThresholdAnalyzer::analyze(&test, &model, &curve, black_box(&config)))
    });

    group.finish();
}

fn bench_full_analysis(c: &mut Criterion) {
    let analyzer = LactateAnalyzer::new();
    let mut group = c.benchmark_group("Full Analysis");

    for &stages in &[7, 50] {
        let test = create_step_test(stages);
        group.bench_with_input(BenchmarkId::new("analyze", stages), &test, |b, test| {
            b.iter(|| analyzer.analyze(black_box(test)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_curve_fit,
    bench_curve_sampling,
    bench_thresholds,
    bench_full_analysis
);
criterion_main!(benches);
