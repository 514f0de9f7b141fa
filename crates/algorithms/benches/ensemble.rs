//! Benchmarks for ensemble training and susceptibility prediction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use georisk_algorithms::susceptibility::{
    predict_susceptibility, train_classifier, ClassifierKind, ClassifierSettings, FeatureStack, TrainingSet,
};
use georisk_core::{CancellationToken, GeoTransform, Raster};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn training_set(n: usize) -> TrainingSet {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut set = TrainingSet::new(vec!["slope".into(), "curvature".into(), "rainfall".into()]);
    for _ in 0..n {
        let x: Vec<f64> = (0..3).map(|_| rng.gen::<f64>()).collect();
        let label = u8::from(x[0] + 0.5 * x[2] > 0.8);
        set.push(x, label);
    }
    set
}

fn stack(size: usize) -> FeatureStack {
    let band = |f: fn(usize, usize) -> f64| {
        let mut r = Raster::new(size, size);
        r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
        for row in 0..size {
            for col in 0..size {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        r
    };
    FeatureStack::new(vec![
        ("slope".into(), band(|r, c| ((r * 7 + c * 13) % 100) as f64 / 100.0)),
        ("curvature".into(), band(|r, c| ((r * 3 + c) % 50) as f64 / 50.0)),
        ("rainfall".into(), band(|r, _| (r % 64) as f64 / 64.0)),
    ])
    .unwrap()
}

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble/train");
    group.sample_size(10);
    let set = training_set(1000);
    let cancel = CancellationToken::new();
    for kind in [ClassifierKind::RandomForest, ClassifierKind::GradientBoosting] {
        let settings = ClassifierSettings {
            kind,
            n_estimators: 50,
            allow_fallback: true,
            ..Default::default()
        };
        group.bench_function(BenchmarkId::from_parameter(kind), |b| {
            b.iter(|| train_classifier(black_box(&set), &settings, 0.3, &cancel).unwrap())
        });
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble/predict");
    group.sample_size(10);
    let cancel = CancellationToken::new();
    let settings = ClassifierSettings {
        n_estimators: 50,
        ..Default::default()
    };
    let model = train_classifier(&training_set(1000), &settings, 0.0, &cancel).unwrap();
    for size in [128, 256] {
        let stack = stack(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| predict_susceptibility(black_box(&stack), &model, &cancel).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train, bench_predict);
criterion_main!(benches);
