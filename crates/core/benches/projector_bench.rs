// Performance benchmarks for settings resolution and chain projection
//
// Run with: cargo bench --bench projector_bench

use auralift_core::domain::chain::PageContext;
use auralift_core::domain::projector::{self, db_to_gain};
use auralift_core::domain::settings::{EnhancerSettings, SettingsPatch};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_db_to_gain(c: &mut Criterion) {
    let mut group = c.benchmark_group("db_to_gain");

    for db in [-12.0, -6.0, 0.0, 3.0, 6.0, 12.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(db), db, |b, &db| {
            b.iter(|| {
                black_box(db_to_gain(black_box(db)));
            });
        });
    }

    group.finish();
}

fn bench_projection_profiles(c: &mut Criterion) {
    let context = PageContext::new(48000);

    let manual = EnhancerSettings {
        preamp: 3.0,
        eq32: 4.0,
        eq1k: -2.0,
        eq16k: 5.0,
        compression_ratio: 4.0,
        ..EnhancerSettings::default()
    };
    let bypass = EnhancerSettings {
        enabled: false,
        ..manual
    };
    let modes = EnhancerSettings {
        smart_volume: true,
        mono: true,
        loudness_mode: true,
        ..manual
    };

    let mut chain = context.build_chain();
    c.bench_function("project_manual_settings", |b| {
        b.iter(|| {
            projector::apply(black_box(&mut chain), black_box(&manual));
        });
    });

    let mut chain = context.build_chain();
    c.bench_function("project_bypass", |b| {
        b.iter(|| {
            projector::apply(black_box(&mut chain), black_box(&bypass));
        });
    });

    let mut chain = context.build_chain();
    c.bench_function("project_all_modes_active", |b| {
        b.iter(|| {
            projector::apply(black_box(&mut chain), black_box(&modes));
        });
    });
}

fn bench_projection_over_many_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("project_many_chains");

    for num_chains in [2, 4, 8, 16].iter() {
        let context = PageContext::new(48000);
        let mut chains = vec![context.build_chain(); *num_chains];
        let settings = EnhancerSettings {
            preamp: 2.0,
            loudness_mode: true,
            ..EnhancerSettings::default()
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(num_chains),
            num_chains,
            |b, _| {
                b.iter(|| {
                    for chain in chains.iter_mut() {
                        projector::apply(black_box(chain), black_box(&settings));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_patch_merge(c: &mut Criterion) {
    let sparse = SettingsPatch {
        preamp: Some(3.0),
        ..SettingsPatch::empty()
    };
    let full = SettingsPatch::from(EnhancerSettings::default());

    c.bench_function("merge_sparse_patch", |b| {
        let mut settings = EnhancerSettings::default();
        b.iter(|| {
            settings.apply_patch(black_box(&sparse));
        });
    });

    c.bench_function("merge_full_patch", |b| {
        let mut settings = EnhancerSettings::default();
        b.iter(|| {
            settings.apply_patch(black_box(&full));
        });
    });
}

fn bench_layered_resolution(c: &mut Criterion) {
    let global = SettingsPatch {
        preamp: Some(1.0),
        eq32: Some(2.0),
        ..SettingsPatch::empty()
    };
    let domain = SettingsPatch {
        preamp: Some(4.0),
        mono: Some(true),
        ..SettingsPatch::empty()
    };
    let tab = SettingsPatch::enabled(false);

    c.bench_function("resolve_three_layers", |b| {
        b.iter(|| {
            black_box(EnhancerSettings::resolve(
                black_box(Some(&global)),
                black_box(Some(&domain)),
                black_box(Some(&tab)),
            ));
        });
    });
}

fn bench_analyser_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyser_frames");

    for size in [64, 256, 1024].iter() {
        let mut context = PageContext::new(48000);
        let frame: Vec<u8> = (0..*size).map(|i| (i % 256) as u8).collect();

        group.bench_with_input(BenchmarkId::new("ingest", size), size, |b, _| {
            b.iter(|| {
                context.analyser_mut().ingest_frame(black_box(&frame));
            });
        });
    }

    let context = PageContext::new(48000);
    group.bench_function("snapshot", |b| {
        b.iter(|| {
            black_box(context.analyser().snapshot());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_db_to_gain,
    bench_projection_profiles,
    bench_projection_over_many_chains,
    bench_patch_merge,
    bench_layered_resolution,
    bench_analyser_frames
);

criterion_main!(benches);
