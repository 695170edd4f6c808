//! Criterion benchmarks for filter compilation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tagql_filter::{compile_filter, parse};

fn custom_criterion() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .warm_up_time(Duration::from_millis(100))
        .measurement_time(Duration::from_secs(1))
        .nresamples(1000)
        .noise_threshold(0.05)
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_simple", |b| {
        b.iter(|| parse(black_box("site and yearBuilt == 1986")).unwrap())
    });

    c.bench_function("parse_nested", |b| {
        b.iter(|| {
            parse(black_box(
                "(dis == \"Zone B\" and area > 1000) or not equipRef->siteRef->geoCity",
            ))
            .unwrap()
        })
    });
}

fn bench_compile(c: &mut Criterion) {
    let tags = vec!["dis".to_string(), "area".to_string()];

    c.bench_function("compile_name_comparison", |b| {
        b.iter(|| compile_filter(black_box("yearBuilt == 1986"), 5, 2, &[], "core_dev").unwrap())
    });

    c.bench_function("compile_path_comparison", |b| {
        b.iter(|| {
            compile_filter(
                black_box("equipRef->siteRef->yearBuilt == 1985"),
                5,
                2,
                &tags,
                "core_dev",
            )
            .unwrap()
        })
    });

    let wide: Vec<String> = (0..50).map(|i| format!("tag{i} == {i}")).collect();
    let wide = wide.join(" or ");
    c.bench_function("compile_wide_disjunction", |b| {
        b.iter(|| compile_filter(black_box(&wide), 5, 2, &[], "core_dev").unwrap())
    });
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets = bench_parse, bench_compile
}
criterion_main!(benches);
