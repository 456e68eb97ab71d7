//! Performance benchmarks for slot policy evaluation.
//!
//! Evaluation runs for every managed slot on every poll tick and after every
//! management operation, so it should stay allocation-free and well under a
//! microsecond.
//!
//! # Run Benchmarks
//!
//! ```sh
//! # Run all policy benchmarks
//! cargo bench --bench policy_bench
//!
//! # Run one group
//! cargo bench --bench policy_bench -- evaluate
//!
//! # Compare against a saved baseline
//! cargo bench --bench policy_bench -- --save-baseline main
//! cargo bench --bench policy_bench -- --baseline main
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use keyslot_core::{
    AccessCode, AccessCountRule, DateRangeRule, DayOfWeekRule, PolicySettings, TimeWindow,
    evaluate,
};
use std::hint::black_box;

fn noon_monday() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 3)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

fn full_settings() -> PolicySettings {
    let window = TimeWindow::new(
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        true,
    )
    .unwrap();

    PolicySettings::new(true)
        .with_access_count(AccessCountRule::new(true, 100))
        .with_date_range(
            DateRangeRule::new(
                true,
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            )
            .unwrap(),
        )
        .with_day_of_week(
            DayOfWeekRule::new(true)
                .with_day(Weekday::Mon, window)
                .with_day(Weekday::Wed, window)
                .with_day(Weekday::Fri, window),
        )
}

/// Benchmark the evaluator across the rule that decides the outcome.
///
/// - `no_settings`: first short-circuit
/// - `count_exceeded`: early rejection
/// - `all_rules_pass`: every rule checked
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    group.throughput(Throughput::Elements(1));

    let now = noon_monday();
    let settings = full_settings();

    group.bench_function("no_settings", |b| {
        b.iter(|| black_box(evaluate(black_box(None), 0, black_box(now))));
    });

    group.bench_function("count_exceeded", |b| {
        b.iter(|| black_box(evaluate(black_box(Some(&settings)), 100, black_box(now))));
    });

    group.bench_function("all_rules_pass", |b| {
        b.iter(|| black_box(evaluate(black_box(Some(&settings)), 3, black_box(now))));
    });

    group.finish();
}

/// Benchmark a full poll's worth of evaluations for common slot counts.
fn bench_evaluate_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_lock");
    let now = noon_monday();
    let settings = full_settings();

    for slots in [10u32, 30, 250] {
        group.throughput(Throughput::Elements(u64::from(slots)));
        group.bench_with_input(BenchmarkId::from_parameter(slots), &slots, |b, &slots| {
            b.iter(|| {
                for usage in 0..slots {
                    black_box(evaluate(Some(&settings), usage, now));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark settings parsing from the stored JSON form.
fn bench_settings_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("settings_parse");
    group.throughput(Throughput::Elements(1));

    let json = serde_json::to_string(&full_settings()).unwrap();

    group.bench_function("full_document", |b| {
        b.iter(|| black_box(serde_json::from_str::<PolicySettings>(black_box(&json))).ok());
    });

    group.finish();
}

/// Benchmark parsing of raw code readings reported by a lock.
fn bench_parse_observed(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_observed");
    group.throughput(Throughput::Elements(1));

    let cases = [
        ("plain", "123456"),
        ("nul_padded", "1234\0\0\0\0\0\0"),
        ("cleared", "0000"),
        ("masked", "******"),
    ];

    for (name, raw) in cases {
        group.bench_function(name, |b| {
            b.iter(|| black_box(AccessCode::parse_observed(black_box(raw))));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_evaluate,
    bench_evaluate_lock,
    bench_settings_parse,
    bench_parse_observed,
);

criterion_main!(benches);
