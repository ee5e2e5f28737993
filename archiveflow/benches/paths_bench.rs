//! Benchmarks for artifact path derivation.

use archiveflow::item::{derive_paths, FetchOptions, InfoRecord, WorkItem};
use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;

fn paths_benchmark(c: &mut Criterion) {
    let at = Utc.with_ymd_and_hms(2014, 3, 9, 17, 5, 42).unwrap();
    let data_dir = Path::new("/srv/archiveflow/data");

    c.bench_function("derive_paths", |b| {
        b.iter(|| derive_paths(black_box(data_dir), black_box("abc123"), black_box("example"), &at));
    });

    c.bench_function("mark_aborted", |b| {
        let paths = derive_paths(data_dir, "abc123", "example", &at);
        b.iter(|| {
            let mut paths = paths.clone();
            paths.mark_aborted(black_box(data_dir));
            paths
        });
    });

    c.bench_function("fetch_options", |b| {
        b.iter(|| {
            let options = FetchOptions::from_depth(black_box("5"));
            options.as_args().len()
        });
    });
}

fn info_benchmark(c: &mut Criterion) {
    let mut item = WorkItem::new();
    item.job.url = Some("http://example.com/".into());
    item.job.fetch_depth = Some("shallow".into());

    c.bench_function("info_record_to_json", |b| {
        b.iter(|| InfoRecord::from_item(black_box(&item)).to_json());
    });
}

criterion_group!(benches, paths_benchmark, info_benchmark);
criterion_main!(benches);
