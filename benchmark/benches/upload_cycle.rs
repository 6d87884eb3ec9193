// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Upload cycle benchmarks.
//!
//! One iteration dispatches a group of overlapping uploads to the loopback
//! server and delivers their completions, so it pays for one swizzle, one
//! unswizzle, the server-side copy and the completion bookkeeping.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shmpix_benchmark::UploadFixture;
use shmpix_core::{Point, UploaderId};
use std::time::Duration;

const SIDES: &[i32] = &[64, 256, 1024];
const OVERLAP: &[u64] = &[1, 4, 16];

fn bench_upload_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_cycle");
    group.measurement_time(Duration::from_secs(5));

    for &side in SIDES {
        let bytes = side as u64 * side as u64 * 4;
        group.throughput(Throughput::Bytes(bytes));

        group.bench_with_input(BenchmarkId::from_parameter(side), &side, |b, &side| {
            let fixture =
                UploadFixture::new(Point::new(side, side)).expect("Failed to create fixture");
            let bounds = fixture.buffer.bounds();

            b.iter(|| {
                let seq = fixture
                    .buffer
                    .upload(
                        UploaderId::new(1),
                        fixture.target,
                        Point::ZERO,
                        bounds,
                        fixture.sender.clone(),
                    )
                    .expect("Upload failed");
                black_box(seq);
                fixture.pump();
            });
        });
    }

    group.finish();
}

fn bench_overlapping_uploads(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlapping_uploads");
    group.measurement_time(Duration::from_secs(5));

    for &overlap in OVERLAP {
        group.throughput(Throughput::Elements(overlap));

        group.bench_with_input(BenchmarkId::from_parameter(overlap), &overlap, |b, &overlap| {
            let fixture =
                UploadFixture::new(Point::new(256, 256)).expect("Failed to create fixture");
            let bounds = fixture.buffer.bounds();

            b.iter(|| {
                for n in 0..overlap {
                    fixture
                        .buffer
                        .upload(
                            UploaderId::new(n),
                            fixture.target,
                            Point::new(n as i32 * 256, 0),
                            bounds,
                            fixture.sender.clone(),
                        )
                        .expect("Upload failed");
                }
                black_box(fixture.pump());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_upload_cycle, bench_overlapping_uploads);
criterion_main!(benches);
