// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Swizzle microbenchmarks.
//!
//! Measures the in-place RGBA/BGRA conversion at common surface sizes, both
//! on heap memory and on a mapped shared-memory segment.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shmpix_core::shm::ShmSegment;
use shmpix_core::swizzle;
use std::time::Duration;

/// Square surface sides to benchmark (in pixels).
const SIDES: &[usize] = &[16, 64, 256, 1024];

fn bench_swizzle_heap(c: &mut Criterion) {
    let mut group = c.benchmark_group("swizzle_heap");
    group.measurement_time(Duration::from_secs(5));

    for &side in SIDES {
        let len = side * side * swizzle::BYTES_PER_PIXEL;
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(side), &len, |b, &len| {
            let mut pixels = vec![0x5au8; len];
            b.iter(|| swizzle::bgra(black_box(&mut pixels)));
        });
    }

    group.finish();
}

fn bench_swizzle_shm(c: &mut Criterion) {
    let mut group = c.benchmark_group("swizzle_shm");
    group.measurement_time(Duration::from_secs(5));

    for &side in SIDES {
        let len = side * side * swizzle::BYTES_PER_PIXEL;
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::from_parameter(side), &len, |b, &len| {
            let name = format!("bench-swizzle-{}-{}", side, std::process::id());
            let segment = ShmSegment::create(&name, len).expect("Failed to create segment");
            // SAFETY: the benchmark is the only user of this mapping.
            let pixels = unsafe { std::slice::from_raw_parts_mut(segment.as_ptr(), len) };

            b.iter(|| swizzle::bgra(black_box(&mut *pixels)));

            segment.close().expect("Failed to close segment");
        });
    }

    group.finish();
}

criterion_group!(benches, bench_swizzle_heap, bench_swizzle_shm);
criterion_main!(benches);
