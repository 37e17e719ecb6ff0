// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use edgefirst_jpu::{context::LINEBUFFER_HEIGHT, convert::ycbcr444_to_nv16_row};

pub fn benchmark_soft_convert(c: &mut Criterion) {
    let widths = [320, 640, 1280, 1920, 2560];

    let mut group = c.benchmark_group("ycbcr444-to-nv16");
    for width in widths {
        let src = (0..width * 3).map(|i| i as u8).collect::<Vec<_>>();
        let mut luma = vec![0u8; width];
        let mut chroma = vec![0u8; width];

        // one line buffer strip per iteration
        group.throughput(Throughput::Bytes(
            (width * 3 * LINEBUFFER_HEIGHT as usize) as u64,
        ));
        group.bench_with_input(BenchmarkId::from_parameter(width), &src, |b, src| {
            b.iter(|| {
                for _ in 0..LINEBUFFER_HEIGHT {
                    ycbcr444_to_nv16_row(src, &mut luma, &mut chroma);
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_soft_convert);
criterion_main!(benches);
