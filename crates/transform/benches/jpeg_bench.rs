//! JPEG 구조 분석 벤치마크
//!
//! 메타데이터 제거와 구조 검사의 버퍼 크기별 비용을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use survival_transform::jpeg;

fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let len = u16::try_from(payload.len() + 2).unwrap().to_be_bytes();
    let mut out = vec![0xFF, marker, len[0], len[1]];
    out.extend_from_slice(payload);
    out
}

fn jpeg_with_scan(scan_len: usize) -> Vec<u8> {
    let mut out = vec![0xFF, jpeg::SOI];
    out.extend(segment(jpeg::APP0, b"JFIF\0\x01\x02\0\0\x01\0\x01\0\0"));
    out.extend(segment(0xE1, &[0x45; 4096]));
    out.extend(segment(jpeg::APP11, b"JP\0\x01c2pa-claim"));
    out.extend(segment(jpeg::SOF0, &[8, 0, 1, 0, 1, 1, 1, 0x11, 0]));
    out.extend(segment(jpeg::SOS, &[1, 1, 0, 0, 0x3F, 0]));
    out.extend(std::iter::repeat_n(0x5A, scan_len));
    out.extend_from_slice(&[0xFF, jpeg::EOI]);
    out
}

fn bench_jpeg(c: &mut Criterion) {
    let mut group = c.benchmark_group("jpeg");

    for scan_len in [1024usize, 64 * 1024, 1024 * 1024] {
        let data = jpeg_with_scan(scan_len);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("inspect", scan_len), &data, |b, data| {
            b.iter(|| jpeg::inspect(black_box(data)));
        });
        group.bench_with_input(BenchmarkId::new("strip", scan_len), &data, |b, data| {
            b.iter(|| jpeg::strip_metadata(black_box(data)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_jpeg);
criterion_main!(benches);
