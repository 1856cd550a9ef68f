//! Performance benchmarks for FrameCodec and framed messages.
//!
//! Tag reports dominate reader traffic, so the interesting cases are
//! report decoding at increasing batch sizes and splitting a read buffer
//! holding many small keepalive frames.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tagwire_protocol::{FrameCodec, Message, TagReportEntry};
use tokio_util::codec::{Decoder, Encoder};

/// Tag report with `count` 96-bit EPCs.
fn create_tag_report(count: usize) -> Message {
    let entries = (0..count)
        .map(|i| TagReportEntry {
            epc: vec![
                0x30, 0x08, 0x33, 0xB2, 0xDD, 0xD9, 0x01, 0x40, 0x00, 0x00,
                (i >> 8) as u8, i as u8,
            ],
            antenna_id: (i % 4 + 1) as u16,
            timestamp_ms: 1_700_000_000_000 + i as u64,
            tid: None,
        })
        .collect();
    Message::tag_report(entries).with_id(1)
}

fn bench_encode_keepalive(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_keepalive");
    group.throughput(Throughput::Elements(1));

    let msg = Message::keepalive_ack().with_id(1);

    group.bench_function("encode_keepalive_ack", |b| {
        b.iter(|| {
            let mut codec = FrameCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(msg.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Benchmark decoding tag reports of increasing size.
fn bench_decode_tag_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_tag_report");

    for tags in [1usize, 50, 500].iter() {
        group.throughput(Throughput::Elements(*tags as u64));

        let wire = create_tag_report(*tags).to_bytes().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(tags), tags, |b, _| {
            b.iter(|| {
                let mut codec = FrameCodec::new();
                let mut buffer = BytesMut::from(&wire[..]);
                let frame = codec.decode(&mut buffer).unwrap().unwrap();
                black_box(Message::decode(&frame).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark splitting a buffer of back-to-back frames.
fn bench_decode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_batch");

    for batch_size in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));

        let mut codec = FrameCodec::new();
        let mut encoded = BytesMut::new();
        for id in 0..*batch_size {
            codec
                .encode(Message::keepalive().with_id(id as u32), &mut encoded)
                .unwrap();
        }
        let encoded_bytes = encoded.freeze();

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, _| {
                b.iter(|| {
                    let mut codec = FrameCodec::new();
                    let mut buffer = BytesMut::from(&encoded_bytes[..]);
                    let mut count = 0;
                    while let Some(frame) = codec.decode(&mut buffer).unwrap() {
                        black_box(frame);
                        count += 1;
                    }
                    black_box(count);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_keepalive,
    bench_decode_tag_report,
    bench_decode_batch,
);
criterion_main!(benches);
