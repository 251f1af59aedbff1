//! Performance benchmarks for the Wiegand decoder.
//!
//! The decoder runs inside the controller tick, so a full frame must decode
//! in a small fraction of the 10 ms tick budget.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench decoder_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use doorman_core::constants::SUPPORTED_FRAME_LENGTHS;
use doorman_wiegand::{BitFrame, DecoderConfig, WiegandDecoder};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Benchmark decoding one frame of each supported length through the queue.
fn bench_decode_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    group.throughput(Throughput::Elements(1));

    for bits in SUPPORTED_FRAME_LENGTHS {
        let code = (1u64 << (bits - 2)) - 1;
        let start = Instant::now();
        let edges = BitFrame::encode(code, bits)
            .unwrap()
            .edges(start, Duration::from_millis(2));
        let done = start + Duration::from_secs(1);

        group.bench_with_input(BenchmarkId::from_parameter(bits), &edges, |b, edges| {
            b.iter(|| {
                let (mut decoder, tx) = WiegandDecoder::new(DecoderConfig::default());
                for edge in edges {
                    tx.send(edge.line, edge.at);
                }
                black_box(decoder.poll(black_box(done)));
            });
        });
    }

    group.finish();
}

/// Benchmark parity validation alone.
fn bench_parity(c: &mut Criterion) {
    let frame = BitFrame::encode(0xABCDEF, 26).unwrap();

    c.bench_function("parity_w26", |b| {
        b.iter(|| black_box(black_box(&frame).parity_ok()));
    });
}

/// Benchmark an idle poll, the common case on every tick.
fn bench_idle_poll(c: &mut Criterion) {
    let (mut decoder, _tx) = WiegandDecoder::new(DecoderConfig::default());
    let now = Instant::now();

    c.bench_function("idle_poll", |b| {
        b.iter(|| black_box(decoder.poll(black_box(now))));
    });
}

criterion_group!(benches, bench_decode_frame, bench_parity, bench_idle_poll);
criterion_main!(benches);
