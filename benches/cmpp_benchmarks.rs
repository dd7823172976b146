// ABOUTME: Benchmark suite for the CMPP codec and the client's hot-path helpers
// ABOUTME: Measures frame detection, decoding, serialization, segmentation and sequence allocation

use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sms_gateway::client::SequenceAllocator;
use sms_gateway::client::udhi;
use sms_gateway::codec::{Encodable, PduRegistry};
use sms_gateway::datatypes::*;
use sms_gateway::frame;
use std::time::Duration;

fn create_sample_submit(destinations: usize, content_len: usize) -> Submit {
    Submit {
        sequence_id: 1,
        service_id: ServiceId::truncating("NEWS"),
        msg_fmt: 8,
        msg_src: MsgSrc::truncating("901234"),
        fee_type: FeeType::truncating("01"),
        src_id: TerminalId::truncating("10657000"),
        dest_terminal_ids: (0..destinations)
            .map(|i| TerminalId::truncating(&format!("138{i:08}")))
            .collect(),
        msg_content: Bytes::from(vec![b'A'; content_len]),
        ..Default::default()
    }
}

fn create_sample_connect() -> Connect {
    let timestamp = Timestamp::from_parts(10, 17, 12, 30, 0).unwrap_or_else(|_| Timestamp::now());
    Connect::signed(1, "901234", "secret", timestamp)
}

fn create_sample_deliver() -> Deliver {
    Deliver {
        sequence_id: 1,
        msg_id: 42,
        dest_id: TerminalId::truncating("10657000"),
        msg_fmt: 8,
        src_terminal_id: TerminalId::truncating("13800000000"),
        msg_content: Bytes::from_static(&[0x00, 0x48, 0x00, 0x69]),
        ..Default::default()
    }
}

fn create_frame_bytes(pdu: &impl Encodable) -> Vec<u8> {
    pdu.to_bytes().map(|b| b.to_vec()).unwrap_or_default()
}

fn bench_frame_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_check");
    group.measurement_time(Duration::from_secs(10));

    let submit_bytes = create_frame_bytes(&create_sample_submit(1, 140));
    group.bench_function("submit", |b| {
        b.iter(|| frame::check(black_box(submit_bytes.as_slice())))
    });

    let active_bytes = create_frame_bytes(&ActiveTest::new(1));
    group.bench_function("active_test", |b| {
        b.iter(|| frame::check(black_box(active_bytes.as_slice())))
    });

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    group.measurement_time(Duration::from_secs(10));
    let registry = PduRegistry::new();

    let submit_bytes = create_frame_bytes(&create_sample_submit(1, 140));
    group.bench_function("submit", |b| {
        b.iter(|| registry.decode_frame(black_box(submit_bytes.as_slice())))
    });

    let deliver_bytes = create_frame_bytes(&create_sample_deliver());
    group.bench_function("deliver", |b| {
        b.iter(|| registry.decode_frame(black_box(deliver_bytes.as_slice())))
    });

    let connect_bytes = create_frame_bytes(&create_sample_connect());
    group.bench_function("connect", |b| {
        b.iter(|| registry.decode_frame(black_box(connect_bytes.as_slice())))
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    group.measurement_time(Duration::from_secs(10));

    // Pooled-buffer style: reuse one BytesMut across iterations
    let submit = create_sample_submit(1, 140);
    let mut buf = BytesMut::with_capacity(4096);
    group.bench_function("submit_reused_buffer", |b| {
        b.iter(|| {
            buf.clear();
            black_box(&submit).encode_frame(&mut buf)
        })
    });

    let connect = create_sample_connect();
    group.bench_function("connect", |b| b.iter(|| black_box(&connect).to_bytes()));

    group.bench_function("connect_signing", |b| {
        b.iter(|| Connect::signed(1, black_box("901234"), black_box("secret"), Timestamp::now()))
    });

    group.finish();
}

fn bench_destination_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("destination_batches");
    group.measurement_time(Duration::from_secs(10));

    for &destinations in &[1usize, 10, 50, 100] {
        let submit = create_sample_submit(destinations, 70);
        group.bench_with_input(
            BenchmarkId::new("submit_encode", destinations),
            &submit,
            |b, submit| b.iter(|| black_box(submit).to_bytes()),
        );
    }

    group.finish();
}

fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");
    group.measurement_time(Duration::from_secs(10));

    for &len in &[70usize, 140, 150, 600, 2000] {
        let content = Bytes::from(vec![0x4Fu8; len]);
        group.bench_with_input(BenchmarkId::new("split", len), &content, |b, content| {
            b.iter(|| udhi::split(black_box(content), 140, udhi::CONCAT_HEADER_LEN, 7))
        });
    }

    group.finish();
}

fn bench_sequence_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_allocation");
    let sequence = SequenceAllocator::new();
    group.bench_function("next", |b| b.iter(|| black_box(sequence.next())));

    let wrapping = SequenceAllocator::with_start(u32::MAX - 1);
    group.bench_function("next_near_wrap", |b| b.iter(|| black_box(wrapping.next())));

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_check,
    bench_frame_decode,
    bench_serialization,
    bench_destination_batches,
    bench_segmentation,
    bench_sequence_allocation
);
criterion_main!(benches);
