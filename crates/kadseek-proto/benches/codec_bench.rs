//! Benchmarks for hash transforms and message encoding

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kadseek_proto::hash::{keyword_target, swap_chunks, udp_verify_key};
use kadseek_proto::{FileRecord, Kad2SearchRes, KadId, KadMessage, SearchResult};

fn bench_hashes(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");

    group.bench_function("keyword_target", |b| {
        b.iter(|| keyword_target(black_box("ubuntu")))
    });

    group.bench_function("udp_verify_key", |b| {
        b.iter(|| udp_verify_key(black_box(0x1234_5678), black_box(0x0A00_0001)))
    });

    let hash = [0xA5u8; 16];
    group.bench_function("swap_chunks", |b| b.iter(|| swap_chunks(black_box(&hash))));

    group.finish();
}

fn search_response(results: usize) -> KadMessage {
    let results = (0..results)
        .map(|i| {
            let record = FileRecord {
                hash: [i as u8; 16],
                name: format!("some.release.{i}.mkv"),
                size: 1_400_000_000 + i as u64,
                file_type: Some("Video".to_string()),
                avail: 3,
                media_length: 5400,
            };
            SearchResult {
                answer: KadId::from_bytes(record.hash),
                tags: record.to_tags(),
            }
        })
        .collect();

    KadMessage::Kad2SearchRes(Kad2SearchRes {
        sender: KadId::random(),
        target: KadId::random(),
        results,
    })
}

fn bench_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("messages");

    let msg = search_response(50);
    let plain = msg.encode().unwrap();
    let packed = msg.encode_packed().unwrap();

    group.bench_function("encode_search_res_50", |b| b.iter(|| black_box(&msg).encode()));
    group.bench_function("decode_search_res_50", |b| {
        b.iter(|| KadMessage::decode(black_box(&plain)))
    });
    group.bench_function("decode_packed_search_res_50", |b| {
        b.iter(|| KadMessage::decode(black_box(&packed)))
    });

    group.finish();
}

criterion_group!(benches, bench_hashes, bench_messages);
criterion_main!(benches);
