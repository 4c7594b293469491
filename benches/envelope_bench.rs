//! Benchmarks for command envelope decoding and outbound encoding.
//!
//! Decoding runs on every inbound frame inside the main loop, so it has to
//! stay well below the 20 ms loop tick.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use fabreader_protocol::{Outbound, decode};
use std::hint::black_box;

fn enroll_frame() -> String {
    let key = |b: u8| format!("[{}]", vec![b.to_string(); 16].join(","));
    format!(
        r#"{{"type":"command","payload":{{"command":"enroll","uid":"04ABCDEF010203","keys":{{"defaultKey":{},"masterKey":{},"authKey":{},"readKey":{},"writeKey":{},"changeKey":{}}}}}}}"#,
        key(0),
        key(0x11),
        key(0xAA),
        key(0xBB),
        key(0xCC),
        key(0xDD)
    )
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_command");

    let authenticate = r#"{"type":"command","payload":{"command":"authenticate","uid":"04ABCDEF","keyNo":1,"authKey":[1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16]}}"#.to_string();
    let enroll = enroll_frame();

    for (name, frame) in [("authenticate", &authenticate), ("enroll", &enroll)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), frame, |b, frame| {
            b.iter(|| decode(black_box(frame)).expect("valid frame"))
        });
    }

    group.finish();
}

fn bench_enroll_keys(c: &mut Criterion) {
    let envelope = decode(&enroll_frame()).expect("valid frame");

    c.bench_function("parse_enroll_keys", |b| {
        b.iter(|| black_box(&envelope).enroll_keys().expect("valid keys"))
    });
}

fn bench_encode(c: &mut Criterion) {
    let status = Outbound::status(Some("04ABCDEF010203"));
    let logs: Vec<String> = (0..10).map(|i| format!("Slot {i}: ok")).collect();
    let result = Outbound::command_result("04ABCDEF010203", true, "Enrollment complete", logs);

    c.bench_function("encode_status", |b| {
        b.iter(|| black_box(&status).encode().expect("encodable"))
    });
    c.bench_function("encode_command_result", |b| {
        b.iter(|| black_box(&result).encode().expect("encodable"))
    });
}

criterion_group!(benches, bench_decode, bench_enroll_keys, bench_encode);
criterion_main!(benches);
