//! Criterion benchmarks for the RCON-Over-IP binary codec and reassembler.
//!
//! Run with:
//! ```bash
//! cargo bench --package rcon-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rcon_core::protocol::codec::{encode_client_message, encode_server_message};
use rcon_core::protocol::messages::{ClientMessage, ServerMessage, CHALLENGE_LEN, DIGEST_LEN};
use rcon_core::protocol::reassembler::Reassembler;

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_challenge() -> ServerMessage {
    ServerMessage::Challenge([0xA5; CHALLENGE_LEN])
}

fn make_result() -> ServerMessage {
    ServerMessage::RconResult {
        command_id: 42,
        result: "map: mp_airfield | players: 12/32 | uptime: 04:13:22".to_string(),
    }
}

fn make_digest() -> ClientMessage {
    ClientMessage::Digest([0x42; DIGEST_LEN])
}

fn make_command() -> ClientMessage {
    ClientMessage::RconCommand {
        command_id: 42,
        command: "status".to_string(),
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.bench_function("challenge", |b| {
        let msg = make_challenge();
        b.iter(|| encode_server_message(black_box(&msg)))
    });
    group.bench_function("rcon_result", |b| {
        let msg = make_result();
        b.iter(|| encode_server_message(black_box(&msg)))
    });
    group.bench_function("digest", |b| {
        let msg = make_digest();
        b.iter(|| encode_client_message(black_box(&msg)))
    });
    group.bench_function("rcon_command", |b| {
        let msg = make_command();
        b.iter(|| encode_client_message(black_box(&msg)))
    });
    group.finish();
}

fn bench_reassemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble");

    // A realistic inbound burst: challenge, then a handful of results.
    let mut stream = encode_server_message(&make_challenge());
    for _ in 0..8 {
        stream.extend(encode_server_message(&make_result()));
    }
    let allowed: Vec<u8> = (0u8..=5).collect();

    group.bench_function("burst_one_chunk", |b| {
        b.iter(|| {
            let mut r = Reassembler::<ServerMessage>::new();
            let mut rest: &[u8] = black_box(&stream);
            let mut count = 0usize;
            loop {
                let (msg, remainder) = r.advance(rest, &allowed).expect("valid stream");
                rest = remainder;
                match msg {
                    Some(_) => count += 1,
                    None => break,
                }
            }
            count
        })
    });

    group.bench_function("burst_byte_at_a_time", |b| {
        b.iter(|| {
            let mut r = Reassembler::<ServerMessage>::new();
            let mut count = 0usize;
            for byte in black_box(&stream) {
                let (msg, _) = r
                    .advance(std::slice::from_ref(byte), &allowed)
                    .expect("valid stream");
                if msg.is_some() {
                    count += 1;
                }
            }
            count
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_reassemble);
criterion_main!(benches);
