//! Performance benchmarks for the key fob token path.
//!
//! The scanner task validates every advertisement carrying our manufacturer
//! id, so the cost per payload bounds how many fobs (or how noisy a radio
//! environment) the ECU can absorb without overflowing the token queue.
//!
//! # Run Benchmarks
//!
//! ```sh
//! cargo bench --bench token_bench
//!
//! # Only the replay scenarios
//! cargo bench --bench token_bench -- token_validation
//! ```

use carberus_core::ReplayScope;
use carberus_core::constants::DEFAULT_TOKEN_KEY;
use carberus_token::{Advertisement, TokenChannel, TokenCipher, TokenPacket};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_cipher");
    group.throughput(Throughput::Elements(1));

    let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
    let sealed = cipher.seal(&TokenPacket::unlock([1, 2, 3, 4], 42));

    group.bench_function("open", |b| {
        b.iter(|| black_box(cipher.open(black_box(&sealed))));
    });

    group.bench_function("seal", |b| {
        let packet = TokenPacket::unlock([1, 2, 3, 4], 42);
        b.iter(|| black_box(cipher.seal(black_box(&packet))));
    });

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_validation");
    group.throughput(Throughput::Elements(1));

    let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);

    for scope in [ReplayScope::Global, ReplayScope::PerDevice] {
        group.bench_with_input(
            BenchmarkId::new("fresh_counter", format!("{scope:?}")),
            &scope,
            |b, &scope| {
                let mut channel = TokenChannel::new(cipher.clone(), scope);
                let mut counter = 0u32;
                b.iter(|| {
                    counter = counter.wrapping_add(1);
                    let payload = cipher.seal(&TokenPacket::unlock([1, 2, 3, 4], counter));
                    black_box(channel.validate(black_box(&payload)))
                });
            },
        );
    }

    group.bench_function("replayed_counter", |b| {
        let mut channel = TokenChannel::new(cipher.clone(), ReplayScope::Global);
        let payload = cipher.seal(&TokenPacket::unlock([1, 2, 3, 4], 1));
        let _ = channel.validate(&payload);
        b.iter(|| black_box(channel.validate(black_box(&payload))));
    });

    group.bench_function("wrong_length", |b| {
        let mut channel = TokenChannel::new(cipher.clone(), ReplayScope::Global);
        let payload = [0u8; 15];
        b.iter(|| black_box(channel.validate(black_box(&payload))));
    });

    group.finish();
}

fn bench_advertisement_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("advertisement_parse");
    group.throughput(Throughput::Elements(1));

    let line = "ffff:3ad77bb40d7a3660a89ecaf32466ef97 004c:021500112233";
    group.bench_function("two_entries", |b| {
        b.iter(|| black_box(black_box(line).parse::<Advertisement>()));
    });

    group.finish();
}

criterion_group!(benches, bench_cipher, bench_validation, bench_advertisement_parse);
criterion_main!(benches);
