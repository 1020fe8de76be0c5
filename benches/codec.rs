use std::collections::BTreeMap;

use acache::capture::StorableResponse;
use acache::key::alias_key;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn response(body_size: usize) -> StorableResponse {
    let mut header = BTreeMap::new();
    header.insert(
        "content-type".to_string(),
        vec!["application/json".to_string()],
    );
    header.insert(
        "set-cookie".to_string(),
        vec!["session=abc".to_string(), "theme=dark".to_string()],
    );

    StorableResponse {
        status: "200 OK".to_string(),
        status_code: 200,
        header,
        body: vec![b'x'; body_size],
    }
}

fn bench_alias_key(c: &mut Criterion) {
    c.bench_function("alias_key", |b| {
        b.iter(|| alias_key(black_box("pokemon/ditto")));
    });
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("storable_response");

    for size in [100, 10_000, 1_000_000] {
        let resp = response(size);
        let encoded = resp.encode();

        group.bench_with_input(BenchmarkId::new("encode", size), &resp, |b, resp| {
            b.iter(|| black_box(resp).encode());
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, data| {
            b.iter(|| StorableResponse::decode(black_box(data)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_alias_key, bench_codec);
criterion_main!(benches);
