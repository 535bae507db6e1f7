//! Performance benchmarks for a3s-emitter
//!
//! Run with: cargo bench

use a3s_emitter::{Codec, Emitter, EmitterConfig, FieldNames, MemoryPublisher, Value};
use criterion::{criterion_group, criterion_main, Criterion};
use tokio_util::sync::CancellationToken;

fn sample_payload() -> Vec<Value> {
    vec![
        Value::from("market.update"),
        a3s_emitter::from_json(serde_json::json!({
            "pair": "USD/CNY",
            "rate": 7.35,
            "volume": 1200.0,
            "tags": ["forex", "asia"],
        })),
    ]
}

fn bench_has_binary(c: &mut Criterion) {
    let plain = sample_payload();
    let mut binary = sample_payload();
    binary.push(Value::Binary(vec![0u8; 64]));

    c.bench_function("has_binary (plain)", |b| {
        b.iter(|| a3s_emitter::has_binary(&plain));
    });
    c.bench_function("has_binary (binary)", |b| {
        b.iter(|| a3s_emitter::has_binary(&binary));
    });
}

fn bench_codec(c: &mut Criterion) {
    let codec = Codec::default();
    let payload = Value::Array(sample_payload());

    c.bench_function("Codec::encode (compatible)", |b| {
        b.iter(|| {
            codec
                .encode(&a3s_emitter::CompactValue(&payload), FieldNames::Compatible)
                .unwrap()
        });
    });
}

fn bench_memory_emit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let cancel = CancellationToken::new();

    let mut group = c.benchmark_group("emit");
    for rooms in [0usize, 1, 10] {
        group.bench_function(format!("{} rooms", rooms), |b| {
            b.to_async(&rt).iter(|| async {
                let mut emitter = Emitter::new(MemoryPublisher::default(), EmitterConfig::default());
                for i in 0..rooms {
                    emitter.to(format!("room-{}", i));
                }
                emitter.emit(&cancel, sample_payload()).await.map(|_| ()).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_has_binary, bench_codec, bench_memory_emit);
criterion_main!(benches);
