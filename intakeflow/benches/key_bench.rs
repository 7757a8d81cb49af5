//! Benchmarks for idempotency key derivation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use intakeflow::idempotency::KeyDeriver;
use serde_json::json;

fn key_benchmark(c: &mut Criterion) {
    let deriver = KeyDeriver::default();
    let flat = json!({
        "company_id": "ACME-001",
        "company_name": "Acme Corp",
        "revenue": "$5,000,000",
        "industry": "Retail",
        "state": "CA",
        "correlation_id": "c-1",
        "received_at": "2024-03-01T10:00:00Z"
    });
    let nested = json!({
        "company_id": "ACME-001",
        "locations": (0..50)
            .map(|i| json!({"zip": format!("{:05}", 10_000 + i), "employees": i * 3}))
            .collect::<Vec<_>>(),
        "contacts": {"primary": {"name": "Dana", "email": "dana@example.com"}}
    });

    c.bench_function("derive_flat", |b| {
        b.iter(|| deriver.derive(black_box(&flat)));
    });
    c.bench_function("derive_nested", |b| {
        b.iter(|| deriver.derive(black_box(&nested)));
    });
}

criterion_group!(benches, key_benchmark);
criterion_main!(benches);
