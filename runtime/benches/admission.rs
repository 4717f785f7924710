//! Admission throughput benchmarks.
//!
//! - Combined admission decision on the in-process gate
//! - Full `ExecuteFlashSale` against in-memory stores
//!
//! Run with: `cargo bench -p flashsale-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used, clippy::unwrap_used)] // Benchmarks can use expect for setup

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use flashsale_core::environment::SystemClock;
use flashsale_core::{ActivityId, AdmissionGate, PaymentMethod, RequesterId, StockLedger};
use flashsale_runtime::InMemoryAdmissionGate;
use flashsale_testing::TestBed;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(3600);

fn bench_gate_admit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let gate = InMemoryAdmissionGate::new(Arc::new(SystemClock));
    let id = ActivityId::new();
    rt.block_on(gate.set_remaining(id, u32::MAX, TTL)).unwrap();

    let mut group = c.benchmark_group("admission_gate");
    group.throughput(Throughput::Elements(1));
    group.bench_function("admit_fresh_requester", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(gate.admit(id, RequesterId::new(), 1, TTL).await.unwrap())
        });
    });

    let repeat = RequesterId::new();
    rt.block_on(gate.admit(id, repeat, 1, TTL)).unwrap();
    group.bench_function("admit_repeat_requester", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(gate.admit(id, repeat, 1, TTL).await.unwrap()) });
    });
    group.finish();
}

fn bench_execute_flash_sale(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let bed = TestBed::new();
    let sold_out = rt.block_on(bed.open_activity(0));
    let plenty = rt.block_on(bed.open_activity(u32::MAX / 2));

    let mut group = c.benchmark_group("execute_flash_sale");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sold_out", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                bed.service
                    .execute_flash_sale(RequesterId::new(), sold_out.id, PaymentMethod::Alipay)
                    .await,
            )
        });
    });
    group.bench_function("ordered", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                bed.service
                    .execute_flash_sale(RequesterId::new(), plenty.id, PaymentMethod::Alipay)
                    .await,
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_gate_admit, bench_execute_flash_sale);
criterion_main!(benches);
