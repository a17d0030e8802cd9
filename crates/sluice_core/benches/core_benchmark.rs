//! # Core Container Benchmark
//!
//! REQUIREMENTS:
//! - Ring push/pop and pool acquire/release are O(1) with 0 allocations
//! - Slot scan cost grows with live entities, not with lookups
//!
//! Run with: `cargo bench --package sluice_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sluice_core::{EntityId, EntitySlotPool, ExhaustionPolicy, ObjectPool, Reset, RingBuffer, Vec2};

#[derive(Default)]
struct Record {
    amount: f32,
    tags: Vec<u8>,
}

impl Reset for Record {
    fn reset(&mut self) {
        self.amount = 0.0;
        self.tags.clear();
    }
}

fn bench_ring_push_pop(c: &mut Criterion) {
    let mut ring: RingBuffer<u32> = RingBuffer::new(1024);
    c.bench_function("ring_push_pop_1024", |b| {
        b.iter(|| {
            for i in 0..1024u32 {
                ring.push(black_box(i));
            }
            while let Some(item) = ring.pop() {
                black_box(item);
            }
        });
    });
}

fn bench_ring_overflow(c: &mut Criterion) {
    let mut ring: RingBuffer<u32> = RingBuffer::new(256);
    c.bench_function("ring_push_overflowing", |b| {
        b.iter(|| {
            for i in 0..1024u32 {
                black_box(ring.push(i));
            }
        });
    });
}

fn bench_pool_cycle(c: &mut Criterion) {
    let mut pool = ObjectPool::with_factory(1024, ExhaustionPolicy::Reject, || Record {
        amount: 0.0,
        tags: Vec::with_capacity(8),
    });
    c.bench_function("pool_acquire_fill_release", |b| {
        b.iter(|| {
            let Some(handle) = pool.acquire().handle() else {
                return;
            };
            if let Some(record) = pool.get_mut(handle) {
                record.amount = 10.0;
                record.tags.extend_from_slice(&[1, 2, 3]);
            }
            black_box(pool.release(handle)).ok();
        });
    });
}

fn bench_slot_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_scan");

    for alive in [100u32, 400, 1000] {
        let mut slots = EntitySlotPool::new(1000);
        for i in 0..alive {
            slots.spawn(EntityId::new(i, 0), Vec2::ZERO, 10.0);
        }
        group.bench_with_input(BenchmarkId::from_parameter(alive), &alive, |b, _| {
            b.iter(|| {
                slots.for_each_alive_mut(|slot| {
                    slot.position += Vec2::new(0.1, 0.1);
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ring_push_pop,
    bench_ring_overflow,
    bench_pool_cycle,
    bench_slot_scan
);
criterion_main!(benches);
