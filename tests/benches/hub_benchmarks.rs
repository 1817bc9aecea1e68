//! # Event Hub Benchmarks
//!
//! | Area | Measurement |
//! |------|-------------|
//! | Dispatch | publish → delivery to N modules |
//! | Ledger | resolve over a long history with links |
//! | Shared state | cross-thread reads while the worker is busy |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use probe_hub::{
    Event, EventData, EventHub, EventListener, EventSource, EventType, HubConfig, Module,
    SharedStateKind, StateVersion,
};
use probe_state::{LedgerEntry, VersionedLedger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Sink(Arc<AtomicUsize>);

impl EventListener for Sink {
    fn hear(&mut self, _event: &Event) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

struct Bench(String);

impl Module for Bench {
    fn name(&self) -> &str {
        &self.0
    }
}

fn hub_with_modules(count: usize) -> (EventHub, Arc<AtomicUsize>) {
    let hub = EventHub::new(HubConfig::default()).expect("hub starts");
    let heard = Arc::new(AtomicUsize::new(0));
    for i in 0..count {
        let heard = Arc::clone(&heard);
        hub.register_module(
            move |ctx| {
                ctx.register_wildcard_listener(move |_| Ok(Sink(heard)), None);
                Ok(Bench(format!("com.bench.module{i}")))
            },
            None,
        );
    }
    drain(&hub);
    (hub, heard)
}

fn drain(hub: &EventHub) {
    hub.wait_idle().blocking_recv().expect("hub stopped");
}

// ============================================================================
// Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(5));

    for modules in [1, 8, 32] {
        let (hub, _heard) = hub_with_modules(modules);
        group.throughput(Throughput::Elements(1_000));
        group.bench_with_input(BenchmarkId::new("publish_1000", modules), &modules, |b, _| {
            b.iter(|| {
                for _ in 0..1_000 {
                    let event = Event::builder("bench", EventType::CUSTOM, EventSource::NONE).build();
                    black_box(hub.publish(event, None));
                }
                drain(&hub);
            })
        });
    }
    group.finish();
}

// ============================================================================
// Ledger
// ============================================================================

fn bench_ledger_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger");

    for size in [100u64, 10_000] {
        let mut ledger = VersionedLedger::new();
        for version in 0..size {
            let entry = if version % 4 == 0 {
                LedgerEntry::Concrete(version)
            } else {
                LedgerEntry::Pending
            };
            ledger.create(version, entry);
        }
        for version in (0..size).filter(|v| v % 4 == 1) {
            ledger.update(version, LedgerEntry::Next);
        }

        group.bench_with_input(BenchmarkId::new("resolve_linked", size), &size, |b, &size| {
            b.iter(|| {
                for version in (0..size).step_by(7) {
                    black_box(ledger.resolve(version));
                }
            })
        });
    }
    group.finish();
}

// ============================================================================
// Shared state
// ============================================================================

fn bench_shared_state_reads(c: &mut Criterion) {
    let hub = EventHub::new(HubConfig::default()).expect("hub starts");
    let (tx, rx) = std::sync::mpsc::channel();
    hub.register_module(
        move |ctx| {
            let _ = tx.send(ctx);
            Ok(Bench("com.bench.state".to_string()))
        },
        None,
    );
    let ctx = rx.recv().expect("module constructed");
    for i in 0..1_000 {
        let mut state = EventData::new();
        state.insert("i".to_string(), i.into());
        hub.publish(Event::builder("tick", EventType::CUSTOM, EventSource::NONE).build(), None);
        ctx.create_shared_state(Some(state), None, SharedStateKind::Standard, None);
    }
    drain(&hub);

    c.bench_function("shared_state_read_newest", |b| {
        b.iter(|| {
            black_box(hub.get_shared_state(
                "com.bench.state",
                StateVersion::Newest,
                SharedStateKind::Standard,
                None,
            ))
        })
    });
    c.bench_function("shared_state_read_historic", |b| {
        b.iter(|| {
            black_box(hub.get_shared_state("com.bench.state", 777, SharedStateKind::Standard, None))
        })
    });
}

criterion_group!(benches, bench_dispatch, bench_ledger_resolve, bench_shared_state_reads);
criterion_main!(benches);
