use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tuktuk_core::{Event, EventBus, EventKind, EventSelector};

#[derive(Debug)]
struct Sample(u64);
impl Event for Sample {}

#[derive(Debug)]
struct Other;
impl Event for Other {
    fn supertypes(&self) -> Vec<EventKind> {
        vec![EventKind::of::<Sample>()]
    }
}

fn wait_for_drain(bus: &EventBus) {
    while bus.in_flight() > 0 {
        std::thread::sleep(Duration::from_micros(50));
    }
}

fn bench_selector_matching(c: &mut Criterion) {
    let selector = EventSelector::of::<Sample>();
    c.bench_function("selector_match_direct", |b| {
        b.iter(|| selector.matches(black_box(&Sample(1))))
    });
    c.bench_function("selector_match_supertype", |b| {
        b.iter(|| selector.matches(black_box(&Other)))
    });
}

fn bench_publish(c: &mut Criterion) {
    let bus = EventBus::new().expect("bus");
    for _ in 0..32 {
        bus.subscribe::<Sample, _>(|_| Ok(())).expect("subscribe");
    }
    for _ in 0..32 {
        bus.subscribe::<Other, _>(|_| Ok(())).expect("subscribe");
    }

    c.bench_function("publish_fan_out_32", |b| {
        b.iter(|| bus.publish(Sample(black_box(7))).expect("publish"))
    });
    wait_for_drain(&bus);

    c.bench_function("publish_fan_out_64_supertype", |b| {
        b.iter(|| bus.publish(black_box(Other)).expect("publish"))
    });
    wait_for_drain(&bus);
}

criterion_group!(benches, bench_selector_matching, bench_publish);
criterion_main!(benches);
