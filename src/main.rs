use std::time::Duration;

use tuktuk::{init_logging, Event, EventBus};

const UPPER_BOUND: u32 = 10_000;

#[derive(Debug)]
struct MultipleOfFifteen {
    winner: u32,
}

impl Event for MultipleOfFifteen {}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging()?;

    let bus = EventBus::new()?;
    let _subscription = bus.subscribe::<MultipleOfFifteen, _>(|event| {
        if let Some(e) = event.downcast_ref::<MultipleOfFifteen>() {
            println!("{} is a multiple of 15!", e.winner);
        }
        Ok(())
    })?;

    tracing::info!("Outputting multiples of 15 between 0 and {}...", UPPER_BOUND);
    let published = run(&bus)?;

    // Dispatch is fire-and-forget; give the queue a chance to drain before shutting down
    while bus.in_flight() > 0 {
        std::thread::sleep(Duration::from_millis(10));
    }
    tracing::info!("Delivered {} events", published);

    bus.dispose()?;
    Ok(())
}

fn run(bus: &EventBus) -> tuktuk::Result<usize> {
    let mut published = 0;
    for i in (0..UPPER_BOUND).filter(|i| i % 15 == 0) {
        published += bus.publish(MultipleOfFifteen { winner: i })?;
    }
    Ok(published)
}
