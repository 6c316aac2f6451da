//! # TukTuk
//!
//! A small in-process publish/subscribe event bus:
//! - Typed subscriptions with base-kind (supertype) matching
//! - Fire-and-forget asynchronous dispatch on a worker pool
//! - Targeted unsubscribe through disposable subscription handles
//! - An explicit active/disposed lifecycle
//!
//! ## Architecture
//!
//! 1. **tuktuk-core** - Event model, subscriptions, registry, dispatcher
//! 2. **tuktuk** - Logging setup and the demo binary

pub use tuktuk_core::event_bus;
pub use tuktuk_core::{
    Event, EventBus, EventBusConfig, EventBusError, EventHandler, EventKind, EventSelector,
    HandlerFailure, HandlerResult, Result, Subscription, SubscriptionGuard, SubscriptionId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
