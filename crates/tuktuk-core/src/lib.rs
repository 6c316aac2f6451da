//! # TukTuk Core
//!
//! The subscription registry and dispatch engine behind TukTuk.
//! Provides the event model, subscriptions, the bus lifecycle and the
//! asynchronous dispatcher.

pub mod config;
pub mod error;
pub mod event_bus;

pub use config::EventBusConfig;
pub use error::{EventBusError, Result};

// Re-export event bus for convenience
pub use event_bus::{
    Event, EventBus, EventHandler, EventKind, EventSelector, HandlerFailure, HandlerResult,
    Subscription, SubscriptionGuard, SubscriptionId, UnsubscribeSource,
};
