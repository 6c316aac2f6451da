//! # Event Bus Module
//!
//! In-process publish/subscribe with asynchronous fan-out.
//!
//! ## Overview
//!
//! - Callers subscribe handlers for an event kind and get a [`Subscription`]
//!   handle back; releasing the handle unsubscribes exactly that handler.
//! - Publishing snapshots the matching subscriptions and hands them to a
//!   dispatch worker. The publisher never waits for handlers.
//! - A kind matches its own events and every event that declares it as a
//!   supertype.
//! - `clear` unsubscribes everyone; `dispose` does the same and shuts the bus
//!   down for good.
//!
//! ## Usage
//!
//! ```rust
//! use tuktuk_core::event_bus::{Event, EventBus};
//!
//! #[derive(Debug)]
//! struct Saved {
//!     path: String,
//! }
//! impl Event for Saved {}
//!
//! let bus = EventBus::new()?;
//!
//! // Subscribe to save events
//! let subscription = bus.subscribe::<Saved, _>(|event| {
//!     if let Some(saved) = event.downcast_ref::<Saved>() {
//!         println!("saved {}", saved.path);
//!     }
//!     Ok(())
//! })?;
//!
//! // Publish an event
//! bus.publish(Saved { path: "part.nc".to_string() })?;
//!
//! // Unsubscribe when done
//! subscription.release()?;
//! # Ok::<(), tuktuk_core::EventBusError>(())
//! ```

mod bus;
mod dispatch;
mod events;
mod subscription;

pub use bus::EventBus;
pub use dispatch::{FailureHook, HandlerFailure};
pub use events::{AsAny, Event, EventKind, EventSelector};
pub use subscription::{
    EventHandler, HandlerResult, Subscription, SubscriptionBuilder, SubscriptionGuard,
    SubscriptionId, UnsubscribeSource,
};
