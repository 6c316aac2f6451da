//! Event Bus implementation.
//!
//! Provides the [`EventBus`] struct: a per-instance subscription registry
//! with asynchronous, fire-and-forget dispatch.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tokio::runtime::Handle;

use super::dispatch::{Dispatcher, FailureHook, HandlerFailure};
use super::events::{Event, EventSelector};
use super::subscription::{
    EventHandler, HandlerResult, Subscription, SubscriptionId, UnsubscribeSource,
};
use crate::config::EventBusConfig;
use crate::error::{EventBusError, Result};

/// Lifecycle of a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusState {
    Active,
    /// Draining the registry on the way to `Disposed`. Only releases made by
    /// the draining thread are accepted.
    Disposing(ThreadId),
    Disposed,
}

struct Registry {
    state: BusState,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl Registry {
    fn ensure_active(&self) -> Result<()> {
        match self.state {
            BusState::Active => Ok(()),
            BusState::Disposing(_) | BusState::Disposed => Err(EventBusError::disposed()),
        }
    }
}

/// State shared between the bus and the back-references of its subscriptions
struct BusShared {
    registry: RwLock<Registry>,
    /// Serializes clear and dispose.
    lifecycle: Mutex<()>,
    self_ref: Weak<BusShared>,
}

impl BusShared {
    /// Empty the registry, moving to `next`, then release every drained member
    fn drain(&self, next: BusState) -> Result<usize> {
        let drained = {
            let mut registry = self.registry.write();
            registry.ensure_active()?;
            registry.state = next;
            std::mem::take(&mut registry.subscriptions)
        };

        for subscription in drained.values() {
            if let Err(e) = subscription.release() {
                tracing::debug!("Release of {} during drain failed: {}", subscription.id(), e);
            }
        }
        Ok(drained.len())
    }
}

impl UnsubscribeSource for BusShared {
    fn unsubscribe(&self, subscription: &Subscription) -> Result<bool> {
        let mut registry = self.registry.write();
        match registry.state {
            BusState::Active => {}
            BusState::Disposing(drainer) if drainer == thread::current().id() => {}
            BusState::Disposing(_) | BusState::Disposed => {
                return Err(EventBusError::disposed())
            }
        }

        let removed = registry.subscriptions.remove(&subscription.id()).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", subscription.id());
        }
        Ok(removed)
    }
}

/// In-process publish/subscribe event bus
///
/// Every bus owns its own registry; two buses never see each other's
/// subscriptions. Wrap the bus in an `Arc` to share it between threads.
///
/// ```
/// use tuktuk_core::{Event, EventBus};
///
/// #[derive(Debug)]
/// struct Greeting;
/// impl Event for Greeting {}
///
/// let bus = EventBus::new().unwrap();
/// let subscription = bus
///     .subscribe::<Greeting, _>(|_| {
///         println!("hello");
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(bus.publish(Greeting).unwrap(), 1);
/// subscription.release().unwrap();
/// bus.dispose().unwrap();
/// ```
pub struct EventBus {
    shared: Arc<BusShared>,
    dispatcher: Dispatcher,
}

impl EventBus {
    /// Create a new event bus with default configuration
    ///
    /// Inside a tokio runtime the bus dispatches on that runtime; otherwise it
    /// starts its own.
    pub fn new() -> Result<Self> {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Result<Self> {
        Ok(Self::from_dispatcher(Dispatcher::new(&config)?))
    }

    /// Create a new event bus dispatching on the runtime behind `handle`
    pub fn with_handle(handle: Handle) -> Self {
        Self::from_dispatcher(Dispatcher::with_handle(handle))
    }

    fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        let shared = Arc::new_cyclic(|self_ref| BusShared {
            registry: RwLock::new(Registry {
                state: BusState::Active,
                subscriptions: HashMap::new(),
            }),
            lifecycle: Mutex::new(()),
            self_ref: self_ref.clone(),
        });
        Self { shared, dispatcher }
    }

    /// Subscribe a handler to events of kind `E` and every kind declaring `E`
    /// as a supertype
    pub fn subscribe<E, F>(&self, handler: F) -> Result<Subscription>
    where
        E: ?Sized + 'static,
        F: Fn(&dyn Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_selector(EventSelector::of::<E>(), EventHandler::new(handler))
    }

    /// Subscribe a shared handler to events of kind `E`
    ///
    /// Subscribing the same handler (or a clone of it) to the same kind again
    /// returns the existing subscription.
    pub fn subscribe_handler<E>(&self, handler: EventHandler) -> Result<Subscription>
    where
        E: ?Sized + 'static,
    {
        self.subscribe_selector(EventSelector::of::<E>(), handler)
    }

    /// Subscribe a handler to every event published on this bus
    pub fn subscribe_all<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(&dyn Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe_selector(EventSelector::All, EventHandler::new(handler))
    }

    /// Subscribe `handler` to the events chosen by `selector`
    pub fn subscribe_selector(
        &self,
        selector: EventSelector,
        handler: EventHandler,
    ) -> Result<Subscription> {
        let mut registry = self.shared.registry.write();
        registry.ensure_active()?;

        if let Some(existing) = registry
            .subscriptions
            .values()
            .find(|s| s.selector() == selector && *s.handler() == handler)
        {
            return Ok(existing.clone());
        }

        let source: Weak<dyn UnsubscribeSource> = self.shared.self_ref.clone();
        let subscription = Subscription::builder()
            .selector(selector)
            .handler(handler)
            .weak_source(source)
            .build()?;
        registry
            .subscriptions
            .insert(subscription.id(), subscription.clone());
        tracing::debug!("Subscription {} added for {}", subscription.id(), selector);

        Ok(subscription)
    }

    /// Remove exactly `subscription` from the registry
    ///
    /// Returns true if the subscription was found and removed. Removing a
    /// subscription that is no longer registered is not an error.
    pub fn unsubscribe(&self, subscription: &Subscription) -> Result<bool> {
        self.shared.unsubscribe(subscription)
    }

    /// Publish an event to all matching subscribers
    ///
    /// The matching subscriptions are snapshotted before returning; their
    /// handlers run later on a dispatch worker, in no particular order.
    /// Returns the number of subscriptions the event will be delivered to.
    pub fn publish<E: Event>(&self, event: E) -> Result<usize> {
        self.publish_arc(Arc::new(event))
    }

    /// Publish an event that is already shared
    pub fn publish_arc(&self, event: Arc<dyn Event>) -> Result<usize> {
        let targets: Vec<Subscription> = {
            let registry = self.shared.registry.read();
            registry.ensure_active()?;
            registry
                .subscriptions
                .values()
                .filter(|s| s.matches(event.as_ref()))
                .cloned()
                .collect()
        };

        let matched = targets.len();
        if matched > 0 {
            self.dispatcher.submit(event, targets);
        }
        Ok(matched)
    }

    /// Unsubscribe everyone. The bus stays usable.
    pub fn clear(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock();
        let cleared = self.shared.drain(BusState::Active)?;
        tracing::debug!("Cleared {} subscription(s)", cleared);
        Ok(())
    }

    /// Clear the bus and shut it down for good
    ///
    /// Every later call, including a second `dispose`, fails with
    /// [`EventBusError::InvalidState`]. Dispatch units already submitted
    /// still run.
    pub fn dispose(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock();
        let cleared = self.shared.drain(BusState::Disposing(thread::current().id()))?;
        self.shared.registry.write().state = BusState::Disposed;
        tracing::debug!("Bus disposed ({} subscription(s) cleared)", cleared);
        Ok(())
    }

    /// Whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        self.shared.registry.read().state != BusState::Active
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.read().subscriptions.len()
    }

    /// Number of published events whose dispatch has not finished yet
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Observe handler failures
    ///
    /// By default failures are only logged. The hook runs on the dispatch
    /// worker and applies to events published after it is set.
    pub fn on_handler_failure<F>(&self, hook: F)
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        let hook: FailureHook = Arc::new(hook);
        self.dispatcher.set_failure_hook(Some(hook));
    }

    /// Go back to logging handler failures only
    pub fn clear_failure_hook(&self) {
        self.dispatcher.set_failure_hook(None);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("disposed", &self.is_disposed())
            .field("in_flight", &self.in_flight())
            .field("owns_runtime", &self.dispatcher.owns_runtime())
            .finish()
    }
}
