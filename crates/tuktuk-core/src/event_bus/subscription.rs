//! Subscriptions and their handles.
//!
//! A [`Subscription`] binds one [`EventSelector`] to one [`EventHandler`] and
//! carries a non-owning reference back to the registry that holds it, so it
//! can ask to be removed. Its identity is a [`SubscriptionId`] generated at
//! construction; nothing else takes part in equality or hashing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use uuid::Uuid;

use super::events::{Event, EventSelector};
use crate::error::{EventBusError, Result};

/// Result returned by event handlers
pub type HandlerResult = anyhow::Result<()>;

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying uuid
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

type HandlerFn = dyn Fn(&dyn Event) -> HandlerResult + Send + Sync;

/// Shared event handler callback
///
/// Clones share the same callback and compare equal. Two handlers built
/// from separate closures are never equal, even if the closures have the
/// same body.
#[derive(Clone)]
pub struct EventHandler(Arc<HandlerFn>);

impl EventHandler {
    /// Wrap a callback
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&dyn Event) -> HandlerResult + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Invoke the callback
    pub fn call(&self, event: &dyn Event) -> HandlerResult {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl Eq for EventHandler {}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Removes subscriptions on their behalf
///
/// Implemented by the bus. A subscription only ever calls this to request
/// its own removal; it never touches registry internals.
pub trait UnsubscribeSource: Send + Sync {
    /// Remove exactly `subscription`. Returns whether it was still registered.
    fn unsubscribe(&self, subscription: &Subscription) -> Result<bool>;
}

struct SubscriptionInner {
    id: SubscriptionId,
    selector: EventSelector,
    handler: EventHandler,
    source: Weak<dyn UnsubscribeSource>,
}

/// A live registration of a handler for an event selector
///
/// Cheap to clone; clones are the same subscription.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Start building a subscription
    pub fn builder() -> SubscriptionBuilder {
        SubscriptionBuilder::default()
    }

    /// Unique identifier of this subscription
    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// The events this subscription receives
    pub fn selector(&self) -> EventSelector {
        self.inner.selector
    }

    /// The handler invoked on dispatch
    pub fn handler(&self) -> &EventHandler {
        &self.inner.handler
    }

    /// Check whether `event` should be delivered to this subscription
    pub fn matches(&self, event: &dyn Event) -> bool {
        self.inner.selector.matches(event)
    }

    /// Invoke the handler with `event`. Handler errors are returned as is.
    pub fn dispatch(&self, event: &dyn Event) -> HandlerResult {
        self.inner.handler.call(event)
    }

    /// Ask the owning registry to remove this subscription.
    ///
    /// Releasing an already removed subscription is a no-op returning
    /// `Ok(false)`, as is releasing after the owning bus was dropped. A
    /// disposed bus rejects the request with
    /// [`EventBusError::InvalidState`].
    pub fn release(&self) -> Result<bool> {
        match self.inner.source.upgrade() {
            Some(source) => source.unsubscribe(self),
            None => Ok(false),
        }
    }

    /// Turn this handle into a guard that releases the subscription when dropped
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            subscription: Some(self),
        }
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Subscription {}

impl Hash for Subscription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("selector", &self.inner.selector)
            .finish()
    }
}

/// Builder for [`Subscription`]
///
/// All three parts are required; [`build`](Self::build) names the first
/// one that is missing.
#[derive(Default)]
pub struct SubscriptionBuilder {
    selector: Option<EventSelector>,
    handler: Option<EventHandler>,
    source: Option<Weak<dyn UnsubscribeSource>>,
}

impl SubscriptionBuilder {
    /// Events the subscription receives
    pub fn selector(mut self, selector: EventSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Callback invoked on dispatch
    pub fn handler(mut self, handler: EventHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Registry asked to remove the subscription on release
    pub fn source<S: UnsubscribeSource + 'static>(self, source: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(source);
        self.weak_source(weak)
    }

    /// Same as [`source`](Self::source) for a reference that is already weak
    pub fn weak_source(mut self, source: Weak<dyn UnsubscribeSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Create the subscription with a fresh identifier
    pub fn build(self) -> Result<Subscription> {
        let selector = self.selector.ok_or(EventBusError::InvalidArgument {
            parameter: "selector",
        })?;
        let handler = self.handler.ok_or(EventBusError::InvalidArgument {
            parameter: "handler",
        })?;
        let source = self.source.ok_or(EventBusError::InvalidArgument {
            parameter: "source",
        })?;

        Ok(Subscription {
            inner: Arc::new(SubscriptionInner {
                id: SubscriptionId::new(),
                selector,
                handler,
                source,
            }),
        })
    }
}

/// Releases its subscription when dropped
///
/// Errors from the release (a disposed bus) are logged and otherwise ignored.
#[derive(Debug)]
pub struct SubscriptionGuard {
    subscription: Option<Subscription>,
}

impl SubscriptionGuard {
    /// The guarded subscription
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Give up the guard without releasing the subscription
    pub fn into_inner(mut self) -> Option<Subscription> {
        self.subscription.take()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            if let Err(e) = subscription.release() {
                tracing::debug!("Release of {} on drop skipped: {}", subscription.id(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping;
    impl Event for Ping {}

    #[derive(Debug)]
    struct Pong;
    impl Event for Pong {}

    #[derive(Default)]
    struct RecordingSource {
        removed: Mutex<Vec<SubscriptionId>>,
    }

    impl UnsubscribeSource for RecordingSource {
        fn unsubscribe(&self, subscription: &Subscription) -> Result<bool> {
            self.removed.lock().push(subscription.id());
            Ok(true)
        }
    }

    fn noop() -> EventHandler {
        EventHandler::new(|_| Ok(()))
    }

    fn build(source: &Arc<RecordingSource>) -> Subscription {
        Subscription::builder()
            .selector(EventSelector::of::<Ping>())
            .handler(noop())
            .source(source)
            .build()
            .unwrap()
    }

    fn hash_of(sub: &Subscription) -> u64 {
        let mut hasher = DefaultHasher::new();
        sub.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_build_requires_selector() {
        let source = Arc::new(RecordingSource::default());
        let err = Subscription::builder()
            .handler(noop())
            .source(&source)
            .build()
            .unwrap_err();
        assert_eq!(err, EventBusError::InvalidArgument { parameter: "selector" });
    }

    #[test]
    fn test_build_requires_handler() {
        let source = Arc::new(RecordingSource::default());
        let err = Subscription::builder()
            .selector(EventSelector::of::<Ping>())
            .source(&source)
            .build()
            .unwrap_err();
        assert_eq!(err, EventBusError::InvalidArgument { parameter: "handler" });
    }

    #[test]
    fn test_build_requires_source() {
        let err = Subscription::builder()
            .selector(EventSelector::of::<Ping>())
            .handler(noop())
            .build()
            .unwrap_err();
        assert_eq!(err, EventBusError::InvalidArgument { parameter: "source" });
    }

    #[test]
    fn test_build_with_all_parts() {
        let source = Arc::new(RecordingSource::default());
        let sub = build(&source);
        assert_eq!(sub.selector(), EventSelector::of::<Ping>());
    }

    #[test]
    fn test_matches_by_selector() {
        let source = Arc::new(RecordingSource::default());
        let sub = build(&source);
        assert!(sub.matches(&Ping));
        assert!(!sub.matches(&Pong));
    }

    #[test]
    fn test_dispatch_invokes_handler() {
        let source = Arc::new(RecordingSource::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let sub = Subscription::builder()
            .selector(EventSelector::of::<Ping>())
            .handler(EventHandler::new(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .source(&source)
            .build()
            .unwrap();

        sub.dispatch(&Ping).unwrap();
        sub.dispatch(&Ping).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispatch_propagates_handler_error() {
        let source = Arc::new(RecordingSource::default());
        let sub = Subscription::builder()
            .selector(EventSelector::All)
            .handler(EventHandler::new(|_| anyhow::bail!("boom")))
            .source(&source)
            .build()
            .unwrap();

        let err = sub.dispatch(&Ping).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_equality_is_identity() {
        let source = Arc::new(RecordingSource::default());
        let a = build(&source);
        let b = build(&source);

        assert_eq!(a, a);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_hash_follows_id() {
        let source = Arc::new(RecordingSource::default());
        let a = build(&source);
        let b = build(&source);

        assert_eq!(hash_of(&a), hash_of(&a));
        assert_eq!(hash_of(&a), hash_of(&a.clone()));
        assert_ne!(hash_of(&a), hash_of(&b));

        let set: HashSet<Subscription> = [a.clone(), a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_release_asks_source() {
        let source = Arc::new(RecordingSource::default());
        let sub = build(&source);

        assert!(sub.release().unwrap());
        assert_eq!(source.removed.lock().as_slice(), &[sub.id()]);
    }

    #[test]
    fn test_release_after_source_dropped_is_noop() {
        let source = Arc::new(RecordingSource::default());
        let sub = build(&source);
        drop(source);

        assert!(!sub.release().unwrap());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let source = Arc::new(RecordingSource::default());
        let sub = build(&source);
        let id = sub.id();

        {
            let guard = sub.into_guard();
            assert_eq!(guard.subscription().map(|s| s.id()), Some(id));
        }
        assert_eq!(source.removed.lock().as_slice(), &[id]);
    }

    #[test]
    fn test_guard_into_inner_keeps_subscription() {
        let source = Arc::new(RecordingSource::default());
        let guard = build(&source).into_guard();

        let sub = guard.into_inner();
        assert!(sub.is_some());
        assert!(source.removed.lock().is_empty());
    }

    #[test]
    fn test_handler_equality() {
        let handler = noop();
        assert_eq!(handler, handler.clone());
        assert_ne!(handler, noop());
    }

    #[test]
    fn test_subscription_id_display() {
        let source = Arc::new(RecordingSource::default());
        let sub = build(&source);
        let shown = sub.id().to_string();
        assert!(shown.starts_with("Sub("));
        assert_eq!(shown.len(), "Sub(12345678)".len());
    }
}
