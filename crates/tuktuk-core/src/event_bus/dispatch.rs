//! Asynchronous dispatch of published events.
//!
//! Every publish that matches at least one subscription becomes one dispatch
//! unit: a blocking job on the tokio runtime that calls each matched handler
//! in turn. Units are independent of each other and of the publisher.
//!
//! ## Rules
//! - **Fire-and-forget**: nothing flows back to the publisher.
//! - **No ordering**: two units may run concurrently and finish in any order.
//! - **Isolation**: a handler that fails or panics is reported as a
//!   [`HandlerFailure`] and the remaining handlers of the unit still run.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::{Builder, Handle, Runtime};

use super::events::{Event, EventKind};
use super::subscription::{Subscription, SubscriptionId};
use crate::config::EventBusConfig;
use crate::error::{EventBusError, Result};

/// A handler that failed while processing an event
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Subscription whose handler failed.
    pub subscription: SubscriptionId,
    /// Kind of the event being handled.
    pub event_kind: EventKind,
    /// Error message, or the panic payload if the handler panicked.
    pub reason: String,
    /// Whether the handler panicked instead of returning an error.
    pub panicked: bool,
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = if self.panicked { "panicked" } else { "failed" };
        write!(
            f,
            "handler of {} {} on {}: {}",
            self.subscription, what, self.event_kind, self.reason
        )
    }
}

/// Callback receiving handler failures
pub type FailureHook = Arc<dyn Fn(&HandlerFailure) + Send + Sync>;

/// Decrements the in-flight counter when the unit finishes or is dropped unrun
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs dispatch units on a tokio runtime
pub(crate) struct Dispatcher {
    handle: Handle,
    /// Present when the bus built its own runtime.
    runtime: Option<Runtime>,
    in_flight: Arc<AtomicUsize>,
    failure_hook: RwLock<Option<FailureHook>>,
}

impl Dispatcher {
    /// Use the current tokio runtime if there is one, otherwise build one from `config`
    pub(crate) fn new(config: &EventBusConfig) -> Result<Self> {
        match Handle::try_current() {
            Ok(handle) => Ok(Self::with_handle(handle)),
            Err(_) => Self::owned(config),
        }
    }

    /// Dispatch on an existing runtime
    pub(crate) fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            runtime: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            failure_hook: RwLock::new(None),
        }
    }

    fn owned(config: &EventBusConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|e| EventBusError::config(format!("cannot start dispatch runtime: {e}")))?;
        tracing::debug!(
            "Dispatch runtime started ({} blocking threads max)",
            config.max_blocking_threads
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            in_flight: Arc::new(AtomicUsize::new(0)),
            failure_hook: RwLock::new(None),
        })
    }

    /// Whether the runtime is owned by this dispatcher
    pub(crate) fn owns_runtime(&self) -> bool {
        self.runtime.is_some()
    }

    /// Number of submitted units that have not finished yet
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failure_hook(&self, hook: Option<FailureHook>) {
        *self.failure_hook.write() = hook;
    }

    /// Schedule one dispatch unit and return without waiting for it
    pub(crate) fn submit(&self, event: Arc<dyn Event>, targets: Vec<Subscription>) {
        let in_flight = InFlight::enter(&self.in_flight);
        let hook = self.failure_hook.read().clone();

        self.handle.spawn_blocking(move || {
            let _in_flight = in_flight;
            run_unit(event.as_ref(), &targets, hook.as_ref());
        });
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Deliver `event` to every target, isolating failures
fn run_unit(event: &dyn Event, targets: &[Subscription], hook: Option<&FailureHook>) {
    tracing::trace!("Dispatching {} to {} subscription(s)", event.kind(), targets.len());

    for subscription in targets {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| subscription.dispatch(event)));
        let (reason, panicked) = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => (format!("{e:#}"), false),
            Err(payload) => (panic_message(payload.as_ref()), true),
        };

        let failure = HandlerFailure {
            subscription: subscription.id(),
            event_kind: event.kind(),
            reason,
            panicked,
        };
        tracing::warn!("{}", failure);

        if let Some(hook) = hook {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| hook(&failure))) {
                tracing::warn!(
                    "Failure hook panicked on {}: {}",
                    subscription.id(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
