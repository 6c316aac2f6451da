//! Event kinds and kind matching.
//!
//! An event kind is the runtime tag of an event type. Events may declare
//! additional kinds they count as (their "supertypes"), which is how a
//! subscription for a base kind receives every derived kind:
//!
//! ```rust
//! use tuktuk_core::{Event, EventKind, EventSelector};
//!
//! #[derive(Debug)]
//! struct Moved;
//! impl Event for Moved {}
//!
//! #[derive(Debug)]
//! struct MovedFast;
//! impl Event for MovedFast {
//!     fn supertypes(&self) -> Vec<EventKind> {
//!         vec![EventKind::of::<Moved>()]
//!     }
//! }
//!
//! assert!(EventSelector::of::<Moved>().matches(&MovedFast));
//! assert!(!EventSelector::of::<MovedFast>().matches(&Moved));
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime tag of an event type
///
/// Two kinds are equal when they were taken from the same type. The type
/// name is carried along for logging only.
#[derive(Debug, Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
}

impl EventKind {
    /// The kind of `T`
    ///
    /// `T` does not have to be an event: marker types and trait objects
    /// (`dyn Trait`) work as base kinds that events opt into.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path or generic arguments
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Access to the concrete value behind a `dyn Event`.
///
/// Implemented for every `'static` type; there is no need to implement it by hand.
pub trait AsAny: Any {
    /// The value as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An event that can be published on the bus
///
/// Events carry no required data. Implementing the trait with an empty body
/// makes a type publishable under its own kind.
pub trait Event: AsAny + Send + Sync + fmt::Debug + 'static {
    /// The concrete kind of this event
    fn kind(&self) -> EventKind {
        EventKind::of::<Self>()
    }

    /// Kinds this event is delivered as besides its own.
    ///
    /// List the full ancestry: a grandchild kind names both its parent and
    /// its grandparent.
    fn supertypes(&self) -> Vec<EventKind> {
        Vec::new()
    }
}

impl dyn Event {
    /// Check whether this event is of `kind`, directly or through a supertype
    pub fn is(&self, kind: EventKind) -> bool {
        self.kind() == kind || self.supertypes().contains(&kind)
    }

    /// Borrow the concrete event if it is a `T`
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Which events a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSelector {
    /// Receive every event.
    All,
    /// Receive events of this kind, including events declaring it as a supertype.
    Kind(EventKind),
}

impl EventSelector {
    /// Select events of kind `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        EventSelector::Kind(EventKind::of::<T>())
    }

    /// Check if an event matches this selector
    pub fn matches(&self, event: &dyn Event) -> bool {
        match self {
            EventSelector::All => true,
            EventSelector::Kind(kind) => event.is(*kind),
        }
    }
}

impl fmt::Display for EventSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSelector::All => write!(f, "*"),
            EventSelector::Kind(kind) => write!(f, "{}", kind),
        }
    }
}
