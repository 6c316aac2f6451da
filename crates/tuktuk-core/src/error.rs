//! Error handling for TukTuk
//!
//! Every precondition violation of the bus surfaces synchronously to the
//! caller as an [`EventBusError`]:
//! - Invalid arguments (a subscription built with a missing part)
//! - Invalid state (any operation on a disposed bus)
//! - Configuration errors (an unusable [`EventBusConfig`](crate::EventBusConfig))
//!
//! Handler failures are not part of this type. They happen inside a dispatch
//! unit, detached from the publisher, and are reported through
//! [`HandlerFailure`](crate::HandlerFailure) instead.

use thiserror::Error;

/// Event bus error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// A required input was not supplied
    #[error("Missing required argument: {parameter}")]
    InvalidArgument {
        /// Name of the missing parameter.
        parameter: &'static str,
    },

    /// The operation is not allowed in the current lifecycle state
    #[error("Invalid state: {reason}")]
    InvalidState {
        /// Why the operation was rejected.
        reason: String,
    },

    /// The bus configuration cannot be used
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl EventBusError {
    /// The error every operation on a disposed bus returns
    pub fn disposed() -> Self {
        EventBusError::InvalidState {
            reason: "the bus has already been disposed".to_string(),
        }
    }

    /// Create a configuration error from a message
    pub fn config(reason: impl Into<String>) -> Self {
        EventBusError::Config {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventBusError::InvalidArgument { .. } => "invalid_argument",
            EventBusError::InvalidState { .. } => "invalid_state",
            EventBusError::Config { .. } => "invalid_config",
        }
    }

    /// Check if this error was caused by a disposed bus
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, EventBusError::InvalidState { .. })
    }

    /// Check if this error was caused by a missing argument
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EventBusError::InvalidArgument { .. })
    }
}

/// Result type using EventBusError
pub type Result<T> = std::result::Result<T, EventBusError>;
