//! Event bus error primitives.

use std::fmt::{self, Display, Formatter};

use crate::payloads::EventId;

/// Error emitted when an event could not be handed to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBusError {
    /// A subscriber fell behind and skipped events.
    Lagged {
        /// Number of envelopes the subscriber missed.
        skipped: u64,
        /// Last event id the subscriber processed, if any.
        last_seen: Option<EventId>,
    },
}

impl EventBusError {
    /// Number of events skipped by the lagging subscriber.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        match self {
            Self::Lagged { skipped, .. } => *skipped,
        }
    }
}

impl Display for EventBusError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("event subscriber lagged behind the bus")
    }
}

impl std::error::Error for EventBusError {}

/// Result wrapper for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagged_error_exposes_fields() {
        let err = EventBusError::Lagged {
            skipped: 7,
            last_seen: Some(42),
        };

        assert_eq!(err.skipped(), 7);
        assert_eq!(err.to_string(), "event subscriber lagged behind the bus");
    }
}
