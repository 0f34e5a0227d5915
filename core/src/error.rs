//! Error taxonomy for the RSVP engine.
//!
//! Every failing operation returns one of these kinds and leaves state exactly
//! as it was before the call. Nothing here is retried by the engine; retry
//! policy belongs to the caller.

use crate::types::{EventId, EventStatus, TicketId, UserId};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Why a presented ticket was treated as tampering or misuse
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidTicketReason {
    /// No ticket with this id was ever issued
    UnknownTicket,
    /// The ticket belongs to a different event than the one scanning it
    EventMismatch,
    /// The scanned code could not be decoded
    Malformed,
}

impl InvalidTicketReason {
    /// Label used for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTicket => "unknown_ticket",
            Self::EventMismatch => "event_mismatch",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for InvalidTicketReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by every engine operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RsvpError {
    /// Malformed input; the caller must fix it
    #[error("Validation error: {0}")]
    Validation(String),

    /// The event's lifecycle status does not permit the action
    #[error("Event {event_id} is {status}: {reason}")]
    InvalidState {
        /// Event the action targeted
        event_id: EventId,
        /// Status at the time of the check
        status: EventStatus,
        /// What was refused
        reason: String,
    },

    /// The going-count is at or above capacity
    #[error("Event {event_id} is full ({capacity} going)")]
    CapacityExceeded {
        /// Full event
        event_id: EventId,
        /// Configured ceiling
        capacity: u32,
    },

    /// The ticket's holder is no longer going, or the ticket was superseded
    #[error("Ticket {ticket_id} has been revoked")]
    TicketRevoked {
        /// Revoked ticket
        ticket_id: TicketId,
    },

    /// The ticket was already consumed
    #[error("Ticket {ticket_id} was already used at {validated_at}")]
    TicketAlreadyUsed {
        /// Consumed ticket
        ticket_id: TicketId,
        /// Time of the first successful check-in
        validated_at: DateTime<Utc>,
    },

    /// Unknown ticket, wrong event, or undecodable code
    #[error("Invalid ticket ({reason})")]
    InvalidTicket {
        /// Classification for abuse monitoring
        reason: InvalidTicketReason,
    },

    /// No event registered under this id
    #[error("Event {0} not found")]
    EventNotFound(EventId),

    /// An event is already registered under this id
    #[error("Event {0} already exists")]
    DuplicateEvent(EventId),

    /// The caller is not allowed to perform an organizer action
    #[error("User {user_id} is not the organizer of event {event_id}")]
    PermissionDenied {
        /// Target event
        event_id: EventId,
        /// Rejected caller
        user_id: UserId,
    },
}

impl RsvpError {
    /// Stable machine-readable code
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::TicketRevoked { .. } => "TICKET_REVOKED",
            Self::TicketAlreadyUsed { .. } => "TICKET_ALREADY_USED",
            Self::InvalidTicket { .. } => "INVALID_TICKET",
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::DuplicateEvent(_) => "DUPLICATE_EVENT",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
        }
    }

    /// Shorthand for [`RsvpError::InvalidState`]
    #[must_use]
    pub fn invalid_state(event_id: EventId, status: EventStatus, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            event_id,
            status,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RsvpError::InvalidTicket`]
    #[must_use]
    pub const fn invalid_ticket(reason: InvalidTicketReason) -> Self {
        Self::InvalidTicket { reason }
    }
}
