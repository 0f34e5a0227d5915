//! Per-event state and the facts emitted when it changes.

use chrono::{DateTime, Utc};
use event_rsvp_core::types::{
    Attendance, Event, EventId, EventStatus, RsvpStatus, Ticket, TicketId, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// State
// ============================================================================

/// Everything known about one event, guarded by that event's lock
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventState {
    /// The event row
    pub event: Event,
    /// Attendance keyed by attendee; rows appear on a user's first action
    pub attendances: HashMap<UserId, Attendance>,
    going: u32,
}

impl EventState {
    /// Fresh state with no attendances
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            event,
            attendances: HashMap::new(),
            going: 0,
        }
    }

    /// Number of attendances currently `going`
    #[must_use]
    pub const fn going_count(&self) -> u32 {
        self.going
    }

    /// Count `going` attendances from scratch
    ///
    /// Agrees with [`EventState::going_count`] whenever the state was only
    /// mutated through the reducer.
    #[must_use]
    pub fn recount_going(&self) -> usize {
        self.attendances
            .values()
            .filter(|a| a.status() == RsvpStatus::Going)
            .count()
    }

    /// Attendance for `user_id`, if they ever acted on this event
    #[must_use]
    pub fn attendance(&self, user_id: &UserId) -> Option<&Attendance> {
        self.attendances.get(user_id)
    }

    /// Current status of `user_id` (implicitly `not_going` before any action)
    #[must_use]
    pub fn status_of(&self, user_id: &UserId) -> RsvpStatus {
        self.attendance(user_id)
            .map_or(RsvpStatus::NotGoing, Attendance::status)
    }

    pub(crate) fn increment_going(&mut self) {
        self.going += 1;
    }

    pub(crate) fn decrement_going(&mut self) {
        self.going = self.going.saturating_sub(1);
    }
}

// ============================================================================
// Emitted facts
// ============================================================================

/// Facts published on the engine's broadcast channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An organizer registered an event
    EventCreated {
        /// New event
        event_id: EventId,
        /// Organizer
        organizer_id: UserId,
        /// Scheduled start
        starts_at: DateTime<Utc>,
    },

    /// An attendee's RSVP status changed
    RsvpChanged {
        /// Event
        event_id: EventId,
        /// Attendee
        user_id: UserId,
        /// Previous status
        from: RsvpStatus,
        /// New status
        to: RsvpStatus,
        /// When
        at: DateTime<Utc>,
    },

    /// A ticket was minted
    TicketIssued {
        /// The new ticket
        ticket: Ticket,
    },

    /// A ticket stopped being usable because its holder left `going`
    TicketRevoked {
        /// Event
        event_id: EventId,
        /// Holder
        user_id: UserId,
        /// Revoked ticket
        ticket_id: TicketId,
        /// When
        at: DateTime<Utc>,
    },

    /// A ticket was consumed at the door
    TicketValidated {
        /// Event
        event_id: EventId,
        /// Holder
        user_id: UserId,
        /// Consumed ticket
        ticket_id: TicketId,
        /// Check-in time
        validated_at: DateTime<Utc>,
    },

    /// An attendee's reminder flag flipped
    ReminderToggled {
        /// Event
        event_id: EventId,
        /// Attendee
        user_id: UserId,
        /// New value
        enabled: bool,
    },

    /// The event moved to the next lifecycle phase
    LifecycleAdvanced {
        /// Event
        event_id: EventId,
        /// Previous status
        from: EventStatus,
        /// New status
        to: EventStatus,
        /// The `now` the scheduler passed in
        at: DateTime<Utc>,
    },

    /// The organizer cancelled the event
    EventCancelled {
        /// Event
        event_id: EventId,
        /// Organizer
        cancelled_by: UserId,
        /// Trimmed reason
        reason: String,
        /// When
        at: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Event the fact belongs to
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        match self {
            Self::EventCreated { event_id, .. }
            | Self::RsvpChanged { event_id, .. }
            | Self::TicketRevoked { event_id, .. }
            | Self::TicketValidated { event_id, .. }
            | Self::ReminderToggled { event_id, .. }
            | Self::LifecycleAdvanced { event_id, .. }
            | Self::EventCancelled { event_id, .. } => *event_id,
            Self::TicketIssued { ticket } => ticket.event_id,
        }
    }
}

// ============================================================================
// Replies
// ============================================================================

/// One lifecycle step performed by `tick`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleTransition {
    /// Event that moved
    pub event_id: EventId,
    /// Previous status
    pub from: EventStatus,
    /// New status
    pub to: EventStatus,
}

/// A successful check-in, for door-staff display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    /// Consumed ticket
    pub ticket_id: TicketId,
    /// Event
    pub event_id: EventId,
    /// Attendee to greet
    pub user_id: UserId,
    /// Check-in time
    pub validated_at: DateTime<Utc>,
}

impl From<CheckIn> for EngineEvent {
    fn from(check_in: CheckIn) -> Self {
        Self::TicketValidated {
            event_id: check_in.event_id,
            user_id: check_in.user_id,
            ticket_id: check_in.ticket_id,
            validated_at: check_in.validated_at,
        }
    }
}

impl CheckIn {
    /// Recover the check-in from its emitted fact
    #[must_use]
    pub fn from_event(event: &EngineEvent) -> Option<Self> {
        match *event {
            EngineEvent::TicketValidated {
                event_id,
                user_id,
                ticket_id,
                validated_at,
            } => Some(Self {
                ticket_id,
                event_id,
                user_id,
                validated_at,
            }),
            _ => None,
        }
    }
}

/// Organizer-facing view of an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// The event row
    pub event: Event,
    /// Live going-count
    pub going_count: u32,
}

/// A reminder the external notifier should deliver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueReminder {
    /// Event
    pub event_id: EventId,
    /// Attendee to notify
    pub user_id: UserId,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
}
