//! Domain types for the event RSVP engine.
//!
//! Identifiers, value objects and the three entities the engine owns:
//! [`Event`], [`Attendance`] and [`Ticket`].

use crate::error::RsvpError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an authenticated user, as supplied by the identity provider
///
/// The engine trusts this value and never re-verifies it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unguessable 128-bit ticket identifier, rendered as 32 lowercase hex digits
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(u128);

impl TicketId {
    /// Build a `TicketId` from raw random bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(bytes))
    }

    /// Build a `TicketId` from an integer (test ids, persisted values)
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// The raw 128-bit value
    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for TicketId {
    type Err = RsvpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RsvpError::Validation(format!(
                "ticket id must be 32 hex digits, got {s:?}"
            )));
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| RsvpError::Validation(format!("ticket id {s:?}: {e}")))
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Money in cents; ticket prices are stored as metadata only
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Going-count ceiling for an event; zero means unlimited
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// No ceiling
    pub const UNLIMITED: Self = Self(0);

    /// Creates a new `Capacity`
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// True when no ceiling applies
    #[must_use]
    pub const fn is_unlimited(&self) -> bool {
        self.0 == 0
    }

    /// Whether one more attendee fits given `going` others already committed
    #[must_use]
    pub const fn admits(&self, going: u32) -> bool {
        self.is_unlimited() || going < self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            write!(f, "unlimited")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ============================================================================
// Statuses
// ============================================================================

/// Event lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Scheduled start not yet reached
    Upcoming,
    /// Between scheduled start and end
    Ongoing,
    /// Scheduled end passed
    Completed,
    /// Cancelled by the organizer
    Cancelled,
}

impl EventStatus {
    /// `completed` and `cancelled` never change again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses in which attendee-facing mutations are accepted
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Upcoming | Self::Ongoing)
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attendee's commitment to an event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    /// No commitment (the implicit state of every user)
    #[default]
    NotGoing,
    /// Following the event without committing
    Interested,
    /// Committed; counts against capacity
    Going,
}

impl RsvpStatus {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotGoing => "not_going",
            Self::Interested => "interested",
            Self::Going => "going",
        }
    }
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RsvpStatus {
    type Err = RsvpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_going" => Ok(Self::NotGoing),
            "interested" => Ok(Self::Interested),
            "going" => Ok(Self::Going),
            other => Err(RsvpError::Validation(format!(
                "unknown rsvp status {other:?} (expected not_going, interested or going)"
            ))),
        }
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// Single-use credential proving a `going` commitment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unguessable identifier
    pub id: TicketId,
    /// Event the ticket admits to (denormalized)
    pub event_id: EventId,
    /// Holder (denormalized)
    pub user_id: UserId,
    /// Mint time
    pub issued_at: DateTime<Utc>,
    validated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Mint an unused ticket
    #[must_use]
    pub const fn new(
        id: TicketId,
        event_id: EventId,
        user_id: UserId,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id,
            user_id,
            issued_at,
            validated_at: None,
        }
    }

    /// First successful check-in time, if any
    #[must_use]
    pub const fn validated_at(&self) -> Option<DateTime<Utc>> {
        self.validated_at
    }

    /// Compare-and-set `validated_at` from unset to `at`.
    ///
    /// # Errors
    ///
    /// Returns the original timestamp when the ticket was already consumed;
    /// the stored value is never overwritten.
    pub fn consume(&mut self, at: DateTime<Utc>) -> Result<DateTime<Utc>, DateTime<Utc>> {
        match self.validated_at {
            Some(original) => Err(original),
            None => {
                self.validated_at = Some(at);
                Ok(at)
            }
        }
    }
}

// ============================================================================
// Attendance
// ============================================================================

/// RSVP state with the ticket folded into the only variant that may hold one
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Rsvp {
    /// Not attending
    #[default]
    NotGoing,
    /// Interested
    Interested,
    /// Going; `ticket` is set once issued on a ticketed event
    Going {
        /// Live ticket
        ticket: Option<Ticket>,
    },
}

impl Rsvp {
    /// Flattened status
    #[must_use]
    pub const fn status(&self) -> RsvpStatus {
        match self {
            Self::NotGoing => RsvpStatus::NotGoing,
            Self::Interested => RsvpStatus::Interested,
            Self::Going { .. } => RsvpStatus::Going,
        }
    }
}

/// Where a presented ticket id was found on an attendance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketStanding {
    /// The attendance's current live ticket
    Live,
    /// Revoked earlier and kept for audit
    Retired,
}

/// One user's relationship to one event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    /// Event
    pub event_id: EventId,
    /// Attendee
    pub user_id: UserId,
    /// Commitment (and live ticket)
    pub rsvp: Rsvp,
    /// Opt-in flag read by the external reminder notifier
    pub reminder_enabled: bool,
    /// Tickets revoked by leaving `going`; never deleted
    pub retired_tickets: Vec<Ticket>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Attendance {
    /// Zero-value record created on a user's first action
    #[must_use]
    pub const fn new(event_id: EventId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            event_id,
            user_id,
            rsvp: Rsvp::NotGoing,
            reminder_enabled: false,
            retired_tickets: Vec::new(),
            updated_at: now,
        }
    }

    /// Current RSVP status
    #[must_use]
    pub const fn status(&self) -> RsvpStatus {
        self.rsvp.status()
    }

    /// Live ticket, if any
    #[must_use]
    pub const fn ticket(&self) -> Option<&Ticket> {
        match &self.rsvp {
            Rsvp::Going { ticket } => ticket.as_ref(),
            Rsvp::NotGoing | Rsvp::Interested => None,
        }
    }

    /// Locate a ticket id among the live and retired tickets
    #[must_use]
    pub fn standing_of(&self, ticket_id: TicketId) -> Option<TicketStanding> {
        if self.ticket().is_some_and(|t| t.id == ticket_id) {
            Some(TicketStanding::Live)
        } else if self.retired_tickets.iter().any(|t| t.id == ticket_id) {
            Some(TicketStanding::Retired)
        } else {
            None
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// Why and by whom an event was cancelled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Organizer-provided reason (trimmed, non-empty)
    pub reason: String,
    /// Organizer who cancelled
    pub cancelled_by: UserId,
    /// When
    pub cancelled_at: DateTime<Utc>,
}

/// Lifecycle phase; the cancellation record exists exactly when cancelled
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lifecycle {
    /// Before start
    Upcoming,
    /// Running
    Ongoing,
    /// Finished
    Completed,
    /// Cancelled
    Cancelled(Cancellation),
}

impl Lifecycle {
    /// Flattened status
    #[must_use]
    pub const fn status(&self) -> EventStatus {
        match self {
            Self::Upcoming => EventStatus::Upcoming,
            Self::Ongoing => EventStatus::Ongoing,
            Self::Completed => EventStatus::Completed,
            Self::Cancelled(_) => EventStatus::Cancelled,
        }
    }
}

/// An event attendees can RSVP to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id: EventId,
    /// Organizer allowed to cancel
    pub organizer_id: UserId,
    /// Going-count ceiling
    pub capacity: Capacity,
    /// Whether `going` attendees receive a ticket
    pub requires_ticket: bool,
    /// Metadata only; no settlement happens here
    pub ticket_price: Money,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Scheduled end
    pub ends_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Lifecycle phase
    pub lifecycle: Lifecycle,
}

impl Event {
    /// Current lifecycle status
    #[must_use]
    pub const fn status(&self) -> EventStatus {
        self.lifecycle.status()
    }

    /// Cancellation reason; present if and only if cancelled
    #[must_use]
    pub fn cancellation_reason(&self) -> Option<&str> {
        match &self.lifecycle {
            Lifecycle::Cancelled(c) => Some(c.reason.as_str()),
            _ => None,
        }
    }
}

/// Organizer input for registering an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Identifier to register under
    pub id: EventId,
    /// Organizer
    pub organizer_id: UserId,
    /// Going-count ceiling (zero = unlimited)
    pub capacity: Capacity,
    /// Whether tickets are issued
    pub requires_ticket: bool,
    /// Ticket price metadata
    pub ticket_price: Money,
    /// Scheduled start
    pub starts_at: DateTime<Utc>,
    /// Scheduled end
    pub ends_at: DateTime<Utc>,
}

impl NewEvent {
    /// Free, unticketed, unlimited event with a fresh id
    #[must_use]
    pub fn new(organizer_id: UserId, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            organizer_id,
            capacity: Capacity::UNLIMITED,
            requires_ticket: false,
            ticket_price: Money::ZERO,
            starts_at,
            ends_at,
        }
    }

    /// Set the capacity
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Capacity::new(capacity);
        self
    }

    /// Require tickets at the given price
    #[must_use]
    pub const fn with_tickets(mut self, price: Money) -> Self {
        self.requires_ticket = true;
        self.ticket_price = price;
        self
    }

    /// Check the input before it becomes an [`Event`]
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Validation`] when the schedule is inverted or a
    /// price is attached to an event that issues no tickets.
    pub fn validate(&self) -> Result<(), RsvpError> {
        if self.ends_at <= self.starts_at {
            return Err(RsvpError::Validation(format!(
                "event must end after it starts (starts {}, ends {})",
                self.starts_at, self.ends_at
            )));
        }
        if !self.requires_ticket && !self.ticket_price.is_zero() {
            return Err(RsvpError::Validation(format!(
                "ticket price {} set on an event that does not require tickets",
                self.ticket_price
            )));
        }
        Ok(())
    }

    /// Materialize the event in the `upcoming` phase
    #[must_use]
    pub fn into_event(self, created_at: DateTime<Utc>) -> Event {
        Event {
            id: self.id,
            organizer_id: self.organizer_id,
            capacity: self.capacity,
            requires_ticket: self.requires_ticket,
            ticket_price: self.ticket_price,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            created_at,
            lifecycle: Lifecycle::Upcoming,
        }
    }
}
