//! Ticket issuer.
//!
//! Mints at most one live ticket per attendee per event. Called by the
//! ledger right after a transition to `going` on a ticketed event.

use chrono::{DateTime, Utc};
use event_rsvp_core::environment::TicketIdGenerator;
use event_rsvp_core::types::{EventId, Ticket, UserId};

/// Outcome of [`issue_if_eligible`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Issued {
    /// The attendee's live ticket, returned unchanged
    Existing(Ticket),
    /// A freshly minted ticket
    Minted(Ticket),
}

impl Issued {
    /// The live ticket either way
    #[must_use]
    pub fn into_ticket(self) -> Ticket {
        match self {
            Self::Existing(ticket) | Self::Minted(ticket) => ticket,
        }
    }
}

/// Keep `live` if there is one, otherwise mint a new ticket
///
/// Revoked tickets never come back: once the ledger retires a ticket the
/// attendance has no live one, so the next call mints a fresh id.
pub fn issue_if_eligible(
    live: Option<Ticket>,
    event_id: EventId,
    user_id: UserId,
    now: DateTime<Utc>,
    ids: &dyn TicketIdGenerator,
) -> Issued {
    match live {
        Some(ticket) => Issued::Existing(ticket),
        None => Issued::Minted(Ticket::new(ids.next_ticket_id(), event_id, user_id, now)),
    }
}
