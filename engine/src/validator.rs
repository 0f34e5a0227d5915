//! Ticket validator.
//!
//! The door-side check-in, and the only place a ticket moves from issued to
//! consumed. The engine resolves the ticket id to its event and holder
//! through the ticket directory first (unknown id, wrong event); everything
//! below runs under the event's lock.

use crate::state::{CheckIn, EventState};
use chrono::{DateTime, Duration, Utc};
use event_rsvp_core::types::{Rsvp, TicketId, TicketStanding, UserId};
use event_rsvp_core::{InvalidTicketReason, RsvpError};

/// Consume `ticket_id`, held by `user_id`, at `now`
///
/// Checks run in this order: revocation, lifecycle status, prior use. The
/// final step is a compare-and-set, so two scans of the same ticket can
/// never both succeed.
///
/// # Errors
///
/// - [`RsvpError::InvalidTicket`] if the attendance does not know the ticket
/// - [`RsvpError::TicketRevoked`] if the holder left `going` or the ticket was superseded
/// - [`RsvpError::InvalidState`] if check-in is not open
/// - [`RsvpError::TicketAlreadyUsed`] with the original time on a second scan
pub fn check_in(
    state: &mut EventState,
    ticket_id: TicketId,
    user_id: UserId,
    now: DateTime<Utc>,
    grace: Duration,
) -> Result<CheckIn, RsvpError> {
    let event_id = state.event.id;
    let attendance = state
        .attendances
        .get_mut(&user_id)
        .ok_or(RsvpError::invalid_ticket(InvalidTicketReason::UnknownTicket))?;

    match attendance.standing_of(ticket_id) {
        Some(TicketStanding::Live) => {}
        Some(TicketStanding::Retired) => return Err(RsvpError::TicketRevoked { ticket_id }),
        None => return Err(RsvpError::invalid_ticket(InvalidTicketReason::UnknownTicket)),
    }

    crate::lifecycle::ensure_check_in_open(&state.event, now, grace)?;

    let Rsvp::Going {
        ticket: Some(ticket),
    } = &mut attendance.rsvp
    else {
        return Err(RsvpError::TicketRevoked { ticket_id });
    };
    let validated_at = ticket
        .consume(now)
        .map_err(|validated_at| RsvpError::TicketAlreadyUsed {
            ticket_id,
            validated_at,
        })?;

    Ok(CheckIn {
        ticket_id,
        event_id,
        user_id,
        validated_at,
    })
}
