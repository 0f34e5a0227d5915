//! RSVP ledger.
//!
//! Idempotent, capacity-aware transitions of an attendee's RSVP status.
//! [`check_capacity`] runs before anything is written; [`set_status`] cannot
//! fail.

use crate::issuer::{Issued, issue_if_eligible};
use crate::state::{EngineEvent, EventState};
use chrono::{DateTime, Utc};
use event_rsvp_core::environment::TicketIdGenerator;
use event_rsvp_core::types::{Attendance, Rsvp, RsvpStatus, UserId};
use event_rsvp_core::{RsvpError, SmallVec};

/// Refuse a move to `going` that would overfill the event
///
/// The caller's own row is excluded from the count, so re-asserting `going`
/// never trips the ceiling.
///
/// # Errors
///
/// Returns [`RsvpError::CapacityExceeded`] when no slot is left.
pub fn check_capacity(state: &EventState, user_id: &UserId, to: RsvpStatus) -> Result<(), RsvpError> {
    if to != RsvpStatus::Going || state.status_of(user_id) == RsvpStatus::Going {
        return Ok(());
    }
    let capacity = state.event.capacity;
    if capacity.admits(state.going_count()) {
        Ok(())
    } else {
        Err(RsvpError::CapacityExceeded {
            event_id: state.event.id,
            capacity: capacity.value(),
        })
    }
}

/// Record `to` for `user_id`, issuing or retiring tickets as needed
///
/// Moving into `going` turns the reminder flag on. Re-asserting `going` while
/// already going is a noop and keeps an explicit opt-out made through
/// `set_reminder`. Leaving `going` never touches the flag.
///
/// Must only be called after [`check_capacity`] and the lifecycle gate
/// passed for the same state.
pub fn set_status(
    state: &mut EventState,
    user_id: UserId,
    to: RsvpStatus,
    now: DateTime<Utc>,
    ids: &dyn TicketIdGenerator,
) -> SmallVec<[EngineEvent; 4]> {
    let event_id = state.event.id;
    let requires_ticket = state.event.requires_ticket;

    let attendance = state
        .attendances
        .entry(user_id)
        .or_insert_with(|| Attendance::new(event_id, user_id, now));
    let from = attendance.status();
    let previous = std::mem::take(&mut attendance.rsvp);

    let mut events = SmallVec::new();
    if from != to {
        events.push(EngineEvent::RsvpChanged {
            event_id,
            user_id,
            from,
            to,
            at: now,
        });
    }

    attendance.rsvp = match to {
        RsvpStatus::Going => {
            let live = match previous {
                Rsvp::Going { ticket } => ticket,
                Rsvp::NotGoing | Rsvp::Interested => None,
            };
            let ticket = if requires_ticket {
                match issue_if_eligible(live, event_id, user_id, now, ids) {
                    Issued::Existing(ticket) => Some(ticket),
                    Issued::Minted(ticket) => {
                        events.push(EngineEvent::TicketIssued {
                            ticket: ticket.clone(),
                        });
                        Some(ticket)
                    }
                }
            } else {
                live
            };
            if from != RsvpStatus::Going {
                attendance.reminder_enabled = true;
            }
            Rsvp::Going { ticket }
        }
        RsvpStatus::Interested | RsvpStatus::NotGoing => {
            if let Rsvp::Going {
                ticket: Some(ticket),
            } = previous
            {
                events.push(EngineEvent::TicketRevoked {
                    event_id,
                    user_id,
                    ticket_id: ticket.id,
                    at: now,
                });
                attendance.retired_tickets.push(ticket);
            }
            if to == RsvpStatus::Interested {
                Rsvp::Interested
            } else {
                Rsvp::NotGoing
            }
        }
    };

    if !events.is_empty() {
        attendance.updated_at = now;
    }

    match (from == RsvpStatus::Going, to == RsvpStatus::Going) {
        (false, true) => state.increment_going(),
        (true, false) => state.decrement_going(),
        _ => {}
    }
    events
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use event_rsvp_core::types::{Money, NewEvent, TicketStanding};
    use event_rsvp_testing::SequentialTicketIds;

    fn ticketed(capacity: u32) -> EventState {
        let now = Utc::now();
        let event = NewEvent::new(UserId::new(), now + Duration::days(1), now + Duration::days(2))
            .with_capacity(capacity)
            .with_tickets(Money::from_cents(1_000))
            .into_event(now);
        EventState::new(event)
    }

    #[test]
    fn going_twice_keeps_the_same_ticket() {
        let ids = SequentialTicketIds::new();
        let mut state = ticketed(0);
        let user = UserId::new();
        let now = Utc::now();

        let first = set_status(&mut state, user, RsvpStatus::Going, now, &ids);
        assert_eq!(first.len(), 2);
        let snapshot = state.attendance(&user).cloned().unwrap();

        let second = set_status(&mut state, user, RsvpStatus::Going, now, &ids);
        assert!(second.is_empty());
        assert_eq!(state.attendance(&user), Some(&snapshot));
        assert_eq!(state.going_count(), 1);
    }

    #[test]
    fn leaving_going_retires_the_ticket() {
        let ids = SequentialTicketIds::new();
        let mut state = ticketed(0);
        let user = UserId::new();
        let now = Utc::now();

        set_status(&mut state, user, RsvpStatus::Going, now, &ids);
        let ticket_id = state.attendance(&user).unwrap().ticket().unwrap().id;

        let events = set_status(&mut state, user, RsvpStatus::Interested, now, &ids);
        assert!(matches!(events[1], EngineEvent::TicketRevoked { .. }));

        let attendance = state.attendance(&user).unwrap();
        assert!(attendance.ticket().is_none());
        assert_eq!(attendance.standing_of(ticket_id), Some(TicketStanding::Retired));
        assert!(attendance.reminder_enabled);
        assert_eq!(state.going_count(), 0);
    }

    #[test]
    fn own_row_does_not_count_against_capacity() {
        let ids = SequentialTicketIds::new();
        let mut state = ticketed(1);
        let user = UserId::new();
        set_status(&mut state, user, RsvpStatus::Going, Utc::now(), &ids);

        assert!(check_capacity(&state, &user, RsvpStatus::Going).is_ok());
        assert!(matches!(
            check_capacity(&state, &UserId::new(), RsvpStatus::Going),
            Err(RsvpError::CapacityExceeded { capacity: 1, .. })
        ));
        assert!(check_capacity(&state, &UserId::new(), RsvpStatus::Interested).is_ok());
    }

    #[test]
    fn first_touch_creates_a_not_going_row() {
        let ids = SequentialTicketIds::new();
        let mut state = ticketed(0);
        let user = UserId::new();
        let events = set_status(&mut state, user, RsvpStatus::NotGoing, Utc::now(), &ids);
        assert!(events.is_empty());
        let attendance = state.attendance(&user).unwrap();
        assert_eq!(attendance.status(), RsvpStatus::NotGoing);
        assert!(!attendance.reminder_enabled);
    }

    #[test]
    fn only_entering_going_turns_reminders_on() {
        let ids = SequentialTicketIds::new();
        let mut state = ticketed(0);
        let user = UserId::new();
        let now = Utc::now();

        set_status(&mut state, user, RsvpStatus::Going, now, &ids);
        state.attendances.get_mut(&user).unwrap().reminder_enabled = false;
        set_status(&mut state, user, RsvpStatus::Going, now, &ids);
        assert!(!state.attendance(&user).unwrap().reminder_enabled);

        set_status(&mut state, user, RsvpStatus::NotGoing, now, &ids);
        set_status(&mut state, user, RsvpStatus::Going, now, &ids);
        assert!(state.attendance(&user).unwrap().reminder_enabled);
    }
}
