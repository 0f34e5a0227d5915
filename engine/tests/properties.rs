//! Property tests over random RSVP histories
//!
//! Drives the reducer directly so each case is a plain synchronous fold.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use event_rsvp::{EngineConfig, EngineEvent, EventAction, EventEnvironment, EventReducer, EventState};
use event_rsvp_core::environment::Clock;
use event_rsvp_core::reducer::Reducer;
use event_rsvp_core::types::{Money, NewEvent, RsvpStatus, UserId};
use event_rsvp_core::RsvpError;
use event_rsvp_testing::fixtures::upcoming_event;
use event_rsvp_testing::properties::{cancellation_reason, rsvp_status};
use event_rsvp_testing::{SequentialTicketIds, test_clock};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn env() -> EventEnvironment {
    EventEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(SequentialTicketIds::new()),
        EngineConfig::default(),
    )
}

fn event(capacity: u32, ticketed: bool) -> NewEvent {
    let new_event = upcoming_event(UserId::new(), test_clock().now()).with_capacity(capacity);
    if ticketed {
        new_event.with_tickets(Money::ZERO)
    } else {
        new_event
    }
}

fn check_invariants(state: &EventState) {
    let capacity = state.event.capacity;
    assert!(capacity.is_unlimited() || state.going_count() <= capacity.value());
    assert_eq!(state.going_count() as usize, state.recount_going());

    let mut seen = HashSet::new();
    for attendance in state.attendances.values() {
        let is_going = attendance.status() == RsvpStatus::Going;
        if state.event.requires_ticket && is_going {
            assert!(attendance.ticket().is_some(), "going without a ticket");
        }
        if !state.event.requires_ticket {
            assert!(attendance.ticket().is_none());
            assert!(attendance.retired_tickets.is_empty());
        }
        for ticket in attendance.ticket().into_iter().chain(&attendance.retired_tickets) {
            assert!(seen.insert(ticket.id), "ticket id reused");
            assert_eq!(ticket.user_id, attendance.user_id);
        }
    }
}

proptest! {
    #[test]
    fn random_histories_respect_capacity_and_tickets(
        capacity in 0u32..5,
        ticketed in any::<bool>(),
        steps in prop::collection::vec((0usize..6, rsvp_status()), 1..60),
    ) {
        let env = env();
        let reducer = EventReducer::new();
        let users: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();
        let mut state = EventState::new(event(capacity, ticketed).into_event(test_clock().now()));

        for (who, status) in steps {
            let before = state.clone();
            let action = EventAction::SetRsvp { user_id: users[who], status };
            match reducer.reduce(&mut state, action, &env) {
                Ok(events) => {
                    let changed = before.status_of(&users[who]) != status;
                    prop_assert_eq!(
                        events.iter().any(|e| matches!(e, EngineEvent::RsvpChanged { .. })),
                        changed
                    );
                    prop_assert_eq!(state.status_of(&users[who]), status);
                }
                Err(error) => {
                    let capacity_hit = matches!(error, RsvpError::CapacityExceeded { .. });
                    prop_assert!(capacity_hit, "unexpected rejection: {:?}", error);
                    prop_assert_eq!(&state, &before);
                }
            }
            check_invariants(&state);
        }
    }

    #[test]
    fn repeating_a_status_is_a_noop(
        ticketed in any::<bool>(),
        status in rsvp_status(),
    ) {
        let env = env();
        let reducer = EventReducer::new();
        let user = UserId::new();
        let mut state = EventState::new(event(0, ticketed).into_event(test_clock().now()));

        reducer
            .reduce(&mut state, EventAction::SetRsvp { user_id: user, status }, &env)
            .unwrap();
        let once = state.clone();
        let events = reducer
            .reduce(&mut state, EventAction::SetRsvp { user_id: user, status }, &env)
            .unwrap();

        prop_assert!(events.is_empty());
        prop_assert_eq!(state, once);
    }

    #[test]
    fn cancelled_events_reject_every_rsvp(
        reason in cancellation_reason(),
        status in rsvp_status(),
    ) {
        let env = env();
        let reducer = EventReducer::new();
        let mut state = EventState::new(event(0, true).into_event(test_clock().now()));
        let organizer_id = state.event.organizer_id;

        reducer
            .reduce(&mut state, EventAction::Cancel { organizer_id, reason: reason.clone() }, &env)
            .unwrap();
        prop_assert_eq!(state.event.cancellation_reason(), Some(reason.trim()));

        let before = state.clone();
        let result = reducer.reduce(
            &mut state,
            EventAction::SetRsvp { user_id: UserId::new(), status },
            &env,
        );
        prop_assert_eq!(result.unwrap_err().kind(), "INVALID_STATE");
        prop_assert_eq!(state, before);
    }
}
