//! Event reducer for the RSVP engine.
//!
//! One reducer instance drives every event; the store hands it the state of
//! the single event an action targets, under that event's lock. Each arm
//! runs the lifecycle gate and the component checks first and only then
//! mutates, so a rejected action leaves the state exactly as it was.

use crate::config::EngineConfig;
use crate::state::{EngineEvent, EventState};
use crate::{ledger, lifecycle, reminders, validator};
use chrono::{DateTime, Utc};
use event_rsvp_core::environment::{Clock, OsRngTicketIds, SystemClock, TicketIdGenerator};
use event_rsvp_core::reducer::Reducer;
use event_rsvp_core::types::{RsvpStatus, TicketId, UserId};
use event_rsvp_core::{RsvpError, SmallVec, smallvec};
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// Requests against a single event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventAction {
    /// Attendee sets their RSVP status
    SetRsvp {
        /// Attendee
        user_id: UserId,
        /// Desired end state
        status: RsvpStatus,
    },

    /// Attendee opts in or out of the pre-event reminder
    SetReminder {
        /// Attendee
        user_id: UserId,
        /// New flag value
        enabled: bool,
    },

    /// Organizer cancels the event
    Cancel {
        /// Caller, who must be the organizer
        organizer_id: UserId,
        /// Free-text reason
        reason: String,
    },

    /// Scheduler advances the lifecycle to `now`
    Tick {
        /// Scheduler's wall-clock time
        now: DateTime<Utc>,
    },

    /// Door staff consume a ticket already resolved to its holder
    CheckIn {
        /// Presented ticket
        ticket_id: TicketId,
        /// Holder according to the ticket directory
        user_id: UserId,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the event reducer
#[derive(Clone)]
pub struct EventEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Source of ticket ids
    pub ticket_ids: Arc<dyn TicketIdGenerator>,
    /// Engine settings
    pub config: EngineConfig,
}

impl EventEnvironment {
    /// Creates a new `EventEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ticket_ids: Arc<dyn TicketIdGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            clock,
            ticket_ids,
            config,
        }
    }

    /// System clock and OS-random ticket ids
    #[must_use]
    pub fn production(config: EngineConfig) -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(OsRngTicketIds), config)
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for a single event and its attendances
#[derive(Clone, Debug, Default)]
pub struct EventReducer;

impl EventReducer {
    /// Creates a new `EventReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for EventReducer {
    type State = EventState;
    type Action = EventAction;
    type Event = EngineEvent;
    type Error = RsvpError;
    type Environment = EventEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Result<SmallVec<[EngineEvent; 4]>, RsvpError> {
        match action {
            EventAction::SetRsvp { user_id, status } => {
                lifecycle::ensure_active(&state.event, "change an RSVP")?;
                ledger::check_capacity(state, &user_id, status)?;
                let now = env.clock.now();
                Ok(ledger::set_status(
                    state,
                    user_id,
                    status,
                    now,
                    env.ticket_ids.as_ref(),
                ))
            }

            EventAction::SetReminder { user_id, enabled } => {
                lifecycle::ensure_active(&state.event, "change a reminder")?;
                let toggled = reminders::set_reminder(state, user_id, enabled, env.clock.now())?;
                Ok(toggled.into_iter().collect())
            }

            EventAction::Cancel {
                organizer_id,
                reason,
            } => {
                let reason = lifecycle::validate_cancel(
                    &state.event,
                    organizer_id,
                    &reason,
                    env.config.min_cancellation_reason_len,
                )?;
                let cancelled = lifecycle::cancel(state, organizer_id, reason, env.clock.now());
                Ok(smallvec![cancelled])
            }

            EventAction::Tick { now } => Ok(lifecycle::advance(state, now)),

            EventAction::CheckIn { ticket_id, user_id } => {
                let check_in = validator::check_in(
                    state,
                    ticket_id,
                    user_id,
                    env.clock.now(),
                    env.config.check_in_grace(),
                )?;
                Ok(smallvec![EngineEvent::from(check_in)])
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::state::CheckIn;
    use chrono::Duration;
    use event_rsvp_core::types::{EventStatus, Lifecycle, Money, NewEvent};
    use event_rsvp_testing::{ReducerTest, SequentialTicketIds, assertions, test_clock};

    fn create_test_env() -> EventEnvironment {
        EventEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(SequentialTicketIds::new()),
            EngineConfig::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        test_clock().now()
    }

    fn ticketed_state(capacity: u32) -> EventState {
        let start = now() + Duration::days(1);
        EventState::new(
            NewEvent::new(UserId::new(), start, start + Duration::hours(3))
                .with_capacity(capacity)
                .with_tickets(Money::from_cents(1_500))
                .into_event(now()),
        )
    }

    fn with_going(mut state: EventState, user_id: UserId) -> EventState {
        ledger::set_status(
            &mut state,
            user_id,
            RsvpStatus::Going,
            now(),
            &SequentialTicketIds::new(),
        );
        state
    }

    #[test]
    fn test_going_issues_ticket_and_enables_reminder() {
        let user = UserId::new();

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(ticketed_state(2))
            .when_action(EventAction::SetRsvp {
                user_id: user,
                status: RsvpStatus::Going,
            })
            .then_state(move |state| {
                let attendance = state.attendance(&user).unwrap();
                assert_eq!(attendance.status(), RsvpStatus::Going);
                assert!(attendance.reminder_enabled);
                assert_eq!(attendance.ticket().unwrap().id, TicketId::from_u128(1));
                assert_eq!(state.going_count(), 1);
            })
            .then_events(|events| {
                assertions::assert_events_count(events, 2);
                assertions::assert_any_event(events, |e| {
                    matches!(e, EngineEvent::TicketIssued { .. })
                });
            })
            .run();
    }

    #[test]
    fn test_full_event_rejects_going_without_writing() {
        let first = UserId::new();
        let late = UserId::new();

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(with_going(ticketed_state(1), first))
            .when_action(EventAction::SetRsvp {
                user_id: late,
                status: RsvpStatus::Going,
            })
            .then_state(move |state| {
                assert!(state.attendance(&late).is_none());
                assert_eq!(state.going_count(), 1);
            })
            .then_error(|error| {
                assert_eq!(error.kind(), "CAPACITY_EXCEEDED");
            })
            .run();
    }

    #[test]
    fn test_interested_is_never_capacity_limited() {
        let first = UserId::new();

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(with_going(ticketed_state(1), first))
            .when_action(EventAction::SetRsvp {
                user_id: UserId::new(),
                status: RsvpStatus::Interested,
            })
            .then_events(|events| {
                assertions::assert_events_count(events, 1);
            })
            .run();
    }

    #[test]
    fn test_rsvp_on_completed_event_is_invalid_state() {
        let mut state = ticketed_state(0);
        state.event.lifecycle = Lifecycle::Completed;

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(state)
            .when_action(EventAction::SetRsvp {
                user_id: UserId::new(),
                status: RsvpStatus::Going,
            })
            .then_state(|state| {
                assert!(state.attendances.is_empty());
            })
            .then_error(|error| {
                assert_eq!(error.kind(), "INVALID_STATE");
            })
            .run();
    }

    #[test]
    fn test_cancel_records_reason_and_organizer() {
        let state = ticketed_state(0);
        let organizer = state.event.organizer_id;

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(state)
            .when_action(EventAction::Cancel {
                organizer_id: organizer,
                reason: " venue unavailable ".to_string(),
            })
            .then_state(move |state| {
                assert_eq!(state.event.status(), EventStatus::Cancelled);
                assert_eq!(state.event.cancellation_reason(), Some("venue unavailable"));
                let Lifecycle::Cancelled(cancellation) = &state.event.lifecycle else {
                    panic!("expected a cancellation record");
                };
                assert_eq!(cancellation.cancelled_by, organizer);
                assert_eq!(cancellation.cancelled_at, now());
            })
            .then_events(|events| {
                assert!(matches!(events, [EngineEvent::EventCancelled { .. }]));
            })
            .run();
    }

    #[test]
    fn test_second_cancel_is_invalid_state() {
        let mut state = ticketed_state(0);
        let organizer = state.event.organizer_id;
        ledger::set_status(
            &mut state,
            UserId::new(),
            RsvpStatus::Interested,
            now(),
            &SequentialTicketIds::new(),
        );
        lifecycle::cancel(&mut state, organizer, "venue unavailable".to_string(), now());

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(state)
            .when_action(EventAction::Cancel {
                organizer_id: organizer,
                reason: "still unavailable".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.event.cancellation_reason(), Some("venue unavailable"));
            })
            .then_error(|error| {
                assert_eq!(error.kind(), "INVALID_STATE");
            })
            .run();
    }

    #[test]
    fn test_tick_with_nothing_due_is_a_noop() {
        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(ticketed_state(0))
            .when_action(EventAction::Tick { now: now() })
            .then_state(|state| {
                assert_eq!(state.event.status(), EventStatus::Upcoming);
            })
            .then_events(assertions::assert_no_events::<EngineEvent>)
            .run();
    }

    #[test]
    fn test_set_reminder_without_attendance_is_invalid_state() {
        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(ticketed_state(0))
            .when_action(EventAction::SetReminder {
                user_id: UserId::new(),
                enabled: true,
            })
            .then_error(|error| {
                assert_eq!(error.kind(), "INVALID_STATE");
            })
            .run();
    }

    #[test]
    fn test_check_in_while_ongoing() {
        let user = UserId::new();
        let mut state = with_going(ticketed_state(0), user);
        state.event.lifecycle = Lifecycle::Ongoing;
        let ticket_id = state.attendance(&user).unwrap().ticket().unwrap().id;

        ReducerTest::new(EventReducer::new())
            .with_env(create_test_env())
            .given_state(state)
            .when_action(EventAction::CheckIn {
                ticket_id,
                user_id: user,
            })
            .then_state(move |state| {
                let ticket = state.attendance(&user).unwrap().ticket().unwrap();
                assert_eq!(ticket.validated_at(), Some(now()));
            })
            .then_events(move |events| {
                let check_in = CheckIn::from_event(&events[0]).unwrap();
                assert_eq!(check_in.user_id, user);
            })
            .run();
    }
}
