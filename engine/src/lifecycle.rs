//! Event lifecycle controller.
//!
//! Owns `Event::lifecycle`. Every attendee-facing action passes through
//! [`ensure_active`] inside the same locked reduction that performs the
//! mutation, so a status flip can never interleave between the gate and the
//! write.
//!
//! ```text
//! upcoming ──start──► ongoing ──end──► completed
//!     │                  │
//!     └──── cancel ──────┴──► cancelled
//! ```

use crate::state::{EngineEvent, EventState};
use chrono::{DateTime, Duration, Utc};
use event_rsvp_core::types::{Cancellation, Event, EventStatus, Lifecycle, UserId};
use event_rsvp_core::{RsvpError, SmallVec};

/// Refuse `action` unless the event is `upcoming` or `ongoing`
///
/// # Errors
///
/// Returns [`RsvpError::InvalidState`] for `completed` and `cancelled` events.
pub fn ensure_active(event: &Event, action: &str) -> Result<(), RsvpError> {
    let status = event.status();
    if status.is_active() {
        Ok(())
    } else {
        Err(RsvpError::invalid_state(
            event.id,
            status,
            format!("cannot {action} on a {status} event"),
        ))
    }
}

/// Whether a door check-in is allowed at `now`
///
/// `ongoing` always admits. With a non-zero `grace`, an `upcoming` event
/// admits from `starts_at - grace` on.
///
/// # Errors
///
/// Returns [`RsvpError::InvalidState`] otherwise.
pub fn ensure_check_in_open(
    event: &Event,
    now: DateTime<Utc>,
    grace: Duration,
) -> Result<(), RsvpError> {
    let status = event.status();
    let open = match status {
        EventStatus::Ongoing => true,
        EventStatus::Upcoming if grace > Duration::zero() => event
            .starts_at
            .checked_sub_signed(grace)
            .is_none_or(|opens_at| now >= opens_at),
        EventStatus::Upcoming | EventStatus::Completed | EventStatus::Cancelled => false,
    };
    if open {
        Ok(())
    } else {
        Err(RsvpError::invalid_state(
            event.id,
            status,
            "check-in is only open while the event is ongoing",
        ))
    }
}

/// Transitions due at `now`, in order
///
/// An `upcoming` event whose end has already passed goes through `ongoing`
/// to `completed`. Terminal events never move.
#[must_use]
pub fn due_transitions(event: &Event, now: DateTime<Utc>) -> SmallVec<[(EventStatus, EventStatus); 2]> {
    let mut steps = SmallVec::new();
    let mut status = event.status();
    if status == EventStatus::Upcoming && now >= event.starts_at {
        steps.push((EventStatus::Upcoming, EventStatus::Ongoing));
        status = EventStatus::Ongoing;
    }
    if status == EventStatus::Ongoing && now >= event.ends_at {
        steps.push((EventStatus::Ongoing, EventStatus::Completed));
    }
    steps
}

/// Advance the event to wherever `now` puts it
///
/// Idempotent: a second call with the same `now` emits nothing.
pub fn advance(state: &mut EventState, now: DateTime<Utc>) -> SmallVec<[EngineEvent; 4]> {
    let event_id = state.event.id;
    due_transitions(&state.event, now)
        .into_iter()
        .map(|(from, to)| {
            state.event.lifecycle = match to {
                EventStatus::Ongoing => Lifecycle::Ongoing,
                _ => Lifecycle::Completed,
            };
            EngineEvent::LifecycleAdvanced {
                event_id,
                from,
                to,
                at: now,
            }
        })
        .collect()
}

/// Check a cancellation request and return the trimmed reason
///
/// Checked in order: organizer identity, current status, reason length.
///
/// # Errors
///
/// - [`RsvpError::PermissionDenied`] when `by` is not the organizer
/// - [`RsvpError::InvalidState`] when the event is already terminal
/// - [`RsvpError::Validation`] when the trimmed reason is shorter than `min_len`
pub fn validate_cancel(
    event: &Event,
    by: UserId,
    reason: &str,
    min_len: usize,
) -> Result<String, RsvpError> {
    if by != event.organizer_id {
        return Err(RsvpError::PermissionDenied {
            event_id: event.id,
            user_id: by,
        });
    }
    ensure_active(event, "cancel")?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(RsvpError::Validation(
            "cancellation reason must not be empty".to_string(),
        ));
    }
    let len = reason.chars().count();
    if len < min_len {
        return Err(RsvpError::Validation(format!(
            "cancellation reason must be at least {min_len} characters (got {len})"
        )));
    }
    Ok(reason.to_string())
}

/// Move the event to `cancelled`; irreversible
pub fn cancel(
    state: &mut EventState,
    by: UserId,
    reason: String,
    now: DateTime<Utc>,
) -> EngineEvent {
    state.event.lifecycle = Lifecycle::Cancelled(Cancellation {
        reason: reason.clone(),
        cancelled_by: by,
        cancelled_at: now,
    });
    EngineEvent::EventCancelled {
        event_id: state.event.id,
        cancelled_by: by,
        reason,
        at: now,
    }
}
