//! Reminder flag store.
//!
//! A per-attendance boolean the external notifier reads. Flipping it has no
//! other side effect; the flag survives RSVP changes.

use crate::state::{DueReminder, EngineEvent, EventState};
use chrono::{DateTime, Duration, Utc};
use event_rsvp_core::types::{EventStatus, UserId};
use event_rsvp_core::RsvpError;

/// Set the reminder flag for an existing attendance
///
/// Returns the toggle event when the value actually changed.
///
/// # Errors
///
/// Returns [`RsvpError::InvalidState`] when the user never acted on the
/// event. The lifecycle gate must already have passed.
pub fn set_reminder(
    state: &mut EventState,
    user_id: UserId,
    enabled: bool,
    now: DateTime<Utc>,
) -> Result<Option<EngineEvent>, RsvpError> {
    let event_id = state.event.id;
    let status = state.event.status();
    let attendance = state.attendances.get_mut(&user_id).ok_or_else(|| {
        RsvpError::invalid_state(
            event_id,
            status,
            format!("user {user_id} has no attendance to set a reminder on"),
        )
    })?;

    if attendance.reminder_enabled == enabled {
        return Ok(None);
    }
    attendance.reminder_enabled = enabled;
    attendance.updated_at = now;
    Ok(Some(EngineEvent::ReminderToggled {
        event_id,
        user_id,
        enabled,
    }))
}

/// Reminders the notifier should deliver for this event at `now`
///
/// Due when the event is `upcoming` and starts within `(now, now + window]`.
/// Sorted by user id.
#[must_use]
pub fn due(state: &EventState, now: DateTime<Utc>, window: Duration) -> Vec<DueReminder> {
    let event = &state.event;
    let in_window = now < event.starts_at
        && now
            .checked_add_signed(window)
            .is_none_or(|horizon| event.starts_at <= horizon);
    if event.status() != EventStatus::Upcoming || !in_window {
        return Vec::new();
    }

    let mut due: Vec<DueReminder> = state
        .attendances
        .values()
        .filter(|a| a.reminder_enabled)
        .map(|a| DueReminder {
            event_id: event.id,
            user_id: a.user_id,
            starts_at: event.starts_at,
        })
        .collect();
    due.sort_by_key(|r| r.user_id);
    due
}
