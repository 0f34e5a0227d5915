//! The engine facade.
//!
//! [`RsvpEngine`] is the method-call surface collaborators use. Every
//! mutating call dispatches one [`EventAction`] to the [`KeyedStore`], which
//! serializes it against every other action on the same event; calls on
//! different events never wait for each other.
//!
//! Ticket ids are resolved to `(event, holder)` through a [`TicketDirectory`]
//! before the event's lock is taken, so an unknown or foreign ticket is
//! refused without touching any event. The directory is written from inside
//! the issuing reduction's reply, under the event lock, and read without it;
//! the two locks are never held in the opposite order.

use crate::config::EngineConfig;
use crate::metrics::{RsvpMetrics, register_metrics};
use crate::reducer::{EventAction, EventEnvironment, EventReducer};
use crate::reminders;
use crate::state::{
    CheckIn, DueReminder, EngineEvent, EventSnapshot, EventState, LifecycleTransition,
};
use chrono::{DateTime, Utc};
use event_rsvp_core::codec;
use event_rsvp_core::types::{Attendance, Event, EventId, NewEvent, RsvpStatus, TicketId, UserId};
use event_rsvp_core::{InvalidTicketReason, RsvpError};
use event_rsvp_runtime::{KeyedStore, StoreError};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Tracing target for tickets treated as tampering or misuse
pub const ABUSE_TARGET: &str = "event_rsvp::abuse";

// ============================================================================
// Ticket directory
// ============================================================================

/// Global index from ticket id to the event and holder it was issued for
///
/// Entries are never removed: a revoked ticket must keep resolving so it
/// fails as revoked rather than unknown.
#[derive(Debug, Default)]
pub struct TicketDirectory {
    entries: RwLock<HashMap<TicketId, (EventId, UserId)>>,
}

impl TicketDirectory {
    /// Index every ticket minted in `events`
    pub fn record(&self, events: &[EngineEvent]) {
        let mut issued = events.iter().filter_map(|event| match event {
            EngineEvent::TicketIssued { ticket } => Some(ticket),
            _ => None,
        });
        let Some(first) = issued.next() else {
            return;
        };
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for ticket in std::iter::once(first).chain(issued) {
            entries.insert(ticket.id, (ticket.event_id, ticket.user_id));
        }
    }

    /// Event and holder `ticket_id` was issued for
    #[must_use]
    pub fn lookup(&self, ticket_id: TicketId) -> Option<(EventId, UserId)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ticket_id)
            .copied()
    }

    /// Number of tickets ever issued
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True before the first ticket is issued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Lift a store failure on `event_id` into the engine's error taxonomy
fn lift(event_id: EventId) -> impl FnOnce(StoreError<RsvpError>) -> RsvpError {
    move |error| match error {
        StoreError::UnknownKey(_) => RsvpError::EventNotFound(event_id),
        StoreError::DuplicateKey(_) => RsvpError::DuplicateEvent(event_id),
        StoreError::Rejected(error) => error,
    }
}

/// Event RSVP, capacity and ticketing engine
///
/// # Example
///
/// ```no_run
/// use event_rsvp::{EngineConfig, RsvpEngine};
/// use event_rsvp_core::types::{NewEvent, RsvpStatus, UserId};
/// use chrono::{Duration, Utc};
///
/// # async fn example() -> Result<(), event_rsvp_core::RsvpError> {
/// let engine = RsvpEngine::new(EngineConfig::default())?;
/// let organizer = UserId::new();
/// let starts = Utc::now() + Duration::days(7);
/// let event = engine
///     .create_event(NewEvent::new(organizer, starts, starts + Duration::hours(2)).with_capacity(50))
///     .await?;
///
/// let attendance = engine.rsvp(event.id, UserId::new(), RsvpStatus::Going).await?;
/// assert!(attendance.reminder_enabled);
/// # Ok(())
/// # }
/// ```
pub struct RsvpEngine {
    store: KeyedStore<EventId, EventReducer>,
    directory: TicketDirectory,
}

impl RsvpEngine {
    /// Engine on the system clock with OS-random ticket ids
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Validation`] if `config` is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, RsvpError> {
        Self::with_environment(EventEnvironment::production(config))
    }

    /// Engine with injected clock and ticket id source
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Validation`] if the environment's config is invalid.
    pub fn with_environment(env: EventEnvironment) -> Result<Self, RsvpError> {
        env.config.validate()?;
        register_metrics();
        let capacity = env.config.event_broadcast_capacity;
        Ok(Self {
            store: KeyedStore::with_broadcast_capacity(EventReducer::new(), env, capacity),
            directory: TicketDirectory::default(),
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.store.environment().config
    }

    /// Ticket index shared by every event
    #[must_use]
    pub const fn tickets(&self) -> &TicketDirectory {
        &self.directory
    }

    /// Observe every fact emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.store.subscribe()
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.environment().clock.now()
    }

    // ------------------------------------------------------------------
    // Organizer operations
    // ------------------------------------------------------------------

    /// Register a new event in the `upcoming` phase
    ///
    /// # Errors
    ///
    /// - [`RsvpError::Validation`] for an inverted schedule or a price without tickets
    /// - [`RsvpError::DuplicateEvent`] if the id is taken
    #[tracing::instrument(
        skip_all,
        fields(event_id = %new_event.id, organizer_id = %new_event.organizer_id)
    )]
    pub async fn create_event(&self, new_event: NewEvent) -> Result<Event, RsvpError> {
        new_event
            .validate()
            .inspect_err(|e| tracing::debug!(error = %e, "Event rejected"))?;

        let event = new_event.into_event(self.now());
        let announcement = EngineEvent::EventCreated {
            event_id: event.id,
            organizer_id: event.organizer_id,
            starts_at: event.starts_at,
        };
        self.store
            .insert_with_events(event.id, EventState::new(event.clone()), [announcement])
            .await
            .map_err(lift(event.id))
            .inspect_err(|e| tracing::debug!(error = %e, "Event rejected"))?;

        tracing::info!(
            capacity = %event.capacity,
            requires_ticket = event.requires_ticket,
            starts_at = %event.starts_at,
            "Event created"
        );
        Ok(event)
    }

    /// Cancel an `upcoming` or `ongoing` event; irreversible
    ///
    /// # Errors
    ///
    /// - [`RsvpError::EventNotFound`] for an unknown event
    /// - [`RsvpError::PermissionDenied`] if `organizer_id` is not the organizer
    /// - [`RsvpError::InvalidState`] if the event is already terminal
    /// - [`RsvpError::Validation`] if the reason is empty or too short
    #[tracing::instrument(skip_all, fields(event_id = %event_id, organizer_id = %organizer_id))]
    pub async fn cancel_event(
        &self,
        event_id: EventId,
        organizer_id: UserId,
        reason: &str,
    ) -> Result<Event, RsvpError> {
        let action = EventAction::Cancel {
            organizer_id,
            reason: reason.to_string(),
        };
        let event = self
            .store
            .send(&event_id, action, |state, events| {
                RsvpMetrics::record_events(events);
                state.event.clone()
            })
            .await
            .map_err(lift(event_id))
            .inspect_err(|e| tracing::debug!(error = %e, kind = e.kind(), "Cancellation rejected"))?;

        tracing::info!(reason = event.cancellation_reason(), "Event cancelled");
        Ok(event)
    }

    /// Advance every event's lifecycle to `now`
    ///
    /// Each event is advanced under its own lock. Returns the transitions
    /// performed, grouped by event; an empty list means nothing was due.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::EventNotFound`] only if an event disappears
    /// mid-sweep, which the engine never does.
    #[tracing::instrument(skip_all, fields(now = %now))]
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<LifecycleTransition>, RsvpError> {
        let mut event_ids = self.store.keys().await;
        event_ids.sort_unstable();

        let mut transitions = Vec::new();
        for event_id in event_ids {
            let steps = self
                .store
                .send(&event_id, EventAction::Tick { now }, |_, events| {
                    RsvpMetrics::record_events(events);
                    events
                        .iter()
                        .filter_map(|event| match *event {
                            EngineEvent::LifecycleAdvanced {
                                event_id, from, to, ..
                            } => Some(LifecycleTransition { event_id, from, to }),
                            _ => None,
                        })
                        .collect::<Vec<_>>()
                })
                .await
                .map_err(lift(event_id))?;

            for step in &steps {
                tracing::info!(event_id = %step.event_id, from = %step.from, to = %step.to, "Lifecycle advanced");
            }
            transitions.extend(steps);
        }
        Ok(transitions)
    }

    // ------------------------------------------------------------------
    // Attendee operations
    // ------------------------------------------------------------------

    /// Set `user_id`'s RSVP status for `event_id`
    ///
    /// Idempotent: repeating the current status changes nothing and never
    /// mints a second ticket.
    ///
    /// # Errors
    ///
    /// - [`RsvpError::EventNotFound`] for an unknown event
    /// - [`RsvpError::InvalidState`] if the event is `completed` or `cancelled`
    /// - [`RsvpError::CapacityExceeded`] if `going` would overfill the event
    #[tracing::instrument(
        skip_all,
        fields(event_id = %event_id, user_id = %user_id, status = %status)
    )]
    pub async fn rsvp(
        &self,
        event_id: EventId,
        user_id: UserId,
        status: RsvpStatus,
    ) -> Result<Attendance, RsvpError> {
        let action = EventAction::SetRsvp { user_id, status };
        let attendance = self
            .store
            .send(&event_id, action, |state, events| {
                self.directory.record(events);
                RsvpMetrics::record_events(events);
                // The ledger always leaves a row behind.
                state
                    .attendance(&user_id)
                    .cloned()
                    .unwrap_or_else(|| Attendance::new(event_id, user_id, state.event.created_at))
            })
            .await
            .map_err(lift(event_id))
            .inspect_err(|e| {
                RsvpMetrics::record_rsvp_rejection(e);
                tracing::debug!(error = %e, kind = e.kind(), "RSVP rejected");
            })?;

        tracing::debug!(
            ticket_id = ?attendance.ticket().map(|t| t.id),
            "RSVP recorded"
        );
        Ok(attendance)
    }

    /// Opt `user_id` in or out of the pre-event reminder
    ///
    /// # Errors
    ///
    /// - [`RsvpError::EventNotFound`] for an unknown event
    /// - [`RsvpError::InvalidState`] if the event is terminal or the user never acted on it
    #[tracing::instrument(
        skip_all,
        fields(event_id = %event_id, user_id = %user_id, enabled = enabled)
    )]
    pub async fn set_reminder(
        &self,
        event_id: EventId,
        user_id: UserId,
        enabled: bool,
    ) -> Result<Attendance, RsvpError> {
        let action = EventAction::SetReminder { user_id, enabled };
        self.store
            .send(&event_id, action, |state, events| {
                RsvpMetrics::record_events(events);
                state
                    .attendance(&user_id)
                    .cloned()
                    .unwrap_or_else(|| Attendance::new(event_id, user_id, state.event.created_at))
            })
            .await
            .map_err(lift(event_id))
            .inspect_err(|e| tracing::debug!(error = %e, kind = e.kind(), "Reminder change rejected"))
    }

    // ------------------------------------------------------------------
    // Door operations
    // ------------------------------------------------------------------

    /// Check in `ticket_id` at `event_id`'s door
    ///
    /// # Errors
    ///
    /// - [`RsvpError::InvalidTicket`] for an unknown ticket or one from another event
    /// - [`RsvpError::TicketRevoked`] if the holder is no longer `going`
    /// - [`RsvpError::InvalidState`] unless the event is `ongoing` (or inside the grace window)
    /// - [`RsvpError::TicketAlreadyUsed`] with the first check-in time
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket_id, event_id = %event_id))]
    pub async fn validate_ticket(
        &self,
        ticket_id: TicketId,
        event_id: EventId,
    ) -> Result<CheckIn, RsvpError> {
        let result = self.check_in(ticket_id, event_id).await;
        Self::observe_check_in(&result);
        result
    }

    /// Decode a scanned ticket code and check it in
    ///
    /// # Errors
    ///
    /// As [`RsvpEngine::validate_ticket`], plus [`RsvpError::InvalidTicket`]
    /// with [`InvalidTicketReason::Malformed`] when the code does not decode.
    #[tracing::instrument(
        skip_all,
        fields(event_id = %event_id, ticket_id = tracing::field::Empty)
    )]
    pub async fn validate_scanned(&self, code: &str, event_id: EventId) -> Result<CheckIn, RsvpError> {
        let result = match codec::decode(code) {
            Ok(payload) => {
                tracing::Span::current().record("ticket_id", tracing::field::display(payload.ticket_id));
                self.check_in(payload.ticket_id, event_id).await
            }
            Err(error) => {
                tracing::debug!(error = %error, "Undecodable ticket code");
                Err(error.into())
            }
        };
        Self::observe_check_in(&result);
        result
    }

    async fn check_in(&self, ticket_id: TicketId, event_id: EventId) -> Result<CheckIn, RsvpError> {
        let (issued_for, user_id) = self
            .directory
            .lookup(ticket_id)
            .ok_or(RsvpError::invalid_ticket(InvalidTicketReason::UnknownTicket))?;
        if issued_for != event_id {
            return Err(RsvpError::invalid_ticket(InvalidTicketReason::EventMismatch));
        }

        self.store
            .send(&event_id, EventAction::CheckIn { ticket_id, user_id }, |_, events| {
                RsvpMetrics::record_events(events);
                events.iter().find_map(CheckIn::from_event)
            })
            .await
            .map_err(lift(event_id))?
            .ok_or(RsvpError::invalid_ticket(InvalidTicketReason::UnknownTicket))
    }

    fn observe_check_in(result: &Result<CheckIn, RsvpError>) {
        match result {
            Ok(check_in) => {
                tracing::info!(user_id = %check_in.user_id, validated_at = %check_in.validated_at, "Ticket checked in");
            }
            Err(error) => {
                RsvpMetrics::record_check_in_rejection(error);
                if let RsvpError::InvalidTicket { reason } = error {
                    tracing::warn!(target: ABUSE_TARGET, reason = %reason, "Invalid ticket presented");
                } else {
                    tracing::debug!(error = %error, kind = error.kind(), "Check-in refused");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// `user_id`'s attendance, or `None` while they are implicitly `not_going`
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::EventNotFound`] for an unknown event.
    #[tracing::instrument(skip_all, fields(event_id = %event_id, user_id = %user_id))]
    pub async fn get_attendance(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Attendance>, RsvpError> {
        self.store
            .state(&event_id, |state| state.attendance(&user_id).cloned())
            .await
            .map_err(lift(event_id))
    }

    /// The event with its live going-count
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::EventNotFound`] for an unknown event.
    #[tracing::instrument(skip_all, fields(event_id = %event_id))]
    pub async fn get_event(&self, event_id: EventId) -> Result<EventSnapshot, RsvpError> {
        self.store
            .state(&event_id, |state| EventSnapshot {
                event: state.event.clone(),
                going_count: state.going_count(),
            })
            .await
            .map_err(lift(event_id))
    }

    /// Attendances, optionally filtered by status, oldest change first
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::EventNotFound`] for an unknown event.
    #[tracing::instrument(skip_all, fields(event_id = %event_id, status = ?status))]
    pub async fn list_attendees(
        &self,
        event_id: EventId,
        status: Option<RsvpStatus>,
    ) -> Result<Vec<Attendance>, RsvpError> {
        self.store
            .state(&event_id, |state| {
                let mut attendees: Vec<Attendance> = state
                    .attendances
                    .values()
                    .filter(|a| status.is_none_or(|s| a.status() == s))
                    .cloned()
                    .collect();
                attendees.sort_by_key(|a| (a.updated_at, a.user_id));
                attendees
            })
            .await
            .map_err(lift(event_id))
    }

    /// Scannable code for `user_id`'s live ticket, if they hold one
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::EventNotFound`] for an unknown event.
    #[tracing::instrument(skip_all, fields(event_id = %event_id, user_id = %user_id))]
    pub async fn ticket_code(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<String>, RsvpError> {
        let ticket = self
            .store
            .state(&event_id, |state| {
                state.attendance(&user_id).and_then(Attendance::ticket).cloned()
            })
            .await
            .map_err(lift(event_id))?;
        ticket
            .map(|ticket| codec::encode_ticket(&ticket).map_err(RsvpError::from))
            .transpose()
    }

    /// Reminders the external notifier should deliver at `now`
    ///
    /// Covers every `upcoming` event starting within the configured window;
    /// sorted by start time, then event, then attendee.
    ///
    /// # Errors
    ///
    /// [`RsvpError::EventNotFound`] if a listed event can no longer be read.
    #[tracing::instrument(skip_all, fields(now = %now))]
    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<DueReminder>, RsvpError> {
        let window = self.config().reminder_window();
        let mut due = Vec::new();
        for event_id in self.store.keys().await {
            let found = self
                .store
                .state(&event_id, |state| reminders::due(state, now, window))
                .await
                .map_err(lift(event_id))?;
            due.extend(found);
        }
        due.sort_by_key(|r| (r.starts_at, r.event_id, r.user_id));
        tracing::debug!(count = due.len(), "Reminder sweep");
        Ok(due)
    }

    /// Number of registered events
    pub async fn event_count(&self) -> usize {
        self.store.len().await
    }
}
