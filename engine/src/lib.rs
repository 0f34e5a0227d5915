//! # Event RSVP
//!
//! RSVP, capacity and ticketing engine for events.
//!
//! Tracks each attendee's commitment to an event, enforces the event's
//! capacity, issues single-use tickets to committed attendees and checks them
//! in at the door, and drives the event's own lifecycle:
//!
//! - [`lifecycle`]: the gate every attendee action passes through, plus
//!   scheduled advancement and organizer cancellation
//! - [`ledger`]: idempotent, capacity-aware RSVP transitions
//! - [`issuer`]: at most one live ticket per attendee
//! - [`validator`]: door-side check-in with a compare-and-set on first use
//! - [`reminders`]: the opt-in flag the external notifier reads
//!
//! All of them are pure functions over one event's [`EventState`], composed
//! by [`EventReducer`]. [`RsvpEngine`] runs that reducer behind a per-event
//! lock.
//!
//! ## Example
//!
//! ```ignore
//! let engine = RsvpEngine::new(EngineConfig::from_env())?;
//! let event = engine.create_event(new_event).await?;
//! engine.rsvp(event.id, user_id, RsvpStatus::Going).await?;
//!
//! // Scheduler
//! engine.tick(Utc::now()).await?;
//!
//! // Door
//! let check_in = engine.validate_ticket(ticket_id, event.id).await?;
//! ```

/// Engine configuration
pub mod config;

/// Engine facade and ticket directory
pub mod engine;

/// Ticket issuer
pub mod issuer;

/// RSVP ledger
pub mod ledger;

/// Event lifecycle controller
pub mod lifecycle;

/// Business metrics
pub mod metrics;

/// Event reducer, actions and environment
pub mod reducer;

/// Reminder flag store
pub mod reminders;

/// Per-event state and emitted facts
pub mod state;

/// Ticket validator
pub mod validator;

pub use config::EngineConfig;
pub use engine::{ABUSE_TARGET, RsvpEngine, TicketDirectory};
pub use reducer::{EventAction, EventEnvironment, EventReducer};
pub use state::{CheckIn, DueReminder, EngineEvent, EventSnapshot, EventState, LifecycleTransition};
