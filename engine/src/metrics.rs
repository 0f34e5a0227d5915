//! Business metrics for the RSVP engine.
//!
//! Recorded through the `metrics` facade; the runtime's `MetricsServer`
//! exports them alongside the store metrics.

use crate::state::EngineEvent;
use event_rsvp_core::RsvpError;
use metrics::{counter, describe_counter};

/// Register engine metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "rsvp_transitions_total",
        "RSVP status changes, labelled by the new status"
    );
    describe_counter!(
        "rsvp_capacity_rejections_total",
        "Going requests refused because the event was full"
    );
    describe_counter!("rsvp_tickets_issued_total", "Tickets minted");
    describe_counter!(
        "rsvp_check_ins_total",
        "Check-in attempts, labelled by outcome"
    );
    describe_counter!(
        "rsvp_invalid_ticket_total",
        "Tickets treated as tampering or misuse, labelled by reason"
    );
    describe_counter!("rsvp_events_cancelled_total", "Events cancelled by organizers");
    describe_counter!(
        "rsvp_lifecycle_transitions_total",
        "Scheduled lifecycle steps, labelled by the new status"
    );
    describe_counter!(
        "rsvp_reminders_toggled_total",
        "Reminder flag changes, labelled by the new value"
    );
}

/// Engine metrics recorder.
pub struct RsvpMetrics;

impl RsvpMetrics {
    /// Count the facts of one successful action.
    pub fn record_events(events: &[EngineEvent]) {
        for event in events {
            match event {
                EngineEvent::RsvpChanged { to, .. } => {
                    counter!("rsvp_transitions_total", "status" => to.as_str()).increment(1);
                }
                EngineEvent::TicketIssued { .. } => {
                    counter!("rsvp_tickets_issued_total").increment(1);
                }
                EngineEvent::TicketValidated { .. } => {
                    counter!("rsvp_check_ins_total", "outcome" => "admitted").increment(1);
                }
                EngineEvent::ReminderToggled { enabled, .. } => {
                    let label = if *enabled { "true" } else { "false" };
                    counter!("rsvp_reminders_toggled_total", "enabled" => label).increment(1);
                }
                EngineEvent::LifecycleAdvanced { to, .. } => {
                    counter!("rsvp_lifecycle_transitions_total", "to" => to.as_str()).increment(1);
                }
                EngineEvent::EventCancelled { .. } => {
                    counter!("rsvp_events_cancelled_total").increment(1);
                }
                EngineEvent::EventCreated { .. } | EngineEvent::TicketRevoked { .. } => {}
            }
        }
    }

    /// Count a refused RSVP.
    pub fn record_rsvp_rejection(error: &RsvpError) {
        if matches!(error, RsvpError::CapacityExceeded { .. }) {
            counter!("rsvp_capacity_rejections_total").increment(1);
        }
    }

    /// Count a refused check-in.
    pub fn record_check_in_rejection(error: &RsvpError) {
        let outcome = match error {
            RsvpError::TicketRevoked { .. } => "revoked",
            RsvpError::TicketAlreadyUsed { .. } => "already_used",
            RsvpError::InvalidState { .. } => "closed",
            RsvpError::InvalidTicket { reason } => {
                counter!("rsvp_invalid_ticket_total", "reason" => reason.as_str()).increment(1);
                "invalid"
            }
            _ => "error",
        };
        counter!("rsvp_check_ins_total", "outcome" => outcome).increment(1);
    }
}
