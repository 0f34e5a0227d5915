//! RSVP engine walkthrough
//!
//! Drives one engine through the capacity, check-in, cancellation and
//! reminder flows and logs every outcome.
//!
//! # Running
//!
//! ```bash
//! cargo run --bin demo
//! RUST_LOG=debug cargo run --bin demo
//! RSVP_METRICS_ADDR=127.0.0.1:9000 cargo run --bin demo
//! ```

use anyhow::{Context, ensure};
use chrono::{Duration, Utc};
use event_rsvp::{EngineConfig, EngineEvent, RsvpEngine};
use event_rsvp_core::RsvpError;
use event_rsvp_core::types::{Money, NewEvent, RsvpStatus, UserId};
use event_rsvp_runtime::metrics::MetricsServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics = match config.metrics_addr {
        Some(addr) => {
            let mut server = MetricsServer::new(addr);
            server.start().context("starting metrics recorder")?;
            Some(server)
        }
        None => None,
    };

    let engine = RsvpEngine::new(config).context("building engine")?;

    let mut facts = engine.subscribe();
    let audit = tokio::spawn(async move {
        let mut seen = 0_usize;
        while let Ok(event) = facts.recv().await {
            tracing::trace!(?event, "Fact");
            seen += 1;
            if matches!(event, EngineEvent::EventCancelled { .. }) {
                break;
            }
        }
        seen
    });

    let organizer = UserId::new();
    let users: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();

    // ------------------------------------------------------------------
    // Capacity: two seats, three takers
    // ------------------------------------------------------------------
    tracing::info!("=== Capacity ===");
    let now = Utc::now();
    // Starts a minute ago; the first tick moves it to ongoing.
    let concert = engine
        .create_event(
            NewEvent::new(organizer, now - Duration::minutes(1), now + Duration::hours(2))
                .with_capacity(2)
                .with_tickets(Money::from_cents(4_000)),
        )
        .await?;

    let mut tickets = Vec::new();
    for user in &users[..2] {
        let attendance = engine.rsvp(concert.id, *user, RsvpStatus::Going).await?;
        let ticket = attendance.ticket().context("going attendee without a ticket")?;
        tracing::info!(user_id = %user, ticket_id = %ticket.id, "Seat taken");
        tickets.push(ticket.id);
    }

    match engine.rsvp(concert.id, users[2], RsvpStatus::Going).await {
        Err(error @ RsvpError::CapacityExceeded { .. }) => {
            tracing::info!(%error, "Third attendee turned away");
        }
        other => anyhow::bail!("expected the event to be full, got {other:?}"),
    }

    // ------------------------------------------------------------------
    // Check-in: one scan admits, the second is refused
    // ------------------------------------------------------------------
    tracing::info!("=== Check-in ===");
    let transitions = engine.tick(Utc::now()).await?;
    tracing::info!(count = transitions.len(), "Lifecycle tick");

    let code = engine
        .ticket_code(concert.id, users[0])
        .await?
        .context("ticket code for the first attendee")?;
    let admitted = engine.validate_scanned(&code, concert.id).await?;
    tracing::info!(validated_at = %admitted.validated_at, "First scan admitted");

    match engine.validate_ticket(tickets[0], concert.id).await {
        Err(error @ RsvpError::TicketAlreadyUsed { .. }) => {
            tracing::info!(%error, "Second scan refused");
        }
        other => anyhow::bail!("expected the second scan to fail, got {other:?}"),
    }

    // ------------------------------------------------------------------
    // Reminders: interested, going, not going
    // ------------------------------------------------------------------
    tracing::info!("=== Reminders ===");
    let meetup_start = Utc::now() + Duration::hours(6);
    let meetup = engine
        .create_event(NewEvent::new(
            organizer,
            meetup_start,
            meetup_start + Duration::hours(1),
        ))
        .await?;
    let user = users[0];

    let attendance = engine.rsvp(meetup.id, user, RsvpStatus::Interested).await?;
    ensure!(!attendance.reminder_enabled, "interested must not opt in");
    let attendance = engine.rsvp(meetup.id, user, RsvpStatus::Going).await?;
    ensure!(attendance.reminder_enabled, "going must opt in");
    let attendance = engine.rsvp(meetup.id, user, RsvpStatus::NotGoing).await?;
    tracing::info!(
        reminder_enabled = attendance.reminder_enabled,
        "Left going; reminder flag kept"
    );
    for reminder in engine.due_reminders(Utc::now()).await? {
        tracing::info!(event_id = %reminder.event_id, user_id = %reminder.user_id, "Reminder due");
    }
    let attendance = engine.set_reminder(meetup.id, user, false).await?;
    ensure!(!attendance.reminder_enabled, "opt-out must stick");

    // ------------------------------------------------------------------
    // Cancellation: the event closes for good
    // ------------------------------------------------------------------
    tracing::info!("=== Cancellation ===");
    let cancelled = engine
        .cancel_event(concert.id, organizer, "venue unavailable")
        .await?;
    tracing::info!(status = %cancelled.status(), "Event closed");

    match engine.rsvp(concert.id, users[3], RsvpStatus::Going).await {
        Err(error @ RsvpError::InvalidState { .. }) => {
            tracing::info!(%error, "Late RSVP refused");
        }
        other => anyhow::bail!("expected the cancelled event to refuse RSVPs, got {other:?}"),
    }

    let seen = audit.await.context("audit task")?;
    tracing::info!(facts = seen, tickets = engine.tickets().len(), "Walkthrough complete");

    if let Some(rendered) = metrics.as_ref().and_then(MetricsServer::render) {
        println!("{rendered}");
    }
    Ok(())
}
