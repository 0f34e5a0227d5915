//! Races between concurrent callers on the same event
//!
//! Every test runs on the multi-threaded runtime so spawned tasks genuinely
//! contend for the per-event lock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::Duration;
use event_rsvp::{EngineConfig, EventEnvironment, RsvpEngine};
use event_rsvp_core::environment::Clock;
use event_rsvp_core::types::{Event, EventStatus, RsvpStatus, UserId};
use event_rsvp_core::RsvpError;
use event_rsvp_testing::fixtures::ticketed_event;
use event_rsvp_testing::{ManualClock, SequentialTicketIds, test_clock};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

fn engine() -> (Arc<RsvpEngine>, ManualClock) {
    let clock = ManualClock::starting_at(test_clock().now());
    let env = EventEnvironment::new(
        Arc::new(clock.clone()),
        Arc::new(SequentialTicketIds::new()),
        EngineConfig::default(),
    );
    (Arc::new(RsvpEngine::with_environment(env).unwrap()), clock)
}

async fn ticketed(engine: &RsvpEngine, clock: &ManualClock, capacity: u32) -> (Event, UserId) {
    let organizer = UserId::new();
    let event = engine
        .create_event(ticketed_event(organizer, clock.now(), capacity))
        .await
        .unwrap();
    (event, organizer)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn capacity_race_admits_exactly_capacity() {
    const CAPACITY: u32 = 5;
    const CONTENDERS: usize = 64;

    let (engine, clock) = engine();
    let (event, _) = ticketed(&engine, &clock, CAPACITY).await;
    let event_id = event.id;

    let handles = (0..CONTENDERS).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .rsvp(event_id, UserId::new(), RsvpStatus::Going)
                .await
        })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let admitted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(admitted.len(), CAPACITY as usize);
    assert!(results.iter().all(|r| match r {
        Ok(_) => true,
        Err(e) => matches!(e, RsvpError::CapacityExceeded { .. }),
    }));

    let ticket_ids: HashSet<_> = admitted.iter().map(|a| a.ticket().unwrap().id).collect();
    assert_eq!(ticket_ids.len(), CAPACITY as usize);

    assert_eq!(engine.get_event(event.id).await.unwrap().going_count, CAPACITY);
    assert_eq!(
        engine
            .list_attendees(event.id, Some(RsvpStatus::Going))
            .await
            .unwrap()
            .len(),
        CAPACITY as usize
    );
    assert_eq!(engine.tickets().len(), CAPACITY as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn one_user_racing_going_gets_one_ticket() {
    let (engine, clock) = engine();
    let (event, _) = ticketed(&engine, &clock, 1).await;
    let event_id = event.id;
    let user = UserId::new();

    let handles = (0..16).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.rsvp(event_id, user, RsvpStatus::Going).await })
    });
    let tickets: HashSet<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().ticket().unwrap().id)
        .collect();

    assert_eq!(tickets.len(), 1);
    assert_eq!(engine.get_event(event.id).await.unwrap().going_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn double_scan_race_admits_once() {
    let (engine, clock) = engine();
    let (event, _) = ticketed(&engine, &clock, 0).await;
    let ticket_id = engine
        .rsvp(event.id, UserId::new(), RsvpStatus::Going)
        .await
        .unwrap()
        .ticket()
        .unwrap()
        .id;
    clock.set(event.starts_at + Duration::minutes(2));
    engine.tick(clock.now()).await.unwrap();
    let event_id = event.id;

    let handles = (0..12).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.validate_ticket(ticket_id, event_id).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let first = winners[0].validated_at;
    for result in &results {
        if let Err(error) = result {
            assert_eq!(
                error,
                &RsvpError::TicketAlreadyUsed {
                    ticket_id,
                    validated_at: first,
                }
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn cancel_racing_rsvps_is_linearizable() {
    let (engine, clock) = engine();
    let (event, organizer) = ticketed(&engine, &clock, 0).await;
    let event_id = event.id;

    let canceller = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            engine
                .cancel_event(event_id, organizer, "venue unavailable")
                .await
        })
    };
    let rsvps = (0..32).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let user = UserId::new();
            (user, engine.rsvp(event_id, user, RsvpStatus::Going).await)
        })
    });
    let rsvps: Vec<_> = join_all(rsvps)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    canceller.await.unwrap().unwrap();

    let snapshot = engine.get_event(event.id).await.unwrap();
    assert_eq!(snapshot.event.status(), EventStatus::Cancelled);

    // Every call either landed before the cancel or was refused after it.
    let mut accepted = 0;
    for (user, result) in rsvps {
        let stored = engine.get_attendance(event.id, user).await.unwrap();
        match result {
            Ok(_) => {
                accepted += 1;
                assert_eq!(stored.unwrap().status(), RsvpStatus::Going);
            }
            Err(error) => {
                assert_eq!(error.kind(), "INVALID_STATE");
                assert_eq!(stored, None);
            }
        }
    }
    assert_eq!(snapshot.going_count, accepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_events_do_not_share_capacity() {
    let (engine, clock) = engine();
    let (first, _) = ticketed(&engine, &clock, 3).await;
    let (second, _) = ticketed(&engine, &clock, 3).await;

    let handles = [first.id, second.id].into_iter().flat_map(|event_id| {
        (0..10).map({
            let engine = Arc::clone(&engine);
            move |_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine.rsvp(event_id, UserId::new(), RsvpStatus::Going).await
                })
            }
        })
    });
    let admitted = join_all(handles)
        .await
        .into_iter()
        .filter(|joined| joined.as_ref().is_ok_and(Result::is_ok))
        .count();

    assert_eq!(admitted, 6);
    assert_eq!(engine.get_event(first.id).await.unwrap().going_count, 3);
    assert_eq!(engine.get_event(second.id).await.unwrap().going_count, 3);
}
