//! # Event RSVP Testing
//!
//! Testing utilities and helpers for the event RSVP engine.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - Event fixtures with schedules relative to a test clock
//! - Property-based testing strategies
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use event_rsvp_testing::{ManualClock, SequentialTicketIds, test_clock};
//!
//! #[tokio::test]
//! async fn ticket_issued_on_going() {
//!     let clock = ManualClock::starting_at(test_clock().now());
//!     let engine = RsvpEngine::with_environment(EventEnvironment::new(
//!         Arc::new(clock.clone()),
//!         Arc::new(SequentialTicketIds::new()),
//!         EngineConfig::default(),
//!     ))?;
//!
//!     clock.advance(Duration::days(1));
//!     engine.tick(clock.now()).await?;
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use event_rsvp_core::environment::{Clock, TicketIdGenerator};
use event_rsvp_core::types::TicketId;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, TicketId, TicketIdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use event_rsvp_testing::mocks::FixedClock;
    /// use event_rsvp_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock the test moves by hand
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the engine.
    ///
    /// ```
    /// use event_rsvp_testing::mocks::{ManualClock, test_clock};
    /// use event_rsvp_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let start = test_clock().now();
    /// let clock = ManualClock::starting_at(start);
    /// let engine_side = clock.clone();
    /// clock.advance(Duration::hours(2));
    /// assert_eq!(engine_side.now(), start + Duration::hours(2));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock reading `time`
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move forward by `by`
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Predictable ticket ids: 1, 2, 3, ...
    #[derive(Debug, Default)]
    pub struct SequentialTicketIds {
        next: AtomicU64,
    }

    impl SequentialTicketIds {
        /// Start counting at 1
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        /// Number of ids handed out so far
        #[must_use]
        pub fn issued(&self) -> u64 {
            self.next.load(Ordering::SeqCst)
        }
    }

    impl TicketIdGenerator for SequentialTicketIds {
        fn next_ticket_id(&self) -> TicketId {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            TicketId::from_u128(u128::from(n))
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Safe to call from every test; only the first call installs anything.
    /// Honors `RUST_LOG`, defaulting to `debug` for the engine crates.
    pub fn init_test_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("event_rsvp=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

/// Event fixtures
///
/// Schedules are expressed relative to a reference time so tests read as
/// "starts in an hour, lasts two".
pub mod fixtures {
    use chrono::{DateTime, Duration, Utc};
    use event_rsvp_core::types::{Money, NewEvent, UserId};

    /// Free, unlimited event starting `starts_in` after `now` and lasting `lasts`
    #[must_use]
    pub fn event_starting_in(
        organizer_id: UserId,
        now: DateTime<Utc>,
        starts_in: Duration,
        lasts: Duration,
    ) -> NewEvent {
        let starts_at = now + starts_in;
        NewEvent::new(organizer_id, starts_at, starts_at + lasts)
    }

    /// Event one day out, lasting three hours
    #[must_use]
    pub fn upcoming_event(organizer_id: UserId, now: DateTime<Utc>) -> NewEvent {
        event_starting_in(organizer_id, now, Duration::days(1), Duration::hours(3))
    }

    /// Ticketed event one day out with the given capacity
    #[must_use]
    pub fn ticketed_event(organizer_id: UserId, now: DateTime<Utc>, capacity: u32) -> NewEvent {
        upcoming_event(organizer_id, now)
            .with_capacity(capacity)
            .with_tickets(Money::from_cents(2_500))
    }
}

/// Property-based testing utilities using proptest
pub mod properties {
    use event_rsvp_core::types::RsvpStatus;
    use proptest::prelude::*;

    /// Any RSVP status
    pub fn rsvp_status() -> impl Strategy<Value = RsvpStatus> {
        prop_oneof![
            Just(RsvpStatus::NotGoing),
            Just(RsvpStatus::Interested),
            Just(RsvpStatus::Going),
        ]
    }

    /// A reason that passes the default length check once trimmed
    pub fn cancellation_reason() -> impl Strategy<Value = String> {
        "[a-z]{10,40}( [a-z]{2,10}){0,4}"
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, SequentialTicketIds, test_clock};
