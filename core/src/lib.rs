//! # Event RSVP Core
//!
//! Core traits and types for the event RSVP, capacity and ticketing engine.
//!
//! This crate holds everything that is pure: the domain model, the error
//! taxonomy, the ticket codec, and the two abstractions the engine is built
//! around.
//!
//! ## Core Concepts
//!
//! - **State**: Everything known about one event (the event row plus its attendances)
//! - **Action**: Every request an attendee, organizer or scheduler can make
//! - **Reducer**: `(State, Action, Environment) → Result<Events, Error>`
//! - **Environment**: Injected dependencies (clock, ticket id source)
//!
//! A reducer validates an action completely before touching state. When it
//! returns `Err` the state is exactly what it was before the call, so the
//! runtime never has to roll anything back.
//!
//! ## Example
//!
//! ```ignore
//! use event_rsvp_core::reducer::Reducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Event = CounterEvent;
//!     type Error = CounterError;
//!     type Environment = CounterEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         env: &CounterEnvironment,
//!     ) -> Result<SmallVec<[CounterEvent; 4]>, CounterError> {
//!         state.count += 1;
//!         Ok(smallvec![CounterEvent::Incremented { at: env.clock.now() }])
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Opaque payload embedded in a ticket's scannable representation
pub mod codec;

/// Error taxonomy shared by every engine component
pub mod error;

/// Domain entities and value objects
pub mod types;

pub use error::{InvalidTicketReason, RsvpError};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Result<Events, Error>`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Event`: Facts emitted by a successful reduction
    /// - `Error`: Why an action was rejected
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Facts recorded by a successful action
        type Event;

        /// Rejection type
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and emitted events
        ///
        /// Implementations must finish every check before the first write:
        /// an `Err` return leaves `state` untouched.
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is not legal for `state`.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All sources of non-determinism (time, randomness) are abstracted behind
/// traits and injected via the Environment parameter.
pub mod environment {
    use crate::types::TicketId;
    use chrono::{DateTime, Utc};
    use rand::RngCore;
    use rand::rngs::OsRng;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use event_rsvp_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of ticket identifiers
    ///
    /// Production ids must be unguessable; test implementations may be
    /// predictable.
    pub trait TicketIdGenerator: Send + Sync {
        /// Produce an identifier never returned before
        fn next_ticket_id(&self) -> TicketId;
    }

    /// Ticket ids drawn from the operating system CSPRNG (128 bits)
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OsRngTicketIds;

    impl TicketIdGenerator for OsRngTicketIds {
        fn next_ticket_id(&self) -> TicketId {
            let mut bytes = [0u8; 16];
            OsRng.fill_bytes(&mut bytes);
            TicketId::from_bytes(bytes)
        }
    }
}
