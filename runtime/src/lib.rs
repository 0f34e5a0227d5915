//! # Event RSVP Runtime
//!
//! The imperative shell around the engine's pure reducers.
//!
//! ## Core Components
//!
//! - **`KeyedStore`**: one state per key (per event), each behind its own
//!   async mutex, so actions on the same key are serialized while different
//!   keys proceed fully in parallel
//! - **Event broadcast**: facts emitted by successful reductions are
//!   published to any number of observers
//!
//! ## Example
//!
//! ```ignore
//! use event_rsvp_runtime::KeyedStore;
//!
//! let store = KeyedStore::new(EventReducer::new(), environment);
//! store.insert(event_id, EventState::new(event)).await?;
//!
//! // Run an action and read the result under the same lock
//! let going = store
//!     .send(&event_id, action, |state, _events| state.going_count())
//!     .await?;
//! ```

use event_rsvp_core::reducer::Reducer;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, broadcast};

/// Prometheus metrics for observability
pub mod metrics;

use crate::metrics::StoreMetrics;

/// Error types for the store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during store operations
    ///
    /// `Rejected` carries the reducer's own error; the key variants are the
    /// store's.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError<E> {
        /// No state registered under the key
        #[error("No state registered for key {0}")]
        UnknownKey(String),

        /// A state is already registered under the key
        #[error("State already registered for key {0}")]
        DuplicateKey(String),

        /// The reducer refused the action; state is unchanged
        #[error("Action rejected: {0}")]
        Rejected(E),
    }
}

pub use error::StoreError;

/// Default capacity of the event broadcast channel
pub const DEFAULT_BROADCAST_CAPACITY: usize = 16;

type Entry<S> = Arc<Mutex<S>>;

/// Store holding one reducer state per key
///
/// Each dispatch locks exactly one key's state, runs the reducer, lets the
/// caller project a reply from the post-action state, and publishes the
/// emitted events, all before the lock is released. The registry lock is
/// only held long enough to clone the entry handle.
pub struct KeyedStore<K, R>
where
    R: Reducer,
{
    entries: RwLock<HashMap<K, Entry<R::State>>>,
    reducer: R,
    environment: R::Environment,
    events: broadcast::Sender<R::Event>,
}

impl<K, R> KeyedStore<K, R>
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    R: Reducer + Send + Sync,
    R::State: Send,
    R::Event: Clone + Send,
    R::Environment: Send + Sync,
{
    /// Create an empty store with the default broadcast capacity
    #[must_use]
    pub fn new(reducer: R, environment: R::Environment) -> Self {
        Self::with_broadcast_capacity(reducer, environment, DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create an empty store with a custom broadcast capacity
    ///
    /// Slow subscribers that fall more than `capacity` events behind observe
    /// a lag error and skip ahead; dispatch never waits for them.
    #[must_use]
    pub fn with_broadcast_capacity(
        reducer: R,
        environment: R::Environment,
        capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: RwLock::new(HashMap::new()),
            reducer,
            environment,
            events,
        }
    }

    /// Injected dependencies shared by every dispatch
    pub const fn environment(&self) -> &R::Environment {
        &self.environment
    }

    /// Register the initial state for `key`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if `key` is already registered.
    pub async fn insert(&self, key: K, state: R::State) -> Result<(), StoreError<R::Error>> {
        self.insert_with_events(key, state, std::iter::empty()).await
    }

    /// Register the initial state for `key` and announce it
    ///
    /// `events` are published while the registry lock is held, so no
    /// subscriber can observe an action on `key` before its announcement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if `key` is already registered;
    /// nothing is published in that case.
    pub async fn insert_with_events<I>(
        &self,
        key: K,
        state: R::State,
        events: I,
    ) -> Result<(), StoreError<R::Error>>
    where
        I: IntoIterator<Item = R::Event>,
    {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }
        entries.insert(key, Arc::new(Mutex::new(state)));
        for event in events {
            let _ = self.events.send(event);
        }
        Ok(())
    }

    async fn entry(&self, key: &K) -> Result<Entry<R::State>, StoreError<R::Error>> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))
    }

    /// Run `action` against the state for `key`
    ///
    /// `reply` runs under the same lock as the reducer, so what it observes is
    /// exactly the state the action produced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKey`] if nothing is registered for `key`,
    /// or [`StoreError::Rejected`] with the reducer's error.
    #[tracing::instrument(skip_all, fields(key = %key), name = "keyed_store_send")]
    pub async fn send<T, F>(
        &self,
        key: &K,
        action: R::Action,
        reply: F,
    ) -> Result<T, StoreError<R::Error>>
    where
        F: FnOnce(&R::State, &[R::Event]) -> T,
    {
        let entry = self.entry(key).await?;

        let waiting = Instant::now();
        let mut state = entry.lock().await;
        StoreMetrics::record_lock_wait(waiting.elapsed());

        let started = Instant::now();
        match self.reducer.reduce(&mut state, action, &self.environment) {
            Ok(events) => {
                let out = reply(&state, &events);
                for event in events {
                    // No subscribers is not an error.
                    let _ = self.events.send(event);
                }
                drop(state);
                StoreMetrics::record_action(started.elapsed());
                Ok(out)
            }
            Err(error) => {
                drop(state);
                StoreMetrics::record_rejection();
                Err(StoreError::Rejected(error))
            }
        }
    }

    /// Read the state for `key` under its lock
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKey`] if nothing is registered for `key`.
    pub async fn state<T, F>(&self, key: &K, f: F) -> Result<T, StoreError<R::Error>>
    where
        F: FnOnce(&R::State) -> T,
    {
        let entry = self.entry(key).await?;
        let state = entry.lock().await;
        Ok(f(&state))
    }

    /// Snapshot of every registered key
    pub async fn keys(&self) -> Vec<K> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Number of registered keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing is registered
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Observe every event emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<R::Event> {
        self.events.subscribe()
    }
}
