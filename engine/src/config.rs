//! Configuration management for the RSVP engine.
//!
//! Loads configuration from environment variables with sensible defaults.

use chrono::Duration;
use event_rsvp_core::RsvpError;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;

/// Default `RUST_LOG` filter
pub const DEFAULT_LOG_FILTER: &str = "info,event_rsvp=debug";

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum cancellation reason length, in characters after trimming
    pub min_cancellation_reason_len: usize,
    /// How long before the scheduled start check-in opens (0 = only while ongoing)
    pub check_in_grace_secs: u64,
    /// How far ahead of the start a reminder becomes due
    pub reminder_window_secs: u64,
    /// Capacity of the engine event broadcast channel
    pub event_broadcast_capacity: usize,
    /// Log filter (trace, debug, info, warn, error or a full directive)
    pub log_level: String,
    /// Prometheus scrape address; metrics are disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_cancellation_reason_len: 10,
            check_in_grace_secs: 0,
            reminder_window_secs: 86_400, // one day
            event_broadcast_capacity: 256,
            log_level: DEFAULT_LOG_FILTER.to_string(),
            metrics_addr: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_cancellation_reason_len: env::var("RSVP_MIN_CANCELLATION_REASON_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.min_cancellation_reason_len),
            check_in_grace_secs: env::var("RSVP_CHECK_IN_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.check_in_grace_secs),
            reminder_window_secs: env::var("RSVP_REMINDER_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reminder_window_secs),
            event_broadcast_capacity: env::var("RSVP_EVENT_BROADCAST_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_broadcast_capacity),
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            metrics_addr: env::var("RSVP_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`RsvpError::Validation`] for a zero reminder window or a zero
    /// broadcast capacity.
    pub fn validate(&self) -> Result<(), RsvpError> {
        if self.reminder_window_secs == 0 {
            return Err(RsvpError::Validation(
                "reminder window must be at least one second".to_string(),
            ));
        }
        if self.event_broadcast_capacity == 0 {
            return Err(RsvpError::Validation(
                "event broadcast capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Check-in grace as a duration
    #[must_use]
    pub fn check_in_grace(&self) -> Duration {
        seconds(self.check_in_grace_secs)
    }

    /// Reminder window as a duration
    #[must_use]
    pub fn reminder_window(&self) -> Duration {
        seconds(self.reminder_window_secs)
    }
}

// Largest second count `chrono::Duration` accepts.
const MAX_SECS: i64 = i64::MAX / 1_000;

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(MAX_SECS).min(MAX_SECS))
}
