//! Timer utilities
//!
//! Pairs a monotonic instant with the wall-clock time it was taken at, and
//! formats elapsed durations for people.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Timer that remembers both when it started and how long it has been running
#[derive(Clone, Debug)]
pub struct Timer {
    start: Instant,
    started_at: DateTime<Utc>,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            started_at: Utc::now(),
            label: label.into(),
        }
    }

    /// Wall-clock start time
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Monotonic elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

/// Format a duration as words, e.g. `1 hour, 2 minutes, 5 seconds`
pub fn format_elapsed(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(plural(seconds, "second"));
    }
    parts.join(", ")
}

/// `1 test`, `2 tests`
pub fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Display form used in reports, e.g. `2024-03-01 02:15 PM`
pub fn format_display_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %I:%M %p").to_string()
}
