//! Bounded run deadlines.
//!
//! Every instance of a run executes under one [`RunDeadline`]. Blocking
//! waits (topic reads, barrier waits, node liveness polls) race the deadline
//! through [`RunDeadline::race`] and surface an explicit error when it trips,
//! so nothing in a run can hang forever.
//!
//! A deadline pairs an instant with a [`CancellationToken`]. Stages derive
//! children with [`RunDeadline::child`]: a child never outlives its parent,
//! and cancelling the parent cancels every child.

use std::future::Future;
use std::time::Duration;

use snafu::Snafu;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Errors surfaced when a wait loses the race against its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum DeadlineError {
    /// The deadline instant passed before the operation completed.
    #[snafu(display("deadline exceeded while waiting for {operation}"))]
    Exceeded { operation: String },

    /// The deadline was cancelled before the operation completed.
    #[snafu(display("cancelled while waiting for {operation}"))]
    Cancelled { operation: String },
}

/// A point in time plus a cancellation token, shared by all waits of a stage.
#[derive(Debug, Clone)]
pub struct RunDeadline {
    at: Instant,
    token: CancellationToken,
}

impl RunDeadline {
    /// Deadline `timeout` from now with a fresh cancellation token.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            token: CancellationToken::new(),
        }
    }

    /// Deadline at `at` tied to an existing token.
    pub fn with_token(at: Instant, token: CancellationToken) -> Self {
        Self { at, token }
    }

    /// Derive a stage deadline `timeout` from now, capped by this deadline.
    ///
    /// Cancelling `self` cancels the child; cancelling the child leaves
    /// `self` untouched.
    pub fn child(&self, timeout: Duration) -> Self {
        let at = (Instant::now() + timeout).min(self.at);
        Self {
            at,
            token: self.token.child_token(),
        }
    }

    /// The instant this deadline trips.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before the deadline trips (zero once passed).
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// True once the instant has passed or the token was cancelled.
    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.at
    }

    /// Cancel this deadline and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The cancellation token behind this deadline.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Run `fut` to completion unless the deadline trips first.
    ///
    /// Cancellation wins ties so a cancelled run unwinds promptly.
    pub async fn race<F>(&self, operation: impl Into<String>, fut: F) -> Result<F::Output, DeadlineError>
    where F: Future {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => CancelledSnafu { operation: operation.into() }.fail(),
            _ = tokio::time::sleep_until(self.at) => ExceededSnafu { operation: operation.into() }.fail(),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration`, or less if the deadline trips first.
    ///
    /// Returns an error if the deadline tripped during the sleep.
    pub async fn sleep(&self, operation: impl Into<String>, duration: Duration) -> Result<(), DeadlineError> {
        let operation = operation.into();
        let wake = Instant::now() + duration;
        if wake >= self.at {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return CancelledSnafu { operation }.fail(),
                _ = tokio::time::sleep_until(self.at) => return ExceededSnafu { operation }.fail(),
            }
        }
        self.race(operation, tokio::time::sleep_until(wake)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_race_returns_output_before_deadline() {
        let deadline = RunDeadline::after(Duration::from_secs(5));
        let value = deadline.race("ready value", async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_race_times_out_within_margin() {
        let deadline = RunDeadline::after(Duration::from_millis(50));
        let started = std::time::Instant::now();
        let err = deadline.race("never", std::future::pending::<()>()).await.unwrap_err();
        assert!(matches!(err, DeadlineError::Exceeded { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancel_propagates_to_children() {
        let parent = RunDeadline::after(Duration::from_secs(60));
        let child = parent.child(Duration::from_secs(30));
        parent.cancel();
        let err = child.race("child wait", std::future::pending::<()>()).await.unwrap_err();
        assert_eq!(err, DeadlineError::Cancelled {
            operation: "child wait".to_string()
        });
    }

    #[tokio::test]
    async fn test_child_is_capped_by_parent() {
        let parent = RunDeadline::after(Duration::from_millis(100));
        let child = parent.child(Duration::from_secs(3600));
        assert!(child.instant() <= parent.instant());
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_parent() {
        let parent = RunDeadline::after(Duration::from_secs(60));
        let child = parent.child(Duration::from_secs(1));
        child.cancel();
        assert!(child.is_expired());
        assert!(!parent.is_expired());
    }

    #[tokio::test]
    async fn test_sleep_past_deadline_errors() {
        let deadline = RunDeadline::after(Duration::from_millis(20));
        let err = deadline.sleep("settle", Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, DeadlineError::Exceeded { .. }));
    }
}
