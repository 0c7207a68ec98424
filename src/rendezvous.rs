//! Counting rendezvous used to gate commands on subscriber readiness.
//!
//! A [`Rendezvous`] starts with zero permits. Each party that reaches the
//! readiness point calls [`Rendezvous::release`]; the gated party calls
//! [`Rendezvous::acquire_many`] once per party it must wait for. Every
//! acquire is bounded by a maximum wait so a missing release surfaces as
//! [`RendezvousError::Stalled`] instead of a hung test.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::Semaphore,
    time::{Instant, timeout_at},
};

use crate::metrics;

/// Errors surfaced while waiting at a rendezvous.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RendezvousError {
    /// The wait exceeded its bound before enough permits were released.
    #[error(
        "{party} stalled at `{point}`: acquired {acquired} of {required} permits within {waited:?}"
    )]
    Stalled {
        /// Actor that was waiting.
        party: String,
        /// Name of the readiness point.
        point: String,
        /// Permits obtained before the deadline.
        acquired: u32,
        /// Permits the party needed.
        required: u32,
        /// Time spent waiting.
        waited: Duration,
    },
    /// The rendezvous was closed while the party was waiting.
    #[error("rendezvous `{point}` closed while {party} was waiting")]
    Closed {
        /// Actor that was waiting.
        party: String,
        /// Name of the readiness point.
        point: String,
    },
}

#[derive(Debug)]
struct Inner {
    point: String,
    permits: Semaphore,
    released: AtomicU64,
    acquired: AtomicU64,
}

/// Shared counting rendezvous for one scenario step.
///
/// Cloning is cheap; all clones share the same permit pool.
#[derive(Clone, Debug)]
pub struct Rendezvous {
    inner: Arc<Inner>,
}

impl Rendezvous {
    /// Create a rendezvous named after its readiness point, with no permits.
    #[must_use]
    pub fn new(point: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                point: point.into(),
                permits: Semaphore::new(0),
                released: AtomicU64::new(0),
                acquired: AtomicU64::new(0),
            }),
        }
    }

    /// Name of the readiness point this rendezvous guards.
    #[must_use]
    pub fn point(&self) -> &str { &self.inner.point }

    /// Add one permit, waking at most one blocked acquirer.
    pub fn release(&self) {
        self.inner.released.fetch_add(1, Ordering::AcqRel);
        self.inner.permits.add_permits(1);
        tracing::debug!(point = %self.inner.point, "rendezvous permit released");
    }

    /// Consume one permit, waiting at most `max_wait` for it.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::Stalled`] when no permit arrives in time.
    pub async fn acquire(&self, party: &str, max_wait: Duration) -> Result<(), RendezvousError> {
        self.acquire_many(party, 1, max_wait).await
    }

    /// Consume `required` permits one at a time under a single deadline.
    ///
    /// Permits obtained before a stall stay consumed; the rendezvous is not
    /// reused after a failed step.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::Stalled`] naming `party` and the readiness
    /// point when the deadline passes first, or [`RendezvousError::Closed`]
    /// if the pool was closed.
    pub async fn acquire_many(
        &self,
        party: &str,
        required: u32,
        max_wait: Duration,
    ) -> Result<(), RendezvousError> {
        let started = Instant::now();
        let deadline = started + max_wait;
        for acquired in 0..required {
            match timeout_at(deadline, self.inner.permits.acquire()).await {
                Ok(Ok(permit)) => {
                    permit.forget();
                    self.inner.acquired.fetch_add(1, Ordering::AcqRel);
                }
                Ok(Err(_)) => {
                    return Err(RendezvousError::Closed {
                        party: party.to_owned(),
                        point: self.inner.point.clone(),
                    });
                }
                Err(_) => {
                    metrics::inc_stalls();
                    let err = RendezvousError::Stalled {
                        party: party.to_owned(),
                        point: self.inner.point.clone(),
                        acquired,
                        required,
                        waited: started.elapsed(),
                    };
                    tracing::warn!(error = %err, "rendezvous stalled");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Wake every waiter with [`RendezvousError::Closed`].
    pub fn close(&self) { self.inner.permits.close(); }

    /// Permits currently available.
    #[must_use]
    pub fn available(&self) -> usize { self.inner.permits.available_permits() }

    /// Total releases issued.
    #[must_use]
    pub fn released(&self) -> u64 { self.inner.released.load(Ordering::Acquire) }

    /// Total acquires completed.
    #[must_use]
    pub fn acquired(&self) -> u64 { self.inner.acquired.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn starts_with_no_permits() {
        let rendezvous = Rendezvous::new("subscribed");
        assert_eq!(rendezvous.available(), 0);
        let err = rendezvous
            .acquire("command", Duration::from_millis(50))
            .await
            .expect_err("no release was issued");
        assert!(matches!(
            err,
            RendezvousError::Stalled { acquired: 0, required: 1, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn release_before_acquire_is_kept() {
        let rendezvous = Rendezvous::new("subscribed");
        rendezvous.release();
        rendezvous.release();
        rendezvous
            .acquire_many("command", 2, Duration::from_millis(10))
            .await
            .expect("both permits were released");
        assert_eq!(rendezvous.acquired(), 2);
        assert_eq!(rendezvous.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stall_reports_party_point_and_progress() {
        let rendezvous = Rendezvous::new("hand-1:subscribed");
        rendezvous.release();
        let err = rendezvous
            .acquire_many("dealer", 3, Duration::from_secs(1))
            .await
            .expect_err("only one of three parties released");
        let message = err.to_string();
        assert!(message.contains("dealer"), "{message}");
        assert!(message.contains("hand-1:subscribed"), "{message}");
        assert!(message.contains("acquired 1 of 3"), "{message}");
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn stall_is_logged_with_the_point() {
        let rendezvous = Rendezvous::new("hand-2:subscribed");
        let _ = rendezvous.acquire("dealer", Duration::from_millis(5)).await;
        assert!(logs_contain("rendezvous stalled"));
        assert!(logs_contain("hand-2:subscribed"));
    }

    #[tokio::test(start_paused = true)]
    async fn close_wakes_waiters() {
        let rendezvous = Rendezvous::new("subscribed");
        let waiter = {
            let rendezvous = rendezvous.clone();
            tokio::spawn(async move {
                rendezvous
                    .acquire("command", Duration::from_secs(60))
                    .await
            })
        };
        tokio::task::yield_now().await;
        rendezvous.close();
        let result = waiter.await.expect("join waiter");
        assert!(matches!(result, Err(RendezvousError::Closed { .. })));
    }
}
