use std::{
    future::Future,
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use futures::StreamExt;
use strata_common::{Backoff, ExponentialBackoff};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ResourceError;

mod manager;
pub use manager::BackpressureResourceManager;

mod scope;
pub use scope::{BackpressureScope, ConnManagerScope, SpanScope, StreamManagerScope};

/// Retry policy for rejected admissions.
#[derive(Debug, Clone)]
pub struct BackpressureOptions {
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    /// Growth factor applied to the delay after every retry.
    pub multiplier: u32,
    /// Fraction of each delay, in `[0, 1]`, that is randomly cut off.
    pub jitter: f64,
    /// Maximum number of retries after the first attempt.
    /// If `None`, an admission is retried until it succeeds or the manager is closed.
    pub max_retries: Option<usize>,
}

impl Default for BackpressureOptions {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
            jitter: 0.2,
            max_retries: None,
        }
    }
}

impl BackpressureOptions {
    /// Retries at a fixed interval, without jitter and without limit.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_backoff: interval,
            max_backoff: interval,
            multiplier: 1,
            jitter: 0.0,
            max_retries: None,
        }
    }

    /// Gives up after `max_retries` rejected retries.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Caps the wait between retries.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the random share of each wait, between 0 and 1.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

impl From<&BackpressureOptions> for ExponentialBackoff {
    fn from(options: &BackpressureOptions) -> Self {
        Self::new(options.initial_backoff, options.max_retries)
            .with_max_backoff(options.max_backoff)
            .with_multiplier(options.multiplier)
            .with_jitter(options.jitter)
    }
}

/// State shared by the manager and every scope it hands out.
#[derive(Debug, Clone)]
struct Shared {
    options: BackpressureOptions,
    /// Cancelled when the manager is closed. Stops every retry loop.
    closed: CancellationToken,
    span: tracing::Span,
}

/// Counts a caller as in flight for as long as it's alive.
struct InFlight<'a>(&'a AtomicI64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicI64) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Shared {
    /// Returns a fresh retry schedule for one admission.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::from(&self.options)
    }

    /// Runs `attempt` until it succeeds, waiting on `backoff` after every rejection.
    ///
    /// Fails with [`ResourceError::Closed`] once the manager is closed and with
    /// [`ResourceError::RetriesExhausted`] once `backoff` ends. `in_flight` counts the callers
    /// inside this loop; it's restored on every exit path, including cancellation.
    async fn admit<T, F, Fut, B>(
        &self,
        kind: &'static str,
        in_flight: &AtomicI64,
        mut backoff: B,
        mut attempt: F,
    ) -> Result<T, ResourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResourceError>>,
        B: Backoff,
    {
        let _guard = InFlight::enter(in_flight);
        let mut attempts = 0;

        loop {
            if self.closed.is_cancelled() {
                return Err(ResourceError::Closed);
            }

            attempts += 1;
            let err = match attempt().await {
                Ok(admitted) => {
                    if attempts > 1 {
                        debug!(parent: &self.span, kind, attempts, "Admitted after backoff");
                    }
                    return Ok(admitted);
                }
                Err(e) => e,
            };

            warn!(
                parent: &self.span,
                kind,
                attempts,
                in_flight = in_flight.load(Ordering::Relaxed),
                err = %err,
                "Admission rejected, backing off"
            );

            tokio::select! {
                biased;

                _ = self.closed.cancelled() => {
                    debug!(parent: &self.span, kind, attempts, "Resource manager closed, giving up");
                    return Err(ResourceError::Closed);
                }
                delay = backoff.next() => match delay {
                    Some(delay) => {
                        debug!(
                            parent: &self.span,
                            kind,
                            ?delay,
                            in_flight = in_flight.load(Ordering::Relaxed),
                            "Retrying admission"
                        );
                    }
                    None => {
                        warn!(parent: &self.span, kind, attempts, "Admission retries exhausted");
                        return Err(ResourceError::RetriesExhausted {
                            attempts,
                            source: Box::new(err),
                        });
                    }
                },
            }
        }
    }
}
