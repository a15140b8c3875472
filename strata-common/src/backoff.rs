use futures::{FutureExt, Stream};
use rand::Rng;
use std::{
    pin::Pin,
    task::{ready, Context, Poll},
    time::Duration,
};
use tokio::time::sleep;

/// A retry schedule: a stream that yields once per retry, after the delay it yields has
/// elapsed, and ends when no retries are left.
pub trait Backoff: Stream<Item = Duration> + Unpin + Send {}

impl<T> Backoff for T where T: Stream<Item = Duration> + Unpin + Send {}

/// A stream that sleeps for exponentially increasing durations, yielding each duration once it
/// has elapsed.
///
/// The delay starts at `initial`, is multiplied by `multiplier` after every retry and never
/// exceeds `max_backoff`. Each delay is shortened by a random fraction of up to `jitter` so that
/// callers rejected at the same moment do not retry in lockstep.
#[derive(Debug)]
pub struct ExponentialBackoff {
    /// Current number of retries.
    retry_count: usize,
    /// Maximum number of retries before closing the stream.
    /// If `None`, the stream will retry indefinitely.
    max_retries: Option<usize>,
    /// The current (un-jittered) backoff duration.
    backoff: Duration,
    /// Upper bound for the backoff duration.
    max_backoff: Duration,
    /// Growth factor applied after every retry.
    multiplier: u32,
    /// Fraction of the delay, in `[0, 1]`, that may be randomly subtracted.
    jitter: f64,
    /// The delay of the timeout currently in flight.
    pending: Duration,
    /// The current backoff timeout, if any.
    /// We need the timeout to be pinned (`Sleep` is not `Unpin`)
    timeout: Option<Pin<Box<tokio::time::Sleep>>>,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff stream with the given initial duration and max retries.
    /// The delay doubles on every retry, without an upper bound or jitter.
    pub fn new(initial: Duration, max_retries: Option<usize>) -> Self {
        Self {
            retry_count: 0,
            max_retries,
            backoff: initial,
            max_backoff: Duration::MAX,
            multiplier: 2,
            jitter: 0.0,
            pending: Duration::ZERO,
            timeout: None,
        }
    }

    /// Sets the upper bound for a single delay.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the growth factor. A multiplier of 1 yields a fixed interval.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Sets the jitter fraction, clamped to `[0, 1]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Returns the number of delays that have fully elapsed.
    pub fn retry_count(&self) -> usize {
        self.retry_count
    }

    /// Computes the next delay, including jitter.
    fn next_delay(&self) -> Duration {
        let delay = self.backoff.min(self.max_backoff);
        if self.jitter == 0.0 {
            return delay;
        }

        let cut = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay.mul_f64(1.0 - cut)
    }

    /// (Re)-set the timeout to the next backoff duration.
    fn reset_timeout(&mut self) {
        self.pending = self.next_delay();
        self.timeout = Some(Box::pin(sleep(self.pending)));
    }
}

impl Stream for ExponentialBackoff {
    type Item = Duration;

    /// Polls the exponential backoff stream. Returns `Poll::Ready` with the slept duration once
    /// the backoff timeout has elapsed, `Poll::Ready(None)` once the retries are exhausted, and
    /// `Poll::Pending` otherwise.
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            let Some(ref mut timeout) = this.timeout else {
                // Close the stream
                if let Some(max_retries) = this.max_retries {
                    if this.retry_count >= max_retries {
                        return Poll::Ready(None);
                    }
                }

                this.reset_timeout();
                continue;
            };

            ready!(timeout.poll_unpin(cx));

            // Timeout has elapsed, grow the backoff for the next round
            this.timeout = None;
            this.retry_count += 1;
            this.backoff = this.backoff.saturating_mul(this.multiplier).min(this.max_backoff);

            return Poll::Ready(Some(this.pending));
        }
    }
}
