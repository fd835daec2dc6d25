// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Poll scheduler for asynchronous cloud operations.
//!
//! Cloud APIs often return before the resource they create, update or delete
//! has settled. The caller must then probe the resource status until it
//! reaches a final state. This crate drives that loop: it calls a probe at an
//! interval scaled to the caller's timeout, retries transient probe failures,
//! stops on terminal states, and gives up when the timeout expires or the
//! wait is cancelled.
//!
//! # Example
//! ```
//! # use cloud_waiter::*;
//! # use cloud_waiter::options::WaitOptions;
//! use std::time::Duration;
//! # tokio_test::block_on(async {
//! let mut status = vec!["ACTIVE", "BUILDING"];
//! let probe = move || {
//!     let current = status.pop().unwrap_or("ACTIVE");
//!     async move {
//!         match current {
//!             "ACTIVE" => Ok::<_, Error>(ProbeOutcome::succeeded(current, 42)),
//!             _ => Ok(ProbeOutcome::pending(current)),
//!         }
//!     }
//! };
//! let options = WaitOptions::new(Duration::from_secs(60))
//!     .with_polling_backoff_policy(polling_backoff_policy::FixedInterval::new(
//!         Duration::from_millis(1),
//!     ));
//! let done = new_poller(options, probe).until_done().await?;
//! assert_eq!(done.state(), "ACTIVE");
//! assert_eq!(done.value(), Some(&42));
//! # Ok::<(), Error>(()) });
//! ```
//!
//! For resources configured as a set of pending and target states, see
//! [StateChangeConf][state::StateChangeConf].

pub use waiter_core::Result;
pub use waiter_core::error::Error;
pub use waiter_core::{
    exponential_backoff, options, poll_interval, polling_backoff_policy, polling_error_policy,
    polling_state, retry_result,
};

use options::WaitOptions;
use polling_backoff_policy::PollingBackoffPolicy;
use polling_error_policy::PollingErrorPolicy;
use polling_state::PollingState;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

mod details;
pub mod state;

/// A status observed by a probe.
///
/// `state` is the status string reported by the service, for example
/// `"BUILDING"` or `"ACTIVE"`. `value` is the resource representation, if the
/// probe has one.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation<T> {
    state: String,
    value: Option<T>,
}

impl<T> Observation<T> {
    /// Creates an observation without a resource value.
    pub fn new<S: Into<String>>(state: S) -> Self {
        Self {
            state: state.into(),
            value: None,
        }
    }

    /// Sets the resource value.
    pub fn with_value(mut self, v: T) -> Self {
        self.value = Some(v);
        self
    }

    /// The observed status.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The observed resource, if any.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consumes the observation, returning the resource, if any.
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// The result of a successful probe call.
///
/// A probe that could not determine the status, for example because the
/// connection dropped, returns an [Error] instead. Use [Error::transient] for
/// failures that may go away in the next attempt.
#[derive(Debug)]
pub enum ProbeOutcome<T> {
    /// The operation is still in progress.
    Pending(Observation<T>),
    /// The operation completed successfully.
    Succeeded(Observation<T>),
    /// The resource entered a state from which it will not recover.
    Aborted { state: String, error: Error },
}

impl<T> ProbeOutcome<T> {
    /// The operation is still in progress, in the given state.
    pub fn pending<S: Into<String>>(state: S) -> Self {
        Self::Pending(Observation::new(state))
    }

    /// The operation completed, `value` is the settled resource.
    pub fn succeeded<S: Into<String>>(state: S, value: T) -> Self {
        Self::Succeeded(Observation::new(state).with_value(value))
    }

    /// The resource entered the terminal `state` because of `source`.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter::ProbeOutcome;
    /// let outcome = ProbeOutcome::<()>::aborted("ERROR", "quota exceeded");
    /// assert!(matches!(outcome, ProbeOutcome::Aborted { ref state, .. } if state == "ERROR"));
    /// ```
    pub fn aborted<S, E>(state: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let state = state.into();
        let error = Error::resource(state.clone(), source);
        Self::Aborted { state, error }
    }

    /// Builds an outcome from the flags reported by some status APIs.
    ///
    /// Non-terminal states are pending. Terminal states are successful or
    /// aborted depending on `success`.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter::ProbeOutcome;
    /// let outcome = ProbeOutcome::<()>::from_status(true, false, "FAILED");
    /// assert!(matches!(outcome, ProbeOutcome::Aborted { .. }));
    /// ```
    pub fn from_status<S: Into<String>>(terminal: bool, success: bool, state: S) -> Self {
        match (terminal, success) {
            (false, _) => Self::pending(state),
            (true, true) => Self::Succeeded(Observation::new(state)),
            (true, false) => Self::aborted(state, "the operation failed"),
        }
    }

    /// The observed status.
    pub fn state(&self) -> &str {
        match self {
            Self::Pending(o) | Self::Succeeded(o) => o.state(),
            Self::Aborted { state, .. } => state,
        }
    }
}

/// Checks the status of an asynchronous operation.
///
/// Closures returning a future are probes, applications rarely need to
/// implement this trait directly.
pub trait Probe<T>: Send {
    /// Queries the current status once.
    fn probe(&mut self) -> impl Future<Output = Result<ProbeOutcome<T>>> + Send;
}

impl<T, F, Fut> Probe<T> for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<ProbeOutcome<T>>> + Send,
{
    fn probe(&mut self) -> impl Future<Output = Result<ProbeOutcome<T>>> + Send {
        (self)()
    }
}

/// The result of a single step in the polling loop.
#[derive(Debug)]
pub enum PollingResult<T> {
    /// The operation is still in progress.
    InProgress(Observation<T>),
    /// The wait completed, successfully or not.
    ///
    /// Once a poller returns this value it returns `None` from all later
    /// calls to [Poller::poll].
    Completed(Result<Observation<T>>),
    /// The probe failed, and the polling error policy decided the failure is
    /// recoverable.
    PollingError(Error),
}

mod sealed {
    pub trait Poller {}
}

/// The interface to drive a wait.
///
/// This trait is sealed, [WaitPoller] is the only implementation.
pub trait Poller<T>: Send + sealed::Poller {
    /// Probes the status once.
    ///
    /// This never sleeps. Applications using it drive their own loop and
    /// should wait between calls. The initial delay configured in
    /// [WaitOptions] only applies to [Poller::until_done].
    ///
    /// Returns `None` once the wait has completed.
    fn poll(&mut self) -> impl Future<Output = Option<PollingResult<T>>> + Send;

    /// Polls until the operation completes, fails, or the wait times out.
    fn until_done(self) -> impl Future<Output = Result<Observation<T>>> + Send;

    /// Converts the poller into a stream of polling results.
    ///
    /// Like [Poller::poll], the stream does not sleep between items.
    #[cfg(feature = "unstable-stream")]
    fn into_stream(self) -> impl futures::Stream<Item = PollingResult<T>> + Unpin;
}

/// Creates a poller for `probe`, configured by `options`.
///
/// The wait starts, and the timeout is measured from, the first call to
/// [Poller::poll] or [Poller::until_done].
pub fn new_poller<T, P>(options: WaitOptions, probe: P) -> WaitPoller<T, P>
where
    P: Probe<T>,
{
    WaitPoller::new(options, probe)
}

/// Waits for `probe` to report a final state.
///
/// This is a shorthand for `new_poller(options, probe).until_done()`.
pub async fn wait<T, P>(options: WaitOptions, probe: P) -> Result<Observation<T>>
where
    T: Send,
    P: Probe<T>,
{
    new_poller(options, probe).until_done().await
}

/// Drives a probe at the configured cadence until the operation settles.
pub struct WaitPoller<T, P> {
    probe: P,
    timeout: Duration,
    delay: Duration,
    min_interval: Duration,
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    cancel: CancellationToken,
    state: PollingState,
    deadline: Option<Instant>,
    last_state: Option<String>,
    last_error: Option<Error>,
    done: bool,
    _value: PhantomData<fn() -> T>,
}

impl<T, P> WaitPoller<T, P>
where
    P: Probe<T>,
{
    fn new(options: WaitOptions, probe: P) -> Self {
        Self {
            probe,
            timeout: options.timeout(),
            delay: options.delay(),
            min_interval: options.min_interval(),
            error_policy: options.polling_error_policy(),
            backoff_policy: options.polling_backoff_policy(),
            cancel: CancellationToken::new(),
            state: PollingState::default(),
            deadline: None,
            last_state: None,
            last_error: None,
            done: false,
            _value: PhantomData,
        }
    }

    /// Stops the wait when `token` is cancelled.
    ///
    /// A cancelled wait completes with an error where
    /// [is_cancelled()][Error::is_cancelled] is true. Cancelling a token
    /// does not interrupt other waits.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The polling loop state: start instant and number of probes so far.
    pub fn polling_state(&self) -> &PollingState {
        &self.state
    }

    /// Starts the clock on the first call, returns the deadline.
    fn deadline(&mut self) -> Instant {
        if let Some(d) = self.deadline {
            return d;
        }
        let now = Instant::now();
        self.state = PollingState::default().set_start(now);
        let d = now.checked_add(self.timeout).unwrap_or_else(far_future);
        self.deadline = Some(d);
        d
    }

    fn timeout_error(&mut self) -> Error {
        Error::timeout(self.timeout, self.last_state.clone(), self.last_error.take())
    }

    fn complete(&mut self, result: Result<Observation<T>>) -> Option<PollingResult<T>> {
        self.done = true;
        Some(PollingResult::Completed(result))
    }
}

impl<T, P> sealed::Poller for WaitPoller<T, P> {}

impl<T, P> Poller<T> for WaitPoller<T, P>
where
    T: Send,
    P: Probe<T>,
{
    async fn poll(&mut self) -> Option<PollingResult<T>> {
        if self.done {
            return None;
        }
        let deadline = self.deadline();
        if self.cancel.is_cancelled() {
            return self.complete(Err(Error::cancelled()));
        }
        if Instant::now() >= deadline {
            let error = self.timeout_error();
            return self.complete(Err(error));
        }

        self.state.attempt_count += 1;
        let attempt = self.state.attempt_count;
        let result = tokio::select! {
            _ = self.cancel.cancelled() => None,
            r = tokio::time::timeout_at(deadline, self.probe.probe()) => Some(r),
        };
        let result = match result {
            None => return self.complete(Err(Error::cancelled())),
            Some(Err(_elapsed)) => {
                tracing::debug!(attempt, "probe interrupted by the wait deadline");
                let error = self.timeout_error();
                return self.complete(Err(error));
            }
            Some(Ok(r)) => r,
        };

        let poll = details::handle_probe(&self.error_policy, &self.state, result);
        match &poll {
            PollingResult::InProgress(o) => {
                tracing::debug!(attempt, state = %o.state(), "operation in progress");
                self.last_state = Some(o.state().to_string());
            }
            PollingResult::PollingError(e) => {
                tracing::warn!(attempt, error = %e, "transient error probing the status");
            }
            PollingResult::Completed(Ok(o)) => {
                tracing::debug!(attempt, state = %o.state(), "operation completed");
                self.done = true;
            }
            PollingResult::Completed(Err(e)) => {
                tracing::warn!(attempt, error = %e, "operation failed");
                self.done = true;
            }
        }
        Some(poll)
    }

    async fn until_done(mut self) -> Result<Observation<T>> {
        let first = PollingState::default().set_attempt_count(1_u32);
        let span = tracing::info_span!(
            "wait",
            timeout = ?self.timeout,
            delay = ?self.delay,
            interval = ?self.backoff_policy.wait_period(&first),
        );
        async move {
            let deadline = self.deadline();
            if !self.delay.is_zero() {
                let until = Instant::now()
                    .checked_add(self.delay)
                    .map_or(deadline, |d| d.min(deadline));
                sleep_until(&self.cancel, until).await?;
            }
            while let Some(p) = self.poll().await {
                match p {
                    // The operation completed, failed, or the wait gave up.
                    PollingResult::Completed(r) => return r,
                    PollingResult::InProgress(_) => (),
                    // Kept as the source of a timeout error.
                    PollingResult::PollingError(e) => self.last_error = Some(e),
                }
                let wait = self
                    .backoff_policy
                    .wait_period(&self.state)
                    .max(self.min_interval);
                let until = Instant::now()
                    .checked_add(wait)
                    .map_or(deadline, |d| d.min(deadline));
                sleep_until(&self.cancel, until).await?;
            }
            // `poll()` returns `None` only after it returned `Completed`,
            // that happens if the application polled before calling this.
            Err(Error::other("the wait already completed"))
        }
        .instrument(span)
        .await
    }

    #[cfg(feature = "unstable-stream")]
    fn into_stream(self) -> impl futures::Stream<Item = PollingResult<T>> + Unpin {
        use futures::stream::unfold;
        Box::pin(unfold(Some(self), move |state| async move {
            if let Some(mut poller) = state {
                if let Some(pr) = poller.poll().await {
                    return Some((pr, Some(poller)));
                }
            };
            None
        }))
    }
}

/// Sleeps until `until`, or the wait is cancelled.
async fn sleep_until(cancel: &CancellationToken, until: Instant) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::cancelled()),
        _ = tokio::time::sleep_until(until) => Ok(()),
    }
}

fn far_future() -> Instant {
    // Roughly 30 years, tokio rounds larger deadlines to this value too.
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}
