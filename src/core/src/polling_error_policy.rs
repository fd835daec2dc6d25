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

//! Defines the types for polling error policies.
//!
//! # Example
//! ```
//! # use cloud_waiter_core::polling_error_policy::*;
//! use std::time::Duration;
//! // Tolerate transient probe errors for at most 15 minutes or at most 50
//! // attempts: whichever limit is reached first stops the polling loop.
//! let policy = TransientOnly
//!     .with_time_limit(Duration::from_secs(15 * 60))
//!     .with_attempt_limit(50);
//! ```
//!
//! Waiters poll the status of asynchronous operations and need to (1)
//! distinguish between transient and permanent probe errors, and (2) provide
//! a mechanism to limit the polling loop.
//!
//! The distinction between transient and permanent errors is expressed by the
//! probe: it returns [Error::transient] for failures that may recover, such as
//! a dropped connection. The policies in this module never guess based on the
//! error message.
//!
//! We provide a trait that applications may implement to customize the behavior
//! of the polling loop, and some common implementations that should meet most
//! needs.

use crate::error::Error;
use crate::polling_state::PollingState;
use crate::retry_result::RetryResult;
use std::sync::Arc;

/// Determines how errors are handled in the polling loop.
///
/// Implementations of this trait determine if probe errors may resolve in
/// future attempts, and for how long the polling loop may continue.
pub trait PollingErrorPolicy: Send + Sync + std::fmt::Debug {
    /// Query the polling policy after an error.
    ///
    /// # Parameters
    /// * `state` - the polling loop start time and the number of attempts,
    ///   including the attempt that just failed. It is always non-zero.
    /// * `error` - the last error returned by the probe.
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult;

    /// Called when the status was successfully probed, but the operation is
    /// still in progress.
    ///
    /// Returning an error stops the polling loop with that error.
    fn on_in_progress(&self, _state: &PollingState, _observed_state: &str) -> crate::Result<()> {
        Ok(())
    }
}

/// A helper type to use [PollingErrorPolicy] in wait options.
#[derive(Clone, Debug)]
pub struct PollingErrorPolicyArg(pub(crate) Arc<dyn PollingErrorPolicy>);

impl<T> std::convert::From<T> for PollingErrorPolicyArg
where
    T: PollingErrorPolicy + 'static,
{
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingErrorPolicy>> for PollingErrorPolicyArg {
    fn from(value: Arc<dyn PollingErrorPolicy>) -> Self {
        Self(value)
    }
}

/// Extension trait for [PollingErrorPolicy]
pub trait PollingErrorPolicyExt: PollingErrorPolicy + Sized {
    /// Decorate a [PollingErrorPolicy] to limit the total elapsed time in the
    /// polling loop.
    ///
    /// While the time spent in the polling loop (including time in backoff) is
    /// less than the prescribed duration the `on_error()` method returns the
    /// results of the inner policy. After that time it returns
    /// [Exhausted][RetryResult::Exhausted] if the inner policy returns
    /// [Continue][RetryResult::Continue].
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter_core::error::Error;
    /// # use cloud_waiter_core::polling_state::PollingState;
    /// use cloud_waiter_core::polling_error_policy::*;
    /// use std::time::Duration;
    /// let policy = TransientOnly.with_time_limit(Duration::from_secs(10)).with_attempt_limit(3);
    /// let state = PollingState::default().set_attempt_count(4_u32);
    /// assert!(policy.on_error(&state, Error::transient("reset")).is_exhausted());
    /// ```
    fn with_time_limit(self, maximum_duration: std::time::Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [PollingErrorPolicy] to limit the number of poll attempts.
    ///
    /// This policy decorates an inner policy and limits the total number of
    /// attempts. Note that `on_error()` is called only after a polling attempt.
    /// Therefore, setting the maximum number of attempts to 0 or 1 results in
    /// no polling after the first probe.
    ///
    /// The policy passes through the results from the inner policy as long as
    /// `attempt_count < maximum_attempts`. Once the maximum number of attempts
    /// is reached, the policy returns [Exhausted][RetryResult::Exhausted] if the
    /// inner policy returns [Continue][RetryResult::Continue], and passes the
    /// inner policy result otherwise.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter_core::error::Error;
    /// # use cloud_waiter_core::polling_state::PollingState;
    /// use cloud_waiter_core::polling_error_policy::*;
    /// let policy = TransientOnly.with_attempt_limit(3);
    /// let state = |n: u32| PollingState::default().set_attempt_count(n);
    /// assert!(policy.on_error(&state(1), Error::transient("reset")).is_continue());
    /// assert!(policy.on_error(&state(2), Error::transient("reset")).is_continue());
    /// assert!(policy.on_error(&state(3), Error::transient("reset")).is_exhausted());
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }
}

impl<T: PollingErrorPolicy> PollingErrorPolicyExt for T {}

/// A polling policy that only continues on transient errors.
///
/// This is the default policy for waiters. The probe decides which failures
/// are transient by returning [Error::transient]. Any other error stops the
/// loop.
///
/// The waiter deadline bounds the loop, but this policy can be decorated to
/// further limit the number of polling attempts or the duration of the loop.
///
/// # Example
/// ```
/// # use cloud_waiter_core::error::Error;
/// # use cloud_waiter_core::polling_state::PollingState;
/// use cloud_waiter_core::polling_error_policy::*;
/// let policy = TransientOnly;
/// let state = PollingState::default().set_attempt_count(1_u32);
/// assert!(policy.on_error(&state, Error::transient("reset")).is_continue());
/// assert!(policy.on_error(&state, Error::other("bad json")).is_permanent());
/// ```
#[derive(Clone, Debug)]
pub struct TransientOnly;

impl PollingErrorPolicy for TransientOnly {
    fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
        if error.is_transient() {
            RetryResult::Continue(error)
        } else {
            RetryResult::Permanent(error)
        }
    }
}

/// A polling policy that continues on any error.
///
/// This policy must be decorated to limit the number of polling attempts or the
/// duration of the polling loop, unless the waiter deadline is enough.
///
/// The policy continues regardless of the error type or contents. Note that
/// terminal resource states reported through the probe outcome still stop the
/// loop. This policy only affects errors returned by the probe call.
///
/// # Example
/// ```
/// # use cloud_waiter_core::error::Error;
/// # use cloud_waiter_core::polling_state::PollingState;
/// use cloud_waiter_core::polling_error_policy::*;
/// let policy = AlwaysContinue;
/// let state = PollingState::default().set_attempt_count(1_u32);
/// assert!(policy.on_error(&state, Error::other("bad json")).is_continue());
/// ```
#[derive(Clone, Debug)]
pub struct AlwaysContinue;

impl PollingErrorPolicy for AlwaysContinue {
    fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
        RetryResult::Continue(error)
    }
}

/// A polling policy decorator that limits the total time in the polling loop.
///
/// This policy decorates an inner policy and limits the duration of polling
/// loops. While the time spent in the polling loop (including time in backoff)
/// is less than the prescribed duration the `on_error()` method returns the
/// results of the inner policy. After that time it returns
/// [Exhausted][RetryResult::Exhausted] if the inner policy returns
/// [Continue][RetryResult::Continue].
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [TransientOnly].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = TransientOnly>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_duration: std::time::Duration,
}

impl LimitedElapsedTime {
    /// Creates a new instance, with the default inner policy.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter_core::error::Error;
    /// # use cloud_waiter_core::polling_state::PollingState;
    /// use cloud_waiter_core::polling_error_policy::*;
    /// use std::time::Duration;
    /// use tokio::time::Instant;
    /// let policy = LimitedElapsedTime::new(Duration::from_secs(10));
    /// let state = PollingState::default().set_start(Instant::now() - Duration::from_secs(20));
    /// assert!(policy.on_error(&state, Error::transient("reset")).is_exhausted());
    /// ```
    pub fn new(maximum_duration: std::time::Duration) -> Self {
        Self {
            inner: TransientOnly,
            maximum_duration,
        }
    }
}

impl<P> LimitedElapsedTime<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter_core::error::Error;
    /// # use cloud_waiter_core::polling_state::PollingState;
    /// use cloud_waiter_core::polling_error_policy::*;
    /// use std::time::Duration;
    /// use tokio::time::Instant;
    /// let policy = LimitedElapsedTime::custom(AlwaysContinue, Duration::from_secs(10));
    /// let state = PollingState::default().set_start(Instant::now() - Duration::from_secs(20));
    /// assert!(policy.on_error(&state, Error::other("bad json")).is_exhausted());
    /// ```
    pub fn custom(inner: P, maximum_duration: std::time::Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn in_progress_impl(&self, state: &PollingState, observed_state: &str) -> crate::Result<()> {
        let elapsed = state.start.elapsed();
        if elapsed < self.maximum_duration {
            return Ok(());
        }
        Err(Error::exhausted(Exhausted::new(
            observed_state,
            "elapsed time",
            format!("{elapsed:?}"),
            format!("{:?}", self.maximum_duration),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedElapsedTime<P>
where
    P: PollingErrorPolicy + 'static,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if state.start.elapsed() >= self.maximum_duration {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(&self, state: &PollingState, observed_state: &str) -> crate::Result<()> {
        self.inner
            .on_in_progress(state, observed_state)
            .and_then(|_| self.in_progress_impl(state, observed_state))
    }
}

/// A polling policy decorator that limits the number of attempts.
///
/// This policy decorates an inner policy and limits polling total number of
/// attempts. Setting the maximum number of attempts to 0 results in no polling
/// attempts after the initial one.
///
/// The policy passes through the results from the inner policy as long as
/// `attempt_count < maximum_attempts`. However, once the maximum number of
/// attempts is reached, the policy replaces any [Continue][RetryResult::Continue]
/// result with [Exhausted][RetryResult::Exhausted].
///
/// # Parameters
/// * `P` - the inner polling policy.
#[derive(Debug)]
pub struct LimitedAttemptCount<P = TransientOnly>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, with the default inner policy.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter_core::error::Error;
    /// # use cloud_waiter_core::polling_state::PollingState;
    /// use cloud_waiter_core::polling_error_policy::*;
    /// let policy = LimitedAttemptCount::new(5);
    /// let state = PollingState::default().set_attempt_count(10_u32);
    /// assert!(policy.on_error(&state, Error::transient("reset")).is_exhausted());
    /// ```
    pub fn new(maximum_attempts: u32) -> Self {
        Self {
            inner: TransientOnly,
            maximum_attempts,
        }
    }
}

impl<P> LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    ///
    /// # Example
    /// ```
    /// # use cloud_waiter_core::error::Error;
    /// # use cloud_waiter_core::polling_state::PollingState;
    /// use cloud_waiter_core::polling_error_policy::*;
    /// let policy = LimitedAttemptCount::custom(AlwaysContinue, 2);
    /// let state = |n: u32| PollingState::default().set_attempt_count(n);
    /// assert!(policy.on_error(&state(1), Error::other("err")).is_continue());
    /// assert!(policy.on_error(&state(2), Error::other("err")).is_exhausted());
    /// ```
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    fn in_progress_impl(&self, count: u32, observed_state: &str) -> crate::Result<()> {
        if count < self.maximum_attempts {
            return Ok(());
        }
        Err(Error::exhausted(Exhausted::new(
            observed_state,
            "attempt count",
            count.to_string(),
            self.maximum_attempts.to_string(),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Permanent(e) => RetryResult::Permanent(e),
            RetryResult::Exhausted(e) => RetryResult::Exhausted(e),
            RetryResult::Continue(e) => {
                if state.attempt_count >= self.maximum_attempts {
                    RetryResult::Exhausted(e)
                } else {
                    RetryResult::Continue(e)
                }
            }
        }
    }

    fn on_in_progress(&self, state: &PollingState, observed_state: &str) -> crate::Result<()> {
        self.inner
            .on_in_progress(state, observed_state)
            .and_then(|_| self.in_progress_impl(state.attempt_count, observed_state))
    }
}

/// Indicates that a polling loop has been exhausted.
#[derive(Debug)]
pub struct Exhausted {
    observed_state: String,
    limit_name: &'static str,
    value: String,
    limit: String,
}

impl Exhausted {
    /// Describes which limit stopped the loop.
    ///
    /// `observed_state` is the last state the probe reported. `limit_name`
    /// names the limit, such as `"attempt count"`. `value` and `limit` are
    /// preformatted so policies can report any unit.
    pub fn new(observed_state: &str, limit_name: &'static str, value: String, limit: String) -> Self {
        Self {
            observed_state: observed_state.to_string(),
            limit_name,
            value,
            limit,
        }
    }
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "polling loop exhausted in state '{}', {} value ({}) exceeds limit ({})",
            self.observed_state, self.limit_name, self.value, self.limit
        )
    }
}

impl std::error::Error for Exhausted {}
