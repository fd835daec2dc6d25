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

//! Waits for a resource to move from a set of pending states to a target
//! state.
//!
//! Most cloud resources expose a status string. Creating a server moves it
//! through `BUILD` to `ACTIVE`, deleting it moves it through `DELETING` until
//! the API reports it as not found. [StateChangeConf] describes these
//! transitions and waits for them.
//!
//! # Example
//! ```
//! # use cloud_waiter::state::StateChangeConf;
//! # use cloud_waiter::Error;
//! use std::time::Duration;
//! # tokio_test::block_on(async {
//! let mut states = vec!["ACTIVE", "BUILD", "BUILD"];
//! let refresh = move || {
//!     let state = states.pop();
//!     async move { Ok::<_, Error>(state.map(|s| (format!("server-{s}"), s.to_string()))) }
//! };
//! let server = StateChangeConf::new(refresh)
//!     .with_pending(["BUILD"])
//!     .with_target(["ACTIVE"])
//!     .with_timeout(Duration::from_secs(60))
//!     .with_poll_interval(Duration::from_millis(1))
//!     .wait_for_state()
//!     .await?;
//! assert_eq!(server.as_deref(), Some("server-ACTIVE"));
//! # Ok::<(), Error>(()) });
//! ```

use crate::options::{DEFAULT_TIMEOUT, WaitOptions};
use crate::polling_backoff_policy::FixedInterval;
use crate::polling_error_policy::TransientOnly;
use crate::{Error, Observation, Poller, Probe, ProbeOutcome, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The number of consecutive "not found" refreshes tolerated by default.
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// The state reported for a refresh that did not find the resource.
pub const NOT_FOUND_STATE: &str = "";

/// Configures a wait for a resource state change.
///
/// The refresh function returns `Ok(None)` when the resource does not exist,
/// and `Ok(Some((value, state)))` otherwise. Errors returned by the refresh
/// function stop the wait, unless they are [transient][Error::transient].
#[derive(Clone, Debug)]
pub struct StateChangeConf<F> {
    refresh: F,
    pending: Vec<String>,
    target: Vec<String>,
    timeout: Duration,
    delay: Duration,
    poll_interval: Option<Duration>,
    min_timeout: Duration,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
}

impl<F> StateChangeConf<F> {
    /// Creates a configuration using `refresh` to query the resource.
    pub fn new(refresh: F) -> Self {
        Self {
            refresh,
            pending: Vec::new(),
            target: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            poll_interval: None,
            min_timeout: Duration::ZERO,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }

    /// Sets the states in which the wait continues.
    pub fn with_pending<I, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.pending = v.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the states that complete the wait.
    ///
    /// With no target states, the wait completes when the resource is no
    /// longer found.
    pub fn with_target<I, V>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.target = v.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the overall deadline.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = v.into();
        self
    }

    /// Sets the wait before the first refresh.
    pub fn with_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.delay = v.into();
        self
    }

    /// Refresh at a fixed interval.
    ///
    /// Without this, the interval is derived from the timeout, see
    /// [calculate_poll_interval][crate::poll_interval::calculate_poll_interval].
    pub fn with_poll_interval<V: Into<Duration>>(mut self, v: V) -> Self {
        self.poll_interval = Some(v.into());
        self
    }

    /// Sets the smallest wait between two refreshes.
    pub fn with_min_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.min_timeout = v.into();
        self
    }

    /// Sets how many consecutive "not found" refreshes are tolerated.
    pub fn with_not_found_checks(mut self, v: u32) -> Self {
        self.not_found_checks = v;
        self
    }

    /// Sets how many consecutive refreshes must observe a target state.
    ///
    /// Some services briefly report the target state before going back to a
    /// pending state. Values below 1 are treated as 1.
    pub fn with_continuous_target_occurrence(mut self, v: u32) -> Self {
        self.continuous_target_occurrence = v;
        self
    }

    /// The wait options equivalent to this configuration.
    pub fn wait_options(&self) -> WaitOptions {
        let options = WaitOptions::new(self.timeout)
            .with_delay(self.delay)
            .with_min_interval(self.min_timeout)
            .with_polling_error_policy(TransientOnly);
        match self.poll_interval {
            Some(i) => options.with_polling_backoff_policy(FixedInterval::new(i)),
            None => options,
        }
    }

    /// Waits until the resource reaches a target state.
    ///
    /// Returns the last refreshed value. That is `None` if the wait completed
    /// because the resource was not found and no target states are configured.
    pub async fn wait_for_state<T, Fut>(self) -> Result<Option<T>>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<Option<(T, String)>>> + Send,
    {
        self.wait_for_state_with_cancel(CancellationToken::new())
            .await
    }

    /// Like [wait_for_state][Self::wait_for_state], stopping early if `cancel`
    /// is cancelled.
    pub async fn wait_for_state_with_cancel<T, Fut>(
        self,
        cancel: CancellationToken,
    ) -> Result<Option<T>>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<Option<(T, String)>>> + Send,
    {
        let options = self.wait_options();
        let probe = RefreshProbe {
            refresh: self.refresh,
            pending: self.pending,
            target: self.target,
            not_found_checks: self.not_found_checks,
            continuous_target_occurrence: self.continuous_target_occurrence.max(1),
            not_found_count: 0,
            target_streak: 0,
        };
        let done = crate::new_poller(options, probe)
            .with_cancellation(cancel)
            .until_done()
            .await?;
        Ok(done.into_value())
    }
}

/// Adapts a refresh function to the [Probe] interface.
struct RefreshProbe<F> {
    refresh: F,
    pending: Vec<String>,
    target: Vec<String>,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
    not_found_count: u32,
    target_streak: u32,
}

impl<F> RefreshProbe<F> {
    fn classify<T>(&mut self, refreshed: Option<(T, String)>) -> ProbeOutcome<T> {
        let Some((value, state)) = refreshed else {
            return self.not_found();
        };
        self.not_found_count = 0;
        if self.target.contains(&state) {
            self.target_streak += 1;
            let observation = Observation::new(state).with_value(value);
            if self.target_streak >= self.continuous_target_occurrence {
                return ProbeOutcome::Succeeded(observation);
            }
            return ProbeOutcome::Pending(observation);
        }
        self.target_streak = 0;
        if self.pending.contains(&state) {
            return ProbeOutcome::Pending(Observation::new(state).with_value(value));
        }
        let error = Error::unexpected_state(state.clone(), self.target.iter().cloned());
        ProbeOutcome::Aborted { state, error }
    }

    fn not_found<T>(&mut self) -> ProbeOutcome<T> {
        if self.target.is_empty() {
            return ProbeOutcome::Succeeded(Observation::new(NOT_FOUND_STATE));
        }
        self.target_streak = 0;
        self.not_found_count += 1;
        if self.not_found_count > self.not_found_checks {
            return ProbeOutcome::Aborted {
                state: NOT_FOUND_STATE.to_string(),
                error: Error::not_found(self.not_found_count),
            };
        }
        ProbeOutcome::pending(NOT_FOUND_STATE)
    }
}

impl<T, F, Fut> Probe<T> for RefreshProbe<F>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<(T, String)>>> + Send,
{
    async fn probe(&mut self) -> Result<ProbeOutcome<T>> {
        let refreshed = (self.refresh)().await?;
        Ok(self.classify(refreshed))
    }
}
