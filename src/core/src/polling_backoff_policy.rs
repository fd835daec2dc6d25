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

//! Defines the trait for polling backoff policies and a fixed interval
//! implementation.
//!
//! Waiters sleep between two consecutive status probes. The backoff policy
//! decides for how long. Polling backoff policies do not use jitter: the
//! wait period for an attempt is a pure function of the polling state.
//!
//! The default policy for waiters is
//! [TimeoutScaledInterval][crate::poll_interval::TimeoutScaledInterval], which
//! derives a constant interval from the wait timeout. Use [FixedInterval] when
//! the expected settle time of a resource is known, or
//! [ExponentialBackoff][crate::exponential_backoff::ExponentialBackoff] when
//! it is not.
//!
//! # Example
//! ```
//! # use cloud_waiter_core::polling_backoff_policy::*;
//! # use cloud_waiter_core::polling_state::PollingState;
//! use std::time::Duration;
//!
//! let policy = FixedInterval::new(Duration::from_secs(5));
//! let state = PollingState::default().set_attempt_count(7_u32);
//! assert_eq!(policy.wait_period(&state), Duration::from_secs(5));
//! ```

use crate::polling_state::PollingState;
use std::sync::Arc;
use std::time::Duration;

/// Defines the trait implemented by all polling backoff strategies.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the wait period before the next probe.
    ///
    /// # Parameters
    /// * `state` - the polling loop start time and the number of probes so
    ///   far. This method is always called after the first attempt.
    fn wait_period(&self, state: &PollingState) -> Duration;
}

/// A helper type to use [PollingBackoffPolicy] in wait options.
#[derive(Clone, Debug)]
pub struct PollingBackoffPolicyArg(pub(crate) Arc<dyn PollingBackoffPolicy>);

impl<T: PollingBackoffPolicy + 'static> std::convert::From<T> for PollingBackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingBackoffPolicy>> for PollingBackoffPolicyArg {
    fn from(value: Arc<dyn PollingBackoffPolicy>) -> Self {
        Self(value)
    }
}

/// Waits the same period between all probes.
///
/// This mirrors an explicit poll interval in a state change configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedInterval {
    period: Duration,
}

impl FixedInterval {
    /// Creates a policy that always waits `period`.
    pub fn new<V: Into<Duration>>(period: V) -> Self {
        Self {
            period: period.into(),
        }
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl PollingBackoffPolicy for FixedInterval {
    fn wait_period(&self, _state: &PollingState) -> Duration {
        self.period
    }
}
