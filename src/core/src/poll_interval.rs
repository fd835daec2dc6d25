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

//! Derives the polling interval from the wait timeout.
//!
//! Long running cloud operations settle in a time roughly proportional to the
//! timeout the caller is willing to wait. Polling a resource that takes an
//! hour to build every second is wasteful, while polling a resource that
//! settles in a minute every thirty seconds adds latency. The interval grows
//! linearly with the timeout:
//!
//! ```text
//! interval = (timeout - 450s) / 220 + 10s
//! ```
//!
//! | timeout | interval |
//! |---------|----------|
//! | 10m     | 10s      |
//! | 15m     | 12s      |
//! | 30m     | 16s      |
//! | 45m     | 20s      |
//! | 60m     | 24s      |
//!
//! # Example
//! ```
//! # use cloud_waiter_core::poll_interval::calculate_poll_interval;
//! use std::time::Duration;
//! let interval = calculate_poll_interval(Duration::from_secs(30 * 60));
//! assert_eq!(interval, Duration::from_secs(16));
//! ```

use crate::polling_backoff_policy::PollingBackoffPolicy;
use crate::polling_state::PollingState;
use std::time::Duration;

/// Timeouts at or below this value poll at [MINIMUM_POLL_INTERVAL].
pub const BASE_TIMEOUT: Duration = Duration::from_secs(450);

/// The interval grows by one second for each increment of this size.
pub const TIMEOUT_SLOPE: Duration = Duration::from_secs(220);

/// The smallest interval returned by [calculate_poll_interval].
pub const MINIMUM_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Computes the polling interval for a wait with the given `timeout`.
///
/// The result has whole second precision, the sub-second part of `timeout` is
/// ignored and the division truncates. The function is monotonic in
/// `timeout`, never returns less than [MINIMUM_POLL_INTERVAL], and does not
/// overflow for any input.
///
/// # Example
/// ```
/// # use cloud_waiter_core::poll_interval::*;
/// use std::time::Duration;
/// assert_eq!(calculate_poll_interval(Duration::ZERO), MINIMUM_POLL_INTERVAL);
/// assert_eq!(calculate_poll_interval(Duration::from_secs(20 * 60)), Duration::from_secs(13));
/// ```
pub fn calculate_poll_interval(timeout: Duration) -> Duration {
    let over = timeout.as_secs().saturating_sub(BASE_TIMEOUT.as_secs());
    let extra = over / TIMEOUT_SLOPE.as_secs();
    MINIMUM_POLL_INTERVAL.saturating_add(Duration::from_secs(extra))
}

/// A polling backoff policy that waits the timeout-scaled interval between
/// all probes.
///
/// This is the default backoff policy for waiters.
///
/// # Example
/// ```
/// # use cloud_waiter_core::poll_interval::TimeoutScaledInterval;
/// # use cloud_waiter_core::polling_backoff_policy::PollingBackoffPolicy;
/// # use cloud_waiter_core::polling_state::PollingState;
/// use std::time::Duration;
/// let policy = TimeoutScaledInterval::new(Duration::from_secs(60 * 60));
/// let state = PollingState::default().set_attempt_count(1_u32);
/// assert_eq!(policy.wait_period(&state), Duration::from_secs(24));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TimeoutScaledInterval {
    interval: Duration,
}

impl TimeoutScaledInterval {
    /// Creates a new policy for a wait bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            interval: calculate_poll_interval(timeout),
        }
    }

    /// The interval between probes.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl PollingBackoffPolicy for TimeoutScaledInterval {
    fn wait_period(&self, _state: &PollingState) -> Duration {
        self.interval
    }
}
