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

//! The decision a polling error policy makes after a failed probe.
//!
//! Waiters hand every probe error to the configured
//! [PollingErrorPolicy][crate::polling_error_policy::PollingErrorPolicy].
//! The policy answers with a [RetryResult], and the waiter either probes the
//! resource again or returns the error to the caller.

use crate::error::Error;

/// What the waiter does with a probe error.
///
/// Each variant carries the error so the waiter can report it. On
/// [Continue][RetryResult::Continue] the waiter keeps it as the last error of
/// a possible timeout.
///
/// # Example
///
/// ```
/// # use cloud_waiter_core::error::Error;
/// # use cloud_waiter_core::polling_state::PollingState;
/// # use cloud_waiter_core::retry_result::RetryResult;
/// # use cloud_waiter_core::polling_error_policy::PollingErrorPolicy;
/// /// Tolerates flaky status endpoints for the first few probes only.
/// #[derive(Debug)]
/// struct FlakyEndpoint;
/// impl PollingErrorPolicy for FlakyEndpoint {
///     fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
///         match (error.is_transient(), state.attempt_count) {
///             (false, _) => RetryResult::Permanent(error),
///             (true, n) if n >= 5 => RetryResult::Exhausted(error),
///             (true, _) => RetryResult::Continue(error),
///         }
///     }
/// }
/// ```
#[derive(Debug)]
pub enum RetryResult {
    /// Stop waiting, the resource will not recover by probing again.
    ///
    /// The waiter returns the error unchanged.
    Permanent(Error),

    /// Stop waiting, the probe could succeed later but the policy gave up.
    ///
    /// Attempt and elapsed time limits return this variant. The waiter wraps
    /// the error with [Error::exhausted].
    Exhausted(Error),

    /// Probe the resource again after the next polling interval.
    Continue(Error),
}

impl RetryResult {
    /// Returns true if the waiter stops and reports the error as is.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// Returns true if the waiter stops because a policy limit was reached.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Returns true if the waiter keeps probing.
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }

    /// Consumes the decision and returns the probe error it carries.
    pub fn into_error(self) -> Error {
        match self {
            Self::Permanent(e) | Self::Exhausted(e) | Self::Continue(e) => e,
        }
    }
}
