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

//! Loop control helpers for cloud resource waiters.
//!
//! This crate contains the types and policies used by the `cloud-waiter`
//! poll scheduler: the error type, the loop control decisions, the polling
//! error and backoff policies, and the configuration types.
//!
//! Most applications use these types indirectly, through `WaitOptions` and
//! the pollers in `cloud-waiter`. Applications only need to use them directly
//! when implementing their own polling policies.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all probes and waiters.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types used by waiters.
pub mod error;

pub mod exponential_backoff;
pub mod options;
pub mod poll_interval;
pub mod polling_backoff_policy;
pub mod polling_error_policy;
pub mod polling_state;
pub mod retry_result;
