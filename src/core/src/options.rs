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

//! Wait configuration.
//!
//! The defaults work for most resources: wait up to 10 minutes, probing at
//! the [timeout-scaled interval][crate::poll_interval::calculate_poll_interval],
//! and retry only [transient][crate::error::Error::transient] probe errors.
//! Applications change them through [WaitOptions].
//!
//! Resources typically let the user pick a timeout per operation. The
//! [Timeouts] type captures that configuration block, and can be deserialized
//! from any `serde` format:
//!
//! ```
//! # use cloud_waiter_core::options::*;
//! use std::time::Duration;
//! let timeouts: Timeouts = serde_json::from_str(r#"{"create": "1h 30m", "default": "20m"}"#)?;
//! assert_eq!(timeouts.get(Operation::Create), Duration::from_secs(90 * 60));
//! assert_eq!(timeouts.get(Operation::Delete), Duration::from_secs(20 * 60));
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::poll_interval::TimeoutScaledInterval;
use crate::polling_backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use crate::polling_error_policy::{PollingErrorPolicy, PollingErrorPolicyArg, TransientOnly};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

/// The timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The error type for configuration values.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid duration '{value}': {source}")]
    InvalidDuration {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Parses a duration string such as `"30s"`, `"10m"` or `"1h 30m"`.
///
/// # Example
/// ```
/// # use cloud_waiter_core::options::parse_duration;
/// use std::time::Duration;
/// assert_eq!(parse_duration("2m 30s")?, Duration::from_secs(150));
/// assert!(parse_duration("soon").is_err());
/// # Ok::<(), cloud_waiter_core::options::Error>(())
/// ```
pub fn parse_duration(value: &str) -> Result<Duration, Error> {
    humantime::parse_duration(value.trim()).map_err(|source| Error::InvalidDuration {
        value: value.to_string(),
        source,
    })
}

/// The options for a single wait.
///
/// # Example
/// ```
/// # use cloud_waiter_core::options::WaitOptions;
/// # use cloud_waiter_core::polling_error_policy::*;
/// use std::time::Duration;
/// let options = WaitOptions::default()
///     .with_timeout(Duration::from_secs(30 * 60))
///     .with_delay(Duration::from_secs(5))
///     .with_polling_error_policy(TransientOnly.with_attempt_limit(100));
/// assert_eq!(options.timeout(), Duration::from_secs(30 * 60));
/// ```
#[derive(Clone, Debug)]
pub struct WaitOptions {
    timeout: Duration,
    delay: Duration,
    min_interval: Duration,
    polling_error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    polling_backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
}

impl WaitOptions {
    /// Creates options that wait up to `timeout`, with all other values set
    /// to their defaults.
    pub fn new<V: Into<Duration>>(timeout: V) -> Self {
        Self::default().with_timeout(timeout)
    }

    /// The overall deadline for the wait, measured from its start.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sets the overall deadline for the wait.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = v.into();
        self
    }

    /// The initial wait before the first probe.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sets the initial wait before the first probe.
    ///
    /// The delay counts against the timeout.
    pub fn with_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.delay = v.into();
        self
    }

    /// The lower bound for the wait between probes.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sets a lower bound for the wait between probes.
    ///
    /// The backoff policy period is raised to this value if it is shorter.
    pub fn with_min_interval<V: Into<Duration>>(mut self, v: V) -> Self {
        self.min_interval = v.into();
        self
    }

    /// The polling error policy, [TransientOnly] unless configured.
    pub fn polling_error_policy(&self) -> Arc<dyn PollingErrorPolicy> {
        self.polling_error_policy
            .clone()
            .unwrap_or_else(|| Arc::new(TransientOnly))
    }

    /// Sets the polling error policy.
    pub fn with_polling_error_policy<V: Into<PollingErrorPolicyArg>>(mut self, v: V) -> Self {
        self.polling_error_policy = Some(v.into().0);
        self
    }

    /// The polling backoff policy.
    ///
    /// Unless configured, this is a [TimeoutScaledInterval] computed from the
    /// current timeout.
    pub fn polling_backoff_policy(&self) -> Arc<dyn PollingBackoffPolicy> {
        self.polling_backoff_policy
            .clone()
            .unwrap_or_else(|| Arc::new(TimeoutScaledInterval::new(self.timeout)))
    }

    /// Sets the polling backoff policy.
    pub fn with_polling_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.polling_backoff_policy = Some(v.into().0);
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            min_interval: Duration::ZERO,
            polling_error_policy: None,
            polling_backoff_policy: None,
        }
    }
}

/// The operations that wait for a resource to settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Per operation timeouts, as configured by the user.
///
/// Unset operations use the `default` value, and if that is also unset,
/// [DEFAULT_TIMEOUT].
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    #[serde(default, deserialize_with = "deserialize_timeout")]
    create: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    read: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    update: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    delete: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_timeout")]
    default: Option<Duration>,
}

impl Timeouts {
    /// The effective timeout for `operation`.
    pub fn get(&self, operation: Operation) -> Duration {
        let configured = match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        };
        configured.or(self.default).unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Wait options bounded by the effective timeout for `operation`.
    pub fn wait_options(&self, operation: Operation) -> WaitOptions {
        WaitOptions::new(self.get(operation))
    }

    /// Sets the timeout for `operation`.
    pub fn with_operation<V: Into<Duration>>(mut self, operation: Operation, v: V) -> Self {
        let slot = match operation {
            Operation::Create => &mut self.create,
            Operation::Read => &mut self.read,
            Operation::Update => &mut self.update,
            Operation::Delete => &mut self.delete,
        };
        *slot = Some(v.into());
        self
    }

    /// Sets the fallback timeout for operations without an explicit value.
    pub fn with_default<V: Into<Duration>>(mut self, v: V) -> Self {
        self.default = Some(v.into());
        self
    }
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    value
        .map(|v| parse_duration(&v))
        .transpose()
        .map_err(serde::de::Error::custom)
}
