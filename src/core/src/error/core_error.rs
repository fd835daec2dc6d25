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

use std::error::Error as StdError;
use std::time::Duration;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by all waiters.
///
/// A wait may fail for several reasons: a status probe may fail (perhaps
/// transiently), the resource may enter a terminal error state, the resource
/// may disappear, the deadline may expire, or the caller may cancel the wait.
/// Collapsing these into a single opaque error loses diagnostic value, so this
/// type offers a predicate for each kind, and accessors for the most common
/// details. Applications can query the error [source][std::error::Error::source]
/// for deeper information.
///
/// # Example
/// ```
/// use cloud_waiter_core::error::Error;
/// match example_function() {
///     Err(e) if e.is_timeout() => {
///         println!("not enough time, last state was {:?}", e.last_state());
///     },
///     Err(e) if e.is_resource() => { println!("resource failed in state {:?}", e.state()); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # Err(Error::resource("ERROR", "the instance failed to boot"))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error representing a transient probe failure.
    ///
    /// Use this when a single status check failed, but the resource may still
    /// reach the desired state. For example, a dropped connection or a `503`
    /// from the service.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::transient("connection reset by peer");
    /// assert!(error.is_transient());
    /// assert!(error.source().is_some());
    /// ```
    pub fn transient<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Transient,
            source: Some(source.into()),
        }
    }

    /// A status probe failed, but the failure may not be permanent.
    ///
    /// Polling error policies may continue the loop after these errors, while
    /// the loop has time and attempts left.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient)
    }

    /// Creates an error representing a resource in a terminal error state.
    ///
    /// # Example
    /// ```
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::resource("ERROR", "quota exceeded while creating the volume");
    /// assert!(error.is_resource());
    /// assert_eq!(error.state(), Some("ERROR"));
    /// ```
    pub fn resource<S: Into<String>, T: Into<BoxError>>(state: S, source: T) -> Self {
        Self {
            kind: ErrorKind::Resource(state.into()),
            source: Some(source.into()),
        }
    }

    /// The resource reported an authoritative failure.
    ///
    /// The waiter stops immediately on these errors. Polling again will not
    /// change the outcome.
    ///
    /// # Troubleshooting
    ///
    /// The [state][Error::state] and the error [source][std::error::Error::source]
    /// describe what the service reported. Typically the operation must be
    /// repaired or retried at a higher level, for example by deleting and
    /// recreating the resource.
    pub fn is_resource(&self) -> bool {
        matches!(self.kind, ErrorKind::Resource(_))
    }

    /// Creates an error representing a state outside the expected sets.
    ///
    /// # Example
    /// ```
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::unexpected_state("SHUTOFF", ["ACTIVE"]);
    /// assert!(error.is_unexpected_state());
    /// assert_eq!(error.state(), Some("SHUTOFF"));
    /// assert_eq!(error.expected_states(), Some(&["ACTIVE".to_string()][..]));
    /// ```
    pub fn unexpected_state<S, I, V>(state: S, expected: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let details = StateDetails {
            state: state.into(),
            expected: expected.into_iter().map(|v| v.into()).collect(),
        };
        Self {
            kind: ErrorKind::UnexpectedState(Box::new(details)),
            source: None,
        }
    }

    /// The resource reported a state that is neither pending nor a target.
    ///
    /// # Troubleshooting
    ///
    /// This often means the list of pending states is incomplete for the
    /// service. Services sometimes introduce new intermediate states.
    pub fn is_unexpected_state(&self) -> bool {
        matches!(self.kind, ErrorKind::UnexpectedState(_))
    }

    /// Creates an error for a resource that could not be found.
    ///
    /// # Example
    /// ```
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::not_found(21);
    /// assert!(error.is_not_found());
    /// assert_eq!(error.not_found_checks(), Some(21));
    /// ```
    pub fn not_found(checks: u32) -> Self {
        Self {
            kind: ErrorKind::NotFound(checks),
            source: None,
        }
    }

    /// The resource was not found after the tolerated number of checks.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }

    /// Creates an error representing an expired deadline.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use std::time::Duration;
    /// use cloud_waiter_core::error::Error;
    /// let last = Error::transient("connection reset by peer");
    /// let error = Error::timeout(Duration::from_secs(600), Some("BUILDING".into()), Some(last));
    /// assert!(error.is_timeout());
    /// assert_eq!(error.last_state(), Some("BUILDING"));
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout(timeout: Duration, last_state: Option<String>, last_error: Option<Error>) -> Self {
        let details = TimeoutDetails {
            timeout,
            last_state,
        };
        Self {
            kind: ErrorKind::Timeout(Box::new(details)),
            source: last_error.map(|e| e.into()),
        }
    }

    /// The resource did not reach the desired state before the deadline.
    ///
    /// This is always a client-side generated error. The operation may still
    /// complete in the service.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause is a timeout derived from the observed latency of
    /// an idle service. Consider increasing the timeout to handle temporary
    /// latency increases too. The [last_state][Error::last_state] may show
    /// the operation is still making progress.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout(_))
    }

    /// Creates an error representing an exhausted polling error policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::exhausted(Error::transient("too many failed probes"));
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The polling error policy stopped the loop after recoverable errors.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause is a transient problem that lasts longer than the
    /// polling error policy tolerates. Consider a larger attempt limit.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled wait.
    ///
    /// # Example
    /// ```
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::cancelled();
    /// assert!(error.is_cancelled());
    /// ```
    pub fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: None,
        }
    }

    /// The caller cancelled the wait before it completed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// A problem reported by a probe that does not fit any other category.
    ///
    /// Polling error policies treat these errors as permanent.
    ///
    /// # Example
    /// ```
    /// use cloud_waiter_core::error::Error;
    /// let error = Error::other("cannot parse the status response");
    /// assert!(!error.is_transient());
    /// ```
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }

    /// The resource state associated with this error, if any.
    ///
    /// Only set for [resource][Error::is_resource] and
    /// [unexpected state][Error::is_unexpected_state] errors.
    pub fn state(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Resource(s) => Some(s.as_str()),
            ErrorKind::UnexpectedState(d) => Some(d.state.as_str()),
            _ => None,
        }
    }

    /// The states the waiter expected, for unexpected state errors.
    pub fn expected_states(&self) -> Option<&[String]> {
        match &self.kind {
            ErrorKind::UnexpectedState(d) => Some(d.expected.as_slice()),
            _ => None,
        }
    }

    /// The last state observed before a timeout, if any probe succeeded.
    pub fn last_state(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Timeout(d) => d.last_state.as_deref(),
            _ => None,
        }
    }

    /// The configured timeout, for timeout errors.
    pub fn timeout_duration(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::Timeout(d) => Some(d.timeout),
            _ => None,
        }
    }

    /// The number of "not found" checks, for not found errors.
    pub fn not_found_checks(&self) -> Option<u32> {
        match &self.kind {
            ErrorKind::NotFound(c) => Some(*c),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Transient, Some(e)) => {
                write!(f, "transient error while probing the resource status: {e}")
            }
            (ErrorKind::Resource(state), Some(e)) => {
                write!(f, "the resource entered the terminal state '{state}': {e}")
            }
            (ErrorKind::UnexpectedState(d), _) => write!(
                f,
                "unexpected state '{}', wanted target '{}'",
                d.state,
                d.expected.join(", ")
            ),
            (ErrorKind::NotFound(checks), _) => {
                write!(f, "couldn't find resource ({checks} retries)")
            }
            (ErrorKind::Timeout(d), source) => {
                write!(
                    f,
                    "timeout while waiting for the resource, waited {}",
                    humantime::format_duration(d.timeout)
                )?;
                if let Some(state) = &d.last_state {
                    write!(f, " (last state: '{state}')")?;
                }
                if let Some(e) = source {
                    write!(f, ", last error: {e}")?;
                }
                Ok(())
            }
            (ErrorKind::Exhausted, Some(e)) => {
                write!(f, "the polling error policy stopped the wait: {e}")
            }
            (ErrorKind::Cancelled, _) => write!(f, "the wait was cancelled"),
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem while waiting: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error))
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Transient,
    Resource(String),
    UnexpectedState(Box<StateDetails>),
    NotFound(u32),
    Timeout(Box<TimeoutDetails>),
    Exhausted,
    Cancelled,
    /// A uncategorized error.
    Other,
}

#[derive(Debug)]
struct StateDetails {
    state: String,
    expected: Vec<String>,
}

#[derive(Debug)]
struct TimeoutDetails {
    timeout: Duration,
    last_state: Option<String>,
}
