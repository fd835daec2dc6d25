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

//! Maps probe results to polling results.

use super::*;
use waiter_core::retry_result::RetryResult;

pub(crate) fn handle_probe<T>(
    error_policy: &Arc<dyn PollingErrorPolicy>,
    state: &PollingState,
    result: Result<ProbeOutcome<T>>,
) -> PollingResult<T> {
    match result {
        Err(e) => handle_polling_error(error_policy.on_error(state, e)),
        Ok(ProbeOutcome::Succeeded(o)) => PollingResult::Completed(Ok(o)),
        Ok(ProbeOutcome::Aborted { error, .. }) => PollingResult::Completed(Err(error)),
        Ok(ProbeOutcome::Pending(o)) => match error_policy.on_in_progress(state, o.state()) {
            Ok(()) => PollingResult::InProgress(o),
            Err(e) => PollingResult::Completed(Err(e)),
        },
    }
}

fn handle_polling_error<T>(result: RetryResult) -> PollingResult<T> {
    match result {
        RetryResult::Continue(e) => PollingResult::PollingError(e),
        RetryResult::Exhausted(e) => PollingResult::Completed(Err(Error::exhausted(e))),
        RetryResult::Permanent(e) => PollingResult::Completed(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling_error_policy::{AlwaysContinue, PollingErrorPolicyExt, TransientOnly};
    use std::error::Error as _;

    mockall::mock! {
        #[derive(Debug)]
        Policy {}
        impl PollingErrorPolicy for Policy {
            fn on_error(&self, state: &PollingState, error: Error) -> RetryResult;
            fn on_in_progress(&self, state: &PollingState, observed_state: &str) -> Result<()>;
        }
    }

    fn state(count: u32) -> PollingState {
        PollingState::default().set_attempt_count(count)
    }

    #[test]
    fn succeeded() {
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(MockPolicy::new());
        let got = handle_probe(&policy, &state(1), Ok(ProbeOutcome::succeeded("ACTIVE", 5)));
        match got {
            PollingResult::Completed(Ok(o)) => {
                assert_eq!(o.state(), "ACTIVE");
                assert_eq!(o.value(), Some(&5));
            }
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn aborted() {
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(MockPolicy::new());
        let got = handle_probe::<i32>(
            &policy,
            &state(1),
            Ok(ProbeOutcome::aborted("ERROR", "bad config")),
        );
        match got {
            PollingResult::Completed(Err(e)) => {
                assert!(e.is_resource(), "{e:?}");
                assert_eq!(e.state(), Some("ERROR"));
            }
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn pending() {
        let mut mock = MockPolicy::new();
        mock.expect_on_in_progress()
            .withf(|s, observed| s.attempt_count == 2 && observed.to_string() == "BUILDING")
            .times(1)
            .returning(|_, _| Ok(()));
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(mock);
        let got = handle_probe::<i32>(&policy, &state(2), Ok(ProbeOutcome::pending("BUILDING")));
        assert!(
            matches!(got, PollingResult::InProgress(ref o) if o.state() == "BUILDING"),
            "{got:?}"
        );
    }

    #[test]
    fn pending_exhausted() {
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(AlwaysContinue.with_attempt_limit(3));
        let got = handle_probe::<i32>(&policy, &state(3), Ok(ProbeOutcome::pending("BUILDING")));
        assert!(
            matches!(got, PollingResult::Completed(Err(ref e)) if e.is_exhausted()),
            "{got:?}"
        );
    }

    #[test]
    fn probe_error_continue() {
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(TransientOnly);
        let got = handle_probe::<i32>(&policy, &state(1), Err(Error::transient("reset")));
        assert!(
            matches!(got, PollingResult::PollingError(ref e) if e.is_transient()),
            "{got:?}"
        );
    }

    #[test]
    fn probe_error_permanent() {
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(TransientOnly);
        let got = handle_probe::<i32>(&policy, &state(1), Err(Error::other("bad json")));
        assert!(matches!(got, PollingResult::Completed(Err(_))), "{got:?}");
    }

    #[test]
    fn probe_error_exhausted() {
        let mut mock = MockPolicy::new();
        mock.expect_on_error()
            .times(1)
            .returning(|_, e| RetryResult::Exhausted(e));
        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(mock);
        let got = handle_probe::<i32>(&policy, &state(1), Err(Error::transient("reset")));
        let err = match got {
            PollingResult::Completed(Err(e)) => e,
            r => panic!("unexpected result {r:?}"),
        };
        assert!(err.is_exhausted(), "{err:?}");
        assert!(!err.is_transient(), "{err:?}");
        let source = err
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .expect("the last probe error is the source");
        assert!(source.is_transient(), "{source:?}");
    }
}
