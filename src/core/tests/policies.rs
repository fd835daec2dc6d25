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

//! Verify polling policies are usable from outside the crate.

#[cfg(test)]
mod tests {
    use cloud_waiter_core::error::Error;
    use cloud_waiter_core::exponential_backoff::*;
    use cloud_waiter_core::poll_interval::*;
    use cloud_waiter_core::polling_backoff_policy::*;
    use cloud_waiter_core::polling_error_policy::*;
    use cloud_waiter_core::polling_state::PollingState;
    use cloud_waiter_core::retry_result::RetryResult;
    use std::time::Duration;
    type Result = anyhow::Result<()>;

    #[derive(Debug)]
    struct StopOnState(&'static str);

    impl PollingErrorPolicy for StopOnState {
        fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
            RetryResult::Continue(error)
        }

        fn on_in_progress(
            &self,
            _state: &PollingState,
            observed_state: &str,
        ) -> cloud_waiter_core::Result<()> {
            if observed_state == self.0 {
                return Err(Error::resource(observed_state, "stopped by policy"));
            }
            Ok(())
        }
    }

    #[test]
    fn custom_error_policy() {
        let policy = StopOnState("FROZEN").with_attempt_limit(10);
        let state = PollingState::default().set_attempt_count(1_u32);
        assert!(policy.on_in_progress(&state, "BUILDING").is_ok());
        let err = policy
            .on_in_progress(&state, "FROZEN")
            .expect_err("the custom policy stops on this state");
        assert!(err.is_resource(), "{err:?}");
        let _ = PollingErrorPolicyArg::from(policy);
    }

    #[test]
    fn error_policies() {
        let policy = TransientOnly
            .with_time_limit(Duration::from_secs(60))
            .with_attempt_limit(5);
        let state = PollingState::default().set_attempt_count(1_u32);
        assert!(policy.on_error(&state, Error::transient("reset")).is_continue());
        assert!(policy.on_error(&state, Error::other("bad")).is_permanent());
        let _ = PollingErrorPolicyArg::from(policy);

        let policy = LimitedAttemptCount::custom(AlwaysContinue, 2);
        let state = PollingState::default().set_attempt_count(2_u32);
        assert!(policy.on_error(&state, Error::other("bad")).is_exhausted());
    }

    #[test]
    fn backoff_policies() -> Result {
        // The functionality is verified in the unit tests.
        let state = PollingState::default().set_attempt_count(1_u32);

        let policy = ExponentialBackoffBuilder::new().build()?;
        assert!(policy.wait_period(&state) > Duration::ZERO, "{policy:?}");
        let _ = PollingBackoffPolicyArg::from(policy);

        let policy = TimeoutScaledInterval::new(Duration::from_secs(20 * 60));
        assert_eq!(policy.wait_period(&state), Duration::from_secs(13));
        let _ = PollingBackoffPolicyArg::from(policy);

        let policy = FixedInterval::new(Duration::from_secs(4));
        assert_eq!(policy.wait_period(&state), Duration::from_secs(4));
        let _ = PollingBackoffPolicyArg::from(policy);
        Ok(())
    }

    #[test]
    fn interval() {
        assert_eq!(
            calculate_poll_interval(Duration::from_secs(60 * 60)),
            Duration::from_secs(24)
        );
        assert_eq!(calculate_poll_interval(Duration::ZERO), MINIMUM_POLL_INTERVAL);
    }
}
