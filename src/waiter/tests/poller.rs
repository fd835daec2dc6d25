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

//! Verify the polling loop timing and termination with a paused clock.

#[cfg(test)]
mod tests {
    use cloud_waiter::options::WaitOptions;
    use cloud_waiter::polling_backoff_policy::FixedInterval;
    use cloud_waiter::polling_error_policy::{AlwaysContinue, PollingErrorPolicyExt, TransientOnly};
    use cloud_waiter::*;
    use std::collections::VecDeque;
    use std::error::Error as _;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    type TestResult = anyhow::Result<()>;

    /// Returns a scripted sequence of outcomes, then stays pending forever.
    struct Script<T> {
        steps: VecDeque<Result<ProbeOutcome<T>>>,
        calls: Arc<AtomicU32>,
    }

    impl<T> Script<T> {
        fn new<I>(steps: I) -> (Self, Arc<AtomicU32>)
        where
            I: IntoIterator<Item = Result<ProbeOutcome<T>>>,
        {
            let calls = Arc::new(AtomicU32::new(0));
            let script = Self {
                steps: steps.into_iter().collect(),
                calls: calls.clone(),
            };
            (script, calls)
        }
    }

    impl<T: Send> Probe<T> for Script<T> {
        async fn probe(&mut self) -> Result<ProbeOutcome<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.steps
                .pop_front()
                .unwrap_or_else(|| Ok(ProbeOutcome::pending("BUILDING")))
        }
    }

    fn pending() -> Result<ProbeOutcome<String>> {
        Ok(ProbeOutcome::pending("BUILDING"))
    }

    fn succeeded() -> Result<ProbeOutcome<String>> {
        Ok(ProbeOutcome::succeeded("ACTIVE", "server-1".to_string()))
    }

    const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);
    const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

    #[tokio::test(start_paused = true)]
    async fn success_without_sleeping() -> TestResult {
        let (probe, calls) = Script::new([succeeded()]);
        let start = Instant::now();
        let done = wait(WaitOptions::new(TEN_MINUTES), probe).await?;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(done.state(), "ACTIVE");
        assert_eq!(done.value().map(String::as_str), Some("server-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn pending_then_success() -> TestResult {
        let (probe, calls) = Script::new([pending(), pending(), succeeded()]);
        let start = Instant::now();
        let done = wait(WaitOptions::new(THIRTY_MINUTES), probe).await?;
        // 30 minutes polls every 16 seconds.
        assert_eq!(start.elapsed(), Duration::from_secs(32));
        assert_eq!(done.state(), "ACTIVE");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn never_settles() {
        let (probe, calls) = Script::<String>::new([]);
        let start = Instant::now();
        let err = wait(WaitOptions::new(TEN_MINUTES), probe)
            .await
            .expect_err("the probe never succeeds");
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(err.timeout_duration(), Some(TEN_MINUTES));
        assert_eq!(err.last_state(), Some("BUILDING"));
        assert!(err.source().is_none(), "{err:?}");
        let elapsed = start.elapsed();
        assert!(elapsed >= TEN_MINUTES, "{elapsed:?}");
        assert!(elapsed <= TEN_MINUTES + Duration::from_secs(10), "{elapsed:?}");
        // One probe every 10 seconds, starting at zero.
        assert_eq!(calls.load(Ordering::SeqCst), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_stops_immediately() {
        let (probe, calls) = Script::new([
            pending(),
            pending(),
            Ok(ProbeOutcome::aborted("ERROR", "volume quota exceeded")),
            succeeded(),
        ]);
        let start = Instant::now();
        let err = wait(WaitOptions::new(TEN_MINUTES), probe)
            .await
            .expect_err("the probe reports a terminal state");
        assert!(err.is_resource(), "{err:?}");
        assert_eq!(err.state(), Some("ERROR"));
        assert!(err.to_string().contains("volume quota exceeded"), "{err}");
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() -> TestResult {
        let (probe, calls) = Script::new([
            Err(Error::transient("connection reset by peer")),
            pending(),
            Err(Error::transient("connection reset by peer")),
            succeeded(),
        ]);
        let start = Instant::now();
        let done = wait(WaitOptions::new(TEN_MINUTES), probe).await?;
        assert_eq!(done.state(), "ACTIVE");
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_keeps_last_transient_error() {
        let steps = std::iter::once(pending())
            .chain((0..100).map(|_| Err(Error::transient("connection reset by peer"))));
        let (probe, _) = Script::new(steps);
        let err = wait(WaitOptions::new(TEN_MINUTES), probe)
            .await
            .expect_err("the probe never succeeds");
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(err.last_state(), Some("BUILDING"));
        let source = err
            .source()
            .and_then(|e| e.downcast_ref::<Error>())
            .expect("the last transient error is the source");
        assert!(source.is_transient(), "{source:?}");
        assert!(err.to_string().contains("connection reset by peer"), "{err}");
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_stops_immediately() {
        let (probe, calls) = Script::new([pending(), Err(Error::other("malformed response"))]);
        let start = Instant::now();
        let err = wait(WaitOptions::new(TEN_MINUTES), probe)
            .await
            .expect_err("the error is not transient");
        assert!(!err.is_timeout(), "{err:?}");
        assert!(err.to_string().contains("malformed response"), "{err}");
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn error_policy_limits_attempts() {
        let (probe, calls) = Script::<String>::new([]);
        let options = WaitOptions::new(TEN_MINUTES)
            .with_polling_error_policy(AlwaysContinue.with_attempt_limit(3));
        let err = wait(options, probe)
            .await
            .expect_err("the policy stops the loop");
        assert!(err.is_exhausted(), "{err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_attempt_limit() {
        let steps = (0..10).map(|_| Err(Error::transient("connection reset by peer")));
        let (probe, calls) = Script::<String>::new(steps);
        let options = WaitOptions::new(TEN_MINUTES)
            .with_polling_error_policy(TransientOnly.with_attempt_limit(3));
        let start = Instant::now();
        let err = wait(options, probe)
            .await
            .expect_err("the policy stops the loop");
        assert!(err.is_exhausted(), "{err:?}");
        assert!(!err.is_transient(), "{err:?}");
        assert!(err.to_string().contains("connection reset by peer"), "{err}");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_sleeping() {
        let (probe, calls) = Script::<String>::new([]);
        let token = CancellationToken::new();
        let canceller = token.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        let err = new_poller(WaitOptions::new(TEN_MINUTES), probe)
            .with_cancellation(token)
            .until_done()
            .await
            .expect_err("the wait is cancelled");
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        task.await.expect("the canceller task completes");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_probe() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        let probe = || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, Error>(ProbeOutcome::succeeded("ACTIVE", ()))
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        let err = new_poller(WaitOptions::new(TEN_MINUTES), probe)
            .with_cancellation(token)
            .until_done()
            .await
            .expect_err("the wait is cancelled");
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        task.await.expect("the canceller task completes");
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled() {
        let (probe, calls) = Script::<String>::new([succeeded()]);
        let token = CancellationToken::new();
        token.cancel();
        let err = new_poller(WaitOptions::new(TEN_MINUTES), probe)
            .with_cancellation(token)
            .until_done()
            .await
            .expect_err("the wait is cancelled");
        assert!(err.is_cancelled(), "{err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_is_bounded_by_deadline() {
        let probe = || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, Error>(ProbeOutcome::succeeded("ACTIVE", ()))
        };
        let start = Instant::now();
        let err = wait(WaitOptions::new(TEN_MINUTES), probe)
            .await
            .expect_err("the probe is slower than the timeout");
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(err.last_state(), None);
        assert_eq!(start.elapsed(), TEN_MINUTES);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_delay() -> TestResult {
        let (probe, calls) = Script::new([succeeded()]);
        let options = WaitOptions::new(TEN_MINUTES).with_delay(Duration::from_secs(30));
        let start = Instant::now();
        let _ = wait(options, probe).await?;
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn delay_past_deadline() {
        let (probe, calls) = Script::new([succeeded()]);
        let options = WaitOptions::new(Duration::from_secs(20)).with_delay(Duration::from_secs(60));
        let start = Instant::now();
        let err = wait(options, probe)
            .await
            .expect_err("the delay exceeds the timeout");
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn min_interval() -> TestResult {
        let (probe, _) = Script::new([pending(), succeeded()]);
        let options = WaitOptions::new(TEN_MINUTES)
            .with_polling_backoff_policy(FixedInterval::new(Duration::from_secs(1)))
            .with_min_interval(Duration::from_secs(5));
        let start = Instant::now();
        let _ = wait(options, probe).await?;
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_clipped_to_deadline() {
        let (probe, calls) = Script::<String>::new([]);
        let options = WaitOptions::new(Duration::from_secs(25))
            .with_polling_backoff_policy(FixedInterval::new(Duration::from_secs(60)));
        let start = Instant::now();
        let err = wait(options, probe)
            .await
            .expect_err("the probe never succeeds");
        assert!(err.is_timeout(), "{err:?}");
        assert_eq!(start.elapsed(), Duration::from_secs(25));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_steps() {
        let (probe, _) = Script::new([pending(), Err(Error::transient("reset")), succeeded()]);
        let mut poller = new_poller(WaitOptions::new(TEN_MINUTES), probe);
        let p = poller.poll().await;
        assert!(
            matches!(p, Some(PollingResult::InProgress(ref o)) if o.state() == "BUILDING"),
            "{p:?}"
        );
        let p = poller.poll().await;
        assert!(
            matches!(p, Some(PollingResult::PollingError(ref e)) if e.is_transient()),
            "{p:?}"
        );
        let p = poller.poll().await;
        assert!(matches!(p, Some(PollingResult::Completed(Ok(_)))), "{p:?}");
        assert_eq!(poller.polling_state().attempt_count, 3);
        let p = poller.poll().await;
        assert!(p.is_none(), "{p:?}");

        let err = poller
            .until_done()
            .await
            .expect_err("the poller already completed");
        assert!(!err.is_timeout(), "{err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_after_deadline() {
        let (probe, calls) = Script::<String>::new([]);
        let mut poller = new_poller(WaitOptions::new(Duration::from_secs(30)), probe);
        let p = poller.poll().await;
        assert!(matches!(p, Some(PollingResult::InProgress(_))), "{p:?}");
        tokio::time::advance(Duration::from_secs(31)).await;
        let p = poller.poll().await;
        assert!(
            matches!(p, Some(PollingResult::Completed(Err(ref e))) if e.is_timeout()),
            "{p:?}"
        );
        assert!(poller.poll().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stream() {
        use futures::StreamExt;
        let (probe, _) = Script::new([pending(), pending(), succeeded()]);
        let poller = new_poller(WaitOptions::new(TEN_MINUTES), probe);
        let items: Vec<_> = poller.into_stream().collect().await;
        assert_eq!(items.len(), 3, "{items:?}");
        assert!(matches!(items[0], PollingResult::InProgress(_)), "{items:?}");
        assert!(matches!(items[1], PollingResult::InProgress(_)), "{items:?}");
        assert!(matches!(items[2], PollingResult::Completed(Ok(_))), "{items:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawned_waits() -> TestResult {
        let waits = (0..4).map(|i| {
            let (probe, _) = Script::new([pending(), succeeded()]);
            let options = WaitOptions::new(TEN_MINUTES)
                .with_polling_backoff_policy(FixedInterval::new(Duration::from_millis(i + 1)));
            tokio::spawn(new_poller(options, probe).until_done())
        });
        for handle in waits.collect::<Vec<_>>() {
            let done = handle.await??;
            assert_eq!(done.state(), "ACTIVE");
        }
        Ok(())
    }
}
