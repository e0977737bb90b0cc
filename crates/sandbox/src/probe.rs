//! Bounded readiness probing for background services.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Poll `check` at a fixed `interval` until it reports ready or `timeout`
/// elapses. Returns how long the wait took, or `None` on timeout.
///
/// The overall deadline is explicit: a service that never comes up yields a
/// timely failure, not a hang.
pub async fn wait_until_ready<F, Fut>(
    mut check: F,
    interval: Duration,
    timeout: Duration,
) -> Option<Duration>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let deadline = start + timeout;

    loop {
        if check().await {
            return Some(start.elapsed());
        }
        if Instant::now() + interval > deadline {
            return None;
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn ready_on_first_check_returns_immediately() {
        let waited = wait_until_ready(
            || async { true },
            Duration::from_millis(500),
            Duration::from_secs(60),
        )
        .await;
        assert!(waited.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn becomes_ready_after_some_polls() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts2 = attempts.clone();

        let waited = wait_until_ready(
            move || {
                let attempts = attempts2.clone();
                async move { attempts.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            Duration::from_millis(500),
            Duration::from_secs(60),
        )
        .await;

        assert!(waited.is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn never_ready_times_out() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts2 = attempts.clone();

        let waited = wait_until_ready(
            move || {
                let attempts = attempts2.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    false
                }
            },
            Duration::from_millis(500),
            Duration::from_secs(5),
        )
        .await;

        assert!(waited.is_none());
        // Bounded: roughly timeout / interval polls, never unbounded.
        let n = attempts.load(Ordering::SeqCst);
        assert!(n >= 2 && n <= 12, "unexpected poll count: {n}");
    }
}
