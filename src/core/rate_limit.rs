use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 固定間隔閘門：兩次放行之間至少相隔 `interval`。
///
/// Uses tokio's clock, so tests can drive it with a paused runtime. Callers are
/// released one at a time; the lock is held across the wait, which serializes
/// every outbound call that goes through the same gate.
#[derive(Debug)]
pub struct FixedIntervalGate {
    interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl FixedIntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_release: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn acquire(&self) {
        let mut last = self.last_release.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    "⏳ Rate gate waiting {:?}",
                    ready_at.saturating_duration_since(Instant::now())
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let gate = FixedIntervalGate::new(Duration::from_secs(1));
        let start = Instant::now();

        gate.acquire().await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_acquires_are_spaced() {
        let gate = FixedIntervalGate::new(Duration::from_secs(1));
        let start = Instant::now();

        for _ in 0..3 {
            gate.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_interval_already_passed() {
        let gate = FixedIntervalGate::new(Duration::from_millis(500));
        gate.acquire().await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        let before = Instant::now();
        gate.acquire().await;

        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let gate = Arc::new(FixedIntervalGate::new(Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    gate.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut releases = Vec::new();
        for handle in handles {
            releases.push(handle.await.unwrap());
        }
        releases.sort();

        for pair in releases.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(1));
        }
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let gate = FixedIntervalGate::new(Duration::ZERO);
        let start = Instant::now();

        for _ in 0..10 {
            gate.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
