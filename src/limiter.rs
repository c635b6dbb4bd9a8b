//! Process-wide token bucket rate limiting.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Token bucket capping the aggregate request rate across every worker in
/// every phase. Burst capacity equals the per-second rate.
///
/// One instance is shared by the whole pool; the configured rate is the
/// total cap, not a per-worker cap.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_second: u32) -> Self {
        let rate = f64::from(requests_per_second);
        Self {
            state: Mutex::new(BucketState {
                tokens: rate,
                last_refill: Instant::now(),
            }),
            capacity: rate,
            refill_rate: rate,
        }
    }

    /// Blocks until a token is available. Returns `Error::Cancelled` when
    /// the shared cancellation token fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }

                // Sleep just long enough for the next token to accumulate.
                let deficit = 1.0 - state.tokens;
                Duration::from_secs_f64((deficit / self.refill_rate).max(0.001))
            };

            tokio::select! {
                _ = sleep(wait) => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_is_bounded_by_capacity() {
        let bucket = TokenBucket::new(5);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire(&cancel).await.expect("token");
        }
        // The burst drains instantly; the sixth token needs a refill.
        assert!(start.elapsed() < Duration::from_millis(50));

        bucket.acquire(&cancel).await.expect("token");
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn many_workers_share_one_rate() {
        // 10 workers each making 3 requests against a 5 req/s bucket: the
        // 30 requests beyond the burst of 5 need (30 - 5) / 5 = 5 seconds.
        let bucket = Arc::new(TokenBucket::new(5));
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let bucket = bucket.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..3 {
                    bucket.acquire(&cancel).await.expect("token");
                }
            }));
        }
        for handle in handles {
            handle.await.expect("worker");
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs_f64(4.9),
            "30 requests at 5 req/s finished too fast: {elapsed:?}"
        );

        // Observed rate stays within 1.5x of the configured rate.
        let observed = 30.0 / elapsed.as_secs_f64();
        assert!(observed <= 5.0 * 1.5, "rate {observed:.2} req/s exceeds cap");
    }

    async fn count_acquisitions(workers: usize, rate: u32, window: Duration) -> usize {
        let bucket = Arc::new(TokenBucket::new(rate));
        let cancel = CancellationToken::new();
        let count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..workers {
            let bucket = bucket.clone();
            let cancel = cancel.clone();
            let count = count.clone();
            handles.push(tokio::spawn(async move {
                while bucket.acquire(&cancel).await.is_ok() {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        sleep(window).await;
        cancel.cancel();
        for handle in handles {
            handle.await.expect("worker");
        }

        count.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn doubling_workers_does_not_double_throughput() {
        let single = count_acquisitions(1, 10, Duration::from_secs(2)).await;
        let multiple = count_acquisitions(5, 10, Duration::from_secs(2)).await;

        let difference = single.abs_diff(multiple);
        assert!(
            difference <= 3,
            "1 worker made {single} requests, 5 workers made {multiple}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_returns_error() {
        let bucket = TokenBucket::new(1);
        let cancel = CancellationToken::new();

        bucket.acquire(&cancel).await.expect("burst token");

        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { bucket.acquire(&cancel).await })
        };
        cancel.cancel();

        let result = waiter.await.expect("join");
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
