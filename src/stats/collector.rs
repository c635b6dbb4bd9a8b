use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::report::{CacheReport, FinalReport, Progress};
use super::{FetchResult, Phase};

/// Thread-safe sink for fetch results.
///
/// One instance per run. Every recording call, whatever the phase, updates
/// the shared counters; warm-up and verify results are additionally kept for
/// the cache report. All mutation happens under the write lock; snapshots
/// take the read lock.
pub struct StatsCollector {
    inner: RwLock<Inner>,
}

struct Inner {
    total: usize,
    processed: usize,
    success: usize,
    error: usize,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Duration,
    started_at: Option<Instant>,
    warm_up: PhaseRecord,
    verify: PhaseRecord,
}

#[derive(Default)]
struct PhaseRecord {
    results: Vec<FetchResult>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
}

impl PhaseRecord {
    fn elapsed(&self) -> Duration {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                total: 0,
                processed: 0,
                success: 0,
                error: 0,
                total_duration: Duration::ZERO,
                min_duration: None,
                max_duration: Duration::ZERO,
                started_at: None,
                warm_up: PhaseRecord::default(),
                verify: PhaseRecord::default(),
            }),
        }
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of results the run will produce and starts the clock.
    /// In cache-verification mode this is twice the URL count, one per phase.
    pub async fn set_total(&self, total: usize) {
        let mut inner = self.inner.write().await;
        inner.total = total;
        inner.started_at = Some(Instant::now());
    }

    pub async fn begin_phase(&self, phase: Phase) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        match phase {
            Phase::Standard => {}
            Phase::WarmUp => {
                inner.warm_up.started_at.get_or_insert(now);
            }
            Phase::Verify => {
                inner.verify.started_at.get_or_insert(now);
            }
        }
    }

    pub async fn end_phase(&self, phase: Phase) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        match phase {
            Phase::Standard => {}
            Phase::WarmUp => inner.warm_up.ended_at = Some(now),
            Phase::Verify => inner.verify.ended_at = Some(now),
        }
    }

    /// Records one fetch result. Each enqueued URL reaches this exactly once.
    pub async fn record(&self, phase: Phase, result: FetchResult) {
        let mut inner = self.inner.write().await;

        inner.processed += 1;
        inner.total_duration += result.duration;
        if result.success {
            inner.success += 1;
        } else {
            inner.error += 1;
        }

        inner.min_duration = Some(match inner.min_duration {
            Some(min) => min.min(result.duration),
            None => result.duration,
        });
        inner.max_duration = inner.max_duration.max(result.duration);

        match phase {
            Phase::Standard => {}
            Phase::WarmUp => inner.warm_up.results.push(result),
            Phase::Verify => inner.verify.results.push(result),
        }
    }

    pub async fn progress(&self) -> Progress {
        let inner = self.inner.read().await;

        let percentage = if inner.total > 0 {
            inner.processed as f64 / inner.total as f64 * 100.0
        } else {
            0.0
        };

        let success_rate = if inner.processed > 0 {
            inner.success as f64 / inner.processed as f64 * 100.0
        } else {
            0.0
        };

        let average_duration = if inner.processed > 0 {
            inner.total_duration / inner.processed as u32
        } else {
            Duration::ZERO
        };

        let elapsed = inner
            .started_at
            .map(|start| start.elapsed())
            .unwrap_or_default();

        let mut requests_per_second = 0.0;
        let mut estimated_time_left = Duration::ZERO;
        if inner.processed > 0 && !elapsed.is_zero() {
            requests_per_second = inner.processed as f64 / elapsed.as_secs_f64();
            let remaining = inner.total.saturating_sub(inner.processed);
            if remaining > 0 && requests_per_second > 0.0 {
                estimated_time_left =
                    Duration::from_secs_f64(remaining as f64 / requests_per_second);
            }
        }

        Progress {
            processed: inner.processed,
            total: inner.total,
            percentage,
            success_rate,
            average_duration,
            elapsed,
            estimated_time_left,
            requests_per_second,
        }
    }

    pub async fn final_report(&self) -> FinalReport {
        let inner = self.inner.read().await;

        let success_rate = if inner.processed > 0 {
            inner.success as f64 / inner.processed as f64 * 100.0
        } else {
            0.0
        };

        let average_duration = if inner.processed > 0 {
            inner.total_duration / inner.processed as u32
        } else {
            Duration::ZERO
        };

        FinalReport {
            total_processed: inner.processed,
            total_success: inner.success,
            total_errors: inner.error,
            success_rate,
            average_duration,
            min_duration: inner.min_duration.unwrap_or_default(),
            max_duration: inner.max_duration,
            total_duration: inner.total_duration,
        }
    }

    /// Classifies the verify-phase results. Only the literal values `HIT`
    /// and `hit` count as hits; any other non-empty value is a miss; empty
    /// or absent values are ignored.
    pub async fn cache_report(&self) -> CacheReport {
        let inner = self.inner.read().await;

        let mut cache_hits = 0;
        let mut cache_misses = 0;
        for result in &inner.verify.results {
            match result.cache_status.as_deref() {
                Some("") | None => {}
                Some("HIT") | Some("hit") => cache_hits += 1,
                Some(_) => cache_misses += 1,
            }
        }

        let checked = cache_hits + cache_misses;
        let cache_hit_rate = if checked > 0 {
            cache_hits as f64 / checked as f64 * 100.0
        } else {
            0.0
        };

        CacheReport {
            cache_hits,
            cache_misses,
            cache_hit_rate,
            warm_up_time: inner.warm_up.elapsed(),
            verify_time: inner.verify.elapsed(),
        }
    }
}
