use std::time::Duration;

/// Live view of the crawl, derived on demand from the collector.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
    pub success_rate: f64,
    pub average_duration: Duration,
    pub elapsed: Duration,
    pub estimated_time_left: Duration,
    pub requests_per_second: f64,
}

/// Terminal statistics for a completed (or interrupted) crawl.
#[derive(Debug, Clone, Default)]
pub struct FinalReport {
    pub total_processed: usize,
    pub total_success: usize,
    pub total_errors: usize,
    pub success_rate: f64,
    pub average_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub total_duration: Duration,
}

/// Cache behavior measured over the verification phase.
#[derive(Debug, Clone, Default)]
pub struct CacheReport {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub warm_up_time: Duration,
    pub verify_time: Duration,
}
