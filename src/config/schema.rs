use std::time::Duration;

use clap::Parser;
use validator::{Validate, ValidationError};

use crate::backoff::BackoffConfig;
use crate::output::OutputFormat;

/// Runtime configuration, assembled from CLI flags with
/// `SITEMAP_CRAWLER_*` environment fallbacks and validated once at startup.
///
/// Boolean flags accept both `--flag` and `--flag=false`; duration flags
/// accept values like `30s` or `5m`.
#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "sitemap-crawler")]
#[command(version)]
#[command(about = "Crawl every URL advertised by a sitemap, measuring latency and cache behavior", long_about = None)]
#[validate(schema(function = "validate_cross_fields", skip_on_field_errors = false))]
pub struct Config {
    /// URL of the sitemap to crawl (required)
    #[arg(long, env = "SITEMAP_CRAWLER_SITEMAP_URL")]
    pub sitemap_url: String,

    /// Maximum number of parallel workers
    #[arg(long, env = "SITEMAP_CRAWLER_MAX_WORKERS", default_value_t = 10)]
    #[validate(range(min = 1))]
    pub max_workers: usize,

    /// Maximum requests per second, aggregated across all workers
    #[arg(long, env = "SITEMAP_CRAWLER_REQUEST_RATE", default_value_t = 100)]
    #[validate(range(min = 1))]
    pub request_rate: u32,

    /// Per-request timeout
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_REQUEST_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub request_timeout: Duration,

    /// User agent sent when no User-Agent header is supplied
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_USER_AGENT",
        default_value = "SitemapCrawler/1.0"
    )]
    pub user_agent: String,

    /// Custom header in 'Key:Value' form (repeatable)
    #[arg(
        long = "headers",
        env = "SITEMAP_CRAWLER_HEADERS",
        value_name = "KEY:VALUE",
        value_parser = parse_header
    )]
    pub headers: Vec<(String, String)>,

    /// Run the two-phase cache warm-up and verification workflow
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_CACHE_VERIFICATION_MODE",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true,
        action = clap::ArgAction::Set
    )]
    pub cache_verification_mode: bool,

    /// Response header carrying the cache status
    #[arg(long, env = "SITEMAP_CRAWLER_CACHE_HEADER", default_value = "X-Cache")]
    pub cache_header: String,

    /// Report format for progress, final, and cache output
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_OUTPUT_FORMAT",
        value_enum,
        default_value = "text"
    )]
    pub output_format: OutputFormat,

    /// Suppress live progress reporting
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_QUIET",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true,
        action = clap::ArgAction::Set
    )]
    pub quiet: bool,

    /// Interval between progress reports
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_PROGRESS_INTERVAL",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub progress_interval: Duration,

    /// Enable debug logging
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_DEBUG",
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true,
        action = clap::ArgAction::Set
    )]
    pub debug: bool,

    /// React to server errors and latency degradation with adaptive backoff
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_BACKOFF_ENABLED",
        default_value_t = true,
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true,
        action = clap::ArgAction::Set
    )]
    pub backoff_enabled: bool,

    /// Delay applied when backoff first activates
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_BACKOFF_INITIAL_DELAY",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub backoff_initial_delay: Duration,

    /// Upper bound for the escalating backoff delay
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_BACKOFF_MAX_DELAY",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub backoff_max_delay: Duration,

    /// Factor applied to the delay on each additional backoff trigger
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_BACKOFF_MULTIPLIER",
        default_value_t = 2.0
    )]
    pub backoff_multiplier: f64,

    /// Fraction above the baseline response time that counts as degradation
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_RESPONSE_TIME_DEGRADATION_THRESHOLD",
        default_value_t = 0.5
    )]
    pub response_time_degradation_threshold: f64,

    /// Number of 403 responses within the window that cancels the crawl
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_FORBIDDEN_ERROR_THRESHOLD",
        default_value_t = 5
    )]
    #[validate(range(min = 1))]
    pub forbidden_error_threshold: usize,

    /// Sliding window over which 403 responses are counted
    #[arg(
        long,
        env = "SITEMAP_CRAWLER_FORBIDDEN_ERROR_WINDOW",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub forbidden_error_window: Duration,
}

impl Config {
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            enabled: self.backoff_enabled,
            initial_delay: self.backoff_initial_delay,
            max_delay: self.backoff_max_delay,
            multiplier: self.backoff_multiplier,
            degradation_threshold: self.response_time_degradation_threshold,
            forbidden_threshold: self.forbidden_error_threshold,
            forbidden_window: self.forbidden_error_window,
        }
    }
}

/// Splits a `Key:Value` header flag on the first colon.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("invalid header '{raw}', expected 'Key:Value'")),
    }
}

fn validate_cross_fields(cfg: &Config) -> Result<(), ValidationError> {
    if cfg.request_timeout < Duration::from_secs(1) {
        return Err(field_error(
            "request_timeout",
            "request timeout must be at least 1 second",
        ));
    }

    if cfg.cache_verification_mode && cfg.cache_header.trim().is_empty() {
        return Err(field_error(
            "cache_header",
            "cache header must be specified when cache verification mode is enabled",
        ));
    }

    if cfg.backoff_initial_delay.is_zero() {
        return Err(field_error(
            "backoff_initial_delay",
            "backoff initial delay must be greater than zero",
        ));
    }

    if cfg.backoff_max_delay.is_zero() {
        return Err(field_error(
            "backoff_max_delay",
            "backoff max delay must be greater than zero",
        ));
    }

    if cfg.backoff_initial_delay > cfg.backoff_max_delay {
        return Err(field_error(
            "backoff_initial_delay",
            "backoff initial delay must not exceed the max delay",
        ));
    }

    if cfg.backoff_multiplier <= 1.0 {
        return Err(field_error(
            "backoff_multiplier",
            "backoff multiplier must be greater than 1.0",
        ));
    }

    let threshold = cfg.response_time_degradation_threshold;
    if threshold <= 0.0 || threshold > 1.0 {
        return Err(field_error(
            "response_time_degradation_threshold",
            "degradation threshold must be in (0, 1]",
        ));
    }

    if cfg.forbidden_error_window.is_zero() {
        return Err(field_error(
            "forbidden_error_window",
            "forbidden error window must be greater than zero",
        ));
    }

    Ok(())
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}
