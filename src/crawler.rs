//! The crawl engine: shared HTTP client, worker pool, phase orchestration,
//! and the live progress reporter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backoff::{BackoffController, BackoffDecision};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::limiter::TokenBucket;
use crate::sitemap::{self, SitemapResolver};
use crate::stats::{FetchResult, Phase, Progress, StatsCollector};

pub struct Crawler {
    config: Config,
    client: Client,
    limiter: Arc<TokenBucket>,
    backoff: Arc<BackoffController>,
    stats: Arc<StatsCollector>,
    cancel: CancellationToken,
}

impl Crawler {
    /// Builds the engine and its one-per-run collaborators: the pooled HTTP
    /// client, the shared token bucket, the backoff controller, and the
    /// statistics collector.
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let cancel = CancellationToken::new();
        let backoff = Arc::new(BackoffController::new(
            config.backoff_config(),
            cancel.clone(),
        ));
        let limiter = Arc::new(TokenBucket::new(config.request_rate));

        Ok(Self {
            config,
            client,
            limiter,
            backoff,
            stats: Arc::new(StatsCollector::new()),
            cancel,
        })
    }

    /// Token shared by every component; cancelling it stops the run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn final_report(&self) -> crate::stats::FinalReport {
        self.stats.final_report().await
    }

    pub async fn cache_report(&self) -> crate::stats::CacheReport {
        self.stats.cache_report().await
    }

    /// Resolves the sitemap and drains every valid URL through the pool,
    /// twice in cache-verification mode.
    pub async fn run(&self) -> Result<()> {
        log::info!("starting sitemap crawler");
        log::info!(
            "sitemap_url={} max_workers={} request_rate={}req/s cache_mode={}",
            self.config.sitemap_url,
            self.config.max_workers,
            self.config.request_rate,
            self.config.cache_verification_mode,
        );

        let resolver = SitemapResolver::new(self.client.clone());
        let urls = resolver
            .resolve(&self.config.sitemap_url, &self.config.headers)
            .await?;
        log::info!("sitemap parsed successfully: {} URLs", urls.len());

        let urls: Vec<String> = urls
            .into_iter()
            .filter(|url| sitemap::is_valid_url(url))
            .collect();
        log::info!("{} valid URLs after filtering", urls.len());

        if urls.is_empty() {
            return Err(Error::NoValidUrls);
        }

        let total = if self.config.cache_verification_mode {
            urls.len() * 2
        } else {
            urls.len()
        };
        self.stats.set_total(total).await;

        let reporter = self.spawn_progress_reporter();

        let outcome = if self.config.cache_verification_mode {
            self.run_cache_verification(&urls).await
        } else {
            self.run_phase(&urls, Phase::Standard).await
        };

        if let Some(handle) = reporter {
            handle.abort();
        }

        outcome
    }

    async fn run_cache_verification(&self, urls: &[String]) -> Result<()> {
        log::info!("running in cache verification mode");

        log::info!("phase 1: warming up cache");
        self.run_phase(urls, Phase::WarmUp).await?;

        log::info!("phase 2: verifying cache");
        self.run_phase(urls, Phase::Verify).await?;

        Ok(())
    }

    /// Drains one pass over the URL list through a pool of `max_workers`
    /// concurrent fetchers. The whole pool races the cancellation token, so
    /// firing it aborts in-flight requests.
    async fn run_phase(&self, urls: &[String], phase: Phase) -> Result<()> {
        self.stats.begin_phase(phase).await;

        let pool = futures::stream::iter(urls.iter().cloned()).for_each_concurrent(
            self.config.max_workers,
            |url| async move {
                self.process_url(url, phase).await;
            },
        );

        tokio::select! {
            _ = pool => {}
            _ = self.cancel.cancelled() => {}
        }

        self.stats.end_phase(phase).await;

        if self.cancel.is_cancelled() {
            if self.backoff.is_cancelled().await {
                let snapshot = self.backoff.snapshot().await;
                return Err(Error::ForbiddenLimit {
                    count: snapshot.forbidden_count,
                    window: self.config.forbidden_error_window,
                });
            }
            return Err(Error::Cancelled);
        }

        Ok(())
    }

    /// One worker iteration: token, fetch, observe, record, maybe pause.
    /// The backoff lock and the stats lock are taken sequentially, never
    /// together.
    async fn process_url(&self, url: String, phase: Phase) {
        if self.limiter.acquire(&self.cancel).await.is_err() {
            // Run cancelled while waiting for a token.
            return;
        }

        let result = self.fetch_url(url).await;

        let decision = self.backoff.observe(result.status, result.duration).await;

        match result.status {
            Some(status) => {
                log::debug!("{} -> {} in {:?}", result.url, status, result.duration)
            }
            None => log::debug!(
                "{} failed: {}",
                result.url,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }

        self.stats.record(phase, result).await;

        match decision {
            Ok(BackoffDecision::Pause(delay)) => {
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
            Ok(BackoffDecision::Proceed) => {}
            // Fatal observation; the controller already fired the token.
            Err(_) => {}
        }
    }

    async fn fetch_url(&self, url: String) -> FetchResult {
        let start = Instant::now();

        let mut request = self.client.get(&url);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let cache_status = if self.config.cache_verification_mode {
                    response
                        .headers()
                        .get(self.config.cache_header.as_str())
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                } else {
                    None
                };

                FetchResult {
                    url,
                    success: (200..400).contains(&status),
                    status: Some(status),
                    error: None,
                    duration: start.elapsed(),
                    cache_status,
                }
            }
            Err(err) => FetchResult {
                url,
                success: false,
                status: None,
                error: Some(err.to_string()),
                duration: start.elapsed(),
                cache_status: None,
            },
        }
    }

    /// Logs a formatted snapshot every `progress_interval` until the run
    /// ends. Quiet mode skips the task entirely; nothing is emitted before
    /// the first result arrives.
    fn spawn_progress_reporter(&self) -> Option<JoinHandle<()>> {
        if self.config.quiet {
            return None;
        }

        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        let formatter = self.config.output_format.formatter();
        let period = self.config.progress_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let progress = stats.progress().await;
                        if progress.processed == 0 {
                            continue;
                        }
                        log::info!("{}", formatter.format_progress(&progress));
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        }))
    }

    /// Periodic progress broadcast for UI consumers such as the terminal
    /// progress bar.
    pub fn watch_progress(&self) -> watch::Receiver<Progress> {
        let (tx, rx) = watch::channel(Progress::default());
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(500));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if tx.send(stats.progress().await).is_err() {
                            break;
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });

        rx
    }
}
