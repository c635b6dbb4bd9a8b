pub mod backoff;
pub mod config;
pub mod crawler;
pub mod error;
pub mod limiter;
pub mod output;
pub mod sitemap;
pub mod stats;

pub use backoff::{BackoffConfig, BackoffController, BackoffDecision};
pub use config::Config;
pub use crawler::Crawler;
pub use error::{Error, Result};
pub use limiter::TokenBucket;
pub use sitemap::SitemapResolver;
pub use stats::{FetchResult, Phase, StatsCollector};
