use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("failed to fetch sitemap {url}: {reason}")]
    SitemapFetch { url: String, reason: String },

    #[error("unable to parse sitemap format")]
    SitemapFormat,

    #[error("no valid URLs found in sitemap")]
    NoValidUrls,

    #[error("crawl cancelled: {count} forbidden responses within {window:?} window")]
    ForbiddenLimit { count: usize, window: Duration },

    #[error("crawl cancelled")]
    Cancelled,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
