use clap::Parser;
use validator::Validate;

use crate::error::Result;

mod schema;

pub use schema::Config;

/// Parses CLI flags and `SITEMAP_CRAWLER_*` environment fallbacks, then
/// validates the assembled configuration once.
pub fn load() -> Result<Config> {
    let cfg = Config::parse();
    cfg.validate()?;
    Ok(cfg)
}
