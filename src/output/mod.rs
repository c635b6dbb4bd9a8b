use crate::stats::{CacheReport, FinalReport, Progress};

pub mod csv;
pub mod json;
pub mod text;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::text::TextFormatter;

/// Report format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn formatter(self) -> Box<dyn ReportFormatter> {
        match self {
            OutputFormat::Text => Box::new(TextFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::Csv => Box::new(CsvFormatter),
        }
    }
}

/// Renders progress, final, and cache reports in one concrete format.
pub trait ReportFormatter: Send + Sync {
    fn format_progress(&self, progress: &Progress) -> String;
    fn format_final(&self, report: &FinalReport) -> String;
    fn format_cache(&self, report: &CacheReport) -> String;
}
