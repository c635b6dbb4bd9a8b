use std::time::{Duration, SystemTime};

use super::ReportFormatter;
use crate::stats::{CacheReport, FinalReport, Progress};

pub struct CsvFormatter;

impl ReportFormatter for CsvFormatter {
    fn format_progress(&self, progress: &Progress) -> String {
        rows(
            &[
                "timestamp",
                "processed",
                "total",
                "percentage",
                "success_rate",
                "average_duration",
                "elapsed_time",
                "estimated_time_left",
                "requests_per_second",
            ],
            &[
                timestamp(),
                progress.processed.to_string(),
                progress.total.to_string(),
                format!("{:.1}", progress.percentage),
                format!("{:.1}", progress.success_rate),
                duration_value(progress.average_duration),
                duration_value(progress.elapsed),
                duration_value(progress.estimated_time_left),
                format!("{:.1}", progress.requests_per_second),
            ],
        )
    }

    fn format_final(&self, report: &FinalReport) -> String {
        rows(
            &[
                "timestamp",
                "total_processed",
                "total_success",
                "total_errors",
                "success_rate",
                "average_duration",
                "min_duration",
                "max_duration",
                "total_duration",
            ],
            &[
                timestamp(),
                report.total_processed.to_string(),
                report.total_success.to_string(),
                report.total_errors.to_string(),
                format!("{:.1}", report.success_rate),
                duration_value(report.average_duration),
                duration_value(report.min_duration),
                duration_value(report.max_duration),
                duration_value(report.total_duration),
            ],
        )
    }

    fn format_cache(&self, report: &CacheReport) -> String {
        rows(
            &[
                "timestamp",
                "cache_hits",
                "cache_misses",
                "cache_hit_rate",
                "warm_up_time",
                "verify_time",
            ],
            &[
                timestamp(),
                report.cache_hits.to_string(),
                report.cache_misses.to_string(),
                format!("{:.1}", report.cache_hit_rate),
                duration_value(report.warm_up_time),
                duration_value(report.verify_time),
            ],
        )
    }
}

/// Header row plus one data row, rendered into a string buffer.
fn rows(header: &[&str], values: &[String]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if writer.write_record(header).is_err() {
        return String::new();
    }
    if writer.write_record(values).is_err() {
        return String::new();
    }

    match writer.into_inner() {
        Ok(buffer) => String::from_utf8(buffer).unwrap_or_default(),
        Err(_) => String::new(),
    }
}

fn timestamp() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

fn duration_value(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}
