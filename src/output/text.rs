use std::time::Duration;

use super::ReportFormatter;
use crate::stats::{CacheReport, FinalReport, Progress};

pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format_progress(&self, progress: &Progress) -> String {
        format!(
            "Progress: {}/{} ({:.1}%) | Success Rate: {:.1}% | Speed: {:.1} req/s | Elapsed: {} | ETA: {} | Avg Response: {}",
            progress.processed,
            progress.total,
            progress.percentage,
            progress.success_rate,
            progress.requests_per_second,
            format_duration(progress.elapsed),
            format_duration(progress.estimated_time_left),
            format_duration(progress.average_duration),
        )
    }

    fn format_final(&self, report: &FinalReport) -> String {
        format!(
            "\nFinal Statistics:\n\
             ================\n\
             Total Processed:  {}\n\
             Total Success:    {}\n\
             Total Errors:     {}\n\
             Success Rate:     {:.1}%\n\
             Average Duration: {}\n\
             Min Duration:     {}\n\
             Max Duration:     {}\n\
             Total Duration:   {}\n",
            report.total_processed,
            report.total_success,
            report.total_errors,
            report.success_rate,
            format_duration(report.average_duration),
            format_duration(report.min_duration),
            format_duration(report.max_duration),
            format_duration(report.total_duration),
        )
    }

    fn format_cache(&self, report: &CacheReport) -> String {
        format!(
            "\nCache Verification Statistics:\n\
             ============================\n\
             Cache Hits:        {}\n\
             Cache Misses:      {}\n\
             Cache Hit Rate:    {:.1}%\n\
             Warm Up Time:      {}\n\
             Verification Time: {}\n",
            report.cache_hits,
            report.cache_misses,
            report.cache_hit_rate,
            format_duration(report.warm_up_time),
            format_duration(report.verify_time),
        )
    }
}

/// Human-readable duration; zero renders as N/A.
fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "N/A".to_string();
    }

    if duration < Duration::from_secs(1) {
        format!("{}ms", duration.as_millis())
    } else if duration < Duration::from_secs(60) {
        format!("{:.1}s", duration.as_secs_f64())
    } else if duration < Duration::from_secs(3600) {
        let total = duration.as_secs();
        format!("{}m{}s", total / 60, total % 60)
    } else {
        let total = duration.as_secs();
        format!("{}h{}m", total / 3600, (total % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_line_carries_all_fields() {
        let progress = Progress {
            processed: 50,
            total: 200,
            percentage: 25.0,
            success_rate: 98.0,
            average_duration: Duration::from_millis(120),
            elapsed: Duration::from_secs(10),
            estimated_time_left: Duration::from_secs(30),
            requests_per_second: 5.0,
        };

        let line = TextFormatter.format_progress(&progress);
        assert!(line.contains("50/200"));
        assert!(line.contains("25.0%"));
        assert!(line.contains("98.0%"));
        assert!(line.contains("5.0 req/s"));
        assert!(line.contains("120ms"));
    }

    #[test]
    fn final_report_lists_labeled_fields() {
        let report = FinalReport {
            total_processed: 10,
            total_success: 9,
            total_errors: 1,
            success_rate: 90.0,
            average_duration: Duration::from_millis(250),
            min_duration: Duration::from_millis(100),
            max_duration: Duration::from_millis(900),
            total_duration: Duration::from_millis(2500),
        };

        let text = TextFormatter.format_final(&report);
        assert!(text.contains("Total Processed:  10"));
        assert!(text.contains("Success Rate:     90.0%"));
        assert!(text.contains("Min Duration:     100ms"));
        assert!(text.contains("Max Duration:     900ms"));
    }

    #[test]
    fn cache_report_shows_hit_rate() {
        let report = CacheReport {
            cache_hits: 2,
            cache_misses: 2,
            cache_hit_rate: 50.0,
            warm_up_time: Duration::from_secs(3),
            verify_time: Duration::from_secs(2),
        };

        let text = TextFormatter.format_cache(&report);
        assert!(text.contains("Cache Hits:        2"));
        assert!(text.contains("Cache Hit Rate:    50.0%"));
    }

    #[test]
    fn durations_render_by_magnitude() {
        assert_eq!(format_duration(Duration::ZERO), "N/A");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h2m");
    }
}
