use std::time::{Duration, SystemTime};

use serde_json::json;

use super::ReportFormatter;
use crate::stats::{CacheReport, FinalReport, Progress};

pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format_progress(&self, progress: &Progress) -> String {
        let data = json!({
            "timestamp": timestamp(),
            "processed": progress.processed,
            "total": progress.total,
            "percentage": progress.percentage,
            "success_rate": progress.success_rate,
            "average_duration": duration_value(progress.average_duration),
            "elapsed_time": duration_value(progress.elapsed),
            "estimated_time_left": duration_value(progress.estimated_time_left),
            "requests_per_second": progress.requests_per_second,
        });
        serde_json::to_string_pretty(&data).unwrap_or_default()
    }

    fn format_final(&self, report: &FinalReport) -> String {
        let data = json!({
            "timestamp": timestamp(),
            "total_processed": report.total_processed,
            "total_success": report.total_success,
            "total_errors": report.total_errors,
            "success_rate": report.success_rate,
            "average_duration": duration_value(report.average_duration),
            "min_duration": duration_value(report.min_duration),
            "max_duration": duration_value(report.max_duration),
            "total_duration": duration_value(report.total_duration),
        });
        serde_json::to_string_pretty(&data).unwrap_or_default()
    }

    fn format_cache(&self, report: &CacheReport) -> String {
        let data = json!({
            "timestamp": timestamp(),
            "cache_hits": report.cache_hits,
            "cache_misses": report.cache_misses,
            "cache_hit_rate": report.cache_hit_rate,
            "warm_up_time": duration_value(report.warm_up_time),
            "verify_time": duration_value(report.verify_time),
        });
        serde_json::to_string_pretty(&data).unwrap_or_default()
    }
}

fn timestamp() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

fn duration_value(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_emits_a_single_object() {
        let progress = Progress {
            processed: 3,
            total: 10,
            percentage: 30.0,
            success_rate: 100.0,
            average_duration: Duration::from_millis(150),
            elapsed: Duration::from_secs(1),
            estimated_time_left: Duration::from_secs(2),
            requests_per_second: 3.0,
        };

        let raw = JsonFormatter.format_progress(&progress);
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");

        assert_eq!(value["processed"], 3);
        assert_eq!(value["total"], 10);
        assert_eq!(value["percentage"], 30.0);
        assert!(value["timestamp"].is_string());
        assert_eq!(value["average_duration"], "150ms");
    }

    #[test]
    fn final_report_round_trips_through_serde() {
        let report = FinalReport {
            total_processed: 10,
            total_success: 8,
            total_errors: 2,
            success_rate: 80.0,
            average_duration: Duration::from_secs(1),
            min_duration: Duration::from_millis(10),
            max_duration: Duration::from_secs(3),
            total_duration: Duration::from_secs(10),
        };

        let raw = JsonFormatter.format_final(&report);
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");

        assert_eq!(value["total_processed"], 10);
        assert_eq!(value["total_errors"], 2);
        assert_eq!(value["min_duration"], "10ms");
        assert_eq!(value["max_duration"], "3s");
    }

    #[test]
    fn cache_report_carries_hit_rate() {
        let report = CacheReport {
            cache_hits: 5,
            cache_misses: 5,
            cache_hit_rate: 50.0,
            warm_up_time: Duration::from_secs(4),
            verify_time: Duration::from_secs(3),
        };

        let raw = JsonFormatter.format_cache(&report);
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");

        assert_eq!(value["cache_hits"], 5);
        assert_eq!(value["cache_hit_rate"], 50.0);
        assert_eq!(value["warm_up_time"], "4s");
    }
}
