//! Final outcome of an acquisition run

use std::time::Duration;

use serde::Serialize;

use super::plan::AcquisitionPlan;
use crate::app::models::format_file_size;
use crate::app::worker::{DownloadReport, FailedTask};

/// Counts handed back to the caller after every run
///
/// A run with failures is still a normal completion; the counts are always
/// filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcquisitionReport {
    /// Unique records returned by the search (or loaded from file)
    pub records_found: usize,
    /// Project buckets with at least one task
    pub projects: usize,
    /// Tasks enqueued
    pub tasks_planned: usize,
    pub downloaded: u64,
    pub skipped: u64,
    /// Failed transfers plus records that could not become tasks
    pub failed: u64,
    /// Tasks dropped by a stop before any worker claimed them
    pub cancelled: u64,
    pub bytes_downloaded: u64,
    pub failures: Vec<FailedTask>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl AcquisitionReport {
    /// Combine the plan with the pool's outcome
    pub fn new(
        records_found: usize,
        plan: &AcquisitionPlan,
        download: DownloadReport,
        elapsed: Duration,
    ) -> Self {
        let mut failures = plan.invalid.clone();
        failures.extend(download.failures);

        Self {
            records_found,
            projects: plan.projects.len(),
            tasks_planned: plan.task_count(),
            downloaded: download.downloaded,
            skipped: download.skipped,
            failed: download.failed + plan.invalid.len() as u64,
            cancelled: download.cancelled,
            bytes_downloaded: download.bytes_downloaded,
            failures,
            elapsed,
        }
    }

    /// Report for a run that found nothing to download
    pub fn empty(records_found: usize, plan: &AcquisitionPlan, elapsed: Duration) -> Self {
        Self::new(records_found, plan, DownloadReport::default(), elapsed)
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    /// One-line summary, e.g. `"3 downloaded (1.5 MB), 2 skipped, 0 failed"`
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} downloaded ({}), {} skipped, {} failed",
            self.downloaded,
            format_file_size(self.bytes_downloaded),
            self.skipped,
            self.failed
        );
        if self.cancelled > 0 {
            line.push_str(&format!(", {} cancelled", self.cancelled));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_report_counts_invalid_records_as_failed() {
        let plan = AcquisitionPlan {
            projects: Vec::new(),
            invalid: vec![FailedTask {
                key: "bad".to_string(),
                local_path: PathBuf::from("out/Unknown/bad"),
                error: "Invalid download locator".to_string(),
            }],
        };
        let download = DownloadReport {
            downloaded: 3,
            skipped: 2,
            failed: 1,
            bytes_downloaded: 1536,
            failures: vec![FailedTask {
                key: "k".to_string(),
                local_path: PathBuf::from("out/P/k"),
                error: "Object not found: k".to_string(),
            }],
            ..Default::default()
        };

        let report = AcquisitionReport::new(7, &plan, download, Duration::from_secs(1));
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].key, "bad");
        assert!(!report.is_complete_success());
        assert_eq!(
            report.summary_line(),
            "3 downloaded (1.5 KB), 2 skipped, 2 failed"
        );
    }

    #[test]
    fn test_summary_mentions_cancelled() {
        let report = AcquisitionReport {
            cancelled: 4,
            ..Default::default()
        };
        assert!(report.summary_line().ends_with(", 4 cancelled"));
    }
}
