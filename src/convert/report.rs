use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use serde::Serialize;
use crate::convert::work_item::{ItemOutcome, ItemStatus, SkipReason};
use crate::SourceKind;

/// Thread-safe accumulator of terminal outcomes for one batch.
///
/// Outcomes are kept in completion order. Nothing is written to disk until
/// the batch is finalized.
#[derive(Debug)]
pub struct RunReport {
    started: Instant,
    expected: usize,
    outcomes: Mutex<Vec<ItemOutcome>>,
}

impl RunReport {
    pub fn new(expected: usize) -> Self {
        Self {
            started: Instant::now(),
            expected,
            outcomes: Mutex::new(Vec::with_capacity(expected)),
        }
    }

    /// Appends an outcome and returns how many items have completed so far.
    pub fn record(&self, outcome: ItemOutcome) -> usize {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        outcomes.push(outcome);
        outcomes.len()
    }

    pub fn completed(&self) -> usize {
        self.outcomes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn finalize(self) -> RunSummary {
        let elapsed_seconds = self.started.elapsed().as_secs_f64();
        let outcomes = self.outcomes.into_inner().unwrap_or_else(|e| e.into_inner());
        RunSummary::from_outcomes(outcomes, elapsed_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningEntry {
    pub source: PathBuf,
    pub message: String,
}

/// Aggregated result of a finished batch.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    /// Audio files encoded in this run.
    pub succeeded: usize,
    /// Extra files mirrored in this run.
    pub copied: usize,
    /// Items whose output already existed.
    pub skipped: usize,
    /// Items never dispatched because the batch was cancelled.
    pub cancelled: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub average_seconds_per_file: f64,
    pub files_per_second: f64,
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<WarningEntry>,
    #[serde(skip)]
    pub outcomes: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<ItemOutcome>, elapsed_seconds: f64) -> Self {
        let mut summary = RunSummary {
            total: outcomes.len(),
            succeeded: 0,
            copied: 0,
            skipped: 0,
            cancelled: 0,
            failed: 0,
            elapsed_seconds: round2(elapsed_seconds),
            average_seconds_per_file: 0.0,
            files_per_second: 0.0,
            errors: Vec::new(),
            warnings: Vec::new(),
            outcomes: Vec::new(),
        };

        let mut busy_seconds = 0.0;
        let mut ran = 0usize;
        for outcome in &outcomes {
            match (outcome.status, outcome.kind) {
                (ItemStatus::Succeeded, SourceKind::Extra) => summary.copied += 1,
                (ItemStatus::Succeeded, SourceKind::Audio(_)) => summary.succeeded += 1,
                (ItemStatus::Skipped(SkipReason::AlreadyConverted), _) => summary.skipped += 1,
                (ItemStatus::Skipped(SkipReason::Cancelled), _) => summary.cancelled += 1,
                (ItemStatus::Failed, _) => {
                    summary.failed += 1;
                    summary.errors.push(ErrorEntry {
                        source: outcome.source.clone(),
                        destination: outcome.destination.clone(),
                        message: outcome.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                    });
                }
            }
            for warning in &outcome.warnings {
                summary.warnings.push(WarningEntry {
                    source: outcome.source.clone(),
                    message: warning.clone(),
                });
            }
            if outcome.ran() {
                ran += 1;
                busy_seconds += outcome.elapsed.as_secs_f64();
            }
        }

        if ran > 0 {
            summary.average_seconds_per_file = round2(busy_seconds / ran as f64);
        }
        if elapsed_seconds > 0.0 {
            summary.files_per_second = round2(summary.total as f64 / elapsed_seconds);
        }
        summary.outcomes = outcomes;
        summary
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.copied + self.skipped + self.cancelled + self.failed
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceFormat;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn outcome(name: &str, kind: SourceKind, status: ItemStatus, error: Option<&str>) -> ItemOutcome {
        ItemOutcome {
            source: PathBuf::from(format!("/music/{}", name)),
            relative_path: PathBuf::from(name),
            destination: PathBuf::from(format!("/out/{}", name)),
            kind,
            status,
            error: error.map(String::from),
            warnings: Vec::new(),
            elapsed: Duration::from_millis(500),
        }
    }

    #[test]
    fn completed_catches_up_with_expected() {
        let audio = SourceKind::Audio(SourceFormat::Flac);
        let report = RunReport::new(2);
        report.record(outcome("a.flac", audio, ItemStatus::Succeeded, None));
        assert_eq!((report.completed(), report.expected()), (1, 2));
        report.record(outcome("b.flac", audio, ItemStatus::Failed, Some("exit 1")));
        assert_eq!(report.completed(), report.expected());
    }

    #[test]
    fn counts_each_status_once() {
        let audio = SourceKind::Audio(SourceFormat::Flac);
        let report = RunReport::new(5);
        report.record(outcome("a.flac", audio, ItemStatus::Succeeded, None));
        report.record(outcome("b.flac", audio, ItemStatus::Skipped(SkipReason::AlreadyConverted), None));
        report.record(outcome("c.flac", audio, ItemStatus::Failed, Some("exit 1")));
        report.record(outcome("d.flac", audio, ItemStatus::Skipped(SkipReason::Cancelled), None));
        let done = report.record(outcome("cover.jpg", SourceKind::Extra, ItemStatus::Succeeded, None));
        assert_eq!(done, 5);

        let summary = report.finalize();
        assert_eq!(
            (summary.total, summary.succeeded, summary.copied, summary.skipped, summary.cancelled, summary.failed),
            (5, 1, 1, 1, 1, 1)
        );
        assert_eq!(summary.processed(), summary.total);
        assert_eq!(
            summary.errors,
            vec![ErrorEntry {
                source: PathBuf::from("/music/c.flac"),
                destination: PathBuf::from("/out/c.flac"),
                message: "exit 1".to_string(),
            }]
        );
        // Three items ran, each for half a second.
        assert_eq!(summary.average_seconds_per_file, 0.5);
    }

    #[test]
    fn warnings_do_not_change_status_counts() {
        let mut item = outcome("a.flac", SourceKind::Audio(SourceFormat::Flac), ItemStatus::Succeeded, None);
        item.warnings.push("cover.jpg: permission denied".into());
        let summary = RunSummary::from_outcomes(vec![item], 1.0);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.files_per_second, 1.0);
    }

    #[test]
    fn serialized_summary_has_report_fields() {
        let summary = RunSummary::from_outcomes(Vec::new(), 0.0);
        let value = serde_json::to_value(&summary).unwrap();
        for key in ["total", "succeeded", "skipped", "failed", "elapsed_seconds", "errors"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert!(value.get("outcomes").is_none());
    }
}
