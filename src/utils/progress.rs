use std::sync::mpsc::Sender;
use std::sync::Mutex;
use indicatif::{ProgressBar, ProgressStyle};
use crate::convert::report::RunSummary;
use crate::convert::work_item::{ItemOutcome, ItemStatus, SkipReason};
use crate::SourceKind;

/// Receives batch progress. Front-ends implement this; the pipeline calls it
/// the same way no matter who is listening.
pub trait ProgressSink: Send + Sync {
    fn started(&self, _total: usize) {}
    fn item_finished(&self, outcome: &ItemOutcome, done: usize, total: usize);
    fn finished(&self, _summary: &RunSummary) {}
}

/// Discards all progress.
pub struct QuietProgress;

impl ProgressSink for QuietProgress {
    fn item_finished(&self, _outcome: &ItemOutcome, _done: usize, _total: usize) {}
}

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA {eta}) {msg}";

/// Terminal progress bar with throughput and ETA. Errors and warnings are
/// printed above the bar.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Drives an existing bar, for example a hidden one.
    pub fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
        self.bar.set_message("Converting files");
    }

    fn item_finished(&self, outcome: &ItemOutcome, _done: usize, _total: usize) {
        let label = match outcome.status {
            ItemStatus::Succeeded => match outcome.kind {
                SourceKind::Audio(_) => "Converted",
                SourceKind::Extra => "Copied",
            },
            ItemStatus::Skipped(SkipReason::AlreadyConverted) => "Skipped",
            ItemStatus::Skipped(SkipReason::Cancelled) => "Cancelled",
            ItemStatus::Failed => "Failed",
        };

        if let Some(error) = &outcome.error {
            self.bar
                .println(format!("{}: {}: {}", label, outcome.relative_path.display(), error));
        }
        for warning in &outcome.warnings {
            self.bar
                .println(format!("warning: {}: {}", outcome.relative_path.display(), warning));
        }
        self.bar
            .set_message(format!("{}: {}", label, outcome.relative_path.display()));
        self.bar.inc(1);
    }

    fn finished(&self, summary: &RunSummary) {
        self.bar.finish_with_message("Done");
        println!("\nConversion Summary:");
        println!("Total files: {}", summary.total);
        println!("Converted: {}", summary.succeeded);
        if summary.copied > 0 {
            println!("Copied: {}", summary.copied);
        }
        println!("Skipped (already converted): {}", summary.skipped);
        if summary.cancelled > 0 {
            println!("Cancelled: {}", summary.cancelled);
        }
        println!("Failed: {}", summary.failed);
        println!("Elapsed: {:.2}s ({:.2}s per file on average)", summary.elapsed_seconds, summary.average_seconds_per_file);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { total: usize },
    ItemFinished { outcome: ItemOutcome, done: usize, total: usize },
    Finished { total: usize, failed: usize },
}

/// Forwards progress over a channel, for front-ends running the batch on a
/// background thread.
pub struct ChannelProgress {
    sender: Mutex<Sender<ProgressEvent>>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }

    fn send(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.sender.lock().unwrap_or_else(|e| e.into_inner()).send(event);
    }
}

impl ProgressSink for ChannelProgress {
    fn started(&self, total: usize) {
        self.send(ProgressEvent::Started { total });
    }

    fn item_finished(&self, outcome: &ItemOutcome, done: usize, total: usize) {
        self.send(ProgressEvent::ItemFinished {
            outcome: outcome.clone(),
            done,
            total,
        });
    }

    fn finished(&self, summary: &RunSummary) {
        self.send(ProgressEvent::Finished {
            total: summary.total,
            failed: summary.failed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::work_item::ConversionWorkItem;
    use crate::{SourceFile, SourceFormat};
    use std::path::PathBuf;
    use std::sync::mpsc;

    #[test]
    fn channel_progress_forwards_events_in_order() {
        let (tx, rx) = mpsc::channel();
        let sink = ChannelProgress::new(tx);
        let source = SourceFile {
            path: PathBuf::from("/music/a.flac"),
            relative_path: PathBuf::from("a.flac"),
            kind: SourceKind::Audio(SourceFormat::Flac),
            destination: PathBuf::from("/out/a.mp3"),
        };
        let outcome = ConversionWorkItem::new(&source).succeed(Vec::new());
        let summary = RunSummary::from_outcomes(vec![outcome.clone()], 1.0);

        sink.started(1);
        sink.item_finished(&outcome, 1, 1);
        sink.finished(&summary);
        drop(sink);

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ProgressEvent::Started { total: 1 });
        assert!(matches!(&events[1], ProgressEvent::ItemFinished { done: 1, total: 1, .. }));
        assert_eq!(events[2], ProgressEvent::Finished { total: 1, failed: 0 });
    }

    #[test]
    fn console_progress_advances_once_per_item() {
        let sink = ConsoleProgress::with_bar(ProgressBar::hidden());
        let source = SourceFile {
            path: PathBuf::from("/music/a.flac"),
            relative_path: PathBuf::from("a.flac"),
            kind: SourceKind::Audio(SourceFormat::Flac),
            destination: PathBuf::from("/out/a.mp3"),
        };
        let failed = ConversionWorkItem::new(&source).fail("exit 1");
        let skipped = ConversionWorkItem::new(&source).skip(SkipReason::AlreadyConverted);

        sink.started(3);
        sink.item_finished(&failed, 1, 3);
        sink.item_finished(&skipped, 2, 3);
        assert_eq!(sink.bar().length(), Some(3));
        assert_eq!(sink.bar().position(), 2);
        assert_eq!(sink.bar().message(), "Skipped: a.flac");

        let summary = RunSummary::from_outcomes(vec![failed, skipped], 1.0);
        sink.finished(&summary);
        assert!(sink.bar().is_finished());
    }

    #[test]
    fn channel_progress_survives_a_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        ChannelProgress::new(tx).started(3);
    }
}
