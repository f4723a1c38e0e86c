use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use serde::Serialize;
use crate::{SourceFile, SourceKind};

/// Why an item was skipped without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A non-empty output from an earlier run already exists.
    AlreadyConverted,
    /// The batch was cancelled before this item was dispatched.
    Cancelled,
}

/// Terminal status of a work item. An item that is still pending is a live
/// [`ConversionWorkItem`]; it has no status value of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Skipped(SkipReason),
    Succeeded,
    Failed,
}

/// One pending source-to-destination task, owned by the worker that
/// claimed it.
///
/// The item can only stop being pending by being consumed into an
/// [`ItemOutcome`], so each item transitions exactly once.
#[derive(Debug)]
pub struct ConversionWorkItem<'a> {
    source: &'a SourceFile,
    claimed_at: Instant,
}

impl<'a> ConversionWorkItem<'a> {
    pub fn new(source: &'a SourceFile) -> Self {
        Self {
            source,
            claimed_at: Instant::now(),
        }
    }

    pub fn source(&self) -> &'a SourceFile {
        self.source
    }

    pub fn destination(&self) -> &'a Path {
        &self.source.destination
    }

    pub fn skip(self, reason: SkipReason) -> ItemOutcome {
        self.finish(ItemStatus::Skipped(reason), None, Vec::new())
    }

    pub fn succeed(self, warnings: Vec<String>) -> ItemOutcome {
        self.finish(ItemStatus::Succeeded, None, warnings)
    }

    pub fn fail(self, message: impl Into<String>) -> ItemOutcome {
        self.finish(ItemStatus::Failed, Some(message.into()), Vec::new())
    }

    fn finish(self, status: ItemStatus, error: Option<String>, warnings: Vec<String>) -> ItemOutcome {
        ItemOutcome {
            source: self.source.path.clone(),
            relative_path: self.source.relative_path.clone(),
            destination: self.source.destination.clone(),
            kind: self.source.kind,
            status,
            error,
            warnings,
            elapsed: self.claimed_at.elapsed(),
        }
    }
}

/// Terminal result of a work item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub source: PathBuf,
    pub relative_path: PathBuf,
    pub destination: PathBuf,
    pub kind: SourceKind,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl ItemOutcome {
    /// True when the item did work (as opposed to being skipped).
    pub fn ran(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded | ItemStatus::Failed)
    }
}
