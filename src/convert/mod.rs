pub mod report;
pub mod resume;
pub mod scheduler;
pub mod work_item;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use log::{error, info, warn};
use crate::audio::cover_art::CoverArtCopier;
use crate::audio::discovery::FileDiscovery;
use crate::audio::encoder::{Encoder, EncoderInvoker, FfmpegEncoder};
use crate::utils::file_ops::copy_atomic;
use crate::utils::progress::ProgressSink;
use crate::utils::reporting::{ReportPaths, Reporter};
use crate::{Result, SourceKind};
use report::{RunReport, RunSummary};
use resume::{ResumeDecision, ResumeGuard};
use scheduler::{CancellationToken, ParallelScheduler};
use work_item::{ConversionWorkItem, ItemOutcome, SkipReason};

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Everything a conversion run needs to know, passed explicitly.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// `None` means one worker per available CPU.
    pub workers: Option<usize>,
    /// Re-encode even when output already exists.
    pub force: bool,
    /// Per-item encoder time limit; 0 disables it.
    pub timeout_secs: u64,
    pub encoder: String,
    pub logs_dir: PathBuf,
    /// Mirror non-audio files into the output tree too.
    pub copy_extras: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("converted"),
            workers: None,
            force: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            encoder: "ffmpeg".to_string(),
            logs_dir: PathBuf::from("logs"),
            copy_extras: false,
        }
    }
}

impl ConvertOptions {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// A finished batch and where its report was written.
#[derive(Debug)]
pub struct CompletedRun {
    pub summary: RunSummary,
    /// `None` when the report could not be written.
    pub report: Option<ReportPaths>,
}

/// The one capability every front-end drives: run a batch, stream progress
/// into `sink`, persist and return the report. Only setup failures are
/// errors; a batch that ran is returned even if its report could not be
/// saved.
pub trait BatchRunner {
    fn run_batch(&self, sink: &dyn ProgressSink) -> Result<CompletedRun>;
}

/// Discovery, resume check, encoding and reporting wired together.
pub struct ConversionPipeline {
    options: ConvertOptions,
    invoker: EncoderInvoker,
    resume: ResumeGuard,
    scheduler: ParallelScheduler,
    cancel: CancellationToken,
}

impl ConversionPipeline {
    pub fn new(options: ConvertOptions, encoder: Arc<dyn Encoder>) -> Result<Self> {
        // With extras enabled, cover images are ordinary copy items already.
        let cover_art = if options.copy_extras {
            None
        } else {
            Some(CoverArtCopier::new()?)
        };

        Ok(Self {
            invoker: EncoderInvoker::new(encoder).with_cover_art(cover_art),
            resume: ResumeGuard::new(!options.force),
            scheduler: ParallelScheduler::new(options.workers),
            cancel: CancellationToken::new(),
            options,
        })
    }

    /// Uses the external encoder named in the options, failing up front if
    /// it cannot be launched.
    pub fn with_ffmpeg(options: ConvertOptions) -> Result<Self> {
        let encoder = FfmpegEncoder::new(options.encoder.clone()).with_timeout(options.timeout());
        encoder.probe()?;
        Self::new(options, Arc::new(encoder))
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Handle for stopping dispatch from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the batch without persisting a report.
    ///
    /// Only setup problems (bad input directory, unusable output directory)
    /// return an error; per-file failures end up in the summary.
    pub fn run(&self, sink: &dyn ProgressSink) -> Result<RunSummary> {
        let discovery = FileDiscovery::new(&self.options.input_dir, self.options.output_dir.clone())?
            .with_extras(self.options.copy_extras);
        let sources = discovery.discover()?;

        info!(
            "Converting {} files from {} to {} with {} workers{}",
            sources.len(),
            discovery.input_root().display(),
            discovery.output_root().display(),
            self.scheduler.workers(),
            if self.resume.is_enabled() { "" } else { " (forced)" }
        );

        let report = RunReport::new(sources.len());
        sink.started(sources.len());
        self.scheduler
            .run(&sources, &self.cancel, &report, sink, |item| self.process_item(item))?;

        if report.completed() != report.expected() {
            warn!(
                "{} files discovered but {} outcomes recorded",
                report.expected(),
                report.completed()
            );
        }
        let summary = report.finalize();
        sink.finished(&summary);
        Ok(summary)
    }

    fn process_item(&self, item: ConversionWorkItem<'_>) -> ItemOutcome {
        if self.resume.check(item.destination()) == ResumeDecision::ShouldSkip {
            return item.skip(SkipReason::AlreadyConverted);
        }

        let source = item.source();
        match source.kind {
            SourceKind::Audio(_) => match self.invoker.invoke(&source.path, &source.destination) {
                Ok(success) => item.succeed(success.warnings),
                Err(e) => {
                    warn!("Failed to convert {}: {}", source.path.display(), e);
                    item.fail(e.to_string())
                }
            },
            SourceKind::Extra => match copy_atomic(&source.path, &source.destination) {
                Ok(_) => item.succeed(Vec::new()),
                Err(e) => {
                    warn!("Failed to copy {}: {}", source.path.display(), e);
                    item.fail(format!("copy failed: {}", e))
                }
            },
        }
    }
}

impl BatchRunner for ConversionPipeline {
    fn run_batch(&self, sink: &dyn ProgressSink) -> Result<CompletedRun> {
        let summary = self.run(sink)?;
        let report = match Reporter::new().write_run_report(&summary, &self.options.logs_dir) {
            Ok(paths) => Some(paths),
            Err(e) => {
                error!("Could not save the run report under {}: {}", self.options.logs_dir.display(), e);
                None
            }
        };
        Ok(CompletedRun { summary, report })
    }
}
