pub mod annotator;
pub mod library;

use std::path::PathBuf;
use std::time::Instant;
use log::{info, warn};
use crate::audio::metadata::MetadataExtractor;
use crate::utils::reporting::{AnalysisPaths, Reporter};
use crate::Result;
use annotator::{Annotator, NO_AI_RESPONSE};
use library::{LibraryAnalyzer, LibrarySummary};

#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub music_dir: PathBuf,
    pub summary_dir: PathBuf,
    pub workers: Option<usize>,
}

#[derive(Debug)]
pub struct CompletedAnalysis {
    pub summary: LibrarySummary,
    pub tracks: usize,
    pub paths: AnalysisPaths,
}

/// Scans the library, summarizes it, optionally asks `annotator` for
/// commentary, and writes everything under a timestamped folder.
///
/// An annotation failure is not fatal: the summary records a fixed
/// "no response" note and no AI text file is written.
pub fn run_analysis(options: &AnalyzeOptions, annotator: Option<&dyn Annotator>) -> Result<CompletedAnalysis> {
    let started = Instant::now();
    let extractor = MetadataExtractor::new()?;
    let tracks = extractor.process_directory(&options.music_dir, options.workers)?;
    let elapsed = started.elapsed().as_secs_f64();

    let mut summary = LibraryAnalyzer::new().summarize(&tracks, elapsed);

    let mut ai_text = None;
    if let Some(annotator) = annotator {
        info!("Using AI for additional analysis, this may take a moment...");
        match annotator.annotate(&summary) {
            Ok(text) => {
                summary.ai_analysis = Some(text.clone());
                ai_text = Some(text);
            }
            Err(e) => {
                warn!("AI analysis failed: {}", e);
                summary.ai_analysis = Some(NO_AI_RESPONSE.to_string());
            }
        }
    }

    let paths = Reporter::new().write_library_report(&tracks, &summary, ai_text.as_deref(), &options.summary_dir)?;
    Ok(CompletedAnalysis {
        summary,
        tracks: tracks.len(),
        paths,
    })
}
