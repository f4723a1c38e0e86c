use std::fs;
use std::path::{Path, PathBuf};
use csv::Writer;
use log::info;
use serde::Serialize;
use crate::analyzers::library::LibrarySummary;
use crate::convert::report::{ErrorEntry, RunSummary};
use crate::utils::file_ops::write_atomic;
use crate::{Result, TrackMetadata};

/// Run timestamp in `ddmmyyyy_hhmmss` form, used to name output folders.
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%d%m%Y_%H%M%S").to_string()
}

/// Files written for one conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub directory: PathBuf,
    pub summary: PathBuf,
    pub errors: PathBuf,
}

/// Files written for one library analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPaths {
    pub directory: PathBuf,
    pub metadata_json: PathBuf,
    pub metadata_csv: PathBuf,
    pub summary: PathBuf,
    pub ai_analysis: Option<PathBuf>,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Creates a fresh `<root>/<timestamp>` directory. Runs started within
    /// the same second get a numeric suffix instead of sharing a folder.
    pub fn create_run_directory(&self, root: impl AsRef<Path>) -> Result<PathBuf> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let stamp = run_timestamp();
        let mut candidate = root.join(&stamp);
        let mut counter = 1;
        while candidate.exists() {
            candidate = root.join(format!("{}_{}", stamp, counter));
            counter += 1;
        }
        fs::create_dir(&candidate)?;
        Ok(candidate)
    }

    /// Writes the summary and error list of a finished conversion run.
    /// Each file is written once and atomically.
    pub fn write_run_report(&self, summary: &RunSummary, logs_dir: impl AsRef<Path>) -> Result<ReportPaths> {
        let directory = self.create_run_directory(logs_dir)?;
        let summary_path = directory.join("log_summary.json");
        let errors_path = directory.join("log_errors.json");

        write_json(&summary_path, summary)?;
        write_json::<Vec<ErrorEntry>>(&errors_path, &summary.errors)?;

        info!("Summary saved to: {}", summary_path.display());
        info!("Errors saved to: {}", errors_path.display());
        Ok(ReportPaths {
            directory,
            summary: summary_path,
            errors: errors_path,
        })
    }

    /// Writes per-track metadata (JSON and CSV), the library summary and,
    /// when present, the AI analysis text.
    pub fn write_library_report(
        &self,
        tracks: &[TrackMetadata],
        summary: &LibrarySummary,
        ai_text: Option<&str>,
        summary_dir: impl AsRef<Path>,
    ) -> Result<AnalysisPaths> {
        let directory = self.create_run_directory(summary_dir)?;
        let metadata_json = directory.join("library_metadata.json");
        let metadata_csv = directory.join("library_metadata.csv");
        let summary_path = directory.join("library_summary.json");

        write_json(&metadata_json, &tracks)?;
        self.write_tracks_csv(tracks, &metadata_csv)?;
        write_json(&summary_path, summary)?;

        let ai_analysis = match ai_text {
            Some(text) => {
                let path = directory.join("library_summary_ai.txt");
                write_atomic(&path, format!("AI analysis:\n\n{}\n", text).as_bytes())?;
                Some(path)
            }
            None => None,
        };

        Ok(AnalysisPaths {
            directory,
            metadata_json,
            metadata_csv,
            summary: summary_path,
            ai_analysis,
        })
    }

    pub fn write_tracks_csv(&self, tracks: &[TrackMetadata], output_path: impl AsRef<Path>) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        let mut writer = Writer::from_path(output_path_ref)?;

        writer.write_record([
            "Path", "Title", "Artist", "Album Artist", "Album", "Year", "Track", "Disc",
            "Publisher", "Composer", "Genre", "Duration (s)", "Bitrate (kbps)",
        ])?;

        for track in tracks {
            writer.write_record([
                track.path.display().to_string(),
                track.title.clone(),
                track.artist.clone(),
                track.album_artist.clone(),
                track.album.clone(),
                track.year.clone(),
                track.track.clone(),
                track.disc.clone(),
                track.publisher.clone(),
                track.composer.clone(),
                track.genre.clone(),
                format!("{:.2}", track.duration_secs),
                track.bitrate_kbps.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)?;
    Ok(())
}
