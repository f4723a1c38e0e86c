use std::path::{Path, PathBuf};
use serde::Serialize;

pub mod analyzers;
pub mod audio;
pub mod cli;
pub mod convert;
pub mod utils;

/// Lossless source formats the converter re-encodes to MP3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Flac,
    Wav,
    Ogg,
    M4a,
}

impl SourceFormat {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "flac" => Some(SourceFormat::Flac),
            "wav" => Some(SourceFormat::Wav),
            "ogg" => Some(SourceFormat::Ogg),
            "m4a" => Some(SourceFormat::M4a),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Flac => "flac",
            SourceFormat::Wav => "wav",
            SourceFormat::Ogg => "ogg",
            SourceFormat::M4a => "m4a",
        }
    }
}

/// What the pipeline does with a discovered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Re-encoded to MP3.
    Audio(SourceFormat),
    /// Mirrored byte-for-byte (only discovered when extras are enabled).
    Extra,
}

/// A file found under the library root. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    pub kind: SourceKind,
    pub destination: PathBuf,
}

impl SourceFile {
    pub fn is_audio(&self) -> bool {
        matches!(self.kind, SourceKind::Audio(_))
    }
}

/// Tag and stream information read from one track by the library analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub year: String,
    pub track: String,
    pub disc: String,
    pub publisher: String,
    pub composer: String,
    pub genre: String,
    pub duration_secs: f64,
    pub bitrate_kbps: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot scan {}: {reason}", .path.display())]
    Discovery { path: PathBuf, reason: String },
    #[error("Encoder '{program}' is not usable: {reason}")]
    EncoderNotFound { program: String, reason: String },
    #[error("Metadata extraction error: {0}")]
    Metadata(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("AI annotation error: {0}")]
    Annotation(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

// Re-exports for convenience
pub use audio::discovery::FileDiscovery;
pub use audio::encoder::{EncodeError, Encoder, EncoderInvoker, FfmpegEncoder};
pub use audio::metadata::MetadataExtractor;
pub use analyzers::library::{LibraryAnalyzer, LibrarySummary};
pub use convert::{BatchRunner, ConversionPipeline, ConvertOptions};
pub use convert::report::{RunReport, RunSummary};
pub use convert::scheduler::{CancellationToken, ParallelScheduler};
pub use utils::progress::ProgressSink;
