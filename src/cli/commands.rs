use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use crate::analyzers::annotator::DEFAULT_MODEL;
use crate::analyzers::AnalyzeOptions;
use crate::convert::{ConvertOptions, DEFAULT_TIMEOUT_SECS};

#[derive(Parser)]
#[command(name = "music-tools")]
#[command(version = "1.0")]
#[command(about = "Batch MP3 conversion and metadata statistics for a music library", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert FLAC/WAV/OGG/M4A files to 320 kbps MP3, mirroring folders
    Convert(ConvertArgs),

    /// Summarize tag metadata of a music library
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Library directory to convert
    #[arg(long = "input_dir")]
    pub input_dir: PathBuf,

    /// Directory that receives the MP3 tree
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Parallel encoder processes (defaults to the number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Re-encode files even if a converted MP3 already exists
    #[arg(long)]
    pub force: bool,

    /// Kill an encoder running longer than this many seconds (0 = never)
    #[arg(long = "timeout_secs", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Encoder executable
    #[arg(long, env = "MP3_ENCODER", default_value = "ffmpeg")]
    pub encoder: String,

    /// Where run reports are written
    #[arg(long = "logs_dir", default_value = "logs")]
    pub logs_dir: PathBuf,

    /// Also copy non-audio files (images, lyrics, cue sheets) as-is
    #[arg(long = "copy_extras")]
    pub copy_extras: bool,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Directory to scan for audio files
    #[arg(long = "music_dir")]
    pub music_dir: PathBuf,

    /// Ask an AI model to comment on the summary
    #[arg(long = "use_ai")]
    pub use_ai: bool,

    /// Where summaries are written
    #[arg(long = "summary_dir", default_value = "summary")]
    pub summary_dir: PathBuf,

    /// Parallel readers (defaults to the number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Gemini API key
    #[arg(long = "api_key", env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Gemini model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

impl From<&ConvertArgs> for ConvertOptions {
    fn from(args: &ConvertArgs) -> Self {
        ConvertOptions {
            input_dir: args.input_dir.clone(),
            output_dir: args.output_dir.clone(),
            workers: args.workers,
            force: args.force,
            timeout_secs: args.timeout_secs,
            encoder: args.encoder.clone(),
            logs_dir: args.logs_dir.clone(),
            copy_extras: args.copy_extras,
        }
    }
}

impl From<&AnalyzeArgs> for AnalyzeOptions {
    fn from(args: &AnalyzeArgs) -> Self {
        AnalyzeOptions {
            music_dir: args.music_dir.clone(),
            summary_dir: args.summary_dir.clone(),
            workers: args.workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_convert_with_defaults() {
        let cli = Cli::try_parse_from([
            "music-tools", "convert", "--input_dir", "/music", "--output_dir", "/out", "--workers", "8",
        ])
        .unwrap();
        let Commands::Convert(args) = &cli.command else {
            panic!("expected convert");
        };
        let options = ConvertOptions::from(args);
        assert_eq!(options.input_dir, PathBuf::from("/music"));
        assert_eq!(options.output_dir, PathBuf::from("/out"));
        assert_eq!(options.workers, Some(8));
        assert!(!options.force);
        assert_eq!(options.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(options.logs_dir, PathBuf::from("logs"));
    }

    #[test]
    fn convert_requires_both_directories() {
        assert!(Cli::try_parse_from(["music-tools", "convert", "--input_dir", "/music"]).is_err());
    }

    #[test]
    fn parses_force_and_timeout() {
        let cli = Cli::try_parse_from([
            "music-tools", "convert", "--input_dir", "a", "--output_dir", "b", "--force", "--timeout_secs", "0",
        ])
        .unwrap();
        let Commands::Convert(args) = &cli.command else {
            panic!("expected convert");
        };
        let options = ConvertOptions::from(args);
        assert!(options.force);
        assert_eq!(options.timeout(), None);
    }

    #[test]
    fn parses_analyze_flags() {
        let cli = Cli::try_parse_from(["music-tools", "analyze", "--music_dir", "/music", "--use_ai"]).unwrap();
        let Commands::Analyze(args) = &cli.command else {
            panic!("expected analyze");
        };
        assert!(args.use_ai);
        assert_eq!(args.model, DEFAULT_MODEL);
        assert_eq!(AnalyzeOptions::from(args).summary_dir, PathBuf::from("summary"));
    }
}
