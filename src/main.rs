use std::process::ExitCode;
use clap::Parser;
use log::{error, warn};
use music_library_tools::analyzers::annotator::{Annotator, GeminiAnnotator};
use music_library_tools::analyzers::{run_analysis, AnalyzeOptions};
use music_library_tools::cli::commands::{AnalyzeArgs, Cli, Commands, ConvertArgs};
use music_library_tools::utils::progress::ConsoleProgress;
use music_library_tools::{BatchRunner, ConversionPipeline, ConvertOptions, Result};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Convert(args) => convert(args),
        Commands::Analyze(args) => analyze(args),
    };

    // Only setup failures get here; per-file errors live in the report.
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn convert(args: &ConvertArgs) -> Result<()> {
    let options = ConvertOptions::from(args);

    println!("=== Starting Conversion ===");
    println!("Input directory: {}", options.input_dir.display());
    println!("Output directory: {}", options.output_dir.display());

    let pipeline = ConversionPipeline::with_ffmpeg(options)?;
    let run = pipeline.run_batch(&ConsoleProgress::new())?;

    if run.summary.total == 0 {
        println!("No files found to convert in the input directory.");
    }
    match &run.report {
        Some(report) => {
            println!("\nSummary saved to: {}", report.summary.display());
            println!("Errors saved to: {}", report.errors.display());
        }
        None => println!("\nThe run report could not be saved; see the log above."),
    }
    println!("\n=== Conversion Complete ===");
    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let options = AnalyzeOptions::from(args);

    println!("=== Starting Library Analysis ===");
    println!("Music directory: {}", options.music_dir.display());

    // Missing credentials downgrade to a plain analysis rather than failing.
    let annotator = if args.use_ai {
        match args.api_key.as_deref().map(|key| GeminiAnnotator::new(key, args.model.as_str())) {
            Some(Ok(annotator)) => Some(annotator),
            Some(Err(e)) => {
                warn!("AI analysis disabled: {}", e);
                None
            }
            None => {
                warn!("AI analysis disabled: GEMINI_API_KEY is not set");
                None
            }
        }
    } else {
        None
    };

    let done = run_analysis(&options, annotator.as_ref().map(|a| a as &dyn Annotator))?;

    println!("\nAnalyzed {} files in {:.2} seconds", done.tracks, done.summary.scan_seconds);
    println!("Metadata saved to: {}", done.paths.metadata_json.display());
    println!("Summary saved to: {}", done.paths.summary.display());
    if let Some(path) = &done.paths.ai_analysis {
        println!("AI analysis saved to: {}", path.display());
    }
    println!("\n=== Library Analysis Complete ===");
    Ok(())
}
