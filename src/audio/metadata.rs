use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use crate::utils::parallel::ParallelProcessor;
use crate::{LibraryError, Result, TrackMetadata};

/// Extensions the library analyzer reads.
pub const ANALYZED_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "aac", "ogg"];

/// Bitrate assumed when a file reports neither duration nor bitrate.
const FALLBACK_BITRATE_KBPS: u32 = 192;

pub struct MetadataExtractor {
    number_pattern: Regex,
}

impl ParallelProcessor for MetadataExtractor {}

impl MetadataExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number_pattern: Regex::new(r"^\d+(/\d+)?$")?,
        })
    }

    pub fn extract_metadata(&self, path: impl AsRef<Path>) -> Result<TrackMetadata> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let size_bytes = file.metadata()?.len();

        // Create media source stream
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint to help with format detection
        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| LibraryError::Metadata(format!("{}: {}", path.display(), e)))?;

        // ID3 tags in front of the stream land in the probe metadata; tags
        // inside the container land in the format reader.
        let mut tags: Vec<Tag> = Vec::new();
        if let Some(metadata) = probed.metadata.get() {
            if let Some(revision) = metadata.current() {
                tags.extend(revision.tags().iter().cloned());
            }
        }
        let mut format = probed.format;
        if let Some(revision) = format.metadata().current() {
            tags.extend(revision.tags().iter().cloned());
        }

        let mut track = TrackMetadata {
            path: path.to_path_buf(),
            ..Default::default()
        };

        let mut track_number = String::new();
        let mut track_total = String::new();
        let mut disc_number = String::new();
        let mut disc_total = String::new();

        for tag in &tags {
            let value = tag.value.to_string().trim().to_string();
            if value.is_empty() {
                continue;
            }
            // First non-empty value wins for each field.
            let slot = match tag.std_key {
                Some(StandardTagKey::TrackTitle) => &mut track.title,
                Some(StandardTagKey::Artist) => &mut track.artist,
                Some(StandardTagKey::AlbumArtist) => &mut track.album_artist,
                Some(StandardTagKey::Album) => &mut track.album,
                Some(StandardTagKey::Date) | Some(StandardTagKey::OriginalDate) => &mut track.year,
                Some(StandardTagKey::TrackNumber) => &mut track_number,
                Some(StandardTagKey::TrackTotal) => &mut track_total,
                Some(StandardTagKey::DiscNumber) => &mut disc_number,
                Some(StandardTagKey::DiscTotal) => &mut disc_total,
                Some(StandardTagKey::Label) => &mut track.publisher,
                Some(StandardTagKey::Composer) => &mut track.composer,
                Some(StandardTagKey::Genre) => &mut track.genre,
                _ => continue,
            };
            if slot.is_empty() {
                *slot = value;
            }
        }

        track.track = self.normalize_number(&join_total(&track_number, &track_total));
        track.disc = self.normalize_number(&join_total(&disc_number, &disc_total));

        let mut duration_secs = 0.0;
        if let Some(default_track) = format.default_track() {
            let params = &default_track.codec_params;
            if let Some(n_frames) = params.n_frames {
                if let Some(time_base) = params.time_base {
                    let time = time_base.calc_time(n_frames);
                    duration_secs = time.seconds as f64 + time.frac;
                } else if let Some(rate) = params.sample_rate.filter(|r| *r > 0) {
                    duration_secs = n_frames as f64 / rate as f64;
                }
            }
        }

        // The container does not report bitrate; derive it from the size.
        let (duration_secs, bitrate_kbps) = estimate_duration_and_bitrate(duration_secs, 0, size_bytes);
        track.duration_secs = duration_secs;
        track.bitrate_kbps = bitrate_kbps;
        Ok(track)
    }

    /// Keeps `N` and `N/M` digit forms; anything else becomes empty.
    pub fn normalize_number(&self, raw: &str) -> String {
        let raw = raw.trim();
        if self.number_pattern.is_match(raw) {
            raw.to_string()
        } else {
            String::new()
        }
    }

    pub fn collect_audio_files(dir_path: &Path) -> Vec<PathBuf> {
        walkdir::WalkDir::new(dir_path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Error accessing entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ANALYZED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect()
    }

    /// Reads every audio file under `dir` on `workers` threads. Files that
    /// cannot be read are logged and left out.
    pub fn process_directory(&self, dir: impl AsRef<Path>, workers: Option<usize>) -> Result<Vec<TrackMetadata>> {
        let dir_ref = dir.as_ref();
        if !dir_ref.is_dir() {
            return Err(LibraryError::Discovery {
                path: dir_ref.to_path_buf(),
                reason: "directory does not exist".to_string(),
            });
        }

        info!("Searching for audio files in {}", dir_ref.display());
        let paths = Self::collect_audio_files(dir_ref);
        info!("Found {} audio files", paths.len());
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let pool = Self::build_pool(Self::worker_count(workers))?;
        let progress = Self::get_progress_counter();
        let total_files = paths.len();

        let tracks = pool.install(|| {
            paths
                .par_iter()
                .map(|path| {
                    let result = self.extract_metadata(path);
                    let processed = progress.fetch_add(1, Ordering::SeqCst) + 1;
                    if processed % 100 == 0 || processed == total_files {
                        info!(
                            "Progress: {}/{} files ({:.1}%)",
                            processed,
                            total_files,
                            (processed as f64 / total_files as f64) * 100.0
                        );
                    }
                    result
                })
                .filter_map(|result| match result {
                    Ok(track) => Some(track),
                    Err(e) => {
                        warn!("Error processing file: {}", e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        });

        Ok(tracks)
    }
}

fn join_total(number: &str, total: &str) -> String {
    if !number.is_empty() && !total.is_empty() && !number.contains('/') {
        format!("{}/{}", number, total)
    } else {
        number.to_string()
    }
}

/// Fills in whichever of duration and bitrate is missing from the file size.
/// With neither known, assumes 192 kbps.
pub fn estimate_duration_and_bitrate(duration_secs: f64, bitrate_kbps: u32, size_bytes: u64) -> (f64, u32) {
    let bits = size_bytes as f64 * 8.0;
    match (duration_secs > 0.0, bitrate_kbps > 0) {
        (true, true) => (duration_secs, bitrate_kbps),
        (true, false) => (duration_secs, (bits / (duration_secs * 1000.0)) as u32),
        (false, true) => (bits / (bitrate_kbps as f64 * 1000.0), bitrate_kbps),
        (false, false) if size_bytes > 0 => {
            (bits / (FALLBACK_BITRATE_KBPS as f64 * 1000.0), FALLBACK_BITRATE_KBPS)
        }
        (false, false) => (0.0, 0),
    }
}
