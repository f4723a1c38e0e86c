use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use log::info;
use serde::Serialize;
use crate::TrackMetadata;

#[derive(Debug, Serialize, Eq, PartialEq, Hash, Ord, PartialOrd, Clone, Copy)]
pub enum BitrateCategory {
    HighRes,       // 1500+ kbps
    Lossless,      // 700-1499 kbps
    High,          // 256-699 kbps
    Standard,      // 160-255 kbps
    Low,           // 64-159 kbps
    Unknown        // Everything else
}

impl BitrateCategory {
    pub fn from_bitrate(bitrate: u32) -> Self {
        match bitrate {
            1500.. => BitrateCategory::HighRes,
            700..=1499 => BitrateCategory::Lossless,
            256..=699 => BitrateCategory::High,
            160..=255 => BitrateCategory::Standard,
            64..=159 => BitrateCategory::Low,
            _ => BitrateCategory::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BitrateCategory::HighRes => "High-Resolution (1500+ kbps)",
            BitrateCategory::Lossless => "Lossless (700-1499 kbps)",
            BitrateCategory::High => "High Bitrate (256-699 kbps)",
            BitrateCategory::Standard => "Standard Bitrate (160-255 kbps)",
            BitrateCategory::Low => "Low Bitrate (64-159 kbps)",
            BitrateCategory::Unknown => "Other"
        }
    }
}

impl fmt::Display for BitrateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Statistics over a scanned library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibrarySummary {
    pub files_analyzed: usize,
    pub scan_seconds: f64,
    pub scan_time_formatted: String,
    pub average_bitrate_kbps: f64,
    pub average_duration_seconds: f64,
    pub average_duration_formatted: String,
    pub unique_artists: usize,
    pub unique_album_artists: usize,
    pub unique_albums: usize,
    pub total_listening_time: String,
    pub predominant_genre: String,
    pub bitrate_distribution: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<String>,
}

pub struct LibraryAnalyzer;

impl LibraryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize(&self, tracks: &[TrackMetadata], scan_seconds: f64) -> LibrarySummary {
        let count = tracks.len();
        let total_duration: f64 = tracks.iter().map(|t| t.duration_secs).sum();
        let total_bitrate: f64 = tracks
            .iter()
            .filter(|t| t.bitrate_kbps > 0)
            .map(|t| t.bitrate_kbps as f64)
            .sum();

        let (average_bitrate, average_duration) = if count > 0 {
            (total_bitrate / count as f64, total_duration / count as f64)
        } else {
            (0.0, 0.0)
        };

        let mut bitrate_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for track in tracks {
            let category = BitrateCategory::from_bitrate(track.bitrate_kbps);
            *bitrate_distribution.entry(category.as_str().to_string()).or_insert(0) += 1;
        }

        let summary = LibrarySummary {
            files_analyzed: count,
            scan_seconds: round_to(scan_seconds, 2),
            scan_time_formatted: format_hms(scan_seconds),
            average_bitrate_kbps: round_to(average_bitrate, 1),
            average_duration_seconds: round_to(average_duration, 2),
            average_duration_formatted: format_ms(average_duration),
            unique_artists: unique(tracks, |t| &t.artist),
            unique_album_artists: unique(tracks, |t| &t.album_artist),
            unique_albums: unique(tracks, |t| &t.album),
            total_listening_time: seconds_to_readable(total_duration),
            predominant_genre: most_common(tracks.iter().map(|t| t.genre.as_str())),
            bitrate_distribution,
            ai_analysis: None,
        };

        info!("Library Analysis Summary:");
        info!("Total files: {}", summary.files_analyzed);
        info!("Average bitrate: {:.1} kbps", summary.average_bitrate_kbps);
        info!("Total listening time: {}", summary.total_listening_time);
        summary
    }
}

impl Default for LibraryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn unique<F>(tracks: &[TrackMetadata], field: F) -> usize
where
    F: Fn(&TrackMetadata) -> &String,
{
    tracks
        .iter()
        .map(field)
        .filter(|v| !v.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Most frequent non-empty value; ties go to the one seen first.
fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, value) in values.filter(|v| !v.is_empty()).enumerate() {
        counts.entry(value).or_insert((0, index)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(value, _)| value.to_string())
        .unwrap_or_default()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `N days, N hours, N minutes`, omitting zero parts; `0 minutes` if empty.
pub fn seconds_to_readable(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;

    let mut parts = Vec::new();
    for (amount, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        if amount > 0 {
            let plural = if amount == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", amount, unit, plural));
        }
    }
    if parts.is_empty() {
        "0 minutes".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}:{:02}", total / 3_600, (total % 3_600) / 60, total % 60)
}

pub fn format_ms(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(artist: &str, album: &str, genre: &str, duration: f64, bitrate: u32) -> TrackMetadata {
        TrackMetadata {
            artist: artist.into(),
            album_artist: artist.into(),
            album: album.into(),
            genre: genre.into(),
            duration_secs: duration,
            bitrate_kbps: bitrate,
            ..Default::default()
        }
    }

    #[test]
    fn bitrate_categories_cover_common_rates() {
        assert_eq!(BitrateCategory::from_bitrate(2304), BitrateCategory::HighRes);
        assert_eq!(BitrateCategory::from_bitrate(900), BitrateCategory::Lossless);
        assert_eq!(BitrateCategory::from_bitrate(320), BitrateCategory::High);
        assert_eq!(BitrateCategory::from_bitrate(192), BitrateCategory::Standard);
        assert_eq!(BitrateCategory::from_bitrate(128), BitrateCategory::Low);
        assert_eq!(BitrateCategory::from_bitrate(0), BitrateCategory::Unknown);
    }

    #[test]
    fn summarizes_a_small_library() {
        let tracks = vec![
            track("Boards of Canada", "Geogaddi", "Electronic", 240.0, 320),
            track("Boards of Canada", "Geogaddi", "Electronic", 180.0, 320),
            track("Slowdive", "Souvlaki", "Shoegaze", 300.0, 0),
            track("", "", "", 0.0, 900),
        ];
        let summary = LibraryAnalyzer::new().summarize(&tracks, 3725.0);

        assert_eq!(summary.files_analyzed, 4);
        // Zero bitrates are left out of the sum but not the divisor.
        assert_eq!(summary.average_bitrate_kbps, 385.0);
        assert_eq!(summary.average_duration_seconds, 180.0);
        assert_eq!(summary.average_duration_formatted, "03:00");
        assert_eq!(summary.scan_time_formatted, "01:02:05");
        assert_eq!(summary.unique_artists, 2);
        assert_eq!(summary.unique_album_artists, 2);
        assert_eq!(summary.unique_albums, 2);
        assert_eq!(summary.predominant_genre, "Electronic");
        assert_eq!(summary.total_listening_time, "12 minutes");
        assert_eq!(summary.bitrate_distribution.get("High Bitrate (256-699 kbps)"), Some(&2));
        assert_eq!(summary.bitrate_distribution.get("Other"), Some(&1));
    }

    #[test]
    fn empty_library_has_zeroed_summary() {
        let summary = LibraryAnalyzer::new().summarize(&[], 0.0);
        assert_eq!(summary.files_analyzed, 0);
        assert_eq!(summary.average_bitrate_kbps, 0.0);
        assert_eq!(summary.predominant_genre, "");
        assert_eq!(summary.total_listening_time, "0 minutes");
    }

    #[test]
    fn genre_ties_go_to_the_first_seen() {
        assert_eq!(most_common(["Jazz", "Rock", "Rock", "Jazz", ""].into_iter()), "Jazz");
        assert_eq!(most_common(["", ""].into_iter()), "");
    }

    #[test]
    fn readable_durations() {
        assert_eq!(seconds_to_readable(59.0), "0 minutes");
        assert_eq!(seconds_to_readable(60.0), "1 minute");
        assert_eq!(seconds_to_readable(90_061.0), "1 day, 1 hour, 1 minute");
        assert_eq!(seconds_to_readable(2.0 * 86_400.0 + 7_200.0), "2 days, 2 hours");
    }
}
