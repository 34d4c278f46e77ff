/// Batch orchestration and per-file reports
pub mod batch;
/// Recursive discovery of audio files
pub mod collect;
/// Loudness correction strategies
pub mod corrector;
/// Runner for the external loudness engine
pub mod engine;
/// Module for error handling
pub mod error;
/// Output path computation
pub mod path;
/// Module for staging and saving output files
pub mod save;

pub use batch::{FileReport, FileStatus, GroupReport, OutputTarget, normalize_groups, plan_group};
pub use collect::{AudioAsset, collect_audio_files};
pub use corrector::{LoudnessCorrector, MeasurementResult, OneShotNormalize, TwoPassLoudnorm};
pub use error::{CorrectionError, EncodingError, Error, MeasurementError};
pub use path::output_path_for;

use std::path::{Path, PathBuf};
use strum_macros::Display;

/// Represents recognized audio file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "camelCase")]
pub enum AudioFormats {
    Mp3,
    Wav,
    Flac,
    Ogg,
    M4a,
    Aac,
    Aiff,
    Aif,
    Wma,
    Opus,
}

impl AudioFormats {
    /// Returns a list of recognized file extensions
    #[inline]
    pub fn supported_extensions() -> &'static [&'static str] {
        &[
            "mp3", "wav", "flac", "ogg", "m4a", "aac", "aiff", "aif", "wma", "opus",
        ]
    }

    /// Creates an AudioFormats enum from a file path based on its extension (case-insensitive)
    #[inline]
    pub fn from_path(value: impl AsRef<Path>) -> Option<Self> {
        Some(
            match value
                .as_ref()
                .extension()
                .unwrap_or_default()
                .to_string_lossy()
                .to_lowercase()
                .as_ref()
            {
                "mp3" => Self::Mp3,
                "wav" => Self::Wav,
                "flac" => Self::Flac,
                "ogg" => Self::Ogg,
                "m4a" => Self::M4a,
                "aac" => Self::Aac,
                "aiff" => Self::Aiff,
                "aif" => Self::Aif,
                "wma" => Self::Wma,
                "opus" => Self::Opus,
                _ => return None,
            },
        )
    }

    /// Canonical output format of an encoder that always produces one container.
    ///
    /// Returns `None` for encoders whose output container follows the input.
    pub fn for_codec(codec: &str) -> Option<Self> {
        match codec.to_ascii_lowercase().as_str() {
            "libmp3lame" | "libshine" | "mp3" => Some(Self::Mp3),
            "flac" => Some(Self::Flac),
            "libvorbis" | "vorbis" => Some(Self::Ogg),
            "libopus" | "opus" => Some(Self::Opus),
            _ => None,
        }
    }
}

/// Loudness targets of one group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessTargets {
    /// Integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// Loudness range in LU
    pub loudness_range_lu: f64,
    /// True peak ceiling in dBTP
    pub true_peak_dbtp: f64,
}

impl LoudnessTargets {
    pub const MUSIC_LUFS: f64 = -18.0;
    pub const SFX_LUFS: f64 = -16.0;
    pub const DEFAULT_LRA: f64 = 11.0;
    pub const DEFAULT_TRUE_PEAK: f64 = -1.0;

    pub fn new(integrated_lufs: f64, loudness_range_lu: f64, true_peak_dbtp: f64) -> Self {
        Self {
            integrated_lufs,
            loudness_range_lu,
            true_peak_dbtp,
        }
    }
}

impl Default for LoudnessTargets {
    fn default() -> Self {
        Self::new(Self::MUSIC_LUFS, Self::DEFAULT_LRA, Self::DEFAULT_TRUE_PEAK)
    }
}

/// Encoder settings shared by every output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingOptions {
    /// Encoder identifier, e.g. `libmp3lame`
    pub codec: String,
    /// Bitrate passed verbatim to the encoder, e.g. `192k`
    pub bitrate: String,
    /// Output sample rate in Hz
    pub sample_rate: u32,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        EncodingOptions {
            codec: "libmp3lame".to_string(),
            bitrate: "192k".to_string(),
            sample_rate: 48000,
        }
    }
}

/// A named batch of input roots sharing one set of loudness targets
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub roots: Vec<PathBuf>,
    pub targets: LoudnessTargets,
}

impl Group {
    pub fn new(name: impl Into<String>, roots: Vec<PathBuf>, targets: LoudnessTargets) -> Self {
        Self {
            name: name.into(),
            roots,
            targets,
        }
    }

    /// Background music, written under `{output}/music`
    pub fn music(roots: Vec<PathBuf>, targets: LoudnessTargets) -> Self {
        Self::new("music", roots, targets)
    }

    /// Sound effects, written under `{output}/sfx`
    pub fn sfx(roots: Vec<PathBuf>, targets: LoudnessTargets) -> Self {
        Self::new("sfx", roots, targets)
    }
}

/// Configuration options for a batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Output root; each group writes into a subdirectory named after it
    pub output_dir: PathBuf,
    pub encoding: EncodingOptions,
    /// Leave files whose output already exists untouched
    pub skip_existing: bool,
    /// Plan only: no external process is spawned and nothing is written
    pub dry_run: bool,
    /// Draw a progress bar while correcting
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            output_dir: PathBuf::from("./normalized_out"),
            encoding: EncodingOptions::default(),
            skip_existing: true,
            dry_run: false,
            show_progress: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(AudioFormats::from_path("a/B.WAV"), Some(AudioFormats::Wav));
        assert_eq!(AudioFormats::from_path("x.Aif"), Some(AudioFormats::Aif));
        assert_eq!(AudioFormats::from_path("notes.txt"), None);
        assert_eq!(AudioFormats::from_path("no_extension"), None);
    }

    #[test]
    fn every_supported_extension_round_trips_through_display() {
        for ext in AudioFormats::supported_extensions() {
            let format = AudioFormats::from_path(format!("f.{ext}")).unwrap();
            assert_eq!(format.to_string(), *ext);
        }
    }

    #[test]
    fn fixed_container_codecs() {
        assert_eq!(AudioFormats::for_codec("libmp3lame"), Some(AudioFormats::Mp3));
        assert_eq!(AudioFormats::for_codec("libopus"), Some(AudioFormats::Opus));
        assert_eq!(AudioFormats::for_codec("aac"), None);
        assert_eq!(AudioFormats::for_codec("pcm_s16le"), None);
    }
}
