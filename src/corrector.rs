//! Loudness correction of single files.
//!
//! Two interchangeable strategies implement [`LoudnessCorrector`]:
//! - [`TwoPassLoudnorm`] drives ffmpeg's `loudnorm` filter itself: an analysis
//!   pass whose JSON summary is parsed into a [`MeasurementResult`], then a
//!   correction pass that applies a linear gain derived from it.
//! - [`OneShotNormalize`] delegates both passes to `ffmpeg-normalize`.

use crate::engine::ExternalTool;
use crate::error::{CorrectionError, EncodingError, Error, MeasurementError};
use crate::save::StagedOutput;
use crate::{EncodingOptions, LoudnessTargets};
use log::debug;
use serde::{Deserialize, Deserializer};
use std::ffi::OsString;
use std::path::Path;

/// A strategy producing one loudness-corrected, re-encoded file
pub trait LoudnessCorrector {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Checks that every external program the strategy needs can be run
    fn check_available(&self) -> Result<(), Error>;

    /// Command lines [`correct`](Self::correct) runs for one file, one per
    /// external invocation, for logging and plan-only previews
    fn describe(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        encoding: &EncodingOptions,
    ) -> Vec<String>;

    /// Writes `output` from `input`, corrected towards `targets`
    ///
    /// The output appears atomically: on failure nothing is left at `output`.
    fn correct(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        encoding: &EncodingOptions,
    ) -> Result<(), CorrectionError>;
}

/// Statistics reported by the `loudnorm` analysis pass
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MeasurementResult {
    #[serde(rename = "input_i", deserialize_with = "number_or_string")]
    pub input_integrated: f64,
    #[serde(rename = "input_lra", deserialize_with = "number_or_string")]
    pub input_loudness_range: f64,
    #[serde(rename = "input_tp", deserialize_with = "number_or_string")]
    pub input_true_peak: f64,
    #[serde(rename = "input_thresh", deserialize_with = "number_or_string")]
    pub input_threshold: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub target_offset: f64,
}

/// loudnorm prints every value as a quoted string (`"-27.83"`, `"-inf"`)
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl MeasurementResult {
    /// Extracts the JSON summary from the engine's diagnostic output
    pub fn parse(text: &str) -> Result<Self, MeasurementError> {
        let block = find_summary_block(text).ok_or(MeasurementError::MissingSummary)?;
        Ok(serde_json::from_str(block)?)
    }
}

/// Locates `{ "input_i" ... }` in free-form ffmpeg output
fn find_summary_block(text: &str) -> Option<&str> {
    let key = text.find("\"input_i\"")?;
    let start = text[..key].rfind('{')?;
    if !text[start + 1..key].trim().is_empty() {
        return None;
    }
    let end = key + text[key..].find('}')?;
    Some(&text[start..=end])
}

/// Manual two-pass normalization with ffmpeg's `loudnorm` filter
#[derive(Debug, Clone)]
pub struct TwoPassLoudnorm {
    ffmpeg: ExternalTool,
}

impl TwoPassLoudnorm {
    pub fn new(ffmpeg: ExternalTool) -> Self {
        Self { ffmpeg }
    }

    /// Analysis pass: measures `input` without writing anything
    pub fn measure(
        &self,
        input: &Path,
        targets: &LoudnessTargets,
    ) -> Result<MeasurementResult, MeasurementError> {
        let output = self
            .ffmpeg
            .run(measure_args(input, targets))
            .map_err(|source| MeasurementError::Spawn {
                program: self.ffmpeg.program().to_path_buf(),
                source,
            })?;
        if !output.status.success() {
            return Err(MeasurementError::Exit {
                status: output.status,
                stderr: output.stderr,
            });
        }

        // ffmpeg prints the summary on stderr; some builds route it to stdout
        let measurement = match MeasurementResult::parse(&output.stderr) {
            Err(MeasurementError::MissingSummary) => MeasurementResult::parse(&output.stdout)?,
            other => other?,
        };
        debug!("Measured {:?}: {:?}", input, measurement);
        Ok(measurement)
    }

    /// Correction pass: re-encodes `input` into `output` using `measurement`
    ///
    /// The gain is linear, so the same measurement always yields the same output.
    pub fn apply(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        measurement: &MeasurementResult,
        encoding: &EncodingOptions,
    ) -> Result<(), CorrectionError> {
        let stage = StagedOutput::new(output).map_err(|source| CorrectionError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        let filter = correction_filter(targets, measurement);
        let args = apply_args(input, stage.path(), filter, encoding);
        run_encoder(&self.ffmpeg, &args).map_err(|source| CorrectionError::Encoding {
            path: input.to_path_buf(),
            source,
        })?;

        stage.commit().map_err(|source| CorrectionError::Io {
            path: output.to_path_buf(),
            source,
        })
    }
}

impl LoudnessCorrector for TwoPassLoudnorm {
    fn name(&self) -> &'static str {
        "ffmpeg loudnorm (two-pass)"
    }

    fn check_available(&self) -> Result<(), Error> {
        self.ffmpeg.probe(&["-version"], true)
    }

    /// The correction pass is shown with placeholders for the measured values
    fn describe(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        encoding: &EncodingOptions,
    ) -> Vec<String> {
        let pending = format!(
            "{}:measured_I=$input_i:measured_LRA=$input_lra:measured_TP=$input_tp:measured_thresh=$input_thresh:offset=$target_offset:linear=true:print_format=summary",
            loudnorm_targets(targets)
        );
        vec![
            self.ffmpeg.command_line(&measure_args(input, targets)),
            self.ffmpeg
                .command_line(&apply_args(input, output, pending, encoding)),
        ]
    }

    fn correct(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        encoding: &EncodingOptions,
    ) -> Result<(), CorrectionError> {
        let measurement =
            self.measure(input, targets)
                .map_err(|source| CorrectionError::Measurement {
                    path: input.to_path_buf(),
                    source,
                })?;
        self.apply(input, output, targets, &measurement, encoding)
    }
}

/// Both passes delegated to the `ffmpeg-normalize` tool
#[derive(Debug, Clone)]
pub struct OneShotNormalize {
    ffmpeg: ExternalTool,
    normalizer: ExternalTool,
}

impl OneShotNormalize {
    pub fn new(ffmpeg: ExternalTool, normalizer: ExternalTool) -> Self {
        Self { ffmpeg, normalizer }
    }
}

impl LoudnessCorrector for OneShotNormalize {
    fn name(&self) -> &'static str {
        "ffmpeg-normalize (one-shot)"
    }

    fn check_available(&self) -> Result<(), Error> {
        self.ffmpeg.probe(&["-version"], true)?;
        self.normalizer.probe(&["--help"], false)
    }

    fn describe(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        encoding: &EncodingOptions,
    ) -> Vec<String> {
        vec![
            self.normalizer
                .command_line(&one_shot_args(input, output, targets, encoding)),
        ]
    }

    fn correct(
        &self,
        input: &Path,
        output: &Path,
        targets: &LoudnessTargets,
        encoding: &EncodingOptions,
    ) -> Result<(), CorrectionError> {
        let stage = StagedOutput::new(output).map_err(|source| CorrectionError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        let args = one_shot_args(input, stage.path(), targets, encoding);
        run_encoder(&self.normalizer, &args).map_err(|source| CorrectionError::Encoding {
            path: input.to_path_buf(),
            source,
        })?;

        stage.commit().map_err(|source| CorrectionError::Io {
            path: output.to_path_buf(),
            source,
        })
    }
}

fn run_encoder(tool: &ExternalTool, args: &[OsString]) -> Result<(), EncodingError> {
    let output = tool.run(args).map_err(|source| EncodingError::Spawn {
        program: tool.program().to_path_buf(),
        source,
    })?;
    if !output.status.success() {
        return Err(EncodingError::Exit {
            status: output.status,
            stderr: output.stderr,
        });
    }
    Ok(())
}

fn measure_args(input: &Path, targets: &LoudnessTargets) -> Vec<OsString> {
    let filter = format!("{}:print_format=json", loudnorm_targets(targets));
    vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-y".into(),
        "-i".into(),
        input.into(),
        "-af".into(),
        filter.into(),
        "-f".into(),
        "null".into(),
        "-".into(),
    ]
}

fn apply_args(
    input: &Path,
    output: &Path,
    filter: String,
    encoding: &EncodingOptions,
) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-y".into(),
        "-i".into(),
        input.into(),
        "-ar".into(),
        encoding.sample_rate.to_string().into(),
        "-af".into(),
        filter.into(),
        "-c:a".into(),
        (&encoding.codec).into(),
        "-b:a".into(),
        (&encoding.bitrate).into(),
        output.into(),
    ]
}

/// LRA is left to the tool's default
fn one_shot_args(
    input: &Path,
    output: &Path,
    targets: &LoudnessTargets,
    encoding: &EncodingOptions,
) -> Vec<OsString> {
    vec![
        input.into(),
        "-o".into(),
        output.into(),
        "-f".into(),
        "-c:a".into(),
        (&encoding.codec).into(),
        "-b:a".into(),
        (&encoding.bitrate).into(),
        "-ar".into(),
        encoding.sample_rate.to_string().into(),
        "-t".into(),
        targets.integrated_lufs.to_string().into(),
        "--true-peak".into(),
        targets.true_peak_dbtp.to_string().into(),
    ]
}

fn loudnorm_targets(targets: &LoudnessTargets) -> String {
    format!(
        "loudnorm=I={}:LRA={}:TP={}",
        targets.integrated_lufs, targets.loudness_range_lu, targets.true_peak_dbtp
    )
}

/// Second-pass filter: the same targets plus the measured statistics
fn correction_filter(targets: &LoudnessTargets, m: &MeasurementResult) -> String {
    format!(
        "{}:measured_I={}:measured_LRA={}:measured_TP={}:measured_thresh={}:offset={}:linear=true:print_format=summary",
        loudnorm_targets(targets),
        m.input_integrated,
        m.input_loudness_range,
        m.input_true_peak,
        m.input_threshold,
        m.target_offset,
    )
}
