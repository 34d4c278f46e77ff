use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum, error::ErrorKind};
use game_audio_normalize::engine::ExternalTool;
use game_audio_normalize::{
    BatchOptions, EncodingOptions, Error, Group, LoudnessCorrector, LoudnessTargets,
    OneShotNormalize, TwoPassLoudnorm, normalize_groups,
};
use log::{error, info};
use std::path::PathBuf;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, ValueEnum, Display)]
#[strum(serialize_all = "kebab-case")]
enum Engine {
    /// measure with ffmpeg loudnorm, then apply the measured correction
    TwoPass,
    /// delegate both passes to ffmpeg-normalize
    OneShot,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// folders/files containing background music
    #[arg(long, num_args = 0.., value_name = "PATH")]
    music: Vec<PathBuf>,

    /// folders/files containing sound effects
    #[arg(long, num_args = 0.., value_name = "PATH")]
    sfx: Vec<PathBuf>,

    /// output root directory
    #[arg(long, default_value = "./normalized_out")]
    out: PathBuf,

    /// integrated loudness target for music in LUFS
    #[arg(long, default_value_t = LoudnessTargets::MUSIC_LUFS, allow_negative_numbers = true)]
    music_lufs: f64,

    /// integrated loudness target for sound effects in LUFS
    #[arg(long, default_value_t = LoudnessTargets::SFX_LUFS, allow_negative_numbers = true)]
    sfx_lufs: f64,

    /// loudness range target in LU, shared by both groups
    #[arg(long, default_value_t = LoudnessTargets::DEFAULT_LRA)]
    lra: f64,

    /// true peak ceiling in dBTP
    #[arg(long, default_value_t = LoudnessTargets::DEFAULT_TRUE_PEAK, allow_negative_numbers = true)]
    true_peak: f64,

    /// output sample rate in Hz
    #[arg(long, default_value_t = 48000)]
    ar: u32,

    /// output bitrate, passed to the encoder as is
    #[arg(long, default_value = "192k")]
    bitrate: String,

    /// output audio codec
    #[arg(long, default_value = "libmp3lame")]
    codec: String,

    /// skip files whose output already exists (default)
    #[arg(long, overrides_with = "no_skip_existing")]
    skip_existing: bool,

    /// re-process files whose output already exists
    #[arg(long, overrides_with = "skip_existing")]
    no_skip_existing: bool,

    /// list what would be processed without writing files
    #[arg(long)]
    dry_run: bool,

    /// loudness correction engine
    #[arg(long, value_enum, default_value_t = Engine::TwoPass)]
    engine: Engine,

    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffmpeg-normalize executable, used by the one-shot engine
    #[arg(long, default_value = "ffmpeg-normalize")]
    ffmpeg_normalize: PathBuf,

    /// do not draw a progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn groups(&self) -> [Group; 2] {
        [
            Group::music(
                self.music.clone(),
                LoudnessTargets::new(self.music_lufs, self.lra, self.true_peak),
            ),
            Group::sfx(
                self.sfx.clone(),
                LoudnessTargets::new(self.sfx_lufs, self.lra, self.true_peak),
            ),
        ]
    }

    /// The last of `--skip-existing`/`--no-skip-existing` wins; skipping is the default
    fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            output_dir: self.out.clone(),
            encoding: EncodingOptions {
                codec: self.codec.clone(),
                bitrate: self.bitrate.clone(),
                sample_rate: self.ar,
            },
            skip_existing: self.skip_existing || !self.no_skip_existing,
            dry_run: self.dry_run,
            show_progress: !self.no_progress,
        }
    }

    fn corrector(&self) -> Box<dyn LoudnessCorrector> {
        let ffmpeg = ExternalTool::new(&self.ffmpeg);
        match self.engine {
            Engine::TwoPass => Box::new(TwoPassLoudnorm::new(ffmpeg)),
            Engine::OneShot => Box::new(OneShotNormalize::new(
                ffmpeg,
                ExternalTool::new(&self.ffmpeg_normalize),
            )),
        }
    }
}

/// Reported like a clap argument error, exiting with status 2
fn usage_error(msg: String) -> clap::Error {
    Cli::command().error(ErrorKind::MissingRequiredArgument, msg)
}

fn main() -> Result<()> {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();

    // --- Configuration ---
    let groups = cli.groups();
    let options = cli.batch_options();
    let corrector = cli.corrector();

    info!("Starting loudness normalization with options:");
    info!("  Output Directory: {:?}", options.output_dir);
    info!("  Engine: {}", cli.engine);
    info!(
        "  Encoding: {} @ {}, {} Hz",
        options.encoding.codec, options.encoding.bitrate, options.encoding.sample_rate
    );
    info!("  Skip Existing: {}", options.skip_existing);
    info!("---");

    match normalize_groups(&groups, &options, corrector.as_ref()) {
        Ok(reports) => {
            let (mut succeeded, mut skipped, mut planned, mut failed) = (0, 0, 0, 0);
            for report in &reports {
                succeeded += report.succeeded();
                skipped += report.skipped();
                planned += report.planned();
                failed += report.failed();
            }
            info!(
                "Done. {} succeeded, {} skipped, {} planned, {} failed.",
                succeeded, skipped, planned, failed
            );
            Ok(())
        }
        Err(Error::Usage(msg)) => usage_error(msg).exit(),
        Err(e) => {
            error!("Normalization failed: {}", e);
            Err(e)?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("loudness-normalize").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn skip_existing_defaults_on_and_last_flag_wins() {
        assert!(parse(&[]).batch_options().skip_existing);
        assert!(parse(&["--skip-existing"]).batch_options().skip_existing);
        assert!(!parse(&["--no-skip-existing"]).batch_options().skip_existing);
        assert!(
            parse(&["--no-skip-existing", "--skip-existing"])
                .batch_options()
                .skip_existing
        );
        assert!(
            !parse(&["--skip-existing", "--no-skip-existing"])
                .batch_options()
                .skip_existing
        );
    }

    #[test]
    fn flags_map_onto_groups_and_options() {
        let cli = parse(&[
            "--music", "bgm", "ambience", "--sfx", "ui", "--music-lufs", "-20", "--sfx-lufs",
            "-14.5", "--true-peak", "-2", "--lra", "7", "--ar", "44100", "--codec", "flac",
            "--dry-run", "--no-progress",
        ]);
        let [music, sfx] = cli.groups();
        assert_eq!(music.roots, vec![PathBuf::from("bgm"), PathBuf::from("ambience")]);
        assert_eq!(music.targets, LoudnessTargets::new(-20.0, 7.0, -2.0));
        assert_eq!(sfx.roots, vec![PathBuf::from("ui")]);
        assert_eq!(sfx.targets, LoudnessTargets::new(-14.5, 7.0, -2.0));

        let options = cli.batch_options();
        assert_eq!(options.output_dir, PathBuf::from("./normalized_out"));
        assert_eq!(options.encoding.codec, "flac");
        assert_eq!(options.encoding.bitrate, "192k");
        assert_eq!(options.encoding.sample_rate, 44100);
        assert!(options.dry_run);
        assert!(!options.show_progress);
    }

    #[test]
    fn usage_errors_exit_like_argument_errors() {
        let err = usage_error("Provide at least one --music or --sfx path.".to_string());
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }
}
