use crate::collect::{AudioAsset, collect_audio_files};
use crate::corrector::LoudnessCorrector;
use crate::error::Error;
use crate::path::output_path_for;
use crate::{BatchOptions, Group, LoudnessTargets};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use strum_macros::Display;

/// Where one asset will be written, and whether that file already exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub asset: AudioAsset,
    pub path: PathBuf,
    pub exists: bool,
}

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FileStatus {
    /// Output already existed and skip-existing was on
    Skipped,
    /// Plan-only run: would have been corrected
    Planned,
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: FileStatus,
    /// Engine command lines for the file; empty when skipped
    pub commands: Vec<String>,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.status == FileStatus::Skipped {
            return write!(f, "  - Skipping (exists): {}", self.output.display());
        }
        write!(f, "  - {} -> {}", self.input.display(), self.output.display())?;
        if self.status == FileStatus::Planned {
            write!(f, " (planned)")?;
        }
        for cmd in &self.commands {
            write!(f, "\n    $ {cmd}")?;
        }
        if let FileStatus::Failed { reason } = &self.status {
            write!(f, "\n    ! Error: {reason}")?;
        }
        Ok(())
    }
}

/// Outcome of one group, files in processing order
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub group: String,
    pub targets: LoudnessTargets,
    pub files: Vec<FileReport>,
}

impl GroupReport {
    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Skipped))
    }

    pub fn planned(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Planned))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Succeeded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Failed { .. }))
    }

    /// Group summary line
    pub fn summary(&self) -> String {
        group_header(&self.group, &self.targets, self.files.len())
    }
}

fn group_header(group: &str, targets: &LoudnessTargets, files: usize) -> String {
    if files == 0 {
        format!("[{group}] No files found.")
    } else {
        format!(
            "[{group}] {files} file(s) to process. Target: I={} LUFS, LRA={}, TP={} dBTP",
            targets.integrated_lufs, targets.loudness_range_lu, targets.true_peak_dbtp
        )
    }
}

/// Collects and maps every file of a group
///
/// # Arguments
/// * `group` - Roots and name of the group
/// * `options` - Output directory and codec decide each output path
///
/// # Returns
/// One [`OutputTarget`] per input file in discovery order, or
/// [`Error::OutputCollision`] when two distinct inputs map to the same output
pub fn plan_group(group: &Group, options: &BatchOptions) -> Result<Vec<OutputTarget>, Error> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut plan = Vec::new();

    for asset in collect_audio_files(&group.roots) {
        let path = output_path_for(
            &asset.path,
            &group.roots,
            &group.name,
            &options.output_dir,
            &options.encoding.codec,
        );
        if let Some(first) = claimed.insert(path.clone(), asset.path.clone()) {
            return Err(Error::OutputCollision {
                group: group.name.clone(),
                output: path,
                first,
                second: asset.path,
            });
        }
        let exists = path.exists();
        plan.push(OutputTarget {
            asset,
            path,
            exists,
        });
    }
    Ok(plan)
}

/// Processes a planned group one file at a time
///
/// A failing file is reported and the batch moves on to the next one.
///
/// # Arguments
/// * `group` - The group the plan was made for; supplies the loudness targets
/// * `plan` - Output of [`plan_group`]
/// * `options` - Skip, plan-only, encoding and progress settings
/// * `corrector` - Strategy used for every file that is not skipped
///
/// # Returns
/// The group's report, one entry per planned file
pub fn run_group(
    group: &Group,
    plan: Vec<OutputTarget>,
    options: &BatchOptions,
    corrector: &dyn LoudnessCorrector,
) -> GroupReport {
    info!("{}", group_header(&group.name, &group.targets, plan.len()));

    let pb = if options.show_progress && !options.dry_run && !plan.is_empty() {
        let pb = ProgressBar::new(plan.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(group.name.clone());
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut files = Vec::with_capacity(plan.len());
    for target in plan {
        let input = &target.asset.path;
        let skip = options.skip_existing && target.exists;
        let commands = if skip {
            Vec::new()
        } else {
            corrector.describe(input, &target.path, &group.targets, &options.encoding)
        };

        let status = if skip {
            FileStatus::Skipped
        } else if options.dry_run {
            FileStatus::Planned
        } else {
            info!("  - {} -> {}", input.display(), target.path.display());
            for cmd in &commands {
                info!("    $ {}", cmd);
            }
            match corrector.correct(input, &target.path, &group.targets, &options.encoding) {
                Ok(()) => FileStatus::Succeeded,
                Err(e) => FileStatus::Failed {
                    reason: e.to_string(),
                },
            }
        };

        let report = FileReport {
            input: target.asset.path,
            output: target.path,
            status,
            commands,
        };
        match &report.status {
            FileStatus::Skipped | FileStatus::Planned => info!("{}", report),
            FileStatus::Succeeded => info!("    done: {}", report.output.display()),
            FileStatus::Failed { reason } => error!("    ! Error: {}", reason),
        }
        pb.inc(1);
        files.push(report);
    }
    pb.finish_and_clear();

    GroupReport {
        group: group.name.clone(),
        targets: group.targets,
        files,
    }
}

/// Normalizes every group
///
/// All groups are planned before any file is touched, so usage errors and
/// output collisions abort the run up front. Unless planning only, the
/// corrector's programs are probed once before the first file.
///
/// # Arguments
/// * `groups` - Groups to process, in order
/// * `options` - Settings shared by every group
/// * `corrector` - Loudness correction strategy
///
/// # Returns
/// One [`GroupReport`] per group, or the error that stopped the run before
/// any file was processed
pub fn normalize_groups(
    groups: &[Group],
    options: &BatchOptions,
    corrector: &dyn LoudnessCorrector,
) -> Result<Vec<GroupReport>, Error> {
    if groups.iter().all(|g| g.roots.is_empty()) {
        return Err(Error::Usage(
            "Provide at least one --music or --sfx path.".to_string(),
        ));
    }

    if options.dry_run {
        info!("Dry run: nothing will be written.");
    } else {
        corrector.check_available()?;
        info!("Using {}", corrector.name());
    }

    let plans = groups
        .iter()
        .map(|group| plan_group(group, options))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(groups
        .iter()
        .zip(plans)
        .map(|(group, plan)| run_group(group, plan, options, corrector))
        .collect())
}
