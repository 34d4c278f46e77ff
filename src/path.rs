use crate::AudioFormats;
use std::path::{Component, Path, PathBuf};

/// Computes `{output_root}/{group}/{relative_path}` for an input file
///
/// `relative_path` is taken against the first root that contains `file`;
/// when no root contains it (or the root is the file itself) the base name
/// is used. Encoders with a fixed container replace the extension, other
/// encoders keep the input extension, lower-cased.
///
/// # Arguments
/// * `file` - The input audio file
/// * `roots` - The group's roots, in the order given
/// * `group` - Group name, used as the first directory under `output_root`
/// * `output_root` - Base output directory
/// * `codec` - Encoder name, which decides the output extension
///
/// # Returns
/// The output file path; nothing is created on disk
pub fn output_path_for(
    file: impl AsRef<Path>,
    roots: &[impl AsRef<Path>],
    group: &str,
    output_root: impl AsRef<Path>,
    codec: &str,
) -> PathBuf {
    let file = file.as_ref();
    let relative = roots
        .iter()
        .find_map(|root| relative_under(file, root.as_ref()))
        .unwrap_or_else(|| PathBuf::from(file.file_name().unwrap_or_default()));

    let mut output = output_root.as_ref().join(group).join(relative);
    match AudioFormats::for_codec(codec) {
        Some(format) => {
            output.set_extension(format.to_string());
        }
        None => {
            if let Some(ext) = file.extension() {
                output.set_extension(ext.to_string_lossy().to_lowercase());
            }
        }
    }
    output
}

/// Path of `file` below `root`, if `root` is a proper ancestor of it
fn relative_under(file: &Path, root: &Path) -> Option<PathBuf> {
    let relative = pathdiff::diff_paths(file, root)?;
    let contained = relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    contained.then_some(relative)
}
