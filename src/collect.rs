use crate::AudioFormats;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An input file together with the root it was discovered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub root: PathBuf,
    pub format: AudioFormats,
}

/// Finds all recognized audio files under the given roots
///
/// Each root may be a single file or a directory searched recursively;
/// symbolic links are followed. Missing roots are skipped. Directory entries
/// are visited in file-name order, so the result is stable for a given
/// filesystem state; a file reached through more than one root is returned
/// once, under the first.
///
/// # Arguments
/// * `roots` - Files or directories to search
///
/// # Returns
/// The recognized audio files, each paired with the root it was found under
pub fn collect_audio_files(roots: &[impl AsRef<Path>]) -> Vec<AudioAsset> {
    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    for root in roots {
        let root = root.as_ref();
        if !root.exists() {
            debug!("Skipping missing root {:?}", root);
            continue;
        }

        for entry in WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!("Cannot read entry under {:?}: {}", root, err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let Some(format) = AudioFormats::from_path(path) else {
                continue;
            };
            if seen.insert(path.to_path_buf()) {
                assets.push(AudioAsset {
                    path: path.to_path_buf(),
                    root: root.to_path_buf(),
                    format,
                });
            }
        }
    }
    assets
}
