use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// An output file being written next to its final destination
///
/// The engine writes into a hidden temporary file in the destination's
/// directory; [`StagedOutput::commit`] renames it over the destination.
/// Dropping an uncommitted stage removes the temporary file, so a failed
/// pass never leaves a partial output behind.
#[derive(Debug)]
pub struct StagedOutput {
    temp: TempPath,
    destination: PathBuf,
}

impl StagedOutput {
    /// Creates the destination's parent directories and an empty staging file
    ///
    /// The staging file keeps the destination's extension so the encoder picks
    /// the same container for it.
    pub fn new(destination: impl AsRef<Path>) -> std::io::Result<Self> {
        let destination = destination.as_ref();
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let prefix = format!(
            ".{}.",
            destination.file_stem().unwrap_or_default().to_string_lossy()
        );
        let suffix = destination
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(&suffix);
        // outputs get the mode of any newly created file, not 0600
        #[cfg(unix)]
        builder.permissions(std::os::unix::fs::PermissionsExt::from_mode(0o666));
        let temp = builder.tempfile_in(parent)?.into_temp_path();

        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    /// Path the engine should write to
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Atomically moves the staged file to its destination
    pub fn commit(self) -> std::io::Result<()> {
        self.temp
            .persist(&self.destination)
            .map_err(|e| e.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn commit_moves_into_place_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("music/bgm/theme.mp3");
        let stage = StagedOutput::new(&dest).unwrap();
        assert_eq!(stage.path().parent(), dest.parent());
        assert_eq!(stage.path().extension().unwrap(), "mp3");
        fs::write(stage.path(), b"encoded").unwrap();

        stage.commit().unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"encoded");
        assert_eq!(fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn dropping_without_commit_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("sfx/hit.mp3");
        {
            let stage = StagedOutput::new(&dest).unwrap();
            fs::write(stage.path(), b"partial").unwrap();
        }
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path().join("sfx")).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn committed_output_has_regular_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let sibling = dir.path().join("sfx/plain.mp3");
        let dest = dir.path().join("sfx/hit.mp3");
        let stage = StagedOutput::new(&dest).unwrap();
        fs::write(stage.path(), b"encoded").unwrap();
        stage.commit().unwrap();
        fs::write(&sibling, b"plain").unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dest), mode(&sibling));
    }

    #[test]
    fn commit_replaces_existing_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("old.mp3");
        fs::write(&dest, b"old").unwrap();
        let stage = StagedOutput::new(&dest).unwrap();
        fs::write(stage.path(), b"new").unwrap();
        stage.commit().unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }
}
