//! Scoped invocation of the external loudness engine.
//!
//! Each call spawns the program, waits for it to exit and hands back the exit
//! status with both output channels captured in full.

use crate::error::Error;
use log::debug;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Captured result of one engine invocation
#[derive(Debug)]
pub struct EngineOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// An external program invoked by path or by name through `PATH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    program: PathBuf,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the program to completion
    pub fn run<I, S>(&self, args: I) -> std::io::Result<EngineOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Running {:?}", cmd);

        let output = cmd.output()?;
        Ok(EngineOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Space-separated rendering of an invocation, for logs
    pub fn command_line<S: AsRef<OsStr>>(&self, args: &[S]) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(AsRef::as_ref))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Presence probe
    ///
    /// A program that cannot be spawned is unavailable. With `require_success`
    /// the probe must also exit cleanly; without it, any exit counts as present
    /// (some builds return non-zero for their help/version output).
    pub fn probe(&self, args: &[&str], require_success: bool) -> Result<(), Error> {
        let output = self.run(args).map_err(|e| Error::Precondition {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;
        if require_success && !output.status.success() {
            return Err(Error::Precondition {
                program: self.program.clone(),
                reason: format!("`{}` exited with {}", args.join(" "), output.status),
            });
        }
        debug!("{:?} is available", self.program);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_precondition_failure() {
        let tool = ExternalTool::new("definitely-not-an-installed-engine-7f3a");
        let err = tool.probe(&["-version"], true).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
        assert!(err.to_string().contains("definitely-not-an-installed-engine-7f3a"));
    }

    #[test]
    fn command_line_joins_program_and_arguments() {
        let tool = ExternalTool::new("ffmpeg");
        assert_eq!(tool.command_line(&["-i", "in.wav"]), "ffmpeg -i in.wav");
        assert_eq!(tool.command_line::<&str>(&[]), "ffmpeg");
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_channels_and_status() {
        let tool = ExternalTool::new("sh");
        let out = tool
            .run(["-c", "echo to-stdout; echo to-stderr >&2; exit 3"])
            .unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout.trim(), "to-stdout");
        assert_eq!(out.stderr.trim(), "to-stderr");
    }

    #[cfg(unix)]
    #[test]
    fn probe_tolerates_non_zero_exit_when_asked() {
        let tool = ExternalTool::new("sh");
        assert!(tool.probe(&["-c", "exit 1"], false).is_ok());
        assert!(tool.probe(&["-c", "exit 1"], true).is_err());
    }
}
