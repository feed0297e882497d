//! Subprocess execution helpers: run an external program with captured
//! stdio, optionally append the exchange to a log file, and resolve
//! executables on `PATH`.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Errors from launching or waiting on an external program.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command line")]
    EmptyCommand,

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program}` exited with status {status}: {stderr}")]
    NonZeroExit {
        program: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to write log file {path}: {source}")]
    Log {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Captured output of a finished subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

/// Run `argv[0]` with the remaining arguments, capturing stdout and stderr.
///
/// When `logfile` is given, the command line and both streams are appended to
/// it. A nonzero exit status is an error unless `check` is false, in which
/// case the captured output is returned regardless.
pub fn run<S: AsRef<OsStr>>(
    argv: &[S],
    logfile: Option<&Path>,
    check: bool,
) -> Result<CommandOutput, ExecError> {
    let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
    let program_name = program.as_ref().to_string_lossy().into_owned();
    debug!(program = %program_name, "running subprocess");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ExecError::Launch {
            program: program_name.clone(),
            source,
        })?;

    let result = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(-1),
    };

    if let Some(path) = logfile {
        append_log(path, argv, &result).map_err(|source| ExecError::Log {
            path: path.to_path_buf(),
            source,
        })?;
    }

    if check && !output.status.success() {
        return Err(ExecError::NonZeroExit {
            program: program_name,
            status: result.status,
            stderr: result.stderr,
        });
    }
    Ok(result)
}

fn append_log<S: AsRef<OsStr>>(
    path: &Path,
    argv: &[S],
    output: &CommandOutput,
) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let cmdline = argv
        .iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(file, "{cmdline}")?;
    if !output.stdout.is_empty() {
        writeln!(file, "{}", output.stdout.trim_end())?;
    }
    if !output.stderr.is_empty() {
        writeln!(file, "{}", output.stderr.trim_end())?;
    }
    writeln!(file)
}

/// Resolve an executable on the current `PATH`.
pub fn which(program: &str) -> Option<PathBuf> {
    which_in(program, std::env::var_os("PATH")?.as_ref())
}

fn which_in(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn captures_stdout() {
        let out = run(&["echo", "hello"], None, true).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.status, 0);
    }

    #[test]
    fn nonzero_exit_is_an_error_when_checked() {
        let err = run(&["false"], None, true).unwrap_err();
        assert!(matches!(err, ExecError::NonZeroExit { status: 1, .. }));
    }

    #[test]
    fn nonzero_exit_is_returned_when_unchecked() {
        let out = run(&["false"], None, false).unwrap();
        assert_eq!(out.status, 1);
    }

    #[test]
    fn missing_program_fails_to_launch() {
        let err = run(&["sarstack-no-such-binary"], None, true).unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = run::<&str>(&[], None, true).unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }

    #[test]
    fn log_file_appends_across_runs() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("run.log");
        run(&["echo", "first"], Some(&log), true).unwrap();
        run(&["echo", "second"], Some(&log), true).unwrap();
        let text = fs::read_to_string(&log).unwrap();
        assert!(text.contains("echo first"));
        assert!(text.contains("first"));
        assert!(text.contains("echo second"));
    }

    #[test]
    fn which_in_finds_executables() {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("mytool");
        fs::write(&exe, b"#!/bin/sh\n").unwrap();
        let path_var = std::env::join_paths([temp.path()]).unwrap();
        assert_eq!(which_in("mytool", &path_var), Some(exe));
        assert!(which_in("othertool", &path_var).is_none());
    }
}
