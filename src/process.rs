/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Invocation of external programs.
//!
//! [`ExternalCommand`] runs a program to completion, blocking the caller,
//! and classifies failures into [`ProcessError`] variants: the program could
//! not be found, it exited with a non-zero status, or it ran past its
//! timeout (in which case it is killed). Standard output and standard error
//! are inherited.

use std::ffi::{OsStr, OsString};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a child with a timeout is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Process failed because the executable {program} could not be found")]
    NotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Process {program} did not return a successful return code: {}", describe_code(.code))]
    NonZeroExit { program: String, code: Option<i32> },
    #[error("Process {program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("Could not run process {program}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("returned {}", code),
        None => "terminated by a signal".to_owned(),
    }
}

/// An external program with its arguments, working directory, and timeout.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ExternalCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Sets the working directory of the child.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Sets the maximum running time; `None` waits forever.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(OsString::as_os_str)
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Runs the program and waits for it to finish.
    pub fn run(&self) -> Result<(), ProcessError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        log::info!("Running {}", self);
        let mut child = command.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: self.program_name(),
                    source,
                }
            } else {
                ProcessError::Io {
                    program: self.program_name(),
                    source,
                }
            }
        })?;

        let status = match self.timeout {
            None => child.wait(),
            Some(timeout) => self.wait_with_timeout(&mut child, timeout)?,
        }
        .map_err(|source| ProcessError::Io {
            program: self.program_name(),
            source,
        })?;

        if status.success() {
            log::debug!("Process {} completed successfully", self.program_name());
            Ok(())
        } else {
            Err(ProcessError::NonZeroExit {
                program: self.program_name(),
                code: status.code(),
            })
        }
    }

    /// Polls the child until it exits, killing it at the deadline.
    fn wait_with_timeout(
        &self,
        child: &mut Child,
        timeout: Duration,
    ) -> Result<std::io::Result<ExitStatus>, ProcessError> {
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Ok(status)),
                Ok(None) => {}
                Err(err) => return Ok(Err(err)),
            }
            if Instant::now() >= deadline {
                if let Err(err) = child.kill() {
                    log::warn!("Could not kill {}: {}", self.program_name(), err);
                }
                if let Err(err) = child.wait() {
                    log::warn!("Could not reap {}: {}", self.program_name(), err);
                }
                return Err(ProcessError::Timeout {
                    program: self.program_name(),
                    timeout,
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Display for ExternalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_success() {
        ExternalCommand::new("sh").arg("-c").arg("exit 0").run().unwrap();
    }

    #[test]
    fn test_non_zero_exit() {
        let err = ExternalCommand::new("sh")
            .arg("-c")
            .arg("exit 3")
            .run()
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessError::NonZeroExit { code: Some(3), .. }
        ));
    }

    #[test]
    fn test_not_found() {
        let err = ExternalCommand::new("/nonexistent/gcm-prep/a.out")
            .run()
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[test]
    fn test_timeout() {
        let start = Instant::now();
        let err = ExternalCommand::new("sh")
            .arg("-c")
            .arg("exec sleep 10")
            .timeout(Some(Duration::from_millis(200)))
            .run()
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_within_timeout() {
        ExternalCommand::new("sh")
            .arg("-c")
            .arg("exit 0")
            .timeout(Some(Duration::from_secs(30)))
            .run()
            .unwrap();
    }

    #[test]
    fn test_current_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        ExternalCommand::new("sh")
            .arg("-c")
            .arg("echo done > marker")
            .current_dir(dir.path())
            .run()?;
        assert_eq!(std::fs::read_to_string(dir.path().join("marker"))?, "done\n");
        Ok(())
    }

    #[test]
    fn test_display() {
        let command = ExternalCommand::new("a.out").arg("2").arg("g.txt");
        assert_eq!(command.to_string(), "a.out 2 g.txt");
    }
}
