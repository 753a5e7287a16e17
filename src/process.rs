//! External process invocation.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use crate::error::{DeployError, DeployErrorKind};

/// Window visibility of a launched process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowStyle {
    /// Shown normally.
    Normal,
    /// No console window.
    #[default]
    Hidden,
}

/// Describes a process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ProcessSpec {
    /// Executable path.
    pub path: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Window visibility.
    pub window: WindowStyle,
    /// Exit codes reported as success.
    pub ignore_exit_codes: Vec<i32>,
    /// Whether to wait for the process to exit and return its exit code.
    pub wait: bool,
}

impl ProcessSpec {
    /// Creates a hidden, waited process spec.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            args: Vec::new(),
            window: WindowStyle::Hidden,
            ignore_exit_codes: Vec::new(),
            wait: true,
        }
    }

    /// Appends an argument.
    pub fn arg<S: Into<String>>(mut self, value: S) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets the `window` field.
    pub fn with_window(mut self, value: WindowStyle) -> Self {
        self.window = value;
        self
    }

    /// Sets the `ignore_exit_codes` field.
    pub fn with_ignore_exit_codes(mut self, value: &[i32]) -> Self {
        self.ignore_exit_codes = value.to_vec();
        self
    }

    /// Sets the `wait` field.
    pub fn with_wait(mut self, value: bool) -> Self {
        self.wait = value;
        self
    }

    /// Returns the code with ignored exit codes mapped to success.
    pub fn effective_exit_code(&self, code: i32) -> i32 {
        if self.ignore_exit_codes.contains(&code) {
            crate::exit::EXIT_CODE_SUCCESS
        } else {
            code
        }
    }

    /// Returns the exit code to record for the result of running this spec.
    ///
    /// Ignored codes and processes that were not waited on count as success.
    /// A process that could not be started counts as a launch failure.
    pub fn exit_code(&self, result: &Result<Option<i32>, DeployError>) -> i32 {
        match result {
            Ok(Some(code)) => self.effective_exit_code(*code),
            Ok(None) => crate::exit::EXIT_CODE_SUCCESS,
            Err(_) => crate::exit::EXIT_CODE_PROCESS_LAUNCH_FAILURE,
        }
    }

    /// Returns the arguments joined by spaces as shown in logs.
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

/// Runs external processes.
pub trait ProcessRunner {
    /// Runs the process.
    ///
    /// Returns the raw exit code when `spec.wait` is set, otherwise `None`.
    fn run(&mut self, spec: &ProcessSpec) -> Result<Option<i32>, DeployError>;
}

/// Runs processes with [`std::process::Command`].
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner {}

impl SystemProcessRunner {
    /// Creates a runner.
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

impl ProcessRunner for SystemProcessRunner {
    fn run(&mut self, spec: &ProcessSpec) -> Result<Option<i32>, DeployError> {
        let mut command = Command::new(&spec.path);
        command.args(&spec.args);

        #[cfg(windows)]
        if spec.window == WindowStyle::Hidden {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        tracing::debug!(path = ?spec.path, args = spec.command_line(), "spawning process");

        let mut child = command.spawn().map_err(|error| {
            DeployError::new(DeployErrorKind::ProcessLaunch)
                .with_source(error)
                .with_context(format!("{:?}", spec.path))
        })?;

        if !spec.wait {
            tracing::debug!(pid = child.id(), "not waiting for process");
            return Ok(None);
        }

        let status = child.wait()?;
        // A process killed by a signal has no code.
        let code = status.code().unwrap_or(-1);

        tracing::debug!(path = ?spec.path, code, "process exited");

        Ok(Some(code))
    }
}
