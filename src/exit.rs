//! Process exit codes and the run status.
//!
//! Codes returned to the endpoint-management system:
//!
//! * `0`: success
//! * `3010`: success, but a reboot is required
//! * `60000..=68999`: reserved for failures of the deployment itself
//! * anything else: an installer failed

use std::ops::RangeInclusive;

/// Success.
pub const EXIT_CODE_SUCCESS: i32 = 0;

/// Success, but a reboot is required to complete the change.
pub const EXIT_CODE_REBOOT_REQUIRED: i32 = 3010;

/// Codes reserved for failures of the deployment itself.
pub const RESERVED_EXIT_CODES: RangeInclusive<i32> = 60000..=68999;

/// A phase returned an error.
pub const EXIT_CODE_GENERIC_FAILURE: i32 = 60001;

/// An external installer could not be started.
pub const EXIT_CODE_PROCESS_LAUNCH_FAILURE: i32 = 60002;

/// The deployment could not find the files it depends on.
pub const EXIT_CODE_BOOTSTRAP_FAILURE: i32 = 60008;

/// Returns whether the code is reserved for deployment failures.
pub fn is_reserved_exit_code(code: i32) -> bool {
    RESERVED_EXIT_CODES.contains(&code)
}

/// Running final status of a deployment.
///
/// The reboot sentinel takes precedence over every other code. Any other
/// non-zero code replaces the current status unless the status is the
/// reboot sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitStatus {
    code: i32,
}

impl ExitStatus {
    /// Creates a successful status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the exit code of a single action.
    pub fn record(&mut self, code: i32) {
        if code == EXIT_CODE_REBOOT_REQUIRED {
            self.code = code;
        } else if code != EXIT_CODE_SUCCESS && self.code != EXIT_CODE_REBOOT_REQUIRED {
            self.code = code;
        }
    }

    /// Records the final code of another status.
    pub fn merge(&mut self, other: &ExitStatus) {
        self.record(other.code);
    }

    /// Returns the current final code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Returns whether the status is success or reboot required.
    pub fn is_success(&self) -> bool {
        matches!(self.code, EXIT_CODE_SUCCESS | EXIT_CODE_REBOOT_REQUIRED)
    }

    /// Returns whether a reboot is required.
    pub fn is_reboot_required(&self) -> bool {
        self.code == EXIT_CODE_REBOOT_REQUIRED
    }
}

impl FromIterator<i32> for ExitStatus {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        let mut status = Self::new();

        for code in iter {
            status.record(code);
        }

        status
    }
}
