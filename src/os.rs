//! OS specific functionalities.

use std::ffi::{OsStr, OsString};

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployErrorKind};

#[cfg(windows)]
pub(crate) mod windows;

/// OS specific error wrapper.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OsError {
    /// Standard IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error type provided by the Windows crates by Microsoft.
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows_result::Error),
}

impl From<OsError> for DeployError {
    fn from(value: OsError) -> Self {
        DeployError::new(DeployErrorKind::Io).with_source(value)
    }
}

/// Specifies which part of the machine a registry view belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessScope {
    /// For the current user only.
    #[default]
    User,
    /// For all users.
    System,
}

pub(crate) fn env_var<A: AsRef<OsStr>>(key: A) -> Result<OsString, DeployError> {
    tracing::trace!(key = ?key.as_ref(), "env_var");
    std::env::var_os(key.as_ref()).ok_or_else(|| {
        DeployError::new(DeployErrorKind::InvalidEnvironmentVariable)
            .with_context(key.as_ref().to_string_lossy())
    })
}
