//! Locations of the external uninstallers.
//!
//! ## Default file locations
//!
//! * `%SystemRoot%\System32\msiexec.exe`
//! * `%ProgramFiles(x86)%\Common Files\Adobe\Adobe Desktop Common\HDBox\Setup.exe`
//! * `%ProgramFiles(x86)%\Adobe\Adobe Creative Cloud\Utils\Creative Cloud Uninstaller.exe`
//!
//! When `ProgramFiles(x86)` is not set (32-bit Windows), `ProgramFiles` is used.
use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::error::{DeployError, DeployErrorKind};

/// Paths of the executables the dispatcher launches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ToolPaths {
    /// Windows Installer.
    pub msiexec: PathBuf,
    /// Adobe managed installer `Setup.exe`.
    pub managed_setup: PathBuf,
    /// Legacy Creative Cloud uninstaller.
    pub legacy_uninstaller: PathBuf,
}

impl ToolPaths {
    /// Creates tool paths with the given locations.
    pub fn new<P: Into<PathBuf>>(msiexec: P, managed_setup: P, legacy_uninstaller: P) -> Self {
        Self {
            msiexec: msiexec.into(),
            managed_setup: managed_setup.into(),
            legacy_uninstaller: legacy_uninstaller.into(),
        }
    }

    /// Resolves the default locations from the environment.
    pub fn from_env() -> Result<Self, DeployError> {
        ToolPathResolver::new(None).resolve()
    }
}

#[derive(Debug, Clone, Default)]
struct ToolPathResolver {
    env_map: Option<HashMap<OsString, OsString>>,
}

impl ToolPathResolver {
    fn new(env_map: Option<HashMap<OsString, OsString>>) -> Self {
        Self { env_map }
    }

    fn resolve(&self) -> Result<ToolPaths, DeployError> {
        let mut msiexec = PathBuf::from(self.get_env_var("SystemRoot")?);
        msiexec.push("System32");
        msiexec.push("msiexec.exe");

        let program_files = self
            .get_env_var("ProgramFiles(x86)")
            .or_else(|_| self.get_env_var("ProgramFiles"))?;

        let mut managed_setup = PathBuf::from(&program_files);
        managed_setup.extend([
            "Common Files",
            "Adobe",
            "Adobe Desktop Common",
            "HDBox",
            "Setup.exe",
        ]);

        let mut legacy_uninstaller = PathBuf::from(&program_files);
        legacy_uninstaller.extend([
            "Adobe",
            "Adobe Creative Cloud",
            "Utils",
            "Creative Cloud Uninstaller.exe",
        ]);

        tracing::debug!(?msiexec, ?managed_setup, ?legacy_uninstaller, "resolved tool paths");

        Ok(ToolPaths {
            msiexec,
            managed_setup,
            legacy_uninstaller,
        })
    }

    fn get_env_var<K: AsRef<OsStr>>(&self, key: K) -> Result<OsString, DeployError> {
        if let Some(map) = &self.env_map {
            map.get(key.as_ref()).cloned().ok_or_else(|| {
                DeployError::new(DeployErrorKind::InvalidEnvironmentVariable)
                    .with_context(key.as_ref().to_string_lossy())
            })
        } else {
            crate::os::env_var(key)
        }
    }
}
