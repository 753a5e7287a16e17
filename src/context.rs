//! Deployment configuration.
//!
//! A [`DeploymentContext`] holds everything a deployment needs to know about
//! itself: what is being deployed, how, and where the external tools are.
//! It is built once, from a [`DeployConfig`] file or programmatically, and
//! passed by reference to every component.
//!
//! Config files use the [RON](https://github.com/ron-rs/ron) format:
//!
//! ```ron
//! (
//!     app_vendor: "Adobe",
//!     app_name: "Acrobat Reader",
//!     deployment_type: Uninstall,
//!     catalog_path: Some("Build/optionXML.xml"),
//!     msi: (ignore_exit_codes: [1605, 1614], settle_delay_ms: 0),
//! )
//! ```
use std::{
    fmt::Display,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AddContext, DeployError, DeployErrorKind},
    path::ToolPaths,
};

/// What the deployment does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentType {
    /// Install the application.
    #[default]
    Install,
    /// Remove the application.
    Uninstall,
    /// Repair an existing installation.
    Repair,
}

impl Display for DeploymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Install => "Install",
            Self::Uninstall => "Uninstall",
            Self::Repair => "Repair",
        };
        f.write_str(text)
    }
}

/// How much the user sees during the deployment.
///
/// The library only carries the value; presenting anything is up to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeployMode {
    /// Dialogs are shown.
    #[default]
    Interactive,
    /// Progress is shown but no prompts.
    NonInteractive,
    /// Nothing is shown.
    Silent,
}

/// Families of external uninstallers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallerFamily {
    /// Windows Installer (`msiexec`).
    Msi,
    /// Adobe HDBox managed installer.
    Managed,
    /// Legacy Creative Cloud uninstaller.
    Legacy,
}

/// Exit code handling for one installer family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct FamilyPolicy {
    /// Non-zero exit codes treated as success, such as "product not installed".
    pub ignore_exit_codes: Vec<i32>,
    /// Pause after the installer exits, in milliseconds.
    pub settle_delay_ms: u64,
}

impl FamilyPolicy {
    /// Creates a policy.
    pub fn new(ignore_exit_codes: &[i32], settle_delay_ms: u64) -> Self {
        Self {
            ignore_exit_codes: ignore_exit_codes.to_vec(),
            settle_delay_ms,
        }
    }

    /// Returns the settle delay.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    fn default_msi() -> Self {
        // 1605: product not installed, 1614: product already uninstalled
        Self::new(&[1605, 1614], 0)
    }

    fn default_managed() -> Self {
        Self::new(&[], 5000)
    }

    fn default_legacy() -> Self {
        Self::new(&[], 10000)
    }
}

/// Serialized form of a [`DeploymentContext`].
///
/// Every field has a default. Relative paths are resolved against the
/// directory of the config file by [`DeploymentContext::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct DeployConfig {
    /// Publisher of the application.
    pub app_vendor: String,
    /// Name of the application.
    pub app_name: String,
    /// Version of the application.
    pub app_version: String,
    /// What the deployment does.
    pub deployment_type: DeploymentType,
    /// How much the user sees.
    pub deploy_mode: DeployMode,
    /// Directory that must exist before any phase runs.
    pub support_files_dir: Option<PathBuf>,
    /// Product catalog XML file.
    pub catalog_path: Option<PathBuf>,
    /// Overrides the default `msiexec.exe` location.
    pub msiexec_path: Option<PathBuf>,
    /// Overrides the default HDBox `Setup.exe` location.
    pub managed_setup_path: Option<PathBuf>,
    /// Overrides the default legacy Creative Cloud uninstaller location.
    pub legacy_uninstaller_path: Option<PathBuf>,
    /// Policy for `msiexec`.
    pub msi: FamilyPolicy,
    /// Policy for the HDBox installer.
    pub managed: FamilyPolicy,
    /// Policy for the legacy uninstaller.
    pub legacy: FamilyPolicy,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            app_vendor: String::new(),
            app_name: String::new(),
            app_version: String::new(),
            deployment_type: DeploymentType::default(),
            deploy_mode: DeployMode::default(),
            support_files_dir: None,
            catalog_path: None,
            msiexec_path: None,
            managed_setup_path: None,
            legacy_uninstaller_path: None,
            msi: FamilyPolicy::default_msi(),
            managed: FamilyPolicy::default_managed(),
            legacy: FamilyPolicy::default_legacy(),
        }
    }
}

impl DeployConfig {
    /// Deserialize from the given reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DeployError> {
        ron::de::from_reader::<R, Self>(reader).map_err(|error| {
            DeployError::new(DeployErrorKind::MalformedConfig).with_source(error)
        })
    }

    /// Deserialize from the given string.
    pub fn from_ron(text: &str) -> Result<Self, DeployError> {
        Self::from_reader(text.as_bytes())
    }

    /// Serialize to a pretty-printed string.
    pub fn to_ron(&self) -> Result<String, DeployError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|error| DeployError::new(DeployErrorKind::Other).with_source(error))
    }
}

/// Immutable settings shared by every part of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentContext {
    app_vendor: String,
    app_name: String,
    app_version: String,
    deployment_type: DeploymentType,
    deploy_mode: DeployMode,
    support_files_dir: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    tool_paths: ToolPaths,
    msi: FamilyPolicy,
    managed: FamilyPolicy,
    legacy: FamilyPolicy,
}

impl DeploymentContext {
    /// Creates a context with default policies and the given tool paths.
    pub fn new(deployment_type: DeploymentType, tool_paths: ToolPaths) -> Self {
        Self::from_parts(DeployConfig::default(), tool_paths, deployment_type)
    }

    fn from_parts(
        config: DeployConfig,
        tool_paths: ToolPaths,
        deployment_type: DeploymentType,
    ) -> Self {
        Self {
            app_vendor: config.app_vendor,
            app_name: config.app_name,
            app_version: config.app_version,
            deployment_type,
            deploy_mode: config.deploy_mode,
            support_files_dir: config.support_files_dir,
            catalog_path: config.catalog_path,
            tool_paths,
            msi: config.msi,
            managed: config.managed,
            legacy: config.legacy,
        }
    }

    /// Builds a context from a config.
    ///
    /// Tool paths not given in the config are resolved from the environment.
    pub fn from_config(config: DeployConfig) -> Result<Self, DeployError> {
        let tool_paths = if config.msiexec_path.is_some()
            && config.managed_setup_path.is_some()
            && config.legacy_uninstaller_path.is_some()
        {
            ToolPaths::default()
        } else {
            ToolPaths::from_env()?
        };

        let tool_paths = ToolPaths {
            msiexec: config.msiexec_path.clone().unwrap_or(tool_paths.msiexec),
            managed_setup: config
                .managed_setup_path
                .clone()
                .unwrap_or(tool_paths.managed_setup),
            legacy_uninstaller: config
                .legacy_uninstaller_path
                .clone()
                .unwrap_or(tool_paths.legacy_uninstaller),
        };
        let deployment_type = config.deployment_type;

        Ok(Self::from_parts(config, tool_paths, deployment_type))
    }

    /// Loads a config file and builds a context from it.
    ///
    /// Relative support file and catalog paths are made relative to the
    /// directory containing the config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DeployError> {
        let path = path.as_ref();
        tracing::debug!(?path, "loading deployment config");

        let buf =
            std::fs::read(path).with_contextc(|_error| format!("could not open file {path:?}"))?;
        let mut config = DeployConfig::from_reader(Cursor::new(buf))
            .map_err(|error| error.with_context(format!("config {path:?}")))?;

        if let Some(base_dir) = path.parent() {
            config.support_files_dir = config.support_files_dir.map(|dir| base_dir.join(dir));
            config.catalog_path = config.catalog_path.map(|file| base_dir.join(file));
        }

        Self::from_config(config)
    }

    /// Sets the application vendor, name and version.
    pub fn with_app<V, N, R>(mut self, vendor: V, name: N, version: R) -> Self
    where
        V: Into<String>,
        N: Into<String>,
        R: Into<String>,
    {
        self.app_vendor = vendor.into();
        self.app_name = name.into();
        self.app_version = version.into();
        self
    }

    /// Sets the deploy mode.
    pub fn with_deploy_mode(mut self, value: DeployMode) -> Self {
        self.deploy_mode = value;
        self
    }

    /// Sets the directory checked before any phase runs.
    pub fn with_support_files_dir<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.support_files_dir = Some(value.into());
        self
    }

    /// Sets the product catalog file.
    pub fn with_catalog_path<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.catalog_path = Some(value.into());
        self
    }

    /// Sets the policy for an installer family.
    pub fn with_policy(mut self, family: InstallerFamily, policy: FamilyPolicy) -> Self {
        match family {
            InstallerFamily::Msi => self.msi = policy,
            InstallerFamily::Managed => self.managed = policy,
            InstallerFamily::Legacy => self.legacy = policy,
        }
        self
    }

    /// Returns the application vendor.
    pub fn app_vendor(&self) -> &str {
        &self.app_vendor
    }

    /// Returns the application name.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Returns the application version.
    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// Returns the deployment type.
    pub fn deployment_type(&self) -> DeploymentType {
        self.deployment_type
    }

    /// Returns the deploy mode.
    pub fn deploy_mode(&self) -> DeployMode {
        self.deploy_mode
    }

    /// Returns the support files directory.
    pub fn support_files_dir(&self) -> Option<&Path> {
        self.support_files_dir.as_deref()
    }

    /// Returns the product catalog path.
    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }

    /// Returns the external tool locations.
    pub fn tool_paths(&self) -> &ToolPaths {
        &self.tool_paths
    }

    /// Returns the policy for an installer family.
    pub fn policy(&self, family: InstallerFamily) -> &FamilyPolicy {
        match family {
            InstallerFamily::Msi => &self.msi,
            InstallerFamily::Managed => &self.managed,
            InstallerFamily::Legacy => &self.legacy,
        }
    }

    /// Checks that the files the deployment depends on are present.
    pub fn verify(&self) -> Result<(), DeployError> {
        if let Some(dir) = &self.support_files_dir {
            if !dir.is_dir() {
                return Err(DeployError::new(DeployErrorKind::Bootstrap)
                    .with_context(format!("missing support files directory {dir:?}")));
            }
        }

        Ok(())
    }
}
