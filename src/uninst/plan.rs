use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    context::InstallerFamily,
    error::{AddDeployContext, DeployError},
    inventory::InstalledApplication,
};

use super::{
    catalog::{ProductCatalog, ProductCatalogEntry},
    command::{classify, CommandKind, ParsedUninstallCommand},
};

/// A single silent uninstall to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UninstallTarget {
    /// Remove a Windows Installer product.
    MsiProduct {
        /// Display name of the installed application.
        display_name: String,
        /// Product code in braced upper-case form.
        product_code: String,
    },
    /// Remove a product through the Adobe managed installer.
    ManagedProduct {
        /// Display name of the installed application.
        display_name: String,
        /// Catalog entry supplying the SAP code, version and platform.
        entry: ProductCatalogEntry,
    },
    /// Remove the Creative Cloud desktop application.
    LegacyCreativeCloud {
        /// Display name of the installed application.
        display_name: String,
    },
}

impl UninstallTarget {
    /// Returns the display name of the installed application.
    pub fn display_name(&self) -> &str {
        match self {
            Self::MsiProduct { display_name, .. }
            | Self::ManagedProduct { display_name, .. }
            | Self::LegacyCreativeCloud { display_name } => display_name,
        }
    }

    /// Returns the installer family that performs the uninstall.
    pub fn family(&self) -> InstallerFamily {
        match self {
            Self::MsiProduct { .. } => InstallerFamily::Msi,
            Self::ManagedProduct { .. } => InstallerFamily::Managed,
            Self::LegacyCreativeCloud { .. } => InstallerFamily::Legacy,
        }
    }
}

impl Display for UninstallTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MsiProduct {
                display_name,
                product_code,
            } => write!(f, "{display_name} (MSI {product_code})"),
            Self::ManagedProduct {
                display_name,
                entry,
            } => write!(
                f,
                "{display_name} ({} {} {})",
                entry.sap_code, entry.version, entry.platform
            ),
            Self::LegacyCreativeCloud { display_name } => {
                write!(f, "{display_name} (Creative Cloud)")
            }
        }
    }
}

/// Ordered list of uninstall targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UninstallPlan {
    /// Targets in the order they are dispatched.
    pub targets: Vec<UninstallTarget>,
    /// Display names of applications that produced no target.
    pub skipped: Vec<String>,
}

impl UninstallPlan {
    /// Returns whether there is nothing to uninstall.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Supplies the product catalog when it is first needed.
pub trait CatalogSource {
    /// Returns the catalog.
    fn catalog(&mut self) -> Result<&ProductCatalog, DeployError>;
}

impl CatalogSource for ProductCatalog {
    fn catalog(&mut self) -> Result<&ProductCatalog, DeployError> {
        Ok(self)
    }
}

/// Turns installed applications into uninstall targets.
pub struct Planner<'a, C: CatalogSource> {
    catalog: &'a mut C,
}

impl<'a, C: CatalogSource> Planner<'a, C> {
    /// Creates a planner that resolves managed products with the given catalog.
    pub fn new(catalog: &'a mut C) -> Self {
        Self { catalog }
    }

    /// Plans the uninstall of the given applications.
    ///
    /// Unrecognized applications and managed products missing from the
    /// catalog are logged and skipped. Only a catalog that fails to load is
    /// an error.
    pub fn run(&mut self, applications: &[InstalledApplication]) -> Result<UninstallPlan, DeployError> {
        let mut plan = UninstallPlan::default();

        for application in applications {
            let span = tracing::debug_span!("planner application", name = application.display_name);
            let _guard = span.enter();

            let command = classify(
                &application.uninstall_string,
                application.uninstall_subkey.as_deref(),
            );
            tracing::debug!(?command, "classified uninstall string");

            let targets = self.plan_application(application, &command)?;

            if targets.is_empty() {
                plan.skipped.push(application.display_name.clone());
            }

            plan.targets.extend(targets);
        }

        Ok(plan)
    }

    fn plan_application(
        &mut self,
        application: &InstalledApplication,
        command: &ParsedUninstallCommand,
    ) -> Result<Vec<UninstallTarget>, DeployError> {
        let display_name = application.display_name.clone();

        match command.kind {
            CommandKind::MsiPackaged => {
                let product_code = command.product_code.as_deref().unwrap_or_default();

                Ok(vec![UninstallTarget::MsiProduct {
                    display_name,
                    product_code: normalize_product_code(product_code),
                }])
            }
            CommandKind::AdobeHDBoxManaged => {
                let Some(sap_code) = command.sap_code.as_deref().filter(|code| !code.is_empty())
                else {
                    tracing::warn!("managed product without SAP code");
                    return Ok(Vec::new());
                };
                let base_version = command.base_version.as_deref().unwrap_or_default();

                let catalog = self
                    .catalog
                    .catalog()
                    .deploy_context("failed to load product catalog")?;
                let entries = catalog.resolve(sap_code, base_version);

                if entries.is_empty() {
                    tracing::warn!(sap_code, base_version, "no catalog entry for product");
                }

                Ok(entries
                    .into_iter()
                    .map(|entry| UninstallTarget::ManagedProduct {
                        display_name: display_name.clone(),
                        entry: entry.clone(),
                    })
                    .collect())
            }
            CommandKind::AdobeCreativeCloudLegacy => {
                Ok(vec![UninstallTarget::LegacyCreativeCloud { display_name }])
            }
            CommandKind::Unrecognized => {
                tracing::warn!(
                    uninstall_string = application.uninstall_string,
                    "unrecognized uninstall string"
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Returns the product code as `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`.
///
/// Values that are not GUIDs are returned unchanged.
pub fn normalize_product_code(value: &str) -> String {
    match Uuid::parse_str(value) {
        Ok(uuid) => uuid.braced().to_string().to_ascii_uppercase(),
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::uninst::catalog::CatalogSection;

    use super::*;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new([
            ProductCatalogEntry::new(CatalogSection::Ribs, "ILST", "26.0", "win64"),
            ProductCatalogEntry::new(CatalogSection::Hd, "ILST", "26.0", "win64"),
            ProductCatalogEntry::new(CatalogSection::Hd, "PHSP", "25.0", "win64"),
        ])
    }

    fn illustrator() -> InstalledApplication {
        InstalledApplication::new(
            "Adobe Illustrator 2022",
            r"C:\Common Files\Adobe\Adobe Desktop Common\HDBox\Uninstaller.exe --sapCode=ILST --productVersion=26.3.1 --productPlatform=win64",
        )
    }

    #[test]
    fn test_msi_target() {
        let mut catalog = ProductCatalog::default();
        let app = InstalledApplication::new(
            "Adobe Acrobat Reader DC",
            "MsiExec.exe /I{ac76ba86-7ad7-1033-7b44-ac0f074e4100}",
        )
        .with_uninstall_subkey("{ac76ba86-7ad7-1033-7b44-ac0f074e4100}");

        let plan = Planner::new(&mut catalog).run(&[app]).unwrap();

        assert_eq!(
            plan.targets,
            vec![UninstallTarget::MsiProduct {
                display_name: "Adobe Acrobat Reader DC".to_string(),
                product_code: "{AC76BA86-7AD7-1033-7B44-AC0F074E4100}".to_string(),
            }]
        );
    }

    #[test]
    fn test_managed_targets_per_section() {
        let mut catalog = catalog();

        let plan = Planner::new(&mut catalog).run(&[illustrator()]).unwrap();

        assert_eq!(plan.targets.len(), 2);
        assert!(plan
            .targets
            .iter()
            .all(|target| target.family() == InstallerFamily::Managed));
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_managed_not_in_catalog() {
        let mut catalog = ProductCatalog::default();

        let plan = Planner::new(&mut catalog).run(&[illustrator()]).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.skipped, vec!["Adobe Illustrator 2022".to_string()]);
    }

    #[test]
    fn test_unrecognized_skipped() {
        let mut catalog = catalog();
        let app = InstalledApplication::new("Oracle VM VirtualBox", r"C:\VirtualBox\uninst.exe /S");

        let plan = Planner::new(&mut catalog).run(&[app]).unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let mut catalog = catalog();
        let apps = [
            illustrator(),
            InstalledApplication::new(
                "Adobe Creative Cloud",
                r"C:\Program Files (x86)\Adobe\Adobe Creative Cloud\Utils\Creative Cloud Uninstaller.exe",
            ),
        ];

        let first = Planner::new(&mut catalog).run(&apps).unwrap();
        let second = Planner::new(&mut catalog).run(&apps).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.targets.len(), 3);
    }

    #[test]
    fn test_normalize_product_code() {
        assert_eq!(
            normalize_product_code("{ac76ba86-7ad7-1033-7b44-ac0f074e4100}"),
            "{AC76BA86-7AD7-1033-7B44-AC0F074E4100}"
        );
        assert_eq!(normalize_product_code("NotAGuid"), "NotAGuid");
    }
}
