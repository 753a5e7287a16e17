//! Uninstaller functionality.
//!
//! Removing an application is done in two steps. First, the installed
//! applications matching the requested names are classified by their
//! uninstall strings and turned into an [`UninstallPlan`]. Then the plan's
//! targets are dispatched to the external uninstallers one at a time.
//!
//! ```
//! # use deploycrate::context::{DeploymentContext, DeploymentType};
//! # use deploycrate::inventory::{InstalledApplication, NameFilter, StaticInventory};
//! # use deploycrate::path::ToolPaths;
//! # use deploycrate::uninst::Uninstaller;
//! let context = DeploymentContext::new(
//!     DeploymentType::Uninstall,
//!     ToolPaths::new("msiexec.exe", "Setup.exe", "Creative Cloud Uninstaller.exe"),
//! );
//! let inventory = StaticInventory::default().with_application(
//!     InstalledApplication::new("Adobe Acrobat Reader DC", "MsiExec.exe /I{AC76BA86-7AD7-1033-7B44-AC0F074E4100}")
//!         .with_uninstall_subkey("{AC76BA86-7AD7-1033-7B44-AC0F074E4100}"),
//! );
//!
//! let plan = Uninstaller::new(&context)
//!     .with_filter(NameFilter::contains("Acrobat Reader"))
//!     .plan(&inventory)
//!     .unwrap();
//!
//! assert_eq!(plan.targets.len(), 1);
//! ```

use std::path::PathBuf;

use crate::{
    context::DeploymentContext,
    error::{AddDeployContext, DeployError, DeployErrorKind},
    inventory::{InstalledApplication, Inventory, NameFilter},
    process::ProcessRunner,
};

pub use self::catalog::*;
pub use self::command::*;
pub use self::exec::*;
pub use self::plan::*;

mod catalog;
mod command;
mod exec;
mod plan;

/// Product catalog read from disk on first use.
#[derive(Debug, Clone, Default)]
pub struct LazyCatalog {
    path: Option<PathBuf>,
    loaded: Option<ProductCatalog>,
}

impl LazyCatalog {
    /// Creates a catalog that will be loaded from the given path.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, loaded: None }
    }

    /// Creates an already loaded catalog.
    pub fn loaded(catalog: ProductCatalog) -> Self {
        Self {
            path: None,
            loaded: Some(catalog),
        }
    }
}

impl CatalogSource for LazyCatalog {
    fn catalog(&mut self) -> Result<&ProductCatalog, DeployError> {
        let catalog = match self.loaded.take() {
            Some(catalog) => catalog,
            None => {
                let path = self.path.as_ref().ok_or_else(|| {
                    DeployError::new(DeployErrorKind::InvalidConfig)
                        .with_context("no product catalog configured")
                })?;

                ProductCatalog::load(path)?
            }
        };

        Ok(self.loaded.insert(catalog))
    }
}

/// The uninstaller interface.
#[derive(Debug)]
pub struct Uninstaller<'a> {
    context: &'a DeploymentContext,
    filters: Vec<NameFilter>,
    catalog: LazyCatalog,
}

impl<'a> Uninstaller<'a> {
    /// Creates a new uninstaller.
    ///
    /// The catalog configured in the context is loaded only when a managed
    /// product needs to be resolved.
    pub fn new(context: &'a DeploymentContext) -> Self {
        Self {
            context,
            filters: Vec::new(),
            catalog: LazyCatalog::new(context.catalog_path().map(|path| path.to_path_buf())),
        }
    }

    /// Adds a filter selecting applications to remove.
    ///
    /// Without filters, the application name of the context is matched.
    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Manually specify a catalog instead of loading it.
    pub fn with_catalog(mut self, catalog: ProductCatalog) -> Self {
        self.catalog = LazyCatalog::loaded(catalog);
        self
    }

    /// Finds the installed applications and plans their removal.
    ///
    /// The result depends only on the inventory contents and the catalog.
    pub fn plan(&mut self, inventory: &dyn Inventory) -> Result<UninstallPlan, DeployError> {
        let applications = self.discover_applications(inventory)?;

        tracing::info!(count = applications.len(), "found installed applications");

        Planner::new(&mut self.catalog).run(&applications)
    }

    /// Plans and performs the removal.
    pub fn run(
        &mut self,
        inventory: &dyn Inventory,
        runner: &mut dyn ProcessRunner,
    ) -> Result<UninstallReport, DeployError> {
        let plan = self.plan(inventory)?;

        if plan.is_empty() {
            tracing::info!(skipped = plan.skipped.len(), "nothing to uninstall");
        }

        Ok(Executor::new(self.context, runner).run(&plan))
    }

    fn discover_applications(
        &self,
        inventory: &dyn Inventory,
    ) -> Result<Vec<InstalledApplication>, DeployError> {
        let default_filter;
        let filters = if self.filters.is_empty() {
            if self.context.app_name().is_empty() {
                return Err(DeployError::new(DeployErrorKind::InvalidInput)
                    .with_context("no application name to uninstall"));
            }
            default_filter = [NameFilter::contains(self.context.app_name())];
            &default_filter[..]
        } else {
            &self.filters[..]
        };

        let mut applications = Vec::<InstalledApplication>::new();

        for filter in filters {
            tracing::debug!(pattern = filter.pattern, method = ?filter.method, "querying inventory");

            let found = inventory
                .installed_applications(filter)
                .deploy_contextc(|| format!("failed to query installed applications {:?}", filter.pattern))?;

            for application in found {
                if !applications.contains(&application) {
                    applications.push(application);
                }
            }
        }

        Ok(applications)
    }
}
