//! Core of Windows application deployment scripts.
//!
//! A deployment script runs a fixed sequence of phases and dispatches to
//! external installers (`msiexec`, vendor `Setup.exe` programs) inside them.
//! The exit codes of those installers are folded into a single status that is
//! reported to the endpoint-management system.
//!
//! The main feature is removing applications by name. The uninstall string
//! of each matching installed application is classified by installer family,
//! Adobe managed products are resolved against an XML product catalog, and
//! the resulting silent uninstall commands are run one at a time.
//!
//! ## Example
//!
//! ```no_run
//! # use deploycrate::context::DeploymentContext;
//! # use deploycrate::error::DeployError;
//! # use deploycrate::inventory::NameFilter;
//! # use deploycrate::phase::{DeploymentScript, Session};
//! struct Script;
//!
//! impl DeploymentScript for Script {
//!     fn main_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
//!         let filters = [NameFilter::contains("Adobe Illustrator")];
//!         let report = deploycrate::uninstall(session.context(), &filters)?;
//!         session.merge_report(&report);
//!         Ok(())
//!     }
//! }
//!
//! let context = DeploymentContext::load("Deploy-Application.ron").unwrap();
//! let code = deploycrate::run_deployment(&context, &mut Script);
//!
//! std::process::exit(code);
//! ```
//!
//! ## Exit codes
//!
//! See [`exit`] for the codes returned. The reboot-required code `3010` is
//! never replaced by a later failure, so a run that needs a reboot always
//! reports it.
//!
//! ## Logging
//!
//! Events are emitted with [`tracing`]. The library does not install a
//! subscriber.
use context::DeploymentContext;
use error::DeployError;
use inventory::NameFilter;
use uninst::UninstallReport;

pub use phase::run_deployment;
pub use uninst::classify;

pub mod context;
pub mod error;
pub mod exit;
pub mod inventory;
pub mod os;
pub mod path;
pub mod phase;
pub mod process;
pub mod uninst;

/// Uninstalls the installed applications matching any of the filters.
///
/// Applications are read from the Windows registry and their uninstallers
/// are run silently. If no filter is given, the application name of the
/// context is used.
///
/// On other operating systems, the error kind
/// [`UnsupportedOsFamily`](crate::error::DeployErrorKind::UnsupportedOsFamily)
/// is returned.
pub fn uninstall(
    context: &DeploymentContext,
    filters: &[NameFilter],
) -> Result<UninstallReport, DeployError> {
    #[cfg(windows)]
    {
        let mut uninstaller = filters
            .iter()
            .cloned()
            .fold(uninst::Uninstaller::new(context), |uninstaller, filter| {
                uninstaller.with_filter(filter)
            });
        let inventory = inventory::RegistryInventory::new();
        let mut runner = process::SystemProcessRunner::new();

        uninstaller.run(&inventory, &mut runner)
    }

    #[cfg(not(windows))]
    {
        let _ = (context, filters);
        Err(error::DeployErrorKind::UnsupportedOsFamily.into())
    }
}
