//! Example of a deployment script removing an application by name.
//!
//! Usage: `deploy_uninstall <config.ron> [name filter]...`
use std::fs::File;

use deploycrate::{
    context::DeploymentContext,
    error::DeployError,
    inventory::NameFilter,
    phase::{DeploymentScript, Session},
};
use tracing::level_filters::LevelFilter;

struct UninstallScript {
    filters: Vec<NameFilter>,
}

impl DeploymentScript for UninstallScript {
    fn pre_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
        tracing::info!(phase = %session.phase(), filters = ?self.filters, "removing applications");
        Ok(())
    }

    fn main_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
        let report = deploycrate::uninstall(session.context(), &self.filters)?;

        for name in &report.skipped {
            println!("skipped: {name}");
        }
        for outcome in &report.outcomes {
            println!("{}: {}", outcome.target, outcome.exit_code);
        }

        session.merge_report(&report);
        Ok(())
    }
}

/// Entry point
pub fn main() -> anyhow::Result<()> {
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing config file argument"))?;
    let filters = args.map(NameFilter::contains).collect();

    let context = DeploymentContext::load(&config_path)?;
    let code = deploycrate::run_deployment(&context, &mut UninstallScript { filters });

    std::process::exit(code);
}

/// Initialize logging for debugging
fn init_logging() -> anyhow::Result<()> {
    let log_file = File::options()
        .create(true)
        .append(true)
        .open(std::env::temp_dir().join("deploycrate_deploy_uninstall.log"))?;

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(LevelFilter::TRACE)
        .with_writer(log_file)
        .init();

    Ok(())
}
