use serde::{Deserialize, Serialize};

use crate::{
    context::{DeploymentContext, InstallerFamily},
    error::format_error,
    exit::ExitStatus,
    process::{ProcessRunner, ProcessSpec},
};

use super::plan::{UninstallPlan, UninstallTarget};

/// Result of dispatching one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOutcome {
    /// The dispatched target.
    pub target: UninstallTarget,
    /// Exit code returned by the installer, if it was waited on.
    pub raw_exit_code: Option<i32>,
    /// Exit code after applying the family's ignored codes.
    pub exit_code: i32,
}

/// Result of dispatching a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    /// One outcome per dispatched target, in order.
    pub outcomes: Vec<TargetOutcome>,
    /// Display names of applications that produced no target.
    pub skipped: Vec<String>,
    /// Combined status of all outcomes.
    pub exit_status: ExitStatus,
}

/// Builds the silent uninstall command for a target.
pub fn uninstall_command(context: &DeploymentContext, target: &UninstallTarget) -> ProcessSpec {
    let tools = context.tool_paths();
    let policy = context.policy(target.family());

    let spec = match target {
        UninstallTarget::MsiProduct { product_code, .. } => ProcessSpec::new(&tools.msiexec)
            .arg(format!("/X{product_code}"))
            .arg("/qn")
            .arg("/norestart"),
        UninstallTarget::ManagedProduct { entry, .. } => ProcessSpec::new(&tools.managed_setup)
            .arg("--uninstall=1")
            .arg(format!("--sapCode={}", entry.sap_code))
            .arg(format!("--baseVersion={}", entry.version))
            .arg(format!("--platform={}", entry.platform))
            .arg("--deleteUserPreferences=false"),
        UninstallTarget::LegacyCreativeCloud { .. } => {
            ProcessSpec::new(&tools.legacy_uninstaller).arg("-u")
        }
    };

    spec.with_ignore_exit_codes(&policy.ignore_exit_codes)
}

/// Dispatches uninstall targets one at a time.
pub struct Executor<'a> {
    context: &'a DeploymentContext,
    runner: &'a mut dyn ProcessRunner,
}

impl<'a> Executor<'a> {
    /// Creates an executor launching processes with the given runner.
    pub fn new(context: &'a DeploymentContext, runner: &'a mut dyn ProcessRunner) -> Self {
        Self { context, runner }
    }

    /// Runs every target of the plan.
    ///
    /// A failing target is recorded in the report and does not stop the
    /// remaining targets.
    pub fn run(&mut self, plan: &UninstallPlan) -> UninstallReport {
        let mut report = UninstallReport {
            skipped: plan.skipped.clone(),
            ..Default::default()
        };

        for target in &plan.targets {
            let span = tracing::info_span!("executor target", uninstall = %target);
            let _guard = span.enter();

            let outcome = self.run_target(target);
            report.exit_status.record(outcome.exit_code);
            report.outcomes.push(outcome);
        }

        tracing::info!(
            count = report.outcomes.len(),
            code = report.exit_status.code(),
            "uninstall finished"
        );

        report
    }

    fn run_target(&mut self, target: &UninstallTarget) -> TargetOutcome {
        let spec = uninstall_command(self.context, target);

        tracing::info!(path = ?spec.path, args = spec.command_line(), "running uninstaller");

        let result = self.runner.run(&spec);
        let exit_code = spec.exit_code(&result);
        let launched = result.is_ok();

        let raw_exit_code = match result {
            Ok(raw_exit_code) => raw_exit_code,
            Err(error) => {
                tracing::error!(error = format_error(&error), "could not run uninstaller");
                None
            }
        };

        match raw_exit_code {
            Some(code) if code != exit_code => {
                tracing::info!(code, "ignored uninstaller exit code")
            }
            Some(code) if code != 0 => tracing::warn!(code, "uninstaller exit code"),
            _ => {}
        }

        // Nothing to settle when the process never started.
        if launched {
            self.settle(target.family());
        }

        TargetOutcome {
            target: target.clone(),
            raw_exit_code,
            exit_code,
        }
    }

    fn settle(&self, family: InstallerFamily) {
        let delay = self.context.policy(family).settle_delay();

        if !delay.is_zero() {
            tracing::debug!(?delay, "waiting for uninstaller to release locks");
            std::thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        context::{DeploymentType, FamilyPolicy},
        error::{DeployError, DeployErrorKind},
        exit::EXIT_CODE_PROCESS_LAUNCH_FAILURE,
        path::ToolPaths,
        uninst::catalog::{CatalogSection, ProductCatalogEntry},
    };

    use super::*;

    struct ScriptedRunner {
        codes: Vec<Result<Option<i32>, DeployErrorKind>>,
        specs: Vec<ProcessSpec>,
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&mut self, spec: &ProcessSpec) -> Result<Option<i32>, DeployError> {
            self.specs.push(spec.clone());
            self.codes.remove(0).map_err(DeployError::new)
        }
    }

    fn context() -> DeploymentContext {
        let context = DeploymentContext::new(
            DeploymentType::Uninstall,
            ToolPaths::new("msiexec.exe", "Setup.exe", "Creative Cloud Uninstaller.exe"),
        );
        [InstallerFamily::Msi, InstallerFamily::Managed, InstallerFamily::Legacy]
            .into_iter()
            .fold(context, |context, family| {
                let codes = context.policy(family).ignore_exit_codes.clone();
                context.with_policy(family, FamilyPolicy::new(&codes, 0))
            })
    }

    fn plan() -> UninstallPlan {
        UninstallPlan {
            targets: vec![
                UninstallTarget::MsiProduct {
                    display_name: "Reader".to_string(),
                    product_code: "{AC76BA86-7AD7-1033-7B44-AC0F074E4100}".to_string(),
                },
                UninstallTarget::ManagedProduct {
                    display_name: "Illustrator".to_string(),
                    entry: ProductCatalogEntry::new(CatalogSection::Hd, "ILST", "26.0", "win64"),
                },
                UninstallTarget::LegacyCreativeCloud {
                    display_name: "Creative Cloud".to_string(),
                },
            ],
            skipped: vec!["VirtualBox".to_string()],
        }
    }

    #[test]
    fn test_command_templates() {
        let context = context();
        let plan = plan();

        let msi = uninstall_command(&context, &plan.targets[0]);
        assert_eq!(msi.path.to_str(), Some("msiexec.exe"));
        assert_eq!(
            msi.args,
            vec!["/X{AC76BA86-7AD7-1033-7B44-AC0F074E4100}", "/qn", "/norestart"]
        );
        assert_eq!(msi.ignore_exit_codes, vec![1605, 1614]);

        let managed = uninstall_command(&context, &plan.targets[1]);
        assert_eq!(
            managed.command_line(),
            "--uninstall=1 --sapCode=ILST --baseVersion=26.0 --platform=win64 --deleteUserPreferences=false"
        );

        let legacy = uninstall_command(&context, &plan.targets[2]);
        assert_eq!(legacy.args, vec!["-u"]);
    }

    #[test]
    fn test_exit_codes() {
        let context = context();
        let mut runner = ScriptedRunner {
            codes: vec![Ok(Some(1605)), Ok(Some(3010)), Ok(Some(1))],
            specs: Vec::new(),
        };

        let report = Executor::new(&context, &mut runner).run(&plan());

        assert_eq!(report.outcomes[0].raw_exit_code, Some(1605));
        assert_eq!(report.outcomes[0].exit_code, 0);
        assert_eq!(report.exit_status.code(), 3010);
        assert_eq!(report.skipped, vec!["VirtualBox".to_string()]);
        assert_eq!(runner.specs.len(), 3);
    }

    #[test]
    fn test_launch_failure_continues() {
        let context = context();
        let mut runner = ScriptedRunner {
            codes: vec![
                Err(DeployErrorKind::ProcessLaunch),
                Ok(Some(0)),
                Ok(None),
            ],
            specs: Vec::new(),
        };

        let report = Executor::new(&context, &mut runner).run(&plan());

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.outcomes[0].exit_code, EXIT_CODE_PROCESS_LAUNCH_FAILURE);
        assert_eq!(report.outcomes[2].raw_exit_code, None);
        assert_eq!(report.exit_status.code(), EXIT_CODE_PROCESS_LAUNCH_FAILURE);
    }

    #[test]
    fn test_launch_failure_skips_settle_delay() {
        let context = context().with_policy(
            InstallerFamily::Managed,
            FamilyPolicy::new(&[], 60_000),
        );
        let plan = UninstallPlan {
            targets: vec![plan().targets[1].clone()],
            skipped: Vec::new(),
        };
        let mut runner = ScriptedRunner {
            codes: vec![Err(DeployErrorKind::ProcessLaunch)],
            specs: Vec::new(),
        };

        let start = std::time::Instant::now();
        let report = Executor::new(&context, &mut runner).run(&plan);

        assert!(start.elapsed() < std::time::Duration::from_secs(30));
        assert_eq!(report.exit_status.code(), EXIT_CODE_PROCESS_LAUNCH_FAILURE);
    }
}
