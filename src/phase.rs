//! Linear phase sequence of a deployment script.
//!
//! A deployment runs three stages in order: pre, main and post. Each
//! deployment type names them differently ("Pre-Installation",
//! "Uninstallation", "Post-Repair"). A stage is entered once and never
//! retried.
//!
//! ```
//! # use deploycrate::context::{DeploymentContext, DeploymentType};
//! # use deploycrate::error::DeployError;
//! # use deploycrate::path::ToolPaths;
//! # use deploycrate::phase::{DeploymentScript, Session};
//! struct Script;
//!
//! impl DeploymentScript for Script {
//!     fn main_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
//!         session.record_exit_code(3010);
//!         Ok(())
//!     }
//! }
//!
//! let context = DeploymentContext::new(DeploymentType::Install, ToolPaths::default());
//! let code = deploycrate::phase::run_deployment(&context, &mut Script);
//!
//! assert_eq!(code, 3010);
//! ```
use std::{any::Any, fmt::Display, panic::AssertUnwindSafe};

use crate::{
    context::{DeploymentContext, DeploymentType},
    error::{format_error, DeployError, DeployErrorKind},
    exit::{ExitStatus, EXIT_CODE_BOOTSTRAP_FAILURE, EXIT_CODE_GENERIC_FAILURE},
    process::{ProcessRunner, ProcessSpec},
    uninst::UninstallReport,
};

/// Position of a phase within the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Preparation before the main work.
    Pre,
    /// The install, uninstall or repair itself.
    Main,
    /// Cleanup after the main work.
    Post,
}

impl Stage {
    /// All stages in the order they run.
    pub const ALL: [Stage; 3] = [Stage::Pre, Stage::Main, Stage::Post];
}

/// A named step of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Phase {
    /// The deployment being performed.
    pub deployment_type: DeploymentType,
    /// Position within the sequence.
    pub stage: Stage,
}

impl Phase {
    /// Creates a phase.
    pub fn new(deployment_type: DeploymentType, stage: Stage) -> Self {
        Self {
            deployment_type,
            stage,
        }
    }

    /// Returns the phases of a deployment in the order they run.
    pub fn sequence(deployment_type: DeploymentType) -> [Phase; 3] {
        Stage::ALL.map(|stage| Phase::new(deployment_type, stage))
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = match self.deployment_type {
            DeploymentType::Install => "Installation",
            DeploymentType::Uninstall => "Uninstallation",
            DeploymentType::Repair => "Repair",
        };

        match self.stage {
            Stage::Pre => write!(f, "Pre-{noun}"),
            Stage::Main => f.write_str(noun),
            Stage::Post => write!(f, "Post-{noun}"),
        }
    }
}

/// State shared by the phases of one run.
#[derive(Debug)]
pub struct Session<'a> {
    context: &'a DeploymentContext,
    phase: Phase,
    exit_status: ExitStatus,
}

impl<'a> Session<'a> {
    fn new(context: &'a DeploymentContext) -> Self {
        Self {
            context,
            phase: Phase::new(context.deployment_type(), Stage::Pre),
            exit_status: ExitStatus::new(),
        }
    }

    /// Returns the deployment context.
    pub fn context(&self) -> &'a DeploymentContext {
        self.context
    }

    /// Returns the phase currently running.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the status so far.
    pub fn exit_status(&self) -> ExitStatus {
        self.exit_status
    }

    /// Records the exit code of an action.
    pub fn record_exit_code(&mut self, code: i32) {
        self.exit_status.record(code);
    }

    /// Records the combined status of an uninstall.
    pub fn merge_report(&mut self, report: &UninstallReport) {
        self.exit_status.merge(&report.exit_status);
    }

    /// Runs an external installer and records its exit code.
    ///
    /// Returns the code after mapping ignored codes to success. A process
    /// that fails to start is recorded as a launch failure.
    pub fn execute(&mut self, runner: &mut dyn ProcessRunner, spec: &ProcessSpec) -> i32 {
        tracing::info!(path = ?spec.path, args = spec.command_line(), "running installer");

        let result = runner.run(spec);
        let code = spec.exit_code(&result);

        if let Err(error) = &result {
            tracing::error!(error = format_error(error), "could not run installer");
        }

        self.record_exit_code(code);
        code
    }
}

/// Work performed by a deployment.
///
/// Only the main phase is required.
pub trait DeploymentScript {
    /// Runs before the main phase.
    fn pre_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
        let _ = session;
        Ok(())
    }

    /// Installs, uninstalls or repairs the application.
    fn main_phase(&mut self, session: &mut Session) -> Result<(), DeployError>;

    /// Runs after the main phase.
    fn post_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
        let _ = session;
        Ok(())
    }

    /// Called once when a phase returns an error, before the run ends.
    fn on_fatal_error(&mut self, error: &DeployError) {
        let _ = error;
    }
}

/// Runs the phases of a deployment and returns the process exit code.
///
/// If the context fails verification, no phase runs and the bootstrap
/// failure code is returned. If a phase returns an error or panics, the
/// remaining phases are not run and the generic failure code is returned. Otherwise
/// the combined status of everything recorded in the session is returned.
pub fn run_deployment<S: DeploymentScript + ?Sized>(
    context: &DeploymentContext,
    script: &mut S,
) -> i32 {
    tracing::info!(
        vendor = context.app_vendor(),
        name = context.app_name(),
        version = context.app_version(),
        deployment_type = %context.deployment_type(),
        "starting deployment"
    );

    if let Err(error) = context.verify() {
        tracing::error!(error = format_error(&error), "bootstrap failed");
        return EXIT_CODE_BOOTSTRAP_FAILURE;
    }

    let mut session = Session::new(context);

    for phase in Phase::sequence(context.deployment_type()) {
        session.phase = phase;

        let span = tracing::info_span!("phase", name = %phase);
        let _guard = span.enter();

        tracing::info!("entering phase");

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| match phase.stage {
            Stage::Pre => script.pre_phase(&mut session),
            Stage::Main => script.main_phase(&mut session),
            Stage::Post => script.post_phase(&mut session),
        }))
        .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));

        if let Err(error) = result {
            tracing::error!(error = format_error(&error), "phase failed");
            script.on_fatal_error(&error);
            return EXIT_CODE_GENERIC_FAILURE;
        }
    }

    let code = session.exit_status.code();
    tracing::info!(code, "deployment finished");

    code
}

fn panic_error(payload: &(dyn Any + Send)) -> DeployError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();

    DeployError::new(DeployErrorKind::Other).with_context(format!("phase panicked: {message}"))
}
