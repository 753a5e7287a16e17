//! Test resolving and dispatching uninstalls from a config directory.
use std::path::Path;

use deploycrate::{
    context::DeploymentContext,
    error::{DeployError, DeployErrorKind},
    exit::{EXIT_CODE_BOOTSTRAP_FAILURE, EXIT_CODE_GENERIC_FAILURE},
    inventory::{InstalledApplication, NameFilter, StaticInventory},
    phase::{DeploymentScript, Session},
    process::{ProcessRunner, ProcessSpec},
    uninst::{CommandKind, UninstallTarget, Uninstaller},
};

const CATALOG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<InstallInfo>
  <RIBSMediaInfo>
    <Media>
      <SAPCode>ILST</SAPCode>
      <prodVersion>25.0</prodVersion>
      <Platform>win32</Platform>
    </Media>
  </RIBSMediaInfo>
  <HDMedias>
    <HDMedia>
      <SAPCode>ILST</SAPCode>
      <baseVersion>26.3</baseVersion>
      <Platform>win64</Platform>
    </HDMedia>
    <HDMedia>
      <SAPCode>KBRG</SAPCode>
      <baseVersion>12.0</baseVersion>
      <Platform>win64</Platform>
    </HDMedia>
  </HDMedias>
</InstallInfo>
"#;

const CONFIG: &str = r#"(
    app_vendor: "Adobe",
    app_name: "Illustrator",
    app_version: "26.3.1",
    deployment_type: Uninstall,
    deploy_mode: Silent,
    support_files_dir: Some("SupportFiles"),
    catalog_path: Some("Build/optionXML.xml"),
    msiexec_path: Some("C:/Windows/System32/msiexec.exe"),
    managed_setup_path: Some("C:/HDBox/Setup.exe"),
    legacy_uninstaller_path: Some("C:/Utils/Creative Cloud Uninstaller.exe"),
    msi: (ignore_exit_codes: [1605, 1614], settle_delay_ms: 0),
    managed: (ignore_exit_codes: [], settle_delay_ms: 0),
    legacy: (ignore_exit_codes: [], settle_delay_ms: 0),
)"#;

#[derive(Default)]
struct RecordingRunner {
    codes: Vec<i32>,
    commands: Vec<ProcessSpec>,
}

impl ProcessRunner for RecordingRunner {
    fn run(&mut self, spec: &ProcessSpec) -> Result<Option<i32>, DeployError> {
        self.commands.push(spec.clone());

        if self.codes.is_empty() {
            Ok(Some(0))
        } else {
            Ok(Some(self.codes.remove(0)))
        }
    }
}

fn write_deployment(dir: &Path) -> anyhow::Result<DeploymentContext> {
    std::fs::create_dir_all(dir.join("SupportFiles"))?;
    std::fs::create_dir_all(dir.join("Build"))?;
    std::fs::write(dir.join("Build/optionXML.xml"), CATALOG)?;
    std::fs::write(dir.join("Deploy-Application.ron"), CONFIG)?;

    Ok(DeploymentContext::load(dir.join("Deploy-Application.ron"))?)
}

fn inventory() -> StaticInventory {
    StaticInventory::default()
        .with_application(InstalledApplication::new(
            "Adobe Illustrator 2022",
            r#""C:\Program Files (x86)\Common Files\Adobe\Adobe Desktop Common\HDBox\Uninstaller.exe" --uninstall=1 --sapCode=ILST --productVersion=26.3.1 --productPlatform=win64 --productAdobeCode={ILST-26.3.1-64-ADBEADBEADBEADBEADBEA}"#,
        ))
        .with_application(
            InstalledApplication::new(
                "Adobe Illustrator CS6",
                "MsiExec.exe /I{6A8E3D9F-4B7C-4E5A-9C1D-2F0E8B7A6C5D}",
            )
            .with_uninstall_subkey("{6a8e3d9f-4b7c-4e5a-9c1d-2f0e8b7a6c5d}"),
        )
        .with_application(InstalledApplication::new(
            "Illustrator Plugin Helper",
            r"C:\Plugins\unins000.exe /SILENT",
        ))
        .with_application(InstalledApplication::new(
            "Adobe Bridge 2022",
            r"C:\Adobe Desktop Common\HDBox\Uninstaller.exe --sapCode=KBRG --productVersion=12.0.1",
        ))
}

#[test_log::test]
fn test_plan_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let context = write_deployment(dir.path()).unwrap();

    let plan = Uninstaller::new(&context).plan(&inventory()).unwrap();

    assert_eq!(plan.targets.len(), 2);
    assert!(matches!(
        &plan.targets[0],
        UninstallTarget::ManagedProduct { entry, .. } if entry.version == "26.3" && entry.platform == "win64"
    ));
    assert_eq!(
        plan.targets[1],
        UninstallTarget::MsiProduct {
            display_name: "Adobe Illustrator CS6".to_string(),
            product_code: "{6A8E3D9F-4B7C-4E5A-9C1D-2F0E8B7A6C5D}".to_string(),
        }
    );
    assert_eq!(plan.skipped, vec!["Illustrator Plugin Helper".to_string()]);
}

#[test_log::test]
fn test_plan_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let context = write_deployment(dir.path()).unwrap();
    let inventory = inventory();
    let mut uninstaller = Uninstaller::new(&context).with_filter(NameFilter::wildcard("Adobe *"));

    let first = uninstaller.plan(&inventory).unwrap();
    let second = uninstaller.plan(&inventory).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.targets.len(), 3);
}

#[test_log::test]
fn test_dispatch_reboot_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let context = write_deployment(dir.path()).unwrap();
    let mut runner = RecordingRunner {
        codes: vec![3010, 1603],
        ..Default::default()
    };

    let report = Uninstaller::new(&context)
        .run(&inventory(), &mut runner)
        .unwrap();

    assert_eq!(report.exit_status.code(), 3010);
    assert_eq!(runner.commands.len(), 2);
    assert_eq!(
        runner.commands[0].args,
        vec![
            "--uninstall=1",
            "--sapCode=ILST",
            "--baseVersion=26.3",
            "--platform=win64",
            "--deleteUserPreferences=false",
        ]
    );
    assert_eq!(
        runner.commands[1].path,
        Path::new("C:/Windows/System32/msiexec.exe")
    );
}

#[test_log::test]
fn test_unrecognized_not_dispatched() {
    let dir = tempfile::tempdir().unwrap();
    let context = write_deployment(dir.path()).unwrap();
    let mut runner = RecordingRunner::default();

    let report = Uninstaller::new(&context)
        .with_filter(NameFilter::exact("Illustrator Plugin Helper"))
        .run(&inventory(), &mut runner)
        .unwrap();

    assert!(report.outcomes.is_empty());
    assert!(runner.commands.is_empty());
    assert_eq!(report.exit_status.code(), 0);
    assert_eq!(
        deploycrate::classify(r"C:\Plugins\unins000.exe /SILENT", None).kind,
        CommandKind::Unrecognized
    );
}

struct UninstallScript {
    runner: RecordingRunner,
    fail_post: bool,
}

impl DeploymentScript for UninstallScript {
    fn main_phase(&mut self, session: &mut Session) -> Result<(), DeployError> {
        let report = Uninstaller::new(session.context()).run(&inventory(), &mut self.runner)?;
        session.merge_report(&report);
        Ok(())
    }

    fn post_phase(&mut self, _session: &mut Session) -> Result<(), DeployError> {
        if self.fail_post {
            Err(DeployErrorKind::Other.into())
        } else {
            Ok(())
        }
    }
}

#[test_log::test]
fn test_run_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let context = write_deployment(dir.path()).unwrap();
    let mut script = UninstallScript {
        runner: RecordingRunner {
            codes: vec![0, 1605],
            ..Default::default()
        },
        fail_post: false,
    };

    let code = deploycrate::run_deployment(&context, &mut script);

    assert_eq!(code, 0);
    assert_eq!(script.runner.commands.len(), 2);

    script.fail_post = true;
    let code = deploycrate::run_deployment(&context, &mut script);

    assert_eq!(code, EXIT_CODE_GENERIC_FAILURE);
}

#[test_log::test]
fn test_missing_support_files() {
    let dir = tempfile::tempdir().unwrap();
    let context = write_deployment(dir.path()).unwrap();
    std::fs::remove_dir(dir.path().join("SupportFiles")).unwrap();
    let mut script = UninstallScript {
        runner: RecordingRunner::default(),
        fail_post: false,
    };

    let code = deploycrate::run_deployment(&context, &mut script);

    assert_eq!(code, EXIT_CODE_BOOTSTRAP_FAILURE);
    assert!(script.runner.commands.is_empty());
}
