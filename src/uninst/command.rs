use serde::{Deserialize, Serialize};

/// Token identifying the Windows Installer service in an uninstall string.
pub const MSI_TOKEN: &str = "msiexec";

/// Path fragment of the Adobe managed installer (HDBox).
pub const MANAGED_INSTALLER_PATH: &str = r"Adobe Desktop Common\HDBox";

/// Path fragment of the legacy Creative Cloud uninstaller.
pub const LEGACY_UNINSTALLER_PATH: &str = r"Adobe Creative Cloud\Utils\Creative Cloud Uninstaller";

/// Installer family of an uninstall string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Installed by Windows Installer and removable by product code.
    MsiPackaged,
    /// Managed by the Adobe HDBox installer.
    AdobeHDBoxManaged,
    /// The Creative Cloud desktop application removed by its own uninstaller.
    AdobeCreativeCloudLegacy,
    /// None of the known shapes.
    #[default]
    Unrecognized,
}

/// Fields extracted from an uninstall string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ParsedUninstallCommand {
    /// Installer family.
    pub kind: CommandKind,
    /// MSI product code for [`CommandKind::MsiPackaged`].
    pub product_code: Option<String>,
    /// Adobe product code such as `ILST` or `PHSP`.
    pub sap_code: Option<String>,
    /// Full installed version such as `26.3.1`.
    pub product_version: Option<String>,
    /// Leading component of `product_version`.
    pub base_version: Option<String>,
    /// Platform identifier such as `win64`.
    pub product_platform: Option<String>,
}

impl ParsedUninstallCommand {
    fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }
}

/// Classifies an uninstall string.
///
/// The checks are applied in order and the first match wins:
///
/// 1. The string invokes `msiexec` and a product code subkey is present.
/// 2. The string runs the HDBox managed installer. Its `--sapCode`,
///    `--productVersion` and `--productPlatform` options are extracted. When
///    no SAP code can be extracted, the result is [`CommandKind::Unrecognized`].
/// 3. The string runs the legacy Creative Cloud uninstaller.
/// 4. Otherwise, [`CommandKind::Unrecognized`].
///
/// Path and token matching ignores ASCII case.
pub fn classify(uninstall_string: &str, uninstall_subkey: Option<&str>) -> ParsedUninstallCommand {
    let lowercase = uninstall_string.to_ascii_lowercase();

    if let Some(subkey) = uninstall_subkey.filter(|subkey| !subkey.is_empty()) {
        if lowercase.contains(MSI_TOKEN) {
            let mut command = ParsedUninstallCommand::new(CommandKind::MsiPackaged);
            command.product_code = Some(subkey.to_string());
            return command;
        }
    }

    if lowercase.contains(&MANAGED_INSTALLER_PATH.to_ascii_lowercase()) {
        return classify_managed(uninstall_string);
    }

    if lowercase.contains(&LEGACY_UNINSTALLER_PATH.to_ascii_lowercase()) {
        return ParsedUninstallCommand::new(CommandKind::AdobeCreativeCloudLegacy);
    }

    ParsedUninstallCommand::new(CommandKind::Unrecognized)
}

fn classify_managed(uninstall_string: &str) -> ParsedUninstallCommand {
    let options = parse_options(uninstall_string);
    let mut command = ParsedUninstallCommand::new(CommandKind::AdobeHDBoxManaged);

    command.sap_code = option_value(&options, "sapCode");
    command.product_version = option_value(&options, "productVersion");
    command.product_platform = option_value(&options, "productPlatform");
    command.base_version = command
        .product_version
        .as_deref()
        .and_then(base_version)
        .map(str::to_string);

    if command.sap_code.is_none() {
        tracing::debug!(uninstall_string, "managed installer string without SAP code");
        return ParsedUninstallCommand::new(CommandKind::Unrecognized);
    }

    command
}

fn option_value(options: &[(String, String)], key: &str) -> Option<String> {
    options
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.clone())
        .filter(|value| !value.is_empty())
}

/// Returns the leading numeric component of a version, `26` for `26.3.1`.
pub fn base_version(version: &str) -> Option<&str> {
    let base = version.split('.').next().unwrap_or_default().trim();

    if !base.is_empty() && base.bytes().all(|c| c.is_ascii_digit()) {
        Some(base)
    } else {
        None
    }
}

/// Splits command line arguments into `(key, value)` option pairs.
///
/// Tokens are separated by whitespace outside double quotes. A token starting
/// with `-` or `--` is an option whose key ends at the first `=`. The value
/// has its surrounding double quotes removed. An option without `=` has an
/// empty value. Other tokens are ignored.
pub fn parse_options(args: &str) -> Vec<(String, String)> {
    split_args(args)
        .into_iter()
        .filter_map(|token| {
            let option = token
                .strip_prefix("--")
                .or_else(|| token.strip_prefix('-'))?;

            let (key, value) = option.split_once('=').unwrap_or((option, ""));

            if key.is_empty() {
                return None;
            }

            Some((key.to_string(), unquote(value).to_string()))
        })
        .collect()
}

fn split_args(args: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in args.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|value| value.strip_suffix('"'))
        .unwrap_or(value)
}
