use windows_registry::Key;

use super::{AccessScope, OsError};

// Notes on installed app entries:
// https://learn.microsoft.com/en-us/windows/win32/msi/uninstall-registry-key
//
// Note on registry API:
// * open() is open read-only
// * create() is open read/write

pub const REGISTRY_UNINSTALL_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
pub const REGISTRY_UNINSTALL_WOW64_KEY: &str =
    r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall";

fn get_registry_predefined_key(access_scope: AccessScope) -> &'static Key {
    match access_scope {
        AccessScope::User => windows_registry::CURRENT_USER,
        AccessScope::System => windows_registry::LOCAL_MACHINE,
    }
}

/// Values of a single subkey under an Uninstall key.
#[derive(Debug, Clone, Default)]
pub struct UninstallEntry {
    pub subkey: String,
    pub display_name: String,
    pub display_version: String,
    pub uninstall_string: String,
    pub system_component: bool,
}

/// Returns the uninstall entries under the given key.
///
/// A missing key returns no entries. Subkeys that cannot be opened are skipped.
pub fn read_uninstall_entries(
    access_scope: AccessScope,
    key_path: &str,
) -> Result<Vec<UninstallEntry>, OsError> {
    let predef_key = get_registry_predefined_key(access_scope);

    tracing::debug!(?access_scope, key_path, "opening uninstall key read-only");
    let Ok(hkey) = predef_key.open(key_path) else {
        tracing::debug!(?access_scope, key_path, "uninstall key not present");
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();

    for subkey in hkey.keys()? {
        let sub_hkey = match hkey.open(&subkey) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(subkey, %error, "cannot open uninstall subkey");
                continue;
            }
        };

        entries.push(UninstallEntry {
            display_name: sub_hkey.get_string("DisplayName").unwrap_or_default(),
            display_version: sub_hkey.get_string("DisplayVersion").unwrap_or_default(),
            uninstall_string: sub_hkey.get_string("UninstallString").unwrap_or_default(),
            system_component: sub_hkey.get_u32("SystemComponent").unwrap_or_default() == 1,
            subkey,
        });
    }

    tracing::trace!(key_path, count = entries.len(), "read uninstall entries");

    Ok(entries)
}
