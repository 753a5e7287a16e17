//! Installed application inventory.
//!
//! An [`Inventory`] answers "which installed applications match this name?"
//! On Windows, [`RegistryInventory`] reads the Uninstall registry keys.
//! [`StaticInventory`] holds a fixed snapshot, such as one captured earlier
//! or assembled by hand.

use regex_lite::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DeployError;

/// An application entry in the host's installed programs view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct InstalledApplication {
    /// Name shown in the installed programs list.
    pub display_name: String,
    /// Version shown in the installed programs list.
    pub display_version: String,
    /// Command that removes the application. May be empty.
    pub uninstall_string: String,
    /// The registry subkey name when it is an MSI product code.
    pub uninstall_subkey: Option<String>,
    /// Whether the entry is hidden from the installed programs list.
    pub is_system_component: bool,
}

impl InstalledApplication {
    /// Creates an entry with the given display name and uninstall string.
    pub fn new<N, U>(display_name: N, uninstall_string: U) -> Self
    where
        N: Into<String>,
        U: Into<String>,
    {
        Self {
            display_name: display_name.into(),
            uninstall_string: uninstall_string.into(),
            ..Default::default()
        }
    }

    /// Sets the `display_version` field.
    pub fn with_display_version<V: Into<String>>(mut self, value: V) -> Self {
        self.display_version = value.into();
        self
    }

    /// Sets the `uninstall_subkey` field.
    pub fn with_uninstall_subkey<S: Into<String>>(mut self, value: S) -> Self {
        self.uninstall_subkey = Some(value.into());
        self
    }

    /// Sets the `is_system_component` field.
    pub fn with_system_component(mut self, value: bool) -> Self {
        self.is_system_component = value;
        self
    }
}

/// Returns whether the value is an MSI product code such as
/// `{23170F69-40C1-2702-2301-000001000000}`.
pub fn is_product_code(value: &str) -> bool {
    value.starts_with('{') && value.ends_with('}') && Uuid::parse_str(value).is_ok()
}

/// How [`NameFilter`] compares display names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameMatch {
    /// The display name contains the pattern.
    #[default]
    Contains,
    /// The display name equals the pattern.
    Exact,
    /// The pattern is a wildcard expression with `*` and `?`.
    Wildcard,
}

/// Selects installed applications by display name.
///
/// Comparisons ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    /// Text to compare against display names.
    pub pattern: String,
    /// Comparison method.
    pub method: NameMatch,
    /// Whether entries marked as system components are included.
    pub include_system_components: bool,
    #[serde(skip)]
    wildcard: Option<WildcardRegex>,
}

impl NameFilter {
    /// Matches display names containing the pattern.
    pub fn contains<P: Into<String>>(pattern: P) -> Self {
        Self::new(pattern, NameMatch::Contains)
    }

    /// Matches display names equal to the pattern.
    pub fn exact<P: Into<String>>(pattern: P) -> Self {
        Self::new(pattern, NameMatch::Exact)
    }

    /// Matches display names against a `*` and `?` wildcard expression.
    pub fn wildcard<P: Into<String>>(pattern: P) -> Self {
        let mut filter = Self::new(pattern, NameMatch::Wildcard);
        filter.wildcard = WildcardRegex::new(&filter.pattern);
        filter
    }

    fn new<P: Into<String>>(pattern: P, method: NameMatch) -> Self {
        Self {
            pattern: pattern.into(),
            method,
            include_system_components: false,
            wildcard: None,
        }
    }

    /// Sets whether system components are included.
    pub fn with_system_components(mut self, value: bool) -> Self {
        self.include_system_components = value;
        self
    }

    /// Returns whether the application passes the filter.
    pub fn matches(&self, application: &InstalledApplication) -> bool {
        if application.display_name.is_empty() {
            return false;
        }

        if application.is_system_component && !self.include_system_components {
            return false;
        }

        let name = &application.display_name;

        match self.method {
            NameMatch::Contains => name
                .to_ascii_lowercase()
                .contains(&self.pattern.to_ascii_lowercase()),
            NameMatch::Exact => name.eq_ignore_ascii_case(&self.pattern),
            NameMatch::Wildcard => match &self.wildcard {
                Some(regex) => regex.is_match(name),
                // Filters read from a config file are compiled on use.
                None => WildcardRegex::new(&self.pattern).is_some_and(|regex| regex.is_match(name)),
            },
        }
    }
}

/// Anchored, case-insensitive regex compiled from a wildcard expression.
#[derive(Debug, Clone)]
struct WildcardRegex(Regex);

impl WildcardRegex {
    fn new(pattern: &str) -> Option<Self> {
        let mut expression = String::from("^");
        let mut literal = String::new();

        for c in pattern.chars() {
            match c {
                '*' | '?' => {
                    expression.push_str(&regex_lite::escape(&literal));
                    literal.clear();
                    expression.push_str(if c == '*' { "(?s:.*)" } else { "(?s:.)" });
                }
                c => literal.push(c),
            }
        }

        expression.push_str(&regex_lite::escape(&literal));
        expression.push('$');

        match RegexBuilder::new(&expression).case_insensitive(true).build() {
            Ok(regex) => Some(Self(regex)),
            Err(error) => {
                tracing::warn!(pattern, %error, "invalid wildcard expression");
                None
            }
        }
    }

    fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for WildcardRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for WildcardRegex {}

/// Query interface for installed applications.
pub trait Inventory {
    /// Returns the installed applications that pass the filter.
    fn installed_applications(
        &self,
        filter: &NameFilter,
    ) -> Result<Vec<InstalledApplication>, DeployError>;
}

/// A fixed list of installed applications.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    applications: Vec<InstalledApplication>,
}

impl StaticInventory {
    /// Creates an inventory from a snapshot.
    pub fn new(applications: Vec<InstalledApplication>) -> Self {
        Self { applications }
    }

    /// Adds an application.
    pub fn with_application(mut self, application: InstalledApplication) -> Self {
        self.applications.push(application);
        self
    }
}

impl Inventory for StaticInventory {
    fn installed_applications(
        &self,
        filter: &NameFilter,
    ) -> Result<Vec<InstalledApplication>, DeployError> {
        Ok(self
            .applications
            .iter()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect())
    }
}

/// Reads the Uninstall keys of the Windows registry.
///
/// The 64-bit and 32-bit machine views are read before the current user's view.
#[cfg(any(windows, doc))]
#[derive(Debug, Clone, Default)]
pub struct RegistryInventory {}

#[cfg(any(windows, doc))]
impl RegistryInventory {
    /// Creates a registry inventory.
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(windows)]
impl Inventory for RegistryInventory {
    fn installed_applications(
        &self,
        filter: &NameFilter,
    ) -> Result<Vec<InstalledApplication>, DeployError> {
        use crate::os::{windows, AccessScope};

        let views = [
            (AccessScope::System, windows::REGISTRY_UNINSTALL_KEY),
            (AccessScope::System, windows::REGISTRY_UNINSTALL_WOW64_KEY),
            (AccessScope::User, windows::REGISTRY_UNINSTALL_KEY),
        ];
        let mut applications = Vec::new();

        for (access_scope, key_path) in views {
            for entry in windows::read_uninstall_entries(access_scope, key_path)? {
                let application = InstalledApplication {
                    uninstall_subkey: is_product_code(&entry.subkey).then_some(entry.subkey),
                    display_name: entry.display_name,
                    display_version: entry.display_version,
                    uninstall_string: entry.uninstall_string,
                    is_system_component: entry.system_component,
                };

                if filter.matches(&application) {
                    tracing::debug!(
                        name = application.display_name,
                        version = application.display_version,
                        "found installed application"
                    );
                    applications.push(application);
                }
            }
        }

        Ok(applications)
    }
}
