use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use quick_xml::{
    escape::resolve_predefined_entity,
    events::{BytesRef, Event},
    Reader,
};
use serde::{Deserialize, Serialize};

use crate::error::{AddContext, DeployError, DeployErrorKind};

/// Product list of the catalog an entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogSection {
    /// The older RIBS installer media list.
    Ribs,
    /// The HD installer media list.
    Hd,
}

impl CatalogSection {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "ribs" | "ribsmediainfo" => Some(Self::Ribs),
            "hd" | "hdmedias" => Some(Self::Hd),
            _ => None,
        }
    }
}

/// A product the managed installer knows how to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProductCatalogEntry {
    /// Section the entry was listed in.
    pub section: CatalogSection,
    /// Adobe product code such as `ILST`.
    pub sap_code: String,
    /// Base version such as `26.0`.
    pub version: String,
    /// Platform identifier such as `win64`.
    pub platform: String,
}

impl ProductCatalogEntry {
    /// Creates an entry.
    pub fn new<S, V, P>(section: CatalogSection, sap_code: S, version: V, platform: P) -> Self
    where
        S: Into<String>,
        V: Into<String>,
        P: Into<String>,
    {
        Self {
            section,
            sap_code: sap_code.into(),
            version: version.into(),
            platform: platform.into(),
        }
    }

    /// Returns whether the entry's version starts with the given major version.
    ///
    /// `25` matches `25`, `25.0` and `25.1.3` but not `125` or `250`.
    pub fn matches_base_version(&self, base_version: &str) -> bool {
        if base_version.is_empty() {
            return false;
        }

        match self.version.strip_prefix(base_version) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryField {
    SapCode,
    Version,
    Platform,
}

impl EntryField {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "sapcode" => Some(Self::SapCode),
            "baseversion" | "prodversion" | "version" => Some(Self::Version),
            "platform" => Some(Self::Platform),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PartialEntry {
    sap_code: String,
    version: String,
    platform: String,
}

impl PartialEntry {
    fn push(&mut self, field: EntryField, text: &str) {
        let target = match field {
            EntryField::SapCode => &mut self.sap_code,
            EntryField::Version => &mut self.version,
            EntryField::Platform => &mut self.platform,
        };
        target.push_str(text);
    }
}

/// Reference data mapping SAP codes to versions and platforms.
///
/// The catalog is an XML document. Elements named `RIBS` or `RIBSMediaInfo`
/// hold the RIBS section, elements named `HD` or `HDMedias` the HD section.
/// Each child of a section is one product whose `SAPCode`, version
/// (`baseVersion`, `prodVersion` or `version`) and `Platform` are read from
/// its child elements:
///
/// ```xml
/// <InstallInfo>
///   <HDMedias>
///     <HDMedia>
///       <SAPCode>ILST</SAPCode>
///       <baseVersion>26.0</baseVersion>
///       <Platform>win64</Platform>
///     </HDMedia>
///   </HDMedias>
/// </InstallInfo>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductCatalog {
    ribs: Vec<ProductCatalogEntry>,
    hd: Vec<ProductCatalogEntry>,
}

impl ProductCatalog {
    /// Creates a catalog from the given entries.
    pub fn new<I: IntoIterator<Item = ProductCatalogEntry>>(entries: I) -> Self {
        let mut catalog = Self::default();

        for entry in entries {
            catalog.push(entry);
        }

        catalog
    }

    fn push(&mut self, entry: ProductCatalogEntry) {
        match entry.section {
            CatalogSection::Ribs => self.ribs.push(entry),
            CatalogSection::Hd => self.hd.push(entry),
        }
    }

    /// Deserialize from the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DeployError> {
        let path = path.as_ref();
        tracing::debug!(?path, "loading product catalog");

        let file =
            File::open(path).with_contextc(|_error| format!("could not open catalog {path:?}"))?;

        Self::from_reader(BufReader::new(file))
            .map_err(|error| error.with_context(format!("catalog {path:?}")))
    }

    /// Deserialize from the given string.
    pub fn from_xml(xml: &str) -> Result<Self, DeployError> {
        Self::from_reader(xml.as_bytes())
    }

    /// Deserialize from the given reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, DeployError> {
        let mut reader = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut catalog = Self::default();

        let mut depth = 0usize;
        let mut section: Option<(CatalogSection, usize)> = None;
        let mut entry: Option<PartialEntry> = None;
        let mut field: Option<EntryField> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|error| malformed(error, reader.buffer_position()))?;

            // Text is only taken directly inside a field element.
            let in_field =
                matches!(section, Some((_, section_depth)) if depth == section_depth + 2);

            match event {
                Event::Start(element) => {
                    depth += 1;
                    let name =
                        String::from_utf8_lossy(element.local_name().as_ref()).to_ascii_lowercase();

                    match section {
                        None => {
                            section = CatalogSection::from_tag(&name).map(|value| (value, depth));
                        }
                        Some((_, section_depth)) if depth == section_depth + 1 => {
                            entry = Some(PartialEntry::default());
                        }
                        Some((_, section_depth)) if depth == section_depth + 2 => {
                            field = EntryField::from_tag(&name);
                        }
                        _ => {}
                    }
                }
                Event::Text(text) => {
                    if let (Some(field), Some(entry)) = (field, entry.as_mut().filter(|_| in_field)) {
                        let text = text
                            .decode()
                            .map_err(|error| malformed(error, reader.buffer_position()))?;
                        entry.push(field, &text);
                    }
                }
                Event::GeneralRef(reference) => {
                    let text = resolve_reference(&reference)
                        .map_err(|error| error.with_context(format!("at byte {}", reader.buffer_position())))?;

                    if let (Some(field), Some(entry)) = (field, entry.as_mut().filter(|_| in_field)) {
                        entry.push(field, &text);
                    }
                }
                Event::CData(text) => {
                    if let (Some(field), Some(entry)) = (field, entry.as_mut().filter(|_| in_field)) {
                        entry.push(field, &String::from_utf8_lossy(&text));
                    }
                }
                Event::End(_) => {
                    if let Some((current_section, section_depth)) = section {
                        if depth == section_depth {
                            section = None;
                        } else if depth == section_depth + 1 {
                            if let Some(partial) = entry.take() {
                                catalog.finish_entry(current_section, partial);
                            }
                        } else if depth == section_depth + 2 {
                            field = None;
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }

            buf.clear();
        }

        tracing::debug!(
            ribs = catalog.ribs.len(),
            hd = catalog.hd.len(),
            "loaded product catalog"
        );

        Ok(catalog)
    }

    fn finish_entry(&mut self, section: CatalogSection, partial: PartialEntry) {
        if partial.sap_code.trim().is_empty() {
            tracing::warn!(?section, version = partial.version, "catalog entry without SAP code");
            return;
        }

        self.push(ProductCatalogEntry {
            section,
            sap_code: partial.sap_code.trim().to_string(),
            version: partial.version.trim().to_string(),
            platform: partial.platform.trim().to_string(),
        });
    }

    /// Returns the entries in the given section.
    pub fn section(&self, section: CatalogSection) -> &[ProductCatalogEntry] {
        match section {
            CatalogSection::Ribs => &self.ribs,
            CatalogSection::Hd => &self.hd,
        }
    }

    /// Returns all entries, RIBS before HD.
    pub fn entries(&self) -> impl Iterator<Item = &ProductCatalogEntry> {
        self.ribs.iter().chain(self.hd.iter())
    }

    /// Returns whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.ribs.is_empty() && self.hd.is_empty()
    }

    /// Finds the entries for a product.
    ///
    /// `sap_code` is compared exactly. `base_version` is matched as described
    /// in [`ProductCatalogEntry::matches_base_version`]. Each section is
    /// searched on its own and a product listed in both is returned twice.
    pub fn resolve(&self, sap_code: &str, base_version: &str) -> Vec<&ProductCatalogEntry> {
        let matches = self
            .entries()
            .filter(|entry| entry.sap_code == sap_code && entry.matches_base_version(base_version))
            .collect::<Vec<_>>();

        tracing::trace!(sap_code, base_version, count = matches.len(), "resolve");

        matches
    }
}

fn resolve_reference(reference: &BytesRef) -> Result<String, DeployError> {
    let character = reference
        .resolve_char_ref()
        .map_err(|error| DeployError::new(DeployErrorKind::MalformedCatalog).with_source(error))?;

    if let Some(c) = character {
        return Ok(c.to_string());
    }

    let name = reference
        .decode()
        .map_err(|error| DeployError::new(DeployErrorKind::MalformedCatalog).with_source(error))?;

    match resolve_predefined_entity(&name) {
        Some(value) => Ok(value.to_string()),
        None => Err(DeployError::new(DeployErrorKind::MalformedCatalog)
            .with_context(format!("unknown entity &{name};"))),
    }
}

fn malformed<E>(error: E, position: u64) -> DeployError
where
    E: std::error::Error + Send + Sync + 'static,
{
    DeployError::new(DeployErrorKind::MalformedCatalog)
        .with_source(error)
        .with_context(format!("at byte {position}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<InstallInfo>
  <Products>
    <RIBSMediaInfo>
      <Media>
        <SAPCode>ILST</SAPCode>
        <prodVersion>25.0</prodVersion>
        <Platform>win64</Platform>
      </Media>
    </RIBSMediaInfo>
    <HDMedias>
      <HDMedia>
        <SAPCode>ILST</SAPCode>
        <baseVersion>25.1.3</baseVersion>
        <Platform>win64</Platform>
      </HDMedia>
      <HDMedia>
        <SAPCode>ILST</SAPCode>
        <baseVersion>250.0</baseVersion>
        <Platform>win64</Platform>
      </HDMedia>
      <HDMedia>
        <SAPCode>PHSP</SAPCode>
        <baseVersion><![CDATA[23.0]]></baseVersion>
        <Platform>win64</Platform>
      </HDMedia>
      <HDMedia>
        <baseVersion>1.0</baseVersion>
      </HDMedia>
    </HDMedias>
  </Products>
</InstallInfo>
"#;

    #[test]
    fn test_parse_sections() {
        let catalog = ProductCatalog::from_xml(CATALOG).unwrap();

        assert_eq!(
            catalog.section(CatalogSection::Ribs),
            &[ProductCatalogEntry::new(
                CatalogSection::Ribs,
                "ILST",
                "25.0",
                "win64"
            )]
        );
        assert_eq!(catalog.section(CatalogSection::Hd).len(), 3);
        assert_eq!(catalog.section(CatalogSection::Hd)[2].version, "23.0");
    }

    #[test]
    fn test_resolve_both_sections() {
        let catalog = ProductCatalog::from_xml(CATALOG).unwrap();

        let found = catalog.resolve("ILST", "25");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].section, CatalogSection::Ribs);
        assert_eq!(found[1].section, CatalogSection::Hd);
        assert_eq!(found[1].version, "25.1.3");
    }

    #[test]
    fn test_resolve_case_sensitive_sap_code() {
        let catalog = ProductCatalog::from_xml(CATALOG).unwrap();

        assert!(catalog.resolve("ilst", "25").is_empty());
        assert!(catalog.resolve("KBRG", "25").is_empty());
    }

    #[test]
    fn test_base_version_prefix() {
        let entry = |version: &str| ProductCatalogEntry::new(CatalogSection::Hd, "X", version, "");

        assert!(entry("25").matches_base_version("25"));
        assert!(entry("25.0").matches_base_version("25"));
        assert!(entry("25.1.3").matches_base_version("25"));
        assert!(!entry("125").matches_base_version("25"));
        assert!(!entry("250").matches_base_version("25"));
        assert!(!entry("25").matches_base_version(""));
    }

    #[test]
    fn test_duplicates_kept() {
        let catalog = ProductCatalog::new([
            ProductCatalogEntry::new(CatalogSection::Hd, "AEFT", "24.0", "win64"),
            ProductCatalogEntry::new(CatalogSection::Ribs, "AEFT", "24.0", "win64"),
        ]);

        let found = catalog.resolve("AEFT", "24");

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].section, CatalogSection::Ribs);
    }

    #[test]
    fn test_malformed() {
        let result = ProductCatalog::from_xml("<InstallInfo><HD></RIBS></InstallInfo>");

        assert!(matches!(
            result.unwrap_err().kind(),
            DeployErrorKind::MalformedCatalog
        ));
    }

    #[test]
    fn test_escaped_field_text() {
        let catalog = ProductCatalog::from_xml(
            "<HDMedias><HDMedia>\
             <SAPCode>IL&#83;T</SAPCode>\
             <baseVersion> 26&#x2E;0 </baseVersion>\
             <Platform>win&amp;64</Platform>\
             </HDMedia></HDMedias>",
        )
        .unwrap();

        assert_eq!(
            catalog.section(CatalogSection::Hd),
            &[ProductCatalogEntry::new(CatalogSection::Hd, "ILST", "26.0", "win&64")]
        );
        assert_eq!(catalog.resolve("ILST", "26").len(), 1);
    }

    #[test]
    fn test_unknown_entity() {
        let result = ProductCatalog::from_xml(
            "<HD><Media><SAPCode>IL&bogus;</SAPCode></Media></HD>",
        );

        assert!(matches!(
            result.unwrap_err().kind(),
            DeployErrorKind::MalformedCatalog
        ));
    }

    #[test]
    fn test_nested_field_markup_ignored() {
        let catalog = ProductCatalog::from_xml(
            "<RIBS><Media>\
             <SAPCode>PHSP<note>retired</note></SAPCode>\
             <version>25.0</version>\
             <Platform>win64</Platform>\
             </Media></RIBS>",
        )
        .unwrap();

        assert_eq!(catalog.section(CatalogSection::Ribs)[0].sap_code, "PHSP");
    }

    #[test]
    fn test_empty_document() {
        let catalog = ProductCatalog::from_xml("<InstallInfo/>").unwrap();

        assert!(catalog.is_empty());
    }
}
