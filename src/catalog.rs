//! The catalog of streams a skim understands.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Identifies a stream by its group (directory) and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    pub group: String,
    pub name: String,
}

impl StreamKey {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, group: &str, name: &str) -> bool {
        self.group == group && self.name == name
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

impl FromStr for StreamKey {
    type Err = Error;

    /// Parses `group/name`.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((group, name))
                if !group.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(StreamKey::new(group, name))
            }
            _ => Err(Error::InvalidCatalog {
                message: format!("stream key `{s}` is not of the form group/name"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Must exist in every usable input.
    Required,
    /// May be absent from any input.
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub key: StreamKey,
    pub presence: Presence,
}

/// The oaAnalysis event record layout.
const OA_ANALYSIS: &[(&str, &str, Presence)] = &[
    ("HeaderDir", "BasicHeader", Presence::Required),
    ("HeaderDir", "BasicDataQuality", Presence::Required),
    ("HeaderDir", "BeamSummaryData", Presence::Required),
    ("ReconDir", "P0D", Presence::Required),
    ("ReconDir", "P0DECal", Presence::Required),
    ("ReconDir", "TrackerECal", Presence::Required),
    ("ReconDir", "Global", Presence::Required),
    ("ReconDir", "Tracker", Presence::Required),
    ("ReconDir", "SMRD", Presence::Required),
    ("ReconDir", "FGDOnly", Presence::Required),
    ("TruthDir", "Trajectories", Presence::Optional),
    ("TruthDir", "Vertices", Presence::Optional),
    ("HeaderDir", "GeometrySummary", Presence::Optional),
];

/// An ordered, duplicate-free set of required and optional stream keys.
///
/// Order matters: output streams are created in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogFile", into = "CatalogFile")]
pub struct StreamCatalog {
    entries: Vec<CatalogEntry>,
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    streams: Vec<CatalogEntry>,
}

impl StreamCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::InvalidCatalog {
                message: "catalog has no streams".into(),
            });
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.key.group.is_empty() || entry.key.name.is_empty() {
                return Err(Error::InvalidCatalog {
                    message: format!("entry {i} has an empty group or name"),
                });
            }
            if entries[..i].iter().any(|e| e.key == entry.key) {
                return Err(Error::InvalidCatalog {
                    message: format!("stream {} listed twice", entry.key),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The standard oaAnalysis catalog: header, data-quality, beam summary and
    /// the reconstruction streams are required; truth information and the
    /// geometry summary are optional.
    pub fn oa_analysis() -> Self {
        Self {
            entries: OA_ANALYSIS
                .iter()
                .map(|&(group, name, presence)| CatalogEntry {
                    key: StreamKey::new(group, name),
                    presence,
                })
                .collect(),
        }
    }

    pub fn builder() -> StreamCatalogBuilder {
        StreamCatalogBuilder::default()
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn required(&self) -> impl Iterator<Item = &StreamKey> {
        self.entries
            .iter()
            .filter(|e| e.presence == Presence::Required)
            .map(|e| &e.key)
    }

    pub fn optional(&self) -> impl Iterator<Item = &StreamKey> {
        self.entries
            .iter()
            .filter(|e| e.presence == Presence::Optional)
            .map(|e| &e.key)
    }

    pub fn presence(&self, key: &StreamKey) -> Option<Presence> {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| e.presence)
    }
}

impl Default for StreamCatalog {
    fn default() -> Self {
        Self::oa_analysis()
    }
}

impl TryFrom<CatalogFile> for StreamCatalog {
    type Error = Error;

    fn try_from(file: CatalogFile) -> Result<Self> {
        StreamCatalog::new(file.streams)
    }
}

impl From<StreamCatalog> for CatalogFile {
    fn from(catalog: StreamCatalog) -> Self {
        CatalogFile {
            streams: catalog.entries,
        }
    }
}

#[derive(Debug, Default)]
pub struct StreamCatalogBuilder {
    entries: Vec<CatalogEntry>,
}

impl StreamCatalogBuilder {
    pub fn required(mut self, group: &str, name: &str) -> Self {
        self.entries.push(CatalogEntry {
            key: StreamKey::new(group, name),
            presence: Presence::Required,
        });
        self
    }

    pub fn optional(mut self, group: &str, name: &str) -> Self {
        self.entries.push(CatalogEntry {
            key: StreamKey::new(group, name),
            presence: Presence::Optional,
        });
        self
    }

    pub fn build(self) -> Result<StreamCatalog> {
        StreamCatalog::new(self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oa_analysis_partition() {
        let catalog = StreamCatalog::oa_analysis();
        assert_eq!(catalog.required().count(), 10);
        assert_eq!(catalog.optional().count(), 3);
        assert_eq!(
            catalog.presence(&StreamKey::new("TruthDir", "Vertices")),
            Some(Presence::Optional)
        );
        assert_eq!(
            catalog.presence(&StreamKey::new("ReconDir", "Global")),
            Some(Presence::Required)
        );
        assert_eq!(catalog.presence(&StreamKey::new("ReconDir", "Nope")), None);
    }

    #[test]
    fn test_key_parse_and_display() {
        let key: StreamKey = "ReconDir/Tracker".parse().unwrap();
        assert_eq!(key, StreamKey::new("ReconDir", "Tracker"));
        assert_eq!(key.to_string(), "ReconDir/Tracker");
        assert!("Tracker".parse::<StreamKey>().is_err());
        assert!("a/b/c".parse::<StreamKey>().is_err());
        assert!("/b".parse::<StreamKey>().is_err());
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        let result = StreamCatalog::builder()
            .required("HeaderDir", "BasicHeader")
            .optional("HeaderDir", "BasicHeader")
            .build();
        assert!(matches!(result, Err(Error::InvalidCatalog { .. })));
        assert!(StreamCatalog::builder().build().is_err());
    }

    #[test]
    fn test_json_catalog() {
        let json = r#"{
            "streams": [
                {"group": "HeaderDir", "name": "BasicHeader", "presence": "required"},
                {"group": "TruthDir", "name": "Vertices", "presence": "optional"}
            ]
        }"#;
        let catalog = StreamCatalog::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(catalog.entries().len(), 2);
        assert_eq!(
            catalog.required().collect::<Vec<_>>(),
            vec![&StreamKey::new("HeaderDir", "BasicHeader")]
        );

        let roundtrip: StreamCatalog =
            serde_json::from_str(&serde_json::to_string(&catalog).unwrap()).unwrap();
        assert_eq!(roundtrip, catalog);
    }
}
