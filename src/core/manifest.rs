//! Container manifest
//!
//! The manifest is the catalogue stored in a container's manifest region: a
//! head record describing the package plus an ordered list of items, one per
//! asset. Each item names its asset-type key (resolved through the mapping
//! registry) and where its payload lives.

use crate::checksum::ContentHash;
use crate::error::{IyamfError, Result};
use crate::segment::Region;
use crate::validation::PackageName;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Package-level metadata
///
/// # Examples
///
/// ```
/// use iyamf::manifest::ManifestHead;
/// use semver::Version;
///
/// let head = ManifestHead::new("core-assets", "Core Assets", Version::new(1, 0, 0))
///     .unwrap()
///     .with_remark("shipped with the base game");
///
/// assert_eq!(head.name.as_str(), "core-assets");
/// assert_eq!(head.display_name, "Core Assets");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestHead {
    /// Package name (validated identifier)
    pub name: PackageName,

    /// Package version
    pub version: Version,

    /// Human-readable display name
    pub display_name: String,

    /// Free-text remark
    #[serde(default)]
    pub remark: String,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl ManifestHead {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        version: Version,
    ) -> Result<Self> {
        Ok(ManifestHead {
            name: PackageName::new(name)?,
            version,
            display_name: display_name.into(),
            remark: String::new(),
            created: Utc::now(),
        })
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }
}

/// Inline payload encodings for `InManifest` items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlinePayload {
    Base64(String),
    Raw(Vec<u8>),
}

impl InlinePayload {
    pub fn base64(bytes: &[u8]) -> Self {
        InlinePayload::Base64(STANDARD.encode(bytes))
    }

    /// Decoded payload bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            InlinePayload::Base64(text) => STANDARD
                .decode(text)
                .map_err(|e| IyamfError::InvalidManifest(format!("bad base64 payload: {}", e))),
            InlinePayload::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Where an item's payload physically resides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    /// Payload embedded in the manifest itself
    InManifest(InlinePayload),

    /// Payload inside this container, offsets relative to the container start
    ManifestData { start: u64, length: u64 },

    /// Payload lives elsewhere; the caller resolves `location`
    Outside { location: String },
}

impl Storage {
    pub fn name(&self) -> &'static str {
        match self {
            Storage::InManifest(_) => "in_manifest",
            Storage::ManifestData { .. } => "manifest_data",
            Storage::Outside { .. } => "outside",
        }
    }
}

/// One asset entry in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Unique within the manifest
    pub id: String,

    /// Key into the mapping registry
    pub type_key: String,

    pub storage: Storage,

    /// MD5 of the encoded payload
    #[serde(default)]
    pub hash: Option<ContentHash>,
}

impl ManifestItem {
    pub fn new(id: impl Into<String>, type_key: impl Into<String>, storage: Storage) -> Self {
        ManifestItem {
            id: id.into(),
            type_key: type_key.into(),
            storage,
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Container-relative payload region for `ManifestData` items
    pub fn data_region(&self) -> Option<Region> {
        match self.storage {
            Storage::ManifestData { start, length } => Some(Region::new(start, length)),
            _ => None,
        }
    }

    /// Payload length when it is known without resolving anything
    pub fn payload_length(&self) -> Option<u64> {
        match &self.storage {
            Storage::InManifest(InlinePayload::Raw(bytes)) => Some(bytes.len() as u64),
            // 4 base64 chars carry 3 bytes; padding makes this an upper bound
            Storage::InManifest(InlinePayload::Base64(text)) => Some((text.len() as u64 / 4) * 3),
            Storage::ManifestData { length, .. } => Some(*length),
            Storage::Outside { .. } => None,
        }
    }
}

/// Parsed manifest: head record plus ordered items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub head: ManifestHead,
    #[serde(default)]
    pub items: Vec<ManifestItem>,
}

impl Manifest {
    pub fn new(head: ManifestHead) -> Self {
        Manifest {
            head,
            items: Vec::new(),
        }
    }

    /// Validate item invariants against the container's data region
    ///
    /// Checks:
    /// - ids and type keys are non-empty
    /// - ids are unique
    /// - `ManifestData` ranges lie inside `data_region`
    pub fn validate(&self, data_region: Region) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.items.len());

        for item in &self.items {
            if item.id.is_empty() {
                return Err(IyamfError::InvalidManifest("empty asset id".to_string()));
            }
            if item.type_key.is_empty() {
                return Err(IyamfError::InvalidManifest(format!(
                    "asset '{}' has an empty type key",
                    item.id
                )));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(IyamfError::InvalidManifest(format!(
                    "duplicate asset id '{}'",
                    item.id
                )));
            }
            if let Some(region) = item.data_region() {
                if !data_region.contains(&region) {
                    return Err(IyamfError::InvalidManifest(format!(
                        "asset '{}' payload [{}, +{}) lies outside the data region",
                        item.id, region.start, region.length
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn items_of_type<'a>(&'a self, type_key: &'a str) -> impl Iterator<Item = &'a ManifestItem> {
        self.items.iter().filter(move |item| item.type_key == type_key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head() -> ManifestHead {
        ManifestHead::new("test-pack", "Test Pack", Version::new(1, 2, 3)).unwrap()
    }

    #[test]
    fn test_create_head() {
        let head = head().with_remark("remark");
        assert_eq!(head.name.as_str(), "test-pack");
        assert_eq!(head.version, Version::new(1, 2, 3));
        assert_eq!(head.remark, "remark");
    }

    #[test]
    fn test_invalid_name() {
        assert!(ManifestHead::new("Test Pack", "Test Pack", Version::new(1, 0, 0)).is_err());
    }

    #[test]
    fn test_inline_payload_decode() {
        let inline = InlinePayload::base64(b"\x00\x01hello");
        assert_eq!(inline.to_bytes().unwrap(), b"\x00\x01hello");
        assert_eq!(
            InlinePayload::Raw(vec![9, 8]).to_bytes().unwrap(),
            vec![9, 8]
        );
        assert!(InlinePayload::Base64("!!not base64".into())
            .to_bytes()
            .is_err());
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut manifest = Manifest::new(head());
        let storage = Storage::InManifest(InlinePayload::Raw(vec![]));
        manifest.items.push(ManifestItem::new("a", "bytes", storage.clone()));
        manifest.items.push(ManifestItem::new("a", "bytes", storage));

        assert!(matches!(
            manifest.validate(Region::default()),
            Err(IyamfError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_validate_data_bounds() {
        let mut manifest = Manifest::new(head());
        manifest.items.push(ManifestItem::new(
            "a",
            "bytes",
            Storage::ManifestData {
                start: 100,
                length: 10,
            },
        ));

        assert!(manifest.validate(Region::new(100, 10)).is_ok());
        assert!(manifest.validate(Region::new(100, 9)).is_err());
    }

    #[test]
    fn test_lookup() {
        let mut manifest = Manifest::new(head());
        let outside = |loc: &str| Storage::Outside {
            location: loc.to_string(),
        };
        manifest.items.push(ManifestItem::new("one", "text", outside("1")));
        manifest.items.push(ManifestItem::new("two", "bytes", outside("2")));
        manifest.items.push(ManifestItem::new("three", "text", outside("3")));

        assert_eq!(manifest.item("two").unwrap().type_key, "bytes");
        assert!(manifest.item("four").is_none());
        let texts: Vec<_> = manifest.items_of_type("text").map(|i| i.id.as_str()).collect();
        assert_eq!(texts, vec!["one", "three"]);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut manifest = Manifest::new(head());
        manifest.items.push(
            ManifestItem::new(
                "blob",
                "bytes",
                Storage::ManifestData {
                    start: 67,
                    length: 4,
                },
            )
            .with_hash(ContentHash::of(b"abcd")),
        );

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);

        let bin = bincode::serialize(&manifest).unwrap();
        let back: Manifest = bincode::deserialize(&bin).unwrap();
        assert_eq!(back, manifest);
    }
}
