//! Format version 1: JSON manifest region

use super::{warn_unknown_keys, ManifestReader, ManifestWriter};
use crate::error::{IyamfError, Result};
use crate::manifest::Manifest;
use crate::mapping::MappingRegistry;
use tracing::debug;

pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonManifestV1;

impl ManifestReader for JsonManifestV1 {
    fn format_version(&self) -> u8 {
        FORMAT_VERSION
    }

    fn read_manifest(&self, region: &[u8], mappings: &MappingRegistry) -> Result<Manifest> {
        let manifest: Manifest = serde_json::from_slice(region)
            .map_err(|e| IyamfError::InvalidManifest(format!("v1 manifest: {}", e)))?;
        debug!(
            "Parsed v1 manifest '{}' with {} items",
            manifest.head.name,
            manifest.items.len()
        );
        warn_unknown_keys(&manifest, mappings);
        Ok(manifest)
    }
}

impl ManifestWriter for JsonManifestV1 {
    fn format_version(&self) -> u8 {
        FORMAT_VERSION
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(manifest)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{InlinePayload, ManifestHead, ManifestItem, Storage};
    use semver::Version;

    #[test]
    fn test_round_trip() {
        let mut manifest = Manifest::new(
            ManifestHead::new("json-pack", "JSON Pack", Version::new(0, 1, 0)).unwrap(),
        );
        manifest.items.push(ManifestItem::new(
            "greeting",
            "text",
            Storage::InManifest(InlinePayload::base64(b"hello")),
        ));

        let region = JsonManifestV1.write_manifest(&manifest).unwrap();
        assert!(std::str::from_utf8(&region).unwrap().contains("\"greeting\""));

        let parsed = JsonManifestV1
            .read_manifest(&region, &MappingRegistry::with_builtin())
            .unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_garbage_is_structural() {
        let err = JsonManifestV1
            .read_manifest(b"{not json", &MappingRegistry::new())
            .unwrap_err();
        assert!(matches!(err, IyamfError::InvalidManifest(_)));
    }
}
