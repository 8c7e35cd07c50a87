//! Format version 2: bincode manifest region

use super::{warn_unknown_keys, ManifestReader, ManifestWriter};
use crate::error::{IyamfError, Result};
use crate::manifest::Manifest;
use crate::mapping::MappingRegistry;
use tracing::debug;

pub const FORMAT_VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryManifestV2;

impl ManifestReader for BinaryManifestV2 {
    fn format_version(&self) -> u8 {
        FORMAT_VERSION
    }

    fn read_manifest(&self, region: &[u8], mappings: &MappingRegistry) -> Result<Manifest> {
        let manifest: Manifest = bincode::deserialize(region)
            .map_err(|e| IyamfError::InvalidManifest(format!("v2 manifest: {}", e)))?;
        debug!(
            "Parsed v2 manifest '{}' with {} items",
            manifest.head.name,
            manifest.items.len()
        );
        warn_unknown_keys(&manifest, mappings);
        Ok(manifest)
    }
}

impl ManifestWriter for BinaryManifestV2 {
    fn format_version(&self) -> u8 {
        FORMAT_VERSION
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<Vec<u8>> {
        Ok(bincode::serialize(manifest)?)
    }
}
