//! Building containers
//!
//! Output layout, all offsets relative to the container start:
//!
//! ```text
//! +--------+-----------------+---------------------------+
//! | header | manifest region | data region               |
//! | 67 B   | v1 JSON/v2 bin  | ManifestData payloads     |
//! +--------+-----------------+---------------------------+
//! ```
//!
//! Item offsets point into the data region, whose start depends on the
//! encoded manifest length, which in turn depends on the offsets. The writer
//! re-encodes until the length stops changing. Offsets only grow between
//! passes, so the loop settles after a couple of rounds (bincode manifests
//! settle immediately).

use crate::checksum::ContentHash;
use crate::codec::AssetValue;
use crate::config::{ContainerConfig, InlineEncoding};
use crate::context::AssetContext;
use crate::error::{IyamfError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::manifest::{InlinePayload, Manifest, ManifestHead, ManifestItem, Storage};
use crate::mapping::MappingRegistry;
use crate::reader::{builtin_writer, ManifestWriter};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const MAX_LAYOUT_PASSES: usize = 16;

/// Where the writer puts an asset's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Inline if the payload is within the configured threshold, data region otherwise
    Auto,
    /// Inside the manifest
    Inline,
    /// Inside the data region
    Data,
    /// Not stored; the manifest records this location and the payload hash
    Outside(String),
}

#[derive(Debug)]
struct PendingAsset {
    id: String,
    type_key: String,
    payload: Vec<u8>,
    placement: Placement,
}

/// Collects assets and writes a container
pub struct ContainerWriter {
    mappings: Arc<MappingRegistry>,
    head: ManifestHead,
    config: ContainerConfig,
    assets: Vec<PendingAsset>,
    ids: HashSet<String>,
}

impl ContainerWriter {
    pub fn new(context: &AssetContext, head: ManifestHead) -> Self {
        ContainerWriter {
            mappings: context.mappings.clone(),
            head,
            config: ContainerConfig::default(),
            assets: Vec::new(),
            ids: HashSet::new(),
        }
    }

    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Encode `value` with the codec registered for `type_key` and add it
    pub fn add_asset(
        &mut self,
        id: impl Into<String>,
        type_key: impl Into<String>,
        value: &AssetValue,
        placement: Placement,
    ) -> Result<&mut Self> {
        let type_key = type_key.into();
        let payload = self.mappings.encode(&type_key, value)?;
        self.push(id.into(), type_key, payload, placement)
    }

    /// Add an already encoded payload
    pub fn add_raw(
        &mut self,
        id: impl Into<String>,
        type_key: impl Into<String>,
        payload: Vec<u8>,
        placement: Placement,
    ) -> Result<&mut Self> {
        self.push(id.into(), type_key.into(), payload, placement)
    }

    fn push(
        &mut self,
        id: String,
        type_key: String,
        payload: Vec<u8>,
        placement: Placement,
    ) -> Result<&mut Self> {
        if id.is_empty() || type_key.is_empty() {
            return Err(IyamfError::InvalidManifest(
                "asset id and type key must be non-empty".to_string(),
            ));
        }
        if !self.ids.insert(id.clone()) {
            return Err(IyamfError::InvalidManifest(format!(
                "duplicate asset id '{}'",
                id
            )));
        }

        let placement = match placement {
            Placement::Auto
                if self.config.inline_threshold > 0
                    && payload.len() <= self.config.inline_threshold =>
            {
                Placement::Inline
            }
            Placement::Auto => Placement::Data,
            other => other,
        };
        debug!(
            "Adding '{}' ({}, {} bytes) as {:?}",
            id,
            type_key,
            payload.len(),
            placement
        );

        self.assets.push(PendingAsset {
            id,
            type_key,
            payload,
            placement,
        });
        Ok(self)
    }

    /// Payloads placed `Outside`, as `(location, bytes)`, for the caller to store
    pub fn outside_payloads(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.assets.iter().filter_map(|asset| match &asset.placement {
            Placement::Outside(location) => Some((location.as_str(), asset.payload.as_slice())),
            _ => None,
        })
    }

    fn inline(&self, payload: &[u8]) -> InlinePayload {
        match self.config.inline_encoding {
            InlineEncoding::Base64 => InlinePayload::base64(payload),
            InlineEncoding::Raw => InlinePayload::Raw(payload.to_vec()),
        }
    }

    fn manifest_at(&self, data_start: u64, data_offsets: &[Option<u64>]) -> Manifest {
        let mut manifest = Manifest::new(self.head.clone());
        for (asset, offset) in self.assets.iter().zip(data_offsets) {
            let storage = match (&asset.placement, offset) {
                (Placement::Outside(location), _) => Storage::Outside {
                    location: location.clone(),
                },
                (_, Some(offset)) => Storage::ManifestData {
                    start: data_start + offset,
                    length: asset.payload.len() as u64,
                },
                _ => Storage::InManifest(self.inline(&asset.payload)),
            };
            manifest.items.push(
                ManifestItem::new(asset.id.clone(), asset.type_key.clone(), storage)
                    .with_hash(ContentHash::of(&asset.payload)),
            );
        }
        manifest
    }

    /// Encode header, manifest region and data region
    fn layout(&self) -> Result<(Header, Vec<u8>, Vec<u8>)> {
        let format = self.config.format_version;
        let manifest_writer: Box<dyn ManifestWriter> =
            builtin_writer(format).ok_or(IyamfError::NoMatchingImplementation {
                version: format,
                marker: self.config.application_marker,
            })?;

        let mut data = Vec::new();
        let mut data_offsets = Vec::with_capacity(self.assets.len());
        for asset in &self.assets {
            if asset.placement == Placement::Data {
                data_offsets.push(Some(data.len() as u64));
                data.extend_from_slice(&asset.payload);
            } else {
                data_offsets.push(None);
            }
        }

        let mut manifest_len = 0usize;
        for _ in 0..MAX_LAYOUT_PASSES {
            let data_start = (HEADER_SIZE + manifest_len) as u64;
            let manifest = self.manifest_at(data_start, &data_offsets);
            let encoded = manifest_writer.write_manifest(&manifest)?;

            if encoded.len() == manifest_len {
                let manifest_length = u32::try_from(manifest_len).map_err(|_| {
                    IyamfError::InvalidManifest(format!(
                        "manifest of {} bytes exceeds the 32-bit length field",
                        manifest_len
                    ))
                })?;

                let mut header = Header::new(format, self.config.application_marker);
                header.manifest_start = HEADER_SIZE as u32;
                header.manifest_length = manifest_length;
                header.manifest_hash = ContentHash::of(&encoded);
                header.data_start = data_start;
                header.data_length = data.len() as u64;
                header.data_hash = ContentHash::of(&data);
                return Ok((header, encoded, data));
            }
            manifest_len = encoded.len();
        }

        Err(IyamfError::InvalidManifest(
            "manifest layout did not settle".to_string(),
        ))
    }

    /// Write the container to `writer`, returning its header
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<Header> {
        let (header, manifest, data) = self.layout()?;
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&manifest)?;
        writer.write_all(&data)?;

        info!(
            "Wrote container '{}' (format {}): {} items, manifest {} bytes, data {} bytes",
            self.head.name,
            header.format_version,
            self.assets.len(),
            header.manifest_length,
            header.data_length
        );
        Ok(header)
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<Header> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        let header = self.write_to(&mut out)?;
        out.flush()?;
        Ok(header)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for ContainerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerWriter")
            .field("name", &self.head.name)
            .field("config", &self.config)
            .field("assets", &self.assets.len())
            .finish()
    }
}
