//! Opening containers
//!
//! Every open runs the same strictly ordered pipeline; each step gates the
//! next and nothing after a failed step is attempted:
//!
//! 1. read and validate the header (length, CRC-8, magic)
//! 2. check both regions against the segment size
//! 3. verify the manifest region MD5 (and the data region MD5 if configured)
//! 4. dispatch a manifest reader on `(format version, application marker)`
//! 5. parse the manifest and validate its items
//!
//! # Examples
//!
//! ```
//! use iyamf::codec::AssetValue;
//! use iyamf::container::ContainerReader;
//! use iyamf::context::AssetContext;
//! use iyamf::manifest::ManifestHead;
//! use iyamf::writer::{ContainerWriter, Placement};
//! use semver::Version;
//!
//! let context = AssetContext::with_builtin();
//! let head = ManifestHead::new("demo", "Demo", Version::new(1, 0, 0)).unwrap();
//!
//! let mut writer = ContainerWriter::new(&context, head);
//! writer
//!     .add_asset("motd", "text", &AssetValue::new(String::from("hello")), Placement::Data)
//!     .unwrap();
//! let bytes = writer.to_bytes().unwrap();
//!
//! let container = ContainerReader::from_bytes(bytes, &context).unwrap();
//! let item = container.item("motd").unwrap();
//! assert_eq!(container.read_payload(item).unwrap(), b"hello");
//! ```

use crate::checksum::ContentHash;
use crate::config::ContainerConfig;
use crate::context::AssetContext;
use crate::error::{IyamfError, Result};
use crate::header::Header;
use crate::io::{PayloadSource, SegmentFile};
use crate::loader::{AssetLoader, ItemLoad, LoadedAsset};
use crate::manifest::{Manifest, ManifestItem, Storage};
use crate::segment::{Region, Segment};
use crate::validation::{validate_header, validate_regions, verify_hash, verify_region_hash};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum Backing {
    File { path: PathBuf, segment: Segment },
    Memory { bytes: Arc<[u8]>, segment: Segment },
}

/// An opened, validated container
#[derive(Debug, Clone)]
pub struct Container {
    header: Header,
    manifest: Manifest,
    backing: Backing,
    size: u64,
}

impl Container {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Addressable bytes of the container's segment
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn segment(&self) -> Segment {
        match &self.backing {
            Backing::File { segment, .. } | Backing::Memory { segment, .. } => *segment,
        }
    }

    /// Physical file, for containers opened from disk
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File { path, .. } => Some(path),
            Backing::Memory { .. } => None,
        }
    }

    pub fn item(&self, id: &str) -> Result<&ManifestItem> {
        self.manifest
            .item(id)
            .ok_or_else(|| IyamfError::AssetNotFound(id.to_string()))
    }

    /// Where an item's payload can be read from
    ///
    /// `Outside` items need an external resolver and fail here with
    /// `UnresolvedOutside`.
    pub fn payload_source(&self, item: &ManifestItem) -> Result<PayloadSource> {
        match &item.storage {
            Storage::InManifest(inline) => Ok(PayloadSource::memory(inline.to_bytes()?)),
            Storage::ManifestData { start, length } => {
                let region = Region::new(*start, *length);
                region.check_within("item", self.size)?;
                match &self.backing {
                    Backing::File { path, segment } => {
                        let absolute = segment.start + region.start;
                        Ok(PayloadSource::File {
                            path: path.clone(),
                            range: absolute..absolute + region.length,
                        })
                    }
                    Backing::Memory { bytes, segment } => {
                        let absolute = addressable(
                            "item",
                            region.start,
                            region.length,
                            segment.start + region.start,
                        )?;
                        let length =
                            addressable("item", region.start, region.length, region.length)?;
                        Ok(PayloadSource::Slice {
                            bytes: bytes.clone(),
                            range: absolute..absolute + length,
                        })
                    }
                }
            }
            Storage::Outside { .. } => Err(IyamfError::UnresolvedOutside(item.id.clone())),
        }
    }

    /// Raw encoded payload bytes of an item stored in this container
    pub fn read_payload(&self, item: &ManifestItem) -> Result<Vec<u8>> {
        self.payload_source(item)?.read_all()
    }

    /// Load every item with `loader`; see [`AssetLoader::load_all`]
    pub fn load_all(&self, loader: &AssetLoader) -> Vec<ItemLoad> {
        loader.load_all(self)
    }

    pub fn load_item(&self, id: &str, loader: &AssetLoader) -> Result<LoadedAsset> {
        loader.load_item(self, self.item(id)?)
    }
}

/// Entry points for opening containers
pub struct ContainerReader;

impl ContainerReader {
    /// Open the container at `segment` of the file at `path`
    pub fn open<P: AsRef<Path>>(path: P, segment: Segment, context: &AssetContext) -> Result<Container> {
        Self::open_with_config(path, segment, context, &ContainerConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        segment: Segment,
        context: &AssetContext,
        config: &ContainerConfig,
    ) -> Result<Container> {
        let path = path.as_ref();
        debug!("Opening container {} at {:?}", path.display(), segment);

        let mut file = SegmentFile::open(path, segment)?;
        let header = validate_header(&file.read_header_bytes()?)?;
        validate_regions(&header, file.size())?;

        let manifest_bytes = file.read_region("manifest", header.manifest_region())?;
        verify_region_hash("manifest", &manifest_bytes, &header.manifest_hash)?;
        if config.verify_data_hash {
            let data_hash = file.hash_region("data", header.data_region())?;
            verify_hash("data", data_hash, &header.data_hash)?;
        }

        let manifest = parse_manifest(&header, &manifest_bytes, context)?;
        let container = Container {
            header,
            manifest,
            backing: Backing::File {
                path: path.to_path_buf(),
                segment,
            },
            size: file.size(),
        };
        log_opened(&container);
        Ok(container)
    }

    /// Parse a container held in memory
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, context: &AssetContext) -> Result<Container> {
        Self::from_bytes_with_config(bytes, Segment::whole(), context, &ContainerConfig::default())
    }

    pub fn from_bytes_with_config(
        bytes: impl Into<Arc<[u8]>>,
        segment: Segment,
        context: &AssetContext,
        config: &ContainerConfig,
    ) -> Result<Container> {
        let bytes: Arc<[u8]> = bytes.into();
        let size = segment.size(bytes.len() as u64)?;
        let base = addressable("segment", segment.start, size, segment.start)?;
        let view = &bytes[base..base + addressable("segment", segment.start, size, size)?];

        let header_end = view.len().min(crate::header::HEADER_SIZE);
        let header = validate_header(&view[..header_end])?;
        validate_regions(&header, size)?;

        let manifest_bytes = region_slice(view, "manifest", header.manifest_region())?;
        verify_region_hash("manifest", manifest_bytes, &header.manifest_hash)?;
        if config.verify_data_hash {
            let data_bytes = region_slice(view, "data", header.data_region())?;
            verify_hash("data", ContentHash::of(data_bytes), &header.data_hash)?;
        }

        let manifest = parse_manifest(&header, manifest_bytes, context)?;
        let container = Container {
            header,
            manifest,
            backing: Backing::Memory { bytes, segment },
            size,
        };
        log_opened(&container);
        Ok(container)
    }
}

/// Slice of an already bounds-checked region
fn region_slice<'a>(view: &'a [u8], name: &'static str, region: Region) -> Result<&'a [u8]> {
    let start = addressable(name, region.start, region.length, region.start)?;
    let length = addressable(name, region.start, region.length, region.length)?;
    Ok(&view[start..start + length])
}

/// `value` as an in-memory index, or `RegionOutOfBounds` where `usize` is too narrow
fn addressable(name: &'static str, start: u64, length: u64, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| IyamfError::RegionOutOfBounds {
        region: name,
        start,
        length,
        limit: usize::MAX as u64,
    })
}

fn parse_manifest(header: &Header, region: &[u8], context: &AssetContext) -> Result<Manifest> {
    let reader = context
        .readers
        .resolve(header.format_version, header.application_marker)?;
    let manifest = reader.read_manifest(region, &context.mappings)?;
    manifest.validate(header.data_region())?;
    Ok(manifest)
}

fn log_opened(container: &Container) {
    info!(
        "Opened container '{}' v{} (format {}, marker {}): {} items",
        container.manifest.head.name,
        container.manifest.head.version,
        container.header.format_version,
        container.header.application_marker,
        container.manifest.items.len()
    );
}

#[cfg(feature = "async")]
impl ContainerReader {
    /// Async counterpart of [`ContainerReader::open`]
    pub async fn open_async<P: AsRef<Path>>(
        path: P,
        segment: Segment,
        context: &AssetContext,
    ) -> Result<Container> {
        Self::open_async_with_config(path, segment, context, &ContainerConfig::default()).await
    }

    pub async fn open_async_with_config<P: AsRef<Path>>(
        path: P,
        segment: Segment,
        context: &AssetContext,
        config: &ContainerConfig,
    ) -> Result<Container> {
        use crate::checksum::ContentHasher;
        use crate::header::HEADER_SIZE;
        use std::io::SeekFrom;
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let path = path.as_ref();
        debug!("Opening container {} at {:?} (async)", path.display(), segment);

        let mut file = tokio::fs::File::open(path).await?;
        let size = segment.size(file.metadata().await?.len())?;
        if size < HEADER_SIZE as u64 {
            return Err(IyamfError::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: size as usize,
            });
        }

        let mut raw = [0u8; HEADER_SIZE];
        file.seek(SeekFrom::Start(segment.start)).await?;
        file.read_exact(&mut raw).await?;
        let header = validate_header(&raw)?;
        validate_regions(&header, size)?;

        let manifest_region = header.manifest_region();
        let mut manifest_bytes = vec![
            0u8;
            addressable(
                "manifest",
                manifest_region.start,
                manifest_region.length,
                manifest_region.length
            )?
        ];
        file.seek(SeekFrom::Start(segment.start + manifest_region.start))
            .await?;
        file.read_exact(&mut manifest_bytes).await?;
        verify_region_hash("manifest", &manifest_bytes, &header.manifest_hash)?;

        if config.verify_data_hash {
            let data_region = header.data_region();
            file.seek(SeekFrom::Start(segment.start + data_region.start))
                .await?;
            let mut hasher = ContentHasher::new();
            let mut remaining = data_region.length;
            let mut chunk = vec![0u8; 64 * 1024];
            while remaining > 0 {
                let take = remaining.min(chunk.len() as u64) as usize;
                file.read_exact(&mut chunk[..take]).await?;
                hasher.update(&chunk[..take]);
                remaining -= take as u64;
            }
            verify_hash("data", hasher.finish(), &header.data_hash)?;
        }

        let manifest = parse_manifest(&header, &manifest_bytes, context)?;
        let container = Container {
            header,
            manifest,
            backing: Backing::File {
                path: path.to_path_buf(),
                segment,
            },
            size,
        };
        log_opened(&container);
        Ok(container)
    }
}
