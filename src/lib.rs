//! # IYaMF - Manifest/Asset Container Format
//!
//! `iyamf-rs` reads and writes IYaMF containers: a fixed, CRC-protected
//! header followed by a manifest region (the catalogue of assets) and a data
//! region (asset payloads).
//!
//! - **Validated header**: 67 bytes, little-endian, CRC-8 trailer, MD5 of
//!   both regions
//! - **Versioned manifests**: readers are dispatched on format version and
//!   application marker, with wildcard fallback
//! - **Mapping registry**: asset-type keys map to a class and codec,
//!   checked for compatibility when registered
//! - **Load modes**: decode now, hand out lazy handles, or delegate to a
//!   custom handler, chosen per item by caller policy
//! - **Segments**: several containers can share one physical file
//!
//! ## Quick Start
//!
//! ```rust
//! use iyamf::{AssetContext, AssetLoader, AssetValue, ContainerReader, ContainerWriter};
//! use iyamf::{ManifestHead, Placement, Result};
//! use semver::Version;
//!
//! # fn main() -> Result<()> {
//! let context = AssetContext::with_builtin();
//!
//! // Write
//! let head = ManifestHead::new("ui-strings", "UI Strings", Version::new(1, 0, 0))?;
//! let mut writer = ContainerWriter::new(&context, head);
//! writer.add_asset("title", "text", &AssetValue::new(String::from("Welcome")), Placement::Data)?;
//! let bytes = writer.to_bytes()?;
//!
//! // Read
//! let container = ContainerReader::from_bytes(bytes, &context)?;
//! let loader = AssetLoader::new(&context)?;
//! let title = container.load_item("title", &loader)?.materialize()?;
//! assert_eq!(title.downcast_ref::<String>().unwrap(), "Welcome");
//! # Ok(())
//! # }
//! ```
//!
//! ## Lazy Loading
//!
//! ```rust,no_run
//! use iyamf::loader::{lazy_above, AssetLoader, LoadedAsset};
//! use iyamf::segment::Segment;
//! use iyamf::{AssetContext, ContainerReader, Result};
//!
//! # fn main() -> Result<()> {
//! let context = AssetContext::with_builtin();
//! let container = ContainerReader::open("assets.iyamf", Segment::whole(), &context)?;
//!
//! // Payloads over 1 MiB become lazy handles backed by temp-file copies
//! let loader = AssetLoader::builder(&context)
//!     .policy(lazy_above(1024 * 1024))
//!     .copy_lazy_to_temp(true)
//!     .build()?;
//!
//! for load in container.load_all(&loader) {
//!     match load.result {
//!         Ok(LoadedAsset::Lazy(handle)) => println!("{}: deferred", load.id),
//!         Ok(LoadedAsset::Object(_)) => println!("{}: decoded", load.id),
//!         Err(e) => eprintln!("{}: {}", load.id, e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    checksum, codec, config, container, context, error, header, io, lazy, loader, manifest,
    mapping, reader, segment, temp, validation, writer,
};

pub use crate::core::{
    checksum::ContentHash,
    codec::{AssetClass, AssetCodec, AssetValue, SharedAsset},
    config::ContainerConfig,
    container::{Container, ContainerReader},
    context::AssetContext,
    error::{ErrorKind, IyamfError, Result},
    header::{Header, HEADER_SIZE, MAGIC},
    lazy::{LazyAsset, LazyState},
    loader::{AssetLoader, ItemLoad, LoadMode, LoadedAsset},
    manifest::{Manifest, ManifestHead, ManifestItem, Storage},
    mapping::{ConflictMode, MappingBuilder, MappingRegistry},
    reader::{ApplicationMarker, ReaderRegistry},
    segment::{Region, Segment},
    validation::{validate_header, PackageName},
    writer::{ContainerWriter, Placement},
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
