//! Versioned manifest readers
//!
//! A container header names a format version and an application marker.
//! [`ReaderRegistry`] maps that pair to a factory producing a
//! [`ManifestReader`] able to parse the manifest region. Lookup is two-tier:
//!
//! 1. exact `(version, marker)` registration
//! 2. `(version, ApplicationMarker::Any)` registration
//! 3. otherwise `NoMatchingImplementation`
//!
//! Format owners ship a wildcard reader per version; applications override
//! it for their own marker without touching shared code.

pub mod binary_v2;
pub mod json_v1;

use crate::error::{IyamfError, Result};
use crate::manifest::Manifest;
use crate::mapping::MappingRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use binary_v2::BinaryManifestV2;
pub use json_v1::JsonManifestV1;

/// Application marker half of a reader registration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationMarker {
    /// Matches any marker for the version
    Any,
    Exact(u32),
}

/// Parses a manifest region of one format version
pub trait ManifestReader: Send + Sync {
    fn format_version(&self) -> u8;

    /// Parse `region` into a manifest. `mappings` is the registry the
    /// items will be resolved against.
    fn read_manifest(&self, region: &[u8], mappings: &MappingRegistry) -> Result<Manifest>;
}

/// Produces a manifest region of one format version
pub trait ManifestWriter: Send + Sync {
    fn format_version(&self) -> u8;

    fn write_manifest(&self, manifest: &Manifest) -> Result<Vec<u8>>;
}

pub type ReaderFactory = Arc<dyn Fn() -> Box<dyn ManifestReader> + Send + Sync>;

/// Writer for a built-in format version
pub fn builtin_writer(version: u8) -> Option<Box<dyn ManifestWriter>> {
    match version {
        json_v1::FORMAT_VERSION => Some(Box::new(JsonManifestV1)),
        binary_v2::FORMAT_VERSION => Some(Box::new(BinaryManifestV2)),
        _ => None,
    }
}

/// Items whose type key the registry does not know are still parsed; they
/// fail individually at load time.
pub(crate) fn warn_unknown_keys(manifest: &Manifest, mappings: &MappingRegistry) {
    for item in &manifest.items {
        if !mappings.contains(&item.type_key) {
            warn!(
                "Manifest item '{}' uses unregistered asset type '{}'",
                item.id, item.type_key
            );
        }
    }
}

#[derive(Default)]
pub struct ReaderRegistry {
    factories: RwLock<HashMap<(u8, ApplicationMarker), ReaderFactory>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the JSON (v1) and bincode (v2) readers for any marker
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_default::<JsonManifestV1>(json_v1::FORMAT_VERSION, ApplicationMarker::Any);
        registry.register_default::<BinaryManifestV2>(
            binary_v2::FORMAT_VERSION,
            ApplicationMarker::Any,
        );
        registry
    }

    /// Register a factory, replacing any previous one for the same key
    pub fn register(&self, version: u8, marker: ApplicationMarker, factory: ReaderFactory) {
        debug!("Registering manifest reader for v{} / {:?}", version, marker);
        self.factories.write().insert((version, marker), factory);
    }

    /// Register a reader type constructed with `Default`
    pub fn register_default<R>(&self, version: u8, marker: ApplicationMarker)
    where
        R: ManifestReader + Default + 'static,
    {
        self.register(
            version,
            marker,
            Arc::new(|| Box::new(R::default()) as Box<dyn ManifestReader>),
        );
    }

    pub fn unregister(&self, version: u8, marker: ApplicationMarker) -> bool {
        self.factories.write().remove(&(version, marker)).is_some()
    }

    pub fn contains(&self, version: u8, marker: ApplicationMarker) -> bool {
        self.factories.read().contains_key(&(version, marker))
    }

    /// Resolve a reader for a parsed header's version and marker
    pub fn resolve(&self, version: u8, marker: u32) -> Result<Box<dyn ManifestReader>> {
        let factory = {
            let factories = self.factories.read();
            if let Some(factory) = factories.get(&(version, ApplicationMarker::Exact(marker))) {
                debug!("Reader for v{} marker {}: exact match", version, marker);
                Some(factory.clone())
            } else if let Some(factory) = factories.get(&(version, ApplicationMarker::Any)) {
                debug!("Reader for v{} marker {}: wildcard match", version, marker);
                Some(factory.clone())
            } else {
                None
            }
        };

        match factory {
            Some(factory) => Ok(factory()),
            None => {
                warn!("No manifest reader for v{} marker {}", version, marker);
                Err(IyamfError::NoMatchingImplementation { version, marker })
            }
        }
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.factories.read().keys().copied().collect();
        keys.sort_by_key(|(version, marker)| {
            (
                *version,
                match marker {
                    ApplicationMarker::Any => None,
                    ApplicationMarker::Exact(m) => Some(*m),
                },
            )
        });
        f.debug_struct("ReaderRegistry").field("keys", &keys).finish()
    }
}
