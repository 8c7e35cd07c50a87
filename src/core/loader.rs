//! Per-item load-mode selection
//!
//! The embedding application supplies the policy: a closure that looks at a
//! manifest item and its payload size and picks a [`LoadMode`]. The loader
//! supplies the mechanism for each mode:
//!
//! - [`LoadMode::Object`] decodes immediately into an [`AssetValue`]
//! - [`LoadMode::Lazy`] returns an unloaded [`LazyAsset`] handle
//! - [`LoadMode::Custom`] hands the payload to a registered
//!   [`CustomLoadHandler`]
//!
//! Failures are per item: [`AssetLoader::load_all`] always returns one
//! [`ItemLoad`] for every manifest item.

use crate::codec::{AssetValue, SharedAsset};
use crate::config::ContainerConfig;
use crate::container::Container;
use crate::context::AssetContext;
use crate::error::{IyamfError, Result};
use crate::io::PayloadSource;
use crate::lazy::LazyAsset;
use crate::manifest::{ManifestItem, Storage};
use crate::mapping::MappingRegistry;
use crate::temp::{TempDirStore, TempStore};
use crate::validation::verify_item_hash;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name the built-in [`DiskCacheHandler`] is registered under
pub const DISK_CACHE: &str = "disk-cache";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Decode now
    Object,
    /// Return a lazy handle
    Lazy,
    /// Delegate to the handler registered under this name
    Custom(String),
}

/// Caller-supplied load policy: `(item, payload length) -> mode`
pub type LoadPolicy = Arc<dyn Fn(&ManifestItem, u64) -> LoadMode + Send + Sync>;

/// Policy decoding small payloads eagerly and deferring larger ones
pub fn lazy_above(threshold: u64) -> impl Fn(&ManifestItem, u64) -> LoadMode + Send + Sync {
    move |_, length| {
        if length > threshold {
            LoadMode::Lazy
        } else {
            LoadMode::Object
        }
    }
}

/// Result of loading one item
pub enum LoadedAsset {
    Object(AssetValue),
    Lazy(Arc<LazyAsset>),
}

impl LoadedAsset {
    pub fn is_lazy(&self) -> bool {
        matches!(self, LoadedAsset::Lazy(_))
    }

    pub fn as_lazy(&self) -> Option<&Arc<LazyAsset>> {
        match self {
            LoadedAsset::Lazy(asset) => Some(asset),
            LoadedAsset::Object(_) => None,
        }
    }

    pub fn into_object(self) -> Option<AssetValue> {
        match self {
            LoadedAsset::Object(value) => Some(value),
            LoadedAsset::Lazy(_) => None,
        }
    }

    /// The decoded value, loading lazy handles on the way
    pub fn materialize(self) -> Result<SharedAsset> {
        match self {
            LoadedAsset::Object(value) => Ok(value.into_shared()),
            LoadedAsset::Lazy(asset) => asset.load(),
        }
    }
}

impl fmt::Debug for LoadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadedAsset::Object(value) => f.debug_tuple("Object").field(value).finish(),
            LoadedAsset::Lazy(asset) => f.debug_tuple("Lazy").field(asset).finish(),
        }
    }
}

/// Outcome for one manifest item
#[derive(Debug)]
pub struct ItemLoad {
    pub id: String,
    /// Mode chosen by the policy; `None` if the payload could not be located
    pub mode: Option<LoadMode>,
    pub result: Result<LoadedAsset>,
}

/// Non-standard materialization for some asset kinds
pub trait CustomLoadHandler: Send + Sync {
    fn load(
        &self,
        item: &ManifestItem,
        source: PayloadSource,
        loader: &AssetLoader,
    ) -> Result<LoadedAsset>;
}

/// Copies the payload into the loader's temp store and returns a lazy
/// handle decoding from that copy
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCacheHandler;

impl CustomLoadHandler for DiskCacheHandler {
    fn load(
        &self,
        item: &ManifestItem,
        source: PayloadSource,
        loader: &AssetLoader,
    ) -> Result<LoadedAsset> {
        let entry = loader.mappings().get(&item.type_key)?;
        let asset = LazyAsset::cached(item, entry, &source, loader.temp_store().clone())?;
        Ok(LoadedAsset::Lazy(Arc::new(loader.hash_policy(asset))))
    }
}

/// Locates payloads of `Outside` items
pub trait ExternalResolver: Send + Sync {
    fn resolve(&self, item: &ManifestItem, location: &str) -> Result<PayloadSource>;
}

/// Resolves `Outside` locations as relative paths under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirectoryResolver { root: root.into() }
    }
}

impl ExternalResolver for DirectoryResolver {
    fn resolve(&self, item: &ManifestItem, location: &str) -> Result<PayloadSource> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(IyamfError::InvalidManifest(format!(
                "asset '{}' location '{}' is not a relative path",
                item.id, location
            )));
        }

        let path = self.root.join(relative);
        if !path.is_file() {
            return Err(IyamfError::AssetNotFound(format!(
                "{} ({})",
                item.id,
                path.display()
            )));
        }
        PayloadSource::file(path)
    }
}

pub struct AssetLoader {
    mappings: Arc<MappingRegistry>,
    policy: LoadPolicy,
    handlers: HashMap<String, Arc<dyn CustomLoadHandler>>,
    temp_store: Arc<dyn TempStore>,
    resolver: Option<Arc<dyn ExternalResolver>>,
    copy_lazy_to_temp: bool,
    verify_item_hash: bool,
}

impl AssetLoader {
    /// Loader decoding everything eagerly
    pub fn new(context: &AssetContext) -> Result<Self> {
        Self::builder(context).build()
    }

    pub fn builder(context: &AssetContext) -> AssetLoaderBuilder {
        AssetLoaderBuilder::new(context.mappings.clone())
    }

    pub fn mappings(&self) -> &Arc<MappingRegistry> {
        &self.mappings
    }

    pub fn temp_store(&self) -> &Arc<dyn TempStore> {
        &self.temp_store
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Apply the loader's item hash setting to a handle
    pub fn hash_policy(&self, asset: LazyAsset) -> LazyAsset {
        if self.verify_item_hash {
            asset
        } else {
            asset.without_hash_check()
        }
    }

    /// Locate an item's payload, consulting the resolver for `Outside` items
    pub fn source_for(&self, container: &Container, item: &ManifestItem) -> Result<PayloadSource> {
        match (&item.storage, &self.resolver) {
            (Storage::Outside { location }, Some(resolver)) => resolver.resolve(item, location),
            _ => container.payload_source(item),
        }
    }

    /// Load one item with the mode the policy picks for it
    pub fn load_item(&self, container: &Container, item: &ManifestItem) -> Result<LoadedAsset> {
        let source = self.source_for(container, item)?;
        let mode = (self.policy)(item, source.len());
        self.load_with(item, source, &mode)
    }

    /// Load one item with an explicit mode
    pub fn load_with(
        &self,
        item: &ManifestItem,
        source: PayloadSource,
        mode: &LoadMode,
    ) -> Result<LoadedAsset> {
        debug!("Loading '{}' as {:?}", item.id, mode);
        match mode {
            LoadMode::Object => {
                let bytes = source.read_all()?;
                if self.verify_item_hash {
                    verify_item_hash(&item.id, &bytes, item.hash.as_ref())?;
                }
                let value = self.mappings.decode_bytes(&item.type_key, &bytes)?;
                Ok(LoadedAsset::Object(value))
            }
            LoadMode::Lazy => {
                let entry = self.mappings.get(&item.type_key)?;
                let asset = if self.copy_lazy_to_temp {
                    LazyAsset::cached(item, entry, &source, self.temp_store.clone())?
                } else {
                    LazyAsset::new(item, entry, source)
                };
                Ok(LoadedAsset::Lazy(Arc::new(self.hash_policy(asset))))
            }
            LoadMode::Custom(name) => {
                let handler = self
                    .handlers
                    .get(name)
                    .ok_or_else(|| IyamfError::UnknownLoadHandler(name.clone()))?;
                handler.load(item, source, self)
            }
        }
    }

    /// Load every item in manifest order; one failure never stops the rest
    pub fn load_all(&self, container: &Container) -> Vec<ItemLoad> {
        let items = &container.manifest().items;
        let mut loads = Vec::with_capacity(items.len());

        for item in items {
            let load = match self.source_for(container, item) {
                Ok(source) => {
                    let mode = (self.policy)(item, source.len());
                    let result = self.load_with(item, source, &mode);
                    ItemLoad {
                        id: item.id.clone(),
                        mode: Some(mode),
                        result,
                    }
                }
                Err(e) => ItemLoad {
                    id: item.id.clone(),
                    mode: None,
                    result: Err(e),
                },
            };

            if let Err(e) = &load.result {
                warn!("Failed to load asset '{}': {}", item.id, e);
            }
            loads.push(load);
        }

        let failed = loads.iter().filter(|l| l.result.is_err()).count();
        info!(
            "Loaded {} of {} assets from '{}'",
            loads.len() - failed,
            loads.len(),
            container.manifest().head.name
        );
        loads
    }
}

impl fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<&String> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("AssetLoader")
            .field("handlers", &handlers)
            .field("resolver", &self.resolver.is_some())
            .field("copy_lazy_to_temp", &self.copy_lazy_to_temp)
            .field("verify_item_hash", &self.verify_item_hash)
            .finish()
    }
}

/// Builder for [`AssetLoader`]
///
/// # Examples
///
/// ```
/// use iyamf::context::AssetContext;
/// use iyamf::loader::{lazy_above, AssetLoader, DISK_CACHE};
///
/// let context = AssetContext::with_builtin();
/// let loader = AssetLoader::builder(&context)
///     .policy(lazy_above(64 * 1024))
///     .copy_lazy_to_temp(true)
///     .build()
///     .unwrap();
/// assert!(loader.has_handler(DISK_CACHE));
/// ```
pub struct AssetLoaderBuilder {
    mappings: Arc<MappingRegistry>,
    policy: LoadPolicy,
    handlers: HashMap<String, Arc<dyn CustomLoadHandler>>,
    temp_store: Option<Arc<dyn TempStore>>,
    temp_dir: Option<PathBuf>,
    resolver: Option<Arc<dyn ExternalResolver>>,
    copy_lazy_to_temp: bool,
    verify_item_hash: bool,
}

impl AssetLoaderBuilder {
    pub fn new(mappings: Arc<MappingRegistry>) -> Self {
        let mut handlers: HashMap<String, Arc<dyn CustomLoadHandler>> = HashMap::new();
        handlers.insert(DISK_CACHE.to_string(), Arc::new(DiskCacheHandler));

        AssetLoaderBuilder {
            mappings,
            policy: Arc::new(|_, _| LoadMode::Object),
            handlers,
            temp_store: None,
            temp_dir: None,
            resolver: None,
            copy_lazy_to_temp: false,
            verify_item_hash: true,
        }
    }

    pub fn policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&ManifestItem, u64) -> LoadMode + Send + Sync + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    /// Register a handler, replacing any previous one of the same name
    pub fn handler<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: CustomLoadHandler + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn temp_store(mut self, store: Arc<dyn TempStore>) -> Self {
        self.temp_store = Some(store);
        self
    }

    pub fn resolver<R>(mut self, resolver: R) -> Self
    where
        R: ExternalResolver + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Copy payloads of lazy handles into the temp store
    pub fn copy_lazy_to_temp(mut self, copy: bool) -> Self {
        self.copy_lazy_to_temp = copy;
        self
    }

    pub fn verify_item_hash(mut self, verify: bool) -> Self {
        self.verify_item_hash = verify;
        self
    }

    /// Take the item hash and temp directory settings from a config
    pub fn config(mut self, config: &ContainerConfig) -> Self {
        self.verify_item_hash = config.verify_item_hash;
        self.temp_dir = config.temp_dir.clone();
        self
    }

    pub fn build(self) -> Result<AssetLoader> {
        let temp_store: Arc<dyn TempStore> = match (self.temp_store, self.temp_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(TempDirStore::in_dir(dir)?),
            (None, None) => Arc::new(TempDirStore::new()?),
        };

        Ok(AssetLoader {
            mappings: self.mappings,
            policy: self.policy,
            handlers: self.handlers,
            temp_store,
            resolver: self.resolver,
            copy_lazy_to_temp: self.copy_lazy_to_temp,
            verify_item_hash: self.verify_item_hash,
        })
    }
}
