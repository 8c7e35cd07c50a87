//! Asset type mapping registry
//!
//! Maps an asset-type key (the text stored in each manifest item) to the
//! asset class and the encoder/decoder that handles it. Entries are checked
//! for compatibility when they are stored, never when they are used, so a
//! bad pairing can not reach the read path.
//!
//! The registry is read-mostly: populate it at startup (directly, through
//! [`MappingBuilder`], or by merging [`MappingSource`] batches) and share it
//! behind an `Arc`.

use crate::codec::{erase, AssetClass, AssetCodec, AssetValue, ErasedCodec};
use crate::error::{IyamfError, Result};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registered pairing of asset class and codec
#[derive(Clone)]
pub struct MappingEntry {
    asset_class: AssetClass,
    codec: Arc<dyn ErasedCodec>,
}

impl MappingEntry {
    /// Entry for a typed codec; always compatible
    pub fn of<C: AssetCodec>(codec: C) -> Self {
        MappingEntry {
            asset_class: AssetClass::of::<C::Asset>(),
            codec: erase(codec),
        }
    }

    pub fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    pub fn codec(&self) -> &Arc<dyn ErasedCodec> {
        &self.codec
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.codec_name()
    }
}

impl fmt::Debug for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingEntry")
            .field("asset_class", &self.asset_class)
            .field("codec", &self.codec.codec_name())
            .finish()
    }
}

/// Unvalidated mapping supplied from outside the registry (e.g. a plugin)
#[derive(Clone)]
pub struct MappingItem {
    pub key: String,
    pub asset_class: AssetClass,
    pub codec: Arc<dyn ErasedCodec>,
}

impl MappingItem {
    pub fn new(key: impl Into<String>, asset_class: AssetClass, codec: Arc<dyn ErasedCodec>) -> Self {
        MappingItem {
            key: key.into(),
            asset_class,
            codec,
        }
    }

    pub fn of<C: AssetCodec>(key: impl Into<String>, codec: C) -> Self {
        MappingItem {
            key: key.into(),
            asset_class: AssetClass::of::<C::Asset>(),
            codec: erase(codec),
        }
    }

    fn into_entry(self) -> Result<(String, MappingEntry)> {
        check_compatible(&self.key, self.asset_class, self.codec.as_ref())?;
        Ok((
            self.key,
            MappingEntry {
                asset_class: self.asset_class,
                codec: self.codec,
            },
        ))
    }
}

impl fmt::Debug for MappingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingItem")
            .field("key", &self.key)
            .field("asset_class", &self.asset_class)
            .field("codec", &self.codec.codec_name())
            .finish()
    }
}

/// Policy for keys that are already registered when merging a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictMode {
    /// Incoming entry replaces the existing one
    Override,
    /// Existing entry is kept, incoming one discarded
    Ignore,
    /// The whole batch is rejected
    RaiseError,
}

/// What an [`MappingRegistry::append`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub inserted: Vec<String>,
    pub overridden: Vec<String>,
    pub ignored: Vec<String>,
}

/// Supplier of mapping batches, the replacement for scanning loaded code
pub trait MappingSource {
    fn name(&self) -> &str;

    fn mappings(&self) -> Vec<MappingItem>;
}

fn check_compatible(key: &str, asset_class: AssetClass, codec: &dyn ErasedCodec) -> Result<()> {
    if codec.asset_class() != asset_class {
        return Err(IyamfError::IncompatibleCodec {
            key: key.to_string(),
            asset_class: asset_class.name(),
            codec_class: codec.codec_name(),
        });
    }
    Ok(())
}

/// Process-wide table from asset-type key to class and codec
#[derive(Default)]
pub struct MappingRegistry {
    entries: RwLock<HashMap<String, MappingEntry>>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `bytes` and `text` codecs
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register("bytes", crate::codec::BytesCodec);
        registry.register("text", crate::codec::TextCodec);
        registry
    }

    /// Insert or overwrite `key`, rejecting a codec that does not handle
    /// exactly `asset_class`. The table is untouched on rejection.
    pub fn set(
        &self,
        key: impl Into<String>,
        asset_class: AssetClass,
        codec: Arc<dyn ErasedCodec>,
    ) -> Result<()> {
        let key = key.into();
        if let Err(e) = check_compatible(&key, asset_class, codec.as_ref()) {
            warn!("Rejected mapping for '{}': {}", key, e);
            return Err(e);
        }

        debug!(
            "Mapping '{}' -> {} via {}",
            key,
            asset_class,
            codec.codec_name()
        );
        let previous = self.entries.write().insert(
            key.clone(),
            MappingEntry {
                asset_class,
                codec,
            },
        );
        if previous.is_some() {
            debug!("Mapping '{}' overwritten", key);
        }
        Ok(())
    }

    /// Typed registration; compatibility holds by construction
    pub fn register<C: AssetCodec>(&self, key: impl Into<String>, codec: C) {
        let key = key.into();
        debug!("Registering codec for '{}'", key);
        self.entries.write().insert(key, MappingEntry::of(codec));
    }

    /// Merge a batch of entries
    ///
    /// Every item is compatibility-checked first; any incompatible item
    /// rejects the batch. Keys colliding with existing entries, or with
    /// earlier items of the same batch, follow `mode`. With
    /// [`ConflictMode::RaiseError`] a single collision leaves the registry
    /// unchanged.
    pub fn append(&self, items: Vec<MappingItem>, mode: ConflictMode) -> Result<AppendReport> {
        let entries = items
            .into_iter()
            .map(MappingItem::into_entry)
            .collect::<Result<Vec<_>>>()?;

        let mut table = self.entries.write();

        if mode == ConflictMode::RaiseError {
            let mut batch_keys = HashSet::with_capacity(entries.len());
            for (key, _) in &entries {
                if table.contains_key(key) || !batch_keys.insert(key.as_str()) {
                    warn!("Mapping batch rejected: key '{}' conflicts", key);
                    return Err(IyamfError::MappingConflict(key.clone()));
                }
            }
        }

        let mut report = AppendReport::default();
        for (key, entry) in entries {
            match table.get_mut(&key) {
                None => {
                    table.insert(key.clone(), entry);
                    report.inserted.push(key);
                }
                Some(_) if mode == ConflictMode::Ignore => {
                    debug!("Mapping '{}' kept, appended entry ignored", key);
                    report.ignored.push(key);
                }
                // RaiseError batches reaching here carry no collisions
                Some(existing) => {
                    debug!("Mapping '{}' overridden by appended entry", key);
                    *existing = entry;
                    report.overridden.push(key);
                }
            }
        }

        info!(
            "Appended mappings: {} inserted, {} overridden, {} ignored",
            report.inserted.len(),
            report.overridden.len(),
            report.ignored.len()
        );
        Ok(report)
    }

    /// Merge everything a [`MappingSource`] supplies
    pub fn append_source(&self, source: &dyn MappingSource, mode: ConflictMode) -> Result<AppendReport> {
        debug!("Merging mappings from source '{}'", source.name());
        self.append(source.mappings(), mode)
    }

    pub fn get(&self, key: &str) -> Result<MappingEntry> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| IyamfError::UnknownAssetType(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<MappingEntry> {
        self.entries.write().remove(key)
    }

    /// Keys registered for an asset class, sorted
    pub fn keys_for_class(&self, asset_class: AssetClass) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.asset_class == asset_class)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // Type-erased read/write façade

    fn checked_entry(&self, key: &str, value: &AssetValue) -> Result<MappingEntry> {
        let entry = self.get(key)?;
        if value.class() != entry.asset_class {
            return Err(IyamfError::TypeMismatch {
                key: key.to_string(),
                expected: entry.asset_class.name(),
                found: value.class().name(),
            });
        }
        Ok(entry)
    }

    /// Decode an asset of type `key` from a stream
    pub fn decode(&self, key: &str, reader: &mut dyn Read) -> Result<AssetValue> {
        let entry = self.get(key)?;
        entry
            .codec
            .read_erased(reader)
            .map_err(|e| IyamfError::codec(key, e))
    }

    /// Decode an asset of type `key` from a byte buffer
    pub fn decode_bytes(&self, key: &str, bytes: &[u8]) -> Result<AssetValue> {
        let entry = self.get(key)?;
        entry
            .codec
            .load_erased(bytes)
            .map_err(|e| IyamfError::codec(key, e))
    }

    /// Encode `value` to a stream; its class must equal the registered one
    pub fn encode_to(&self, key: &str, value: &AssetValue, writer: &mut dyn Write) -> Result<()> {
        let entry = self.checked_entry(key, value)?;
        entry
            .codec
            .write_erased(value.as_any(), writer)
            .map_err(|e| IyamfError::codec(key, e))
    }

    /// Encode `value` to bytes; its class must equal the registered one
    pub fn encode(&self, key: &str, value: &AssetValue) -> Result<Vec<u8>> {
        let entry = self.checked_entry(key, value)?;
        entry
            .codec
            .serialize_erased(value.as_any())
            .map_err(|e| IyamfError::codec(key, e))
    }
}

impl fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Startup registration surface, one call per asset kind
///
/// # Examples
///
/// ```
/// use iyamf::codec::{BincodeCodec, BytesCodec};
/// use iyamf::mapping::{ConflictMode, MappingBuilder, MappingRegistry};
///
/// let registry = MappingRegistry::new();
/// MappingBuilder::new()
///     .codec("bytes", BytesCodec)
///     .codec("score", BincodeCodec::<u64>::new())
///     .install(&registry, ConflictMode::RaiseError)
///     .unwrap();
///
/// assert!(registry.contains("score"));
/// ```
#[derive(Default)]
pub struct MappingBuilder {
    items: Vec<MappingItem>,
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn codec<C: AssetCodec>(mut self, key: impl Into<String>, codec: C) -> Self {
        self.items.push(MappingItem::of(key, codec));
        self
    }

    pub fn entry(
        mut self,
        key: impl Into<String>,
        asset_class: AssetClass,
        codec: Arc<dyn ErasedCodec>,
    ) -> Self {
        self.items.push(MappingItem::new(key, asset_class, codec));
        self
    }

    pub fn build(self) -> Vec<MappingItem> {
        self.items
    }

    pub fn install(self, registry: &MappingRegistry, mode: ConflictMode) -> Result<AppendReport> {
        registry.append(self.items, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BytesCodec, TextCodec};

    #[test]
    fn test_builtin() {
        let registry = MappingRegistry::with_builtin();
        assert_eq!(registry.keys(), vec!["bytes".to_string(), "text".to_string()]);
        assert!(registry.get("bytes").unwrap().asset_class().is::<Vec<u8>>());
    }

    #[test]
    fn test_set_rejects_incompatible_codec() {
        let registry = MappingRegistry::new();
        let result = registry.set("blob", AssetClass::of::<String>(), erase(BytesCodec));
        assert!(matches!(result, Err(IyamfError::IncompatibleCodec { .. })));
        assert!(matches!(
            registry.get("blob"),
            Err(IyamfError::UnknownAssetType(_))
        ));
    }

    #[test]
    fn test_set_overwrites() {
        let registry = MappingRegistry::new();
        registry
            .set("blob", AssetClass::of::<Vec<u8>>(), erase(BytesCodec))
            .unwrap();
        registry
            .set("blob", AssetClass::of::<String>(), erase(TextCodec))
            .unwrap();
        assert!(registry.get("blob").unwrap().asset_class().is::<String>());
    }

    #[test]
    fn test_keys_for_class() {
        let registry = MappingRegistry::with_builtin();
        registry.register("raw", BytesCodec);
        assert_eq!(
            registry.keys_for_class(AssetClass::of::<Vec<u8>>()),
            vec!["bytes".to_string(), "raw".to_string()]
        );
        assert!(registry.keys_for_class(AssetClass::of::<u8>()).is_empty());
    }

    #[test]
    fn test_facade_strict_type_check() {
        let registry = MappingRegistry::with_builtin();
        let text = AssetValue::new(String::from("hi"));
        assert!(matches!(
            registry.encode("bytes", &text),
            Err(IyamfError::TypeMismatch { .. })
        ));
        let bytes = registry.encode("text", &text).unwrap();
        let back = registry.decode_bytes("text", &bytes).unwrap();
        assert_eq!(back.downcast_ref::<String>().unwrap(), "hi");
    }

    #[test]
    fn test_facade_unknown_key() {
        let registry = MappingRegistry::new();
        assert!(matches!(
            registry.decode_bytes("missing", b""),
            Err(IyamfError::UnknownAssetType(_))
        ));
    }

    #[test]
    fn test_facade_codec_failure() {
        let registry = MappingRegistry::with_builtin();
        let err = registry.decode_bytes("text", &[0xFF]).unwrap_err();
        assert!(matches!(err, IyamfError::Codec { ref key, .. } if key == "text"));
    }

    #[test]
    fn test_batch_with_incompatible_item_is_rejected() {
        let registry = MappingRegistry::new();
        let items = vec![
            MappingItem::of("bytes", BytesCodec),
            MappingItem::new("bad", AssetClass::of::<u32>(), erase(TextCodec)),
        ];
        assert!(registry.append(items, ConflictMode::Override).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_keys_within_batch() {
        let registry = MappingRegistry::new();
        let items = vec![
            MappingItem::of("asset", BytesCodec),
            MappingItem::of("asset", TextCodec),
        ];
        assert!(matches!(
            registry.append(items.clone(), ConflictMode::RaiseError),
            Err(IyamfError::MappingConflict(_))
        ));
        assert!(registry.is_empty());

        let report = registry.append(items, ConflictMode::Ignore).unwrap();
        assert_eq!(report.inserted, vec!["asset".to_string()]);
        assert_eq!(report.ignored, vec!["asset".to_string()]);
        assert!(registry.get("asset").unwrap().asset_class().is::<Vec<u8>>());
    }

    #[test]
    fn test_append_modes_without_collisions() {
        for mode in [ConflictMode::Override, ConflictMode::Ignore, ConflictMode::RaiseError] {
            let registry = MappingRegistry::new();
            let report = registry
                .append(
                    vec![
                        MappingItem::of("a", BytesCodec),
                        MappingItem::of("b", TextCodec),
                    ],
                    mode,
                )
                .unwrap();
            assert_eq!(report.inserted, vec!["a".to_string(), "b".to_string()]);
            assert!(report.overridden.is_empty() && report.ignored.is_empty());
        }

        let registry = MappingRegistry::new();
        let items = vec![
            MappingItem::of("asset", BytesCodec),
            MappingItem::of("asset", TextCodec),
        ];
        let report = registry.append(items, ConflictMode::Override).unwrap();
        assert_eq!(report.overridden, vec!["asset".to_string()]);
        assert!(registry.get("asset").unwrap().asset_class().is::<String>());
    }

    struct PluginSource;

    impl MappingSource for PluginSource {
        fn name(&self) -> &str {
            "plugin"
        }

        fn mappings(&self) -> Vec<MappingItem> {
            vec![MappingItem::of("plugin.text", TextCodec)]
        }
    }

    #[test]
    fn test_append_source() {
        let registry = MappingRegistry::with_builtin();
        let report = registry
            .append_source(&PluginSource, ConflictMode::RaiseError)
            .unwrap();
        assert_eq!(report.inserted, vec!["plugin.text".to_string()]);
        assert_eq!(registry.len(), 3);
    }
}
