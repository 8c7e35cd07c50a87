//! Lazily materialized assets
//!
//! A [`LazyAsset`] knows where its payload lives and which codec decodes it,
//! but decodes nothing until [`LazyAsset::load`] is called. The decoded value
//! is cached inside the handle until [`LazyAsset::unload`] drops it again.
//! Handles are `Send + Sync`: one mutex per handle serializes load and
//! unload, so sharing a handle behind an `Arc` is safe.
//!
//! Handles created with [`LazyAsset::cached`] copy the payload into a
//! [`TempStore`] file up front, so the container it came from need not stay
//! open while the handle is pending. `unload` releases that copy together
//! with the decoded value; the next `load` copies from the original source
//! again.

use crate::checksum::ContentHash;
use crate::codec::SharedAsset;
use crate::error::{IyamfError, Result};
use crate::io::PayloadSource;
use crate::manifest::ManifestItem;
use crate::mapping::MappingEntry;
use crate::temp::{TempFile, TempStore};
use crate::validation::verify_item_hash;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::{type_name, Any};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazyState {
    Unloaded,
    Loaded,
}

/// Notification sent to subscribers on every state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub asset_id: String,
    pub state: LazyState,
}

/// Temp-file copy of the payload
struct TempBacking {
    file: TempFile,
    length: u64,
}

impl TempBacking {
    fn source(&self) -> PayloadSource {
        PayloadSource::File {
            path: self.file.path.clone(),
            range: 0..self.length,
        }
    }
}

#[derive(Default)]
struct Slot {
    value: Option<SharedAsset>,
    backing: Option<TempBacking>,
}

pub struct LazyAsset {
    id: String,
    type_key: String,
    entry: MappingEntry,
    source: PayloadSource,
    expected_hash: Option<ContentHash>,
    store: Option<Arc<dyn TempStore>>,
    slot: Mutex<Slot>,
    listeners: Mutex<Vec<Sender<StateChange>>>,
}

impl LazyAsset {
    /// Handle reading straight from `source`
    pub fn new(item: &ManifestItem, entry: MappingEntry, source: PayloadSource) -> Self {
        LazyAsset {
            id: item.id.clone(),
            type_key: item.type_key.clone(),
            entry,
            source,
            expected_hash: item.hash,
            store: None,
            slot: Mutex::new(Slot::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Handle backed by a temp-file copy of `source`
    pub fn cached(
        item: &ManifestItem,
        entry: MappingEntry,
        source: &PayloadSource,
        store: Arc<dyn TempStore>,
    ) -> Result<Self> {
        let backing = copy_to_store(&item.id, source, store.as_ref())?;
        let mut asset = Self::new(item, entry, source.clone());
        asset.slot.get_mut().backing = Some(backing);
        asset.store = Some(store);
        Ok(asset)
    }

    /// Skip the payload hash check on load
    pub fn without_hash_check(mut self) -> Self {
        self.expected_hash = None;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    pub fn entry(&self) -> &MappingEntry {
        &self.entry
    }

    /// Encoded payload size in bytes
    pub fn payload_len(&self) -> u64 {
        self.source.len()
    }

    /// Path of the current temp-file copy, if one is held
    pub fn temp_path(&self) -> Option<PathBuf> {
        self.slot
            .lock()
            .backing
            .as_ref()
            .map(|backing| backing.file.path.clone())
    }

    pub fn state(&self) -> LazyState {
        if self.slot.lock().value.is_some() {
            LazyState::Loaded
        } else {
            LazyState::Unloaded
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LazyState::Loaded
    }

    /// The decoded value if currently loaded
    pub fn get(&self) -> Option<SharedAsset> {
        self.slot.lock().value.clone()
    }

    /// Receive a [`StateChange`] for every later transition of this handle
    pub fn subscribe(&self) -> Receiver<StateChange> {
        let (tx, rx) = unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    /// Decode the payload, or return the already decoded value
    pub fn load(&self) -> Result<SharedAsset> {
        let mut slot = self.slot.lock();
        if let Some(value) = slot.value.as_ref() {
            return Ok(value.clone());
        }

        if slot.backing.is_none() {
            if let Some(store) = &self.store {
                slot.backing = Some(copy_to_store(&self.id, &self.source, store.as_ref())?);
            }
        }
        let bytes = match &slot.backing {
            Some(backing) => backing.source().read_all()?,
            None => self.source.read_all()?,
        };

        verify_item_hash(&self.id, &bytes, self.expected_hash.as_ref())?;
        let value = self
            .entry
            .codec()
            .load_erased(&bytes)
            .map_err(|e| IyamfError::codec(&self.type_key, e))?
            .into_shared();

        slot.value = Some(value.clone());
        debug!("Lazy asset '{}' loaded ({} bytes)", self.id, bytes.len());
        self.notify(LazyState::Loaded);
        Ok(value)
    }

    /// [`load`](Self::load) and downcast to the concrete asset type
    pub fn load_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let value = self.load()?;
        value.downcast::<T>().ok_or_else(|| IyamfError::TypeMismatch {
            key: self.type_key.clone(),
            expected: type_name::<T>(),
            found: value.class().name(),
        })
    }

    /// Drop the decoded value and release any temp-file copy.
    /// Returns false if nothing was loaded.
    pub fn unload(&self) -> bool {
        let mut slot = self.slot.lock();
        let value = slot.value.take();
        if let Some(backing) = slot.backing.take() {
            self.release(backing);
        }
        if value.is_none() {
            return false;
        }
        debug!("Lazy asset '{}' unloaded", self.id);
        self.notify(LazyState::Unloaded);
        true
    }

    fn release(&self, backing: TempBacking) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.release(backing.file.id) {
            warn!(
                "Failed to release temp file {} for '{}': {}",
                backing.file.id, self.id, e
            );
        }
    }

    fn notify(&self, state: LazyState) {
        let change = StateChange {
            asset_id: self.id.clone(),
            state,
        };
        self.listeners
            .lock()
            .retain(|listener| listener.send(change.clone()).is_ok());
    }
}

/// Copy `source` into a fresh temp file from `store`
fn copy_to_store(id: &str, source: &PayloadSource, store: &dyn TempStore) -> Result<TempBacking> {
    let file = store.acquire()?;
    match write_copy(source, &file) {
        Ok(length) => {
            debug!("Cached {} bytes of '{}' into temp file {}", length, id, file.id);
            Ok(TempBacking { file, length })
        }
        Err(e) => {
            if let Err(release_err) = store.release(file.id) {
                warn!("Failed to release temp file {}: {}", file.id, release_err);
            }
            Err(e)
        }
    }
}

fn write_copy(source: &PayloadSource, file: &TempFile) -> Result<u64> {
    let mut out = File::create(&file.path)?;
    let written = source.copy_to(&mut out)?;
    out.flush()?;
    Ok(written)
}

impl Drop for LazyAsset {
    fn drop(&mut self) {
        if let Some(backing) = self.slot.get_mut().backing.take() {
            self.release(backing);
        }
    }
}

impl fmt::Debug for LazyAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyAsset")
            .field("id", &self.id)
            .field("type_key", &self.type_key)
            .field("state", &self.state())
            .field("payload_len", &self.payload_len())
            .field("cached", &self.store.is_some())
            .finish()
    }
}
