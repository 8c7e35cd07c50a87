//! Registries shared by readers, writers and loaders

use crate::mapping::MappingRegistry;
use crate::reader::ReaderRegistry;
use std::sync::{Arc, OnceLock};

/// Mapping and reader registries passed explicitly to every operation
///
/// Hosts that want a single process-wide instance can use
/// [`AssetContext::shared`]; everything else takes a context by reference,
/// so tests can build isolated ones.
#[derive(Debug, Clone)]
pub struct AssetContext {
    pub mappings: Arc<MappingRegistry>,
    pub readers: Arc<ReaderRegistry>,
}

impl AssetContext {
    pub fn new(mappings: Arc<MappingRegistry>, readers: Arc<ReaderRegistry>) -> Self {
        AssetContext { mappings, readers }
    }

    /// Context with no mappings and no readers
    pub fn empty() -> Self {
        Self::new(
            Arc::new(MappingRegistry::new()),
            Arc::new(ReaderRegistry::new()),
        )
    }

    /// Built-in `bytes`/`text` mappings and the v1/v2 manifest readers
    pub fn with_builtin() -> Self {
        Self::new(
            Arc::new(MappingRegistry::with_builtin()),
            Arc::new(ReaderRegistry::with_builtin()),
        )
    }

    /// Process-wide context, created with the built-ins on first use
    pub fn shared() -> &'static AssetContext {
        static SHARED: OnceLock<AssetContext> = OnceLock::new();
        SHARED.get_or_init(AssetContext::with_builtin)
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    pub fn readers(&self) -> &ReaderRegistry {
        &self.readers
    }
}

impl Default for AssetContext {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ApplicationMarker;

    #[test]
    fn test_contexts_are_isolated() {
        let a = AssetContext::with_builtin();
        let b = AssetContext::with_builtin();
        a.mappings.register("extra", crate::codec::BytesCodec);
        assert!(a.mappings().contains("extra"));
        assert!(!b.mappings().contains("extra"));
    }

    #[test]
    fn test_shared_is_singleton() {
        let first = AssetContext::shared() as *const AssetContext;
        let second = AssetContext::shared() as *const AssetContext;
        assert_eq!(first, second);
        assert!(AssetContext::shared()
            .readers()
            .contains(1, ApplicationMarker::Any));
    }

    #[test]
    fn test_empty() {
        let context = AssetContext::empty();
        assert!(context.mappings().is_empty());
        assert!(context.readers().resolve(1, 0).is_err());
    }
}
