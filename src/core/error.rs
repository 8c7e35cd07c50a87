use thiserror::Error;

/// Failure classes a caller can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad magic, checksum mismatch, truncated or inconsistent regions.
    /// Fatal to the current read and never retried.
    Structural,
    /// No reader registered for the header's version/marker pair.
    Dispatch,
    /// Unknown asset-type key or an incompatible encoder/decoder.
    Mapping,
    /// An encoder/decoder could not handle one asset's bytes.
    Codec,
    /// File and stream I/O, configuration parsing.
    Resource,
}

#[derive(Error, Debug)]
pub enum IyamfError {
    #[error("Truncated header: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("Header checksum mismatch: stored {stored:#04x}, computed {computed:#04x}")]
    HeaderChecksumMismatch { stored: u8, computed: u8 },

    #[error("Invalid magic mark in header: {0:?}")]
    InvalidMagic([u8; 5]),

    #[error("{region} region [{start}, +{length}) exceeds addressable size {limit}")]
    RegionOutOfBounds {
        region: &'static str,
        start: u64,
        length: u64,
        limit: u64,
    },

    #[error("Manifest and data regions overlap")]
    OverlappingRegions,

    #[error("{0} region hash does not match header")]
    RegionHashMismatch(&'static str),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid package name: {0}")]
    InvalidPackageName(String),

    #[error("No manifest reader for format version {version}, application marker {marker}")]
    NoMatchingImplementation { version: u8, marker: u32 },

    #[error("Unknown asset type key: {0}")]
    UnknownAssetType(String),

    #[error("Codec for {codec_class} cannot handle asset class {asset_class} (key '{key}')")]
    IncompatibleCodec {
        key: String,
        asset_class: &'static str,
        codec_class: &'static str,
    },

    #[error("Mapping conflict: key '{0}' is already registered")]
    MappingConflict(String),

    #[error("Asset type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Codec failure for '{key}': {source}")]
    Codec {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Payload hash mismatch for asset '{0}'")]
    PayloadHashMismatch(String),

    #[error("Asset '{0}' not found in manifest")]
    AssetNotFound(String),

    #[error("No custom load handler registered under '{0}'")]
    UnknownLoadHandler(String),

    #[error("Asset '{0}' is stored outside the container and no resolver is configured")]
    UnresolvedOutside(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl IyamfError {
    /// Taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        use IyamfError::*;
        match self {
            TruncatedHeader { .. }
            | HeaderChecksumMismatch { .. }
            | InvalidMagic(_)
            | RegionOutOfBounds { .. }
            | OverlappingRegions
            | RegionHashMismatch(_)
            | InvalidManifest(_)
            | InvalidPackageName(_)
            | PayloadHashMismatch(_) => ErrorKind::Structural,
            NoMatchingImplementation { .. } => ErrorKind::Dispatch,
            UnknownAssetType(_)
            | IncompatibleCodec { .. }
            | MappingConflict(_)
            | UnknownLoadHandler(_) => ErrorKind::Mapping,
            TypeMismatch { .. } | Codec { .. } => ErrorKind::Codec,
            AssetNotFound(_) | UnresolvedOutside(_) | Io(_) | Serialization(_) | Binary(_)
            | Config(_) => ErrorKind::Resource,
        }
    }

    pub(crate) fn codec(key: &str, source: anyhow::Error) -> Self {
        IyamfError::Codec {
            key: key.to_string(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IyamfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            IyamfError::HeaderChecksumMismatch {
                stored: 1,
                computed: 2
            }
            .kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            IyamfError::NoMatchingImplementation {
                version: 2,
                marker: 77
            }
            .kind(),
            ErrorKind::Dispatch
        );
        assert_eq!(
            IyamfError::UnknownAssetType("x".into()).kind(),
            ErrorKind::Mapping
        );
        assert_eq!(
            IyamfError::codec("x", anyhow::anyhow!("bad bytes")).kind(),
            ErrorKind::Codec
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(IyamfError::from(io).kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_codec_error_keeps_cause() {
        let err = IyamfError::codec("bytes", anyhow::anyhow!("short read"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("short read"));
    }
}
