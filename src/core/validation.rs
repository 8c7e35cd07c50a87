//! Header and region validation, plus package name rules
//!
//! [`validate_header`] is the gate every read passes through before any
//! manifest byte is looked at: a header that fails here is never partially
//! trusted.

use crate::checksum::{crc8, ContentHash};
use crate::error::{IyamfError, Result};
use crate::header::{offsets, Header, HEADER_SIZE, MAGIC};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Validate raw header bytes and decode them
///
/// 1. length must equal [`HEADER_SIZE`]
/// 2. CRC-8 over all bytes but the last must equal the last byte
/// 3. fields are decoded positionally
/// 4. the magic mark must be `"IYaMF"`
///
/// # Examples
///
/// ```
/// use iyamf::header::Header;
/// use iyamf::validation::validate_header;
///
/// let bytes = Header::new(1, 0).to_bytes();
/// let header = validate_header(&bytes).unwrap();
/// assert_eq!(header.format_version, 1);
///
/// let mut corrupted = bytes;
/// corrupted[10] ^= 0x01;
/// assert!(validate_header(&corrupted).is_err());
/// ```
pub fn validate_header(raw: &[u8]) -> Result<Header> {
    let bytes: &[u8; HEADER_SIZE] =
        raw.try_into()
            .map_err(|_| IyamfError::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: raw.len(),
            })?;

    let stored = bytes[offsets::CHECKSUM];
    let computed = crc8(&bytes[..offsets::CHECKSUM]);
    if stored != computed {
        debug!(
            "Header checksum mismatch: stored {:#04x}, computed {:#04x}",
            stored, computed
        );
        return Err(IyamfError::HeaderChecksumMismatch { stored, computed });
    }

    let header = Header::decode_fields(bytes);
    if header.magic != MAGIC {
        return Err(IyamfError::InvalidMagic(header.magic));
    }

    Ok(header)
}

/// Check that both regions fit inside a container of `container_size` bytes
/// and do not overlap each other
pub fn validate_regions(header: &Header, container_size: u64) -> Result<()> {
    let manifest = header.manifest_region();
    let data = header.data_region();

    manifest.check_within("manifest", container_size)?;
    data.check_within("data", container_size)?;

    if manifest.overlaps(&data) {
        return Err(IyamfError::OverlappingRegions);
    }

    Ok(())
}

/// Compare a region's bytes against the hash stored in the header
pub fn verify_region_hash(name: &'static str, bytes: &[u8], expected: &ContentHash) -> Result<()> {
    verify_hash(name, ContentHash::of(bytes), expected)
}

pub(crate) fn verify_hash(
    name: &'static str,
    actual: ContentHash,
    expected: &ContentHash,
) -> Result<()> {
    if actual != *expected {
        debug!(
            "{} region hash mismatch: header {}, computed {}",
            name, expected, actual
        );
        return Err(IyamfError::RegionHashMismatch(name));
    }
    Ok(())
}

/// Compare an item payload against the hash recorded in its manifest entry
///
/// Items without a recorded hash always pass.
pub fn verify_item_hash(id: &str, bytes: &[u8], expected: Option<&ContentHash>) -> Result<()> {
    if let Some(expected) = expected {
        let actual = ContentHash::of(bytes);
        if actual != *expected {
            debug!(
                "Payload hash mismatch for '{}': manifest {}, computed {}",
                id, expected, actual
            );
            return Err(IyamfError::PayloadHashMismatch(id.to_string()));
        }
    }
    Ok(())
}

/// Validated package name from the manifest head record
///
/// # Rules
/// - Lowercase letters, digits, `-`, `.` and `_`
/// - Must start and end with a letter or digit
/// - Length: 1-214 characters
///
/// # Examples
///
/// ```
/// use iyamf::validation::PackageName;
///
/// assert!(PackageName::new("core-assets").is_ok());
/// assert!(PackageName::new("ui.icons_v2").is_ok());
/// assert!(PackageName::new("Core Assets").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageName(String);

impl PackageName {
    const PATTERN: &'static str = r"^[a-z0-9]([a-z0-9._-]*[a-z0-9])?$";

    const MAX_LENGTH: usize = 214;

    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;
        Ok(PackageName(name))
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(IyamfError::InvalidPackageName(
                "name cannot be empty".to_string(),
            ));
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(IyamfError::InvalidPackageName(format!(
                "name too long (max {} characters)",
                Self::MAX_LENGTH
            )));
        }

        if !Self::pattern().is_match(name) {
            return Err(IyamfError::InvalidPackageName(format!(
                "'{}' may only contain lowercase letters, digits, '-', '.' and '_'",
                name
            )));
        }

        Ok(())
    }

    fn pattern() -> &'static Regex {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        PATTERN.get_or_init(|| Regex::new(Self::PATTERN).expect("package name pattern is valid"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for PackageName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PackageName {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        PackageName::new(name).map_err(serde::de::Error::custom)
    }
}
