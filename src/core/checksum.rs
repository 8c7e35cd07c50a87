//! Checksum primitives used by the container format
//!
//! - CRC-8/SMBUS (poly 0x07) protects the fixed header
//! - MD5 hashes the manifest region, the data region and every item payload

use crc::{Crc, CRC_8_SMBUS};
use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const HEADER_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// CRC-8 over `bytes`
pub fn crc8(bytes: &[u8]) -> u8 {
    HEADER_CRC.checksum(bytes)
}

/// 128-bit content hash (MD5)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentHash(pub [u8; 16]);

impl ContentHash {
    pub const ZERO: ContentHash = ContentHash([0u8; 16]);

    /// Hash a complete buffer
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(text: &str) -> Option<Self> {
        let decoded = hex::decode(text).ok()?;
        let bytes: [u8; 16] = decoded.try_into().ok()?;
        Some(ContentHash(bytes))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Hex text in JSON manifests, raw bytes in binary manifests
impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            ContentHash::from_hex(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash '{}'", text)))
        } else {
            <[u8; 16]>::deserialize(deserializer).map(ContentHash)
        }
    }
}

/// Incremental MD5 for payloads read in chunks
pub struct ContentHasher(Md5);

impl ContentHasher {
    pub fn new() -> Self {
        ContentHasher(Md5::new())
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    pub fn finish(self) -> ContentHash {
        let digest = self.0.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest);
        ContentHash(out)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
