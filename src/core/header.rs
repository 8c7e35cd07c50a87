use crate::checksum::{crc8, ContentHash};
use crate::segment::Region;

pub const MAGIC: [u8; 5] = *b"IYaMF";

/// Total header size: 66 field bytes plus the CRC-8 trailer
pub const HEADER_SIZE: usize = 67;

/// Byte offsets of each header field (little-endian integers)
pub mod offsets {
    pub const MAGIC: usize = 0;
    pub const MANIFEST_START: usize = 5;
    pub const MANIFEST_LENGTH: usize = 9;
    pub const MANIFEST_HASH: usize = 13;
    pub const DATA_START: usize = 29;
    pub const DATA_LENGTH: usize = 37;
    pub const DATA_HASH: usize = 45;
    pub const FORMAT_VERSION: usize = 61;
    pub const APPLICATION_MARKER: usize = 62;
    pub const CHECKSUM: usize = 66;
}

/// Container header
///
/// Fixed-size record at the start of every container (or container segment).
/// It locates the manifest and data regions, carries their content hashes,
/// and names the format version and application marker used to pick a
/// manifest reader.
///
/// # Layout
///
/// ```text
/// Offset  Size  Field
///   0      5    magic "IYaMF"
///   5      4    manifest start (u32)
///   9      4    manifest length (u32)
///  13     16    manifest hash (MD5)
///  29      8    data start (u64)
///  37      8    data length (u64)
///  45     16    data hash (MD5)
///  61      1    format version
///  62      4    application marker (u32)
///  66      1    CRC-8 over bytes 0..66
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 5],
    pub manifest_start: u32,
    pub manifest_length: u32,
    pub manifest_hash: ContentHash,
    pub data_start: u64,
    pub data_length: u64,
    pub data_hash: ContentHash,
    pub format_version: u8,
    /// 0 means "no specific application"
    pub application_marker: u32,
}

impl Header {
    /// Create an empty header for the given format version and marker
    pub fn new(format_version: u8, application_marker: u32) -> Self {
        Header {
            magic: MAGIC,
            manifest_start: 0,
            manifest_length: 0,
            manifest_hash: ContentHash::ZERO,
            data_start: 0,
            data_length: 0,
            data_hash: ContentHash::ZERO,
            format_version,
            application_marker,
        }
    }

    pub fn manifest_region(&self) -> Region {
        Region::new(self.manifest_start as u64, self.manifest_length as u64)
    }

    pub fn data_region(&self) -> Region {
        Region::new(self.data_start, self.data_length)
    }

    /// Serialize the header, appending the CRC-8 trailer
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        bytes[offsets::MAGIC..offsets::MANIFEST_START].copy_from_slice(&self.magic);
        bytes[offsets::MANIFEST_START..offsets::MANIFEST_LENGTH]
            .copy_from_slice(&self.manifest_start.to_le_bytes());
        bytes[offsets::MANIFEST_LENGTH..offsets::MANIFEST_HASH]
            .copy_from_slice(&self.manifest_length.to_le_bytes());
        bytes[offsets::MANIFEST_HASH..offsets::DATA_START]
            .copy_from_slice(self.manifest_hash.as_bytes());
        bytes[offsets::DATA_START..offsets::DATA_LENGTH]
            .copy_from_slice(&self.data_start.to_le_bytes());
        bytes[offsets::DATA_LENGTH..offsets::DATA_HASH]
            .copy_from_slice(&self.data_length.to_le_bytes());
        bytes[offsets::DATA_HASH..offsets::FORMAT_VERSION].copy_from_slice(self.data_hash.as_bytes());
        bytes[offsets::FORMAT_VERSION] = self.format_version;
        bytes[offsets::APPLICATION_MARKER..offsets::CHECKSUM]
            .copy_from_slice(&self.application_marker.to_le_bytes());

        bytes[offsets::CHECKSUM] = crc8(&bytes[..offsets::CHECKSUM]);
        bytes
    }

    /// Decode fields positionally. Callers must have checked length and CRC.
    pub(crate) fn decode_fields(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 5];
        magic.copy_from_slice(&bytes[offsets::MAGIC..offsets::MANIFEST_START]);

        Header {
            magic,
            manifest_start: read_u32(bytes, offsets::MANIFEST_START),
            manifest_length: read_u32(bytes, offsets::MANIFEST_LENGTH),
            manifest_hash: read_hash(bytes, offsets::MANIFEST_HASH),
            data_start: read_u64(bytes, offsets::DATA_START),
            data_length: read_u64(bytes, offsets::DATA_LENGTH),
            data_hash: read_hash(bytes, offsets::DATA_HASH),
            format_version: bytes[offsets::FORMAT_VERSION],
            application_marker: read_u32(bytes, offsets::APPLICATION_MARKER),
        }
    }
}

fn read_u32(bytes: &[u8; HEADER_SIZE], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8; HEADER_SIZE], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn read_hash(bytes: &[u8; HEADER_SIZE], at: usize) -> ContentHash {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&bytes[at..at + 16]);
    ContentHash(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_table_sums_to_header_size() {
        assert_eq!(offsets::CHECKSUM + 1, HEADER_SIZE);
        assert_eq!(offsets::MANIFEST_LENGTH - offsets::MANIFEST_START, 4);
        assert_eq!(offsets::DATA_LENGTH - offsets::DATA_START, 8);
        assert_eq!(offsets::FORMAT_VERSION - offsets::DATA_HASH, 16);
    }

    #[test]
    fn test_header_serialization() {
        let mut header = Header::new(2, 0xDEAD_BEEF);
        header.manifest_start = 64;
        header.manifest_length = 128;
        header.data_start = 192;
        header.data_length = 5_000_000_000;
        header.data_hash = ContentHash::of(b"data");

        let bytes = header.to_bytes();
        assert_eq!(&bytes[..5], b"IYaMF");
        assert_eq!(&bytes[5..9], &64u32.to_le_bytes());
        assert_eq!(bytes[offsets::FORMAT_VERSION], 2);
        assert_eq!(bytes[66], crc8(&bytes[..66]));

        let decoded = Header::decode_fields(&bytes);
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_regions() {
        let mut header = Header::new(1, 0);
        header.manifest_start = 10;
        header.manifest_length = 20;
        header.data_start = 30;
        header.data_length = 40;

        assert_eq!(header.manifest_region(), Region::new(10, 20));
        assert_eq!(header.data_region(), Region::new(30, 40));
    }
}
