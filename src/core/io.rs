//! Disk I/O for containers and payload sources

use crate::checksum::{ContentHash, ContentHasher};
use crate::error::{IyamfError, Result};
use crate::header::HEADER_SIZE;
use crate::segment::{Region, Segment};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHUNK_SIZE: usize = 64 * 1024;

/// Read-only view of one container segment inside a physical file
///
/// All offsets given to this type are relative to the segment start;
/// reads past the segment limit are rejected before touching the file.
pub struct SegmentFile {
    file: File,
    path: PathBuf,
    segment: Segment,
    size: u64,
}

impl SegmentFile {
    pub fn open<P: AsRef<Path>>(path: P, segment: Segment) -> Result<Self> {
        let file = File::open(&path)?;
        let physical_len = file.metadata()?.len();
        let size = segment.size(physical_len)?;

        Ok(SegmentFile {
            file,
            path: path.as_ref().to_path_buf(),
            segment,
            size,
        })
    }

    /// Addressable bytes in this segment
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    /// Raw header bytes at the start of the segment
    pub fn read_header_bytes(&mut self) -> Result<Vec<u8>> {
        if self.size < HEADER_SIZE as u64 {
            return Err(IyamfError::TruncatedHeader {
                expected: HEADER_SIZE,
                actual: self.size as usize,
            });
        }
        self.read_region("header", Region::new(0, HEADER_SIZE as u64))
    }

    /// Read a whole region into memory
    pub fn read_region(&mut self, name: &'static str, region: Region) -> Result<Vec<u8>> {
        region.check_within(name, self.size)?;
        let length = usize::try_from(region.length).map_err(|_| IyamfError::RegionOutOfBounds {
            region: name,
            start: region.start,
            length: region.length,
            limit: usize::MAX as u64,
        })?;

        self.file
            .seek(SeekFrom::Start(self.segment.start + region.start))?;
        let mut buffer = vec![0u8; length];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// MD5 of a region, streamed in chunks so regions larger than memory work
    pub fn hash_region(&mut self, name: &'static str, region: Region) -> Result<ContentHash> {
        region.check_within(name, self.size)?;
        self.file
            .seek(SeekFrom::Start(self.segment.start + region.start))?;

        let mut hasher = ContentHasher::new();
        let mut remaining = region.length;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        while remaining > 0 {
            let take = remaining.min(CHUNK_SIZE as u64) as usize;
            self.file.read_exact(&mut chunk[..take])?;
            hasher.update(&chunk[..take]);
            remaining -= take as u64;
        }
        Ok(hasher.finish())
    }

    /// Absolute file range of a container-relative region
    pub fn absolute(&self, name: &'static str, region: Region) -> Result<Range<u64>> {
        region.check_within(name, self.size)?;
        let start = self.segment.start + region.start;
        Ok(start..start + region.length)
    }
}

/// Where an asset's encoded bytes can be read from
///
/// Sources are cheap to clone and reopen their backing file on every read,
/// so a lazy asset never keeps the container file open.
#[derive(Debug, Clone)]
pub enum PayloadSource {
    /// Bytes held in memory
    Memory(Arc<[u8]>),

    /// Window into a shared in-memory buffer
    Slice { bytes: Arc<[u8]>, range: Range<usize> },

    /// Absolute byte range of a file
    File { path: PathBuf, range: Range<u64> },
}

impl PayloadSource {
    pub fn memory(bytes: impl Into<Arc<[u8]>>) -> Self {
        PayloadSource::Memory(bytes.into())
    }

    /// Whole file
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let len = std::fs::metadata(path.as_ref())?.len();
        Ok(PayloadSource::File {
            path: path.as_ref().to_path_buf(),
            range: 0..len,
        })
    }

    pub fn len(&self) -> u64 {
        match self {
            PayloadSource::Memory(bytes) => bytes.len() as u64,
            PayloadSource::Slice { range, .. } => range.len() as u64,
            PayloadSource::File { range, .. } => range.end - range.start,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream over the payload bytes
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            PayloadSource::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            PayloadSource::Slice { bytes, range } => {
                let mut cursor = Cursor::new(bytes.clone());
                cursor.set_position(range.start as u64);
                Ok(Box::new(cursor.take(range.len() as u64)))
            }
            PayloadSource::File { path, range } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(range.start))?;
                Ok(Box::new(file.take(range.end - range.start)))
            }
        }
    }

    /// All payload bytes; fails if the backing file is shorter than the range
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            PayloadSource::Memory(bytes) => Ok(bytes.to_vec()),
            PayloadSource::Slice { bytes, range } => Ok(bytes[range.clone()].to_vec()),
            PayloadSource::File { .. } => {
                let expected = self.len();
                let mut buffer = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
                self.open()?.read_to_end(&mut buffer)?;
                if buffer.len() as u64 != expected {
                    return Err(IyamfError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("payload truncated: {} of {} bytes", buffer.len(), expected),
                    )));
                }
                Ok(buffer)
            }
        }
    }

    /// Copy the payload into `writer`, returning the byte count
    pub fn copy_to(&self, writer: &mut dyn Write) -> Result<u64> {
        let mut reader = self.open()?;
        Ok(std::io::copy(&mut reader, writer)?)
    }
}
