//! Regions and segments
//!
//! A [`Region`] is an offset+length window relative to the start of a
//! container. A [`Segment`] is a bounded window into a physical file that
//! hosts one container, so a single file can carry several independently
//! addressable containers back to back.

use crate::error::{IyamfError, Result};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub start: u64,
    pub length: u64,
}

impl Region {
    pub fn new(start: u64, length: u64) -> Self {
        Region { start, length }
    }

    /// Exclusive end offset, `None` on overflow
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Empty regions never overlap anything
    pub fn overlaps(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        match (self.end(), other.end()) {
            (Some(a_end), Some(b_end)) => self.start < b_end && other.start < a_end,
            _ => true,
        }
    }

    /// Whether `inner` lies entirely within this region
    pub fn contains(&self, inner: &Region) -> bool {
        match (self.end(), inner.end()) {
            (Some(outer_end), Some(inner_end)) => {
                inner.start >= self.start && inner_end <= outer_end
            }
            _ => false,
        }
    }

    /// Fail with `RegionOutOfBounds` unless the region fits in `[0, limit)`
    pub fn check_within(&self, name: &'static str, limit: u64) -> Result<()> {
        match self.end() {
            Some(end) if end <= limit => Ok(()),
            _ => Err(IyamfError::RegionOutOfBounds {
                region: name,
                start: self.start,
                length: self.length,
                limit,
            }),
        }
    }
}

/// Bounded window into a physical file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Segment {
    /// Absolute offset of the container header
    pub start: u64,
    /// Maximum number of bytes the container may span
    pub limit: Option<u64>,
}

impl Segment {
    /// The whole file, container at offset 0
    pub fn whole() -> Self {
        Segment {
            start: 0,
            limit: None,
        }
    }

    pub fn new(start: u64, limit: Option<u64>) -> Self {
        Segment { start, limit }
    }

    pub fn bounded(start: u64, length: u64) -> Self {
        Segment {
            start,
            limit: Some(length),
        }
    }

    /// Addressable size of this segment inside a file of `physical_len` bytes
    pub fn size(&self, physical_len: u64) -> Result<u64> {
        if self.start > physical_len {
            return Err(IyamfError::RegionOutOfBounds {
                region: "segment",
                start: self.start,
                length: self.limit.unwrap_or(0),
                limit: physical_len,
            });
        }
        let available = physical_len - self.start;
        Ok(match self.limit {
            Some(limit) => limit.min(available),
            None => available,
        })
    }

    /// Translate a container-relative region into an absolute file range
    pub fn resolve(
        &self,
        name: &'static str,
        region: Region,
        physical_len: u64,
    ) -> Result<Range<u64>> {
        let size = self.size(physical_len)?;
        region.check_within(name, size)?;
        let start = self.start + region.start;
        Ok(start..start + region.length)
    }
}
