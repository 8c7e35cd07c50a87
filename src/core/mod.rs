//! IYaMF container core
//!
//! - [`error`] - Error taxonomy
//! - [`checksum`] - CRC-8 header trailer and MD5 content hashes
//! - [`header`] - Fixed 67-byte header codec
//! - [`segment`] - Regions and file segments
//! - [`validation`] - Header/region validation, package names
//! - [`manifest`] - Manifest model
//! - [`codec`] - Asset read/write protocol and built-in codecs
//! - [`mapping`] - Asset type mapping registry
//! - [`reader`] - Versioned manifest readers and dispatch
//! - [`context`] - Registries threaded through every call
//! - [`config`] - Reader/writer configuration
//! - [`io`] - Segment-bounded file reads and payload sources
//! - [`temp`] - Temporary-file service
//! - [`lazy`] - Lazily materialized assets
//! - [`loader`] - Per-item load-mode selection
//! - [`container`] - Opening containers
//! - [`writer`] - Building containers

pub mod checksum;
pub mod codec;
pub mod config;
pub mod container;
pub mod context;
pub mod error;
pub mod header;
pub mod io;
pub mod lazy;
pub mod loader;
pub mod manifest;
pub mod mapping;
pub mod reader;
pub mod segment;
pub mod temp;
pub mod validation;
pub mod writer;
