//! `.pkpass` archive creation.
//!
//! A `.pkpass` is a flat ZIP archive. The signature and the manifest come
//! first, followed by every bundle file at its flattened path.
//!
//! For the reverse operation, see the [`verify`](super::verify) module.
//!
//! # Examples
//!
//! ```
//! use passkit::bundle::Bundle;
//! use passkit::pkpass::{write_pkpass, CompressionLevel};
//! use std::io::Cursor;
//!
//! let mut files = Bundle::new();
//! files.insert("pass.json".to_string(), b"{}".to_vec());
//!
//! let cursor = write_pkpass(
//!     Cursor::new(Vec::new()),
//!     b"signature bytes",
//!     b"{}",
//!     &files,
//!     CompressionLevel::NONE,
//! )?;
//! assert!(!cursor.into_inner().is_empty());
//! # Ok::<(), passkit::Error>(())
//! ```

use crate::bundle::manifest::MANIFEST_FILE;
use crate::bundle::Bundle;
use crate::crypto::SIGNATURE_FILE;
use crate::{Error, Result};
use std::io::{Cursor, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for pass archives.
///
/// # Examples
///
/// ```
/// use passkit::pkpass::CompressionLevel;
///
/// let fast = CompressionLevel::NONE;        // Stored
/// let balanced = CompressionLevel::DEFAULT; // Level 6
/// let small = CompressionLevel::MAX;        // Level 9
///
/// // Custom levels are clamped to 0-9
/// assert_eq!(CompressionLevel::new(42).level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0), entries are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(&self) -> SimpleFileOptions {
        if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(self.0 as i64))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Write a pass archive into `sink` and return the sink.
///
/// Entry order is `signature`, `manifest.json`, then `files` in path order.
///
/// # Errors
///
/// Returns [`Error::PathCollision`] if `files` contains an entry named like
/// the signature or the manifest, and [`Error::Zip`] if the archive cannot
/// be written.
pub fn write_pkpass<W: Write + Seek>(
    sink: W,
    signature: &[u8],
    manifest: &[u8],
    files: &Bundle,
    compression_level: CompressionLevel,
) -> Result<W> {
    for reserved in [SIGNATURE_FILE, MANIFEST_FILE] {
        if files.contains_key(reserved) {
            return Err(Error::PathCollision(reserved.to_string()));
        }
    }

    let options = compression_level.file_options();
    let mut zip = ZipWriter::new(sink);

    let entries = [(SIGNATURE_FILE, signature), (MANIFEST_FILE, manifest)]
        .into_iter()
        .chain(files.iter().map(|(path, data)| (path.as_str(), data.as_slice())));

    for (path, data) in entries {
        zip.start_file(path, options).map_err(Error::Zip)?;
        zip.write_all(data)?;
    }

    zip.finish().map_err(Error::Zip)
}

/// Write a pass archive into memory.
pub fn create_pkpass(
    signature: &[u8],
    manifest: &[u8],
    files: &Bundle,
    compression_level: CompressionLevel,
) -> Result<Vec<u8>> {
    let cursor = write_pkpass(
        Cursor::new(Vec::new()),
        signature,
        manifest,
        files,
        compression_level,
    )?;
    Ok(cursor.into_inner())
}
