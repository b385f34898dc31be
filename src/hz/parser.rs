//! Low-level archive parser.
//!
//! This module handles the binary parsing of `.hz` structures, reading from
//! any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! Unlike ZIP, a `.hz` file is read from the front:
//! 1. Validate the 16-byte signature
//! 2. Decode the type-width table and format version
//! 3. Skip the reserved block and probe the optional entry count
//! 4. Walk the entry table record by record
//!
//! The entry count deserves a note: an archive that never merged ends at the
//! reserved block, so the count field is physically missing. A short read at
//! that offset is the format's "absent means zero" encoding, not corruption,
//! and the parser models it as `Option<u32>` rather than an error.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::sync::Arc;

use crate::io::ReadAt;

use super::error::HzError;
use super::structures::*;

/// Low-level `.hz` parser.
///
/// This struct handles reading and parsing archive structures from a data
/// source. It's generic over the reader type so the same code serves local
/// files and in-memory buffers in tests.
///
/// ## Usage
///
/// Typically used through [`HzArchive`](super::HzArchive) rather than
/// directly.
pub struct HzParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> HzParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read and validate the fixed header.
    ///
    /// # Returns
    ///
    /// The parsed [`HzHeader`], with `entry_count` set to `None` when the
    /// file ends before the count field.
    ///
    /// # Errors
    ///
    /// [`HzError::InvalidFormat`] if the file is shorter than the fixed
    /// header or its signature does not match exactly.
    pub async fn read_header(&self) -> Result<HzHeader, HzError> {
        // signature + type widths + format version
        let mut fixed = [0u8; 28];
        if self.size < fixed.len() as u64 {
            return Err(HzError::InvalidFormat);
        }
        self.reader.read_exact_at(0, &mut fixed).await?;

        if fixed[..16] != SIGNATURE {
            return Err(HzError::InvalidFormat);
        }

        let mut cursor = Cursor::new(&fixed[16..]);
        let mut type_widths = [0u8; 4];
        for width in &mut type_widths {
            *width = cursor.read_u8()?;
        }
        let mut format_version = [0u16; 4];
        for component in &mut format_version {
            *component = cursor.read_u16::<LittleEndian>()?;
        }

        let entry_count = self.read_entry_count().await?;

        Ok(HzHeader {
            type_widths,
            format_version,
            entry_count,
        })
    }

    /// Probe the entry-count field behind the reserved block.
    ///
    /// A file that ends at the reserved block never had a merge; that is a
    /// valid terminal state, not a parse failure. A file that ends *inside*
    /// the count field is truncated and rejected.
    async fn read_entry_count(&self) -> Result<Option<u32>, HzError> {
        if self.size <= ENTRY_COUNT_OFFSET {
            return Ok(None);
        }
        if self.size < BOM_START {
            return Err(HzError::InvalidFormat);
        }
        let mut buf = [0u8; 4];
        self.reader.read_exact_at(ENTRY_COUNT_OFFSET, &mut buf).await?;
        Ok(Some(u32::from_le_bytes(buf)))
    }

    /// Parse the entry table.
    ///
    /// Reads `entry_count` records starting at [`BOM_START`], in on-disk
    /// order. Each record is a fixed `(payload_size, name_length)` pair
    /// followed by `name_length` bytes of NUL-terminated UTF-8 name.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is truncated.
    pub async fn read_bom(&self, entry_count: u32) -> Result<Vec<BomEntry>, HzError> {
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut offset = BOM_START;

        for _ in 0..entry_count {
            let mut fixed = [0u8; BOM_RECORD_FIXED as usize];
            self.reader.read_exact_at(offset, &mut fixed).await?;
            let mut cursor = Cursor::new(&fixed[..]);
            let payload_size = cursor.read_u32::<LittleEndian>()?;
            let name_length = cursor.read_u32::<LittleEndian>()?;
            offset += BOM_RECORD_FIXED;

            let mut name_bytes = vec![0u8; name_length as usize];
            self.reader.read_exact_at(offset, &mut name_bytes).await?;
            offset += name_length as u64;

            // Strip the mandatory trailing NUL before decoding.
            if name_bytes.last() == Some(&0) {
                name_bytes.pop();
            }
            // Use lossy conversion to keep damaged names listable
            let name = String::from_utf8_lossy(&name_bytes).to_string();

            entries.push(BomEntry {
                payload_size,
                name_length,
                name,
            });
        }

        Ok(entries)
    }

    /// Get a reference to the underlying reader.
    ///
    /// Useful for reading payload bytes after computing their offsets from
    /// the entry table.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}
