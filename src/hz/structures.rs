//! On-disk layout of the `.hz` container.
//!
//! Everything is little-endian. The file begins with a fixed header:
//!
//! | field          | offset | size |
//! |----------------|--------|------|
//! | signature      | 0      | 16   |
//! | type_widths    | 16     | 4    |
//! | format_version | 20     | 8    |
//! | reserved       | 28     | 255  |
//! | entry_count    | 283    | 4    |
//!
//! The entry count is *physically absent* from an archive that never merged;
//! the file simply ends at offset 283. The entry table (BOM) follows at
//! offset 287, then the payload region: every entry's raw bytes concatenated
//! in table order.

/// Fixed 16-byte signature at the start of every archive. The first seven
/// bytes are the format tag, the rest are reserved zeros.
pub const SIGNATURE: [u8; 16] = [0, 104, 114, 112, 122, 99, 102, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Byte widths of the codec's four integer kinds (u8, u16, u32, u64),
/// recorded in the header for forward-compatibility diagnostics.
pub const TYPE_WIDTHS: [u8; 4] = [1, 2, 4, 8];

/// Format version written by this codec, four u16 components.
pub const FORMAT_VERSION: [u16; 4] = [0, 0, 1, 0];

/// Length of the zero-filled reserved block behind the fixed header fields.
pub const RESERVED_LEN: usize = 255;

/// Offset of the optional entry-count field.
pub const ENTRY_COUNT_OFFSET: u64 = (16 + 4 + 8 + RESERVED_LEN) as u64;

/// Offset of the first entry-table record.
pub const BOM_START: u64 = ENTRY_COUNT_OFFSET + 4;

/// Fixed part of an entry-table record: payload_size (u32) + name_length (u32).
pub const BOM_RECORD_FIXED: u64 = 8;

/// Largest payload a single entry can describe.
pub const MAX_PAYLOAD_SIZE: u64 = u32::MAX as u64;

/// Parsed archive header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HzHeader {
    pub type_widths: [u8; 4],
    pub format_version: [u16; 4],
    /// `None` when the field is physically absent (no merge ever happened).
    /// Reads as zero entries.
    pub entry_count: Option<u32>,
}

impl HzHeader {
    /// Header state of a freshly created archive.
    pub fn new() -> Self {
        Self {
            type_widths: TYPE_WIDTHS,
            format_version: FORMAT_VERSION,
            entry_count: None,
        }
    }

    /// Entry count with the absent field defaulted to zero.
    pub fn entries(&self) -> u32 {
        self.entry_count.unwrap_or(0)
    }
}

impl Default for HzHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry-table record describing an embedded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomEntry {
    /// Byte length of the payload.
    pub payload_size: u32,
    /// On-disk length of the encoded name, including the trailing NUL.
    pub name_length: u32,
    /// Decoded file name, NUL stripped.
    pub name: String,
}

impl BomEntry {
    /// Build a record for `name` with a payload of `payload_size` bytes.
    pub fn new(name: &str, payload_size: u32) -> Self {
        Self {
            payload_size,
            name_length: name.len() as u32 + 1,
            name: name.to_string(),
        }
    }

    /// On-disk size of this record.
    pub fn record_len(&self) -> u64 {
        BOM_RECORD_FIXED + self.name_length as u64
    }

    /// Encode the record: payload_size, name_length, NUL-terminated name.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.record_len() as usize);
        buf.extend_from_slice(&self.payload_size.to_le_bytes());
        buf.extend_from_slice(&self.name_length.to_le_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(0);
        buf
    }
}

/// First byte of the payload region for the given entry table.
pub fn payload_start(entries: &[BomEntry]) -> u64 {
    BOM_START + entries.iter().map(BomEntry::record_len).sum::<u64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_prefix_is_the_format_tag() {
        assert_eq!(SIGNATURE.len(), 16);
        assert_eq!(&SIGNATURE[..7], &[0, 104, 114, 112, 122, 99, 102]);
        assert!(SIGNATURE[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn layout_offsets() {
        assert_eq!(ENTRY_COUNT_OFFSET, 283);
        assert_eq!(BOM_START, 287);
    }

    #[test]
    fn record_counts_the_nul_terminator() {
        let entry = BomEntry::new("a.txt", 42);
        assert_eq!(entry.name_length, 6);
        assert_eq!(entry.record_len(), 8 + 6);
    }

    #[test]
    fn record_encoding() {
        let entry = BomEntry::new("hi", 0x0102_0304);
        let bytes = entry.to_bytes();
        assert_eq!(
            bytes,
            vec![0x04, 0x03, 0x02, 0x01, 3, 0, 0, 0, b'h', b'i', 0]
        );
    }

    #[test]
    fn payload_start_sums_variable_records() {
        let entries = vec![BomEntry::new("a.txt", 10), BomEntry::new("bb.txt", 20)];
        // 287 + (8 + 6) + (8 + 7)
        assert_eq!(payload_start(&entries), 287 + 14 + 15);
        assert_eq!(payload_start(&[]), BOM_START);
    }
}
