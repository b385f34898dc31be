//! Archive write paths: creation and the one-time append.

use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::error::HzError;
use super::structures::*;

/// Byte image of a freshly created archive: signature, type widths, format
/// version and the zero reserved block. No entry count; that field only
/// appears once a merge happens.
pub fn header_image() -> Vec<u8> {
    let mut buf = Vec::with_capacity(ENTRY_COUNT_OFFSET as usize);
    buf.extend_from_slice(&SIGNATURE);
    buf.extend_from_slice(&TYPE_WIDTHS);
    for component in FORMAT_VERSION {
        buf.extend_from_slice(&component.to_le_bytes());
    }
    buf.extend_from_slice(&[0u8; RESERVED_LEN]);
    buf
}

/// Create a new archive at `path` holding only the fixed header.
pub async fn create_archive(path: &Path) -> Result<(), HzError> {
    let mut file = fs::File::create(path).await?;
    file.write_all(&header_image()).await?;
    file.flush().await?;
    Ok(())
}

/// Append a merge batch to the end of the archive: the entry count, then the
/// full entry table, then every payload, all in order.
///
/// `files` are already-open readers matching `entries` one-to-one; opening
/// up front is what lets the caller drop vanished candidates before any byte
/// of the batch is committed.
pub async fn append_entries(
    path: &Path,
    entries: &[BomEntry],
    files: Vec<fs::File>,
) -> Result<(), HzError> {
    debug_assert_eq!(entries.len(), files.len());

    let archive = fs::OpenOptions::new().append(true).open(path).await?;
    let mut archive = BufWriter::new(archive);

    archive.write_u32_le(entries.len() as u32).await?;
    for entry in entries {
        archive.write_all(&entry.to_bytes()).await?;
    }
    for mut file in files {
        tokio::io::copy(&mut file, &mut archive).await?;
    }

    archive.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_image_ends_at_the_entry_count_offset() {
        let image = header_image();
        assert_eq!(image.len() as u64, ENTRY_COUNT_OFFSET);
        assert_eq!(&image[..16], &SIGNATURE);
        assert_eq!(&image[16..20], &TYPE_WIDTHS);
        // version 0.0.1.0 as four little-endian u16
        assert_eq!(&image[20..28], &[0, 0, 0, 0, 1, 0, 0, 0]);
        assert!(image[28..].iter().all(|&b| b == 0));
    }
}
