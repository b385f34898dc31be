//! High-level archive handle.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::warn;

use crate::io::{LocalFileReader, ReadAt};

use super::error::HzError;
use super::parser::HzParser;
use super::structures::{payload_start, BomEntry, HzHeader, MAX_PAYLOAD_SIZE};
use super::writer;

/// Write permission state of an archive handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Freshly created; exactly one merge is allowed.
    Writable,
    /// The one-time merge permission has been consumed.
    Sealed,
    /// Opened from an existing file; merging is never allowed.
    ReadOnly,
}

/// Handle to a `.hz` archive on disk.
///
/// [`HzArchive::open`] is the single entry point: it creates a new archive
/// when the path is free and opens an existing one otherwise. A freshly
/// created archive may [`merge`](HzArchive::merge) exactly once; everything
/// else is a pure read.
#[derive(Debug)]
pub struct HzArchive {
    path: PathBuf,
    header: HzHeader,
    mode: ArchiveMode,
}

impl HzArchive {
    /// Open `path` as an archive.
    ///
    /// If the path does not exist, a new empty archive is written there and
    /// the returned handle is writable for one merge. If it names an existing
    /// regular file, the header is parsed and the handle is read-only. A
    /// directory at the path is rejected.
    ///
    /// # Errors
    ///
    /// [`HzError::PathIsDirectory`] when the path is a directory,
    /// [`HzError::InvalidFormat`] when an existing file is not a `.hz`
    /// archive.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HzError> {
        let path = path.as_ref().to_path_buf();
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Err(HzError::PathIsDirectory(path)),
            Ok(_) => {
                let reader = Arc::new(LocalFileReader::new(&path)?);
                let header = HzParser::new(reader).read_header().await?;
                Ok(Self {
                    path,
                    header,
                    mode: ArchiveMode::ReadOnly,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                writer::create_archive(&path).await?;
                Ok(Self {
                    path,
                    header: HzHeader::new(),
                    mode: ArchiveMode::Writable,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    /// Byte widths of the codec's integer kinds as recorded in the header.
    pub fn type_widths(&self) -> [u8; 4] {
        self.header.type_widths
    }

    /// On-disk format version, four components.
    pub fn format_version(&self) -> [u16; 4] {
        self.header.format_version
    }

    /// Number of entries merged into the archive.
    pub fn entry_count(&self) -> u32 {
        self.header.entries()
    }

    /// Append every file under `dir` to the archive.
    ///
    /// Only top-level files are taken unless `recursive` is set. Candidates
    /// that vanish or turn unreadable between the scan and the write are
    /// dropped with a warning rather than failing the merge; the archive's
    /// own file is never packed into itself. A file larger than
    /// [`MAX_PAYLOAD_SIZE`] aborts the merge unless `tolerate_oversized` is
    /// set, in which case it is skipped.
    ///
    /// A handle may merge at most once, and the permission is consumed even
    /// when the merge fails.
    ///
    /// # Errors
    ///
    /// [`HzError::ReadOnly`] when the handle is not writable,
    /// [`HzError::NotADirectory`] when `dir` is not a directory,
    /// [`HzError::FileTooLarge`] for an oversized candidate without
    /// tolerance.
    pub async fn merge(
        &mut self,
        dir: impl AsRef<Path>,
        recursive: bool,
        tolerate_oversized: bool,
    ) -> Result<(), HzError> {
        if self.mode != ArchiveMode::Writable {
            return Err(HzError::ReadOnly);
        }
        // Consumed up front: a failed merge does not earn a second attempt.
        self.mode = ArchiveMode::Sealed;

        let dir = dir.as_ref();
        let is_dir = fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(HzError::NotADirectory(dir.to_path_buf()));
        }

        let candidates = self.scan_dir(dir, recursive, tolerate_oversized).await?;

        // Open everything before writing a single byte; a candidate that
        // disappeared since the scan is dropped, not fatal.
        let mut entries = Vec::with_capacity(candidates.len());
        let mut files = Vec::with_capacity(candidates.len());
        for (path, entry) in candidates {
            match fs::File::open(&path).await {
                Ok(file) => {
                    entries.push(entry);
                    files.push(file);
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "dropping unreadable file from merge");
                }
            }
        }

        let count = entries.len() as u32;
        writer::append_entries(&self.path, &entries, files).await?;
        self.header.entry_count = Some(count);
        Ok(())
    }

    /// Enumerate merge candidates under `dir`, in sorted order per directory
    /// so archives come out the same on every platform.
    async fn scan_dir(
        &self,
        dir: &Path,
        recursive: bool,
        tolerate_oversized: bool,
    ) -> Result<Vec<(PathBuf, BomEntry)>, HzError> {
        let own_path = fs::canonicalize(&self.path).await.ok();
        let mut candidates = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut children = Vec::new();
            let mut read_dir = fs::read_dir(&current).await?;
            while let Some(dirent) = read_dir.next_entry().await? {
                children.push(dirent.path());
            }
            children.sort();

            let mut subdirs = Vec::new();
            for path in children {
                let meta = match fs::metadata(&path).await {
                    Ok(meta) => meta,
                    Err(err) => {
                        warn!(path = %path.display(), %err, "skipping unstattable entry");
                        continue;
                    }
                };
                if meta.is_dir() {
                    if recursive {
                        subdirs.push(path);
                    }
                    continue;
                }
                if !meta.is_file() {
                    continue;
                }
                // Never pack the archive into itself.
                if own_path.is_some() && fs::canonicalize(&path).await.ok() == own_path {
                    continue;
                }
                if !check_payload_size(&path, meta.len(), tolerate_oversized)? {
                    continue;
                }
                let name = path
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                candidates.push((path, BomEntry::new(&name, meta.len() as u32)));
            }
            // Reversed so the LIFO scan visits subdirectories in sorted order.
            subdirs.reverse();
            pending.extend(subdirs);
        }

        Ok(candidates)
    }

    /// Parse and return the entry table, in on-disk order.
    ///
    /// An archive that never merged yields an empty table.
    pub async fn bom(&self) -> Result<Vec<BomEntry>, HzError> {
        let count = self.header.entries();
        if count == 0 {
            return Ok(Vec::new());
        }
        let reader = Arc::new(LocalFileReader::new(&self.path)?);
        HzParser::new(reader).read_bom(count).await
    }

    /// Extract the named entries into `dest_dir` (the current directory when
    /// `None`), creating it if needed.
    ///
    /// Requested names are deduplicated. When several archive entries share
    /// a requested name, the first extracts as `name` and repeat `n` as
    /// `stem(n).ext`. An existing target is skipped unless `overwrite` is
    /// set; with `overwrite`, an empty directory in the way is removed first
    /// (a non-empty one fails with the underlying I/O error).
    ///
    /// # Errors
    ///
    /// [`HzError::BadDestination`] when `dest_dir` exists and is not a
    /// directory; I/O errors from reading the archive or writing targets.
    pub async fn extract<I, S>(
        &self,
        names: I,
        dest_dir: Option<&Path>,
        overwrite: bool,
    ) -> Result<(), HzError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dest = match dest_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()?,
        };
        match fs::metadata(&dest).await {
            Ok(meta) if !meta.is_dir() => return Err(HzError::BadDestination(dest)),
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&dest).await?;
            }
            Err(err) => return Err(err.into()),
        }

        let wanted: HashSet<String> = names.into_iter().map(Into::into).collect();
        let bom = self.bom().await?;
        let parser = HzParser::new(Arc::new(LocalFileReader::new(&self.path)?));

        let mut cursor = payload_start(&bom);
        let mut seen: HashMap<String, u32> = HashMap::new();
        for entry in &bom {
            if wanted.contains(&entry.name) {
                let repeat = seen
                    .entry(entry.name.clone())
                    .and_modify(|count| *count += 1)
                    .or_insert(0);
                let file_name = if *repeat > 0 {
                    numbered_name(&entry.name, *repeat)
                } else {
                    entry.name.clone()
                };
                let target = dest.join(&file_name);

                let skip = match fs::metadata(&target).await {
                    Ok(_) if !overwrite => true,
                    Ok(meta) => {
                        if meta.is_dir() {
                            // Only an empty directory can be displaced.
                            fs::remove_dir(&target).await?;
                        }
                        false
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
                    Err(err) => return Err(err.into()),
                };

                if !skip {
                    let mut payload = vec![0u8; entry.payload_size as usize];
                    parser.reader().read_exact_at(cursor, &mut payload).await?;
                    fs::write(&target, &payload).await?;
                }
            }
            // Advance unconditionally so later entries stay addressable even
            // when earlier ones were skipped.
            cursor += entry.payload_size as u64;
        }

        Ok(())
    }

    /// Extract every entry of the archive. Same destination and overwrite
    /// semantics as [`extract`](HzArchive::extract).
    pub async fn extract_all(
        &self,
        dest_dir: Option<&Path>,
        overwrite: bool,
    ) -> Result<(), HzError> {
        let names: Vec<String> = self.bom().await?.into_iter().map(|e| e.name).collect();
        self.extract(names, dest_dir, overwrite).await
    }
}

/// Decide what to do with a merge candidate of `size` bytes: include it,
/// skip it, or abort the merge.
fn check_payload_size(path: &Path, size: u64, tolerate_oversized: bool) -> Result<bool, HzError> {
    if size <= MAX_PAYLOAD_SIZE {
        return Ok(true);
    }
    if tolerate_oversized {
        warn!(path = %path.display(), size, "skipping oversized file");
        return Ok(false);
    }
    Err(HzError::FileTooLarge {
        path: path.to_path_buf(),
        size,
    })
}

/// `report.txt` requested twice comes back as `report(1).txt` the second
/// time, `report(2).txt` the third, and so on.
fn numbered_name(name: &str, repeat: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}({repeat}).{ext}"),
        _ => format!("{name}({repeat})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn numbered_names() {
        assert_eq!(numbered_name("a.txt", 1), "a(1).txt");
        assert_eq!(numbered_name("archive.tar.gz", 2), "archive.tar(2).gz");
        assert_eq!(numbered_name("README", 1), "README(1)");
        assert_eq!(numbered_name(".bashrc", 3), ".bashrc(3)");
    }

    #[test]
    fn oversized_policy() {
        let path = Path::new("big.bin");
        assert!(check_payload_size(path, MAX_PAYLOAD_SIZE, false).unwrap());
        assert!(!check_payload_size(path, MAX_PAYLOAD_SIZE + 1, true).unwrap());
        let err = check_payload_size(path, MAX_PAYLOAD_SIZE + 1, false).unwrap_err();
        assert!(matches!(err, HzError::FileTooLarge { size, .. } if size == MAX_PAYLOAD_SIZE + 1));
    }

    #[tokio::test]
    async fn open_rejects_a_directory_path() {
        let tmp = tempfile::tempdir().unwrap();
        let err = HzArchive::open(tmp.path()).await.unwrap_err();
        assert!(matches!(err, HzError::PathIsDirectory(_)));
    }

    #[tokio::test]
    async fn open_rejects_a_foreign_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_file(tmp.path(), "not-an-archive", b"hello world, definitely not hz");
        let err = HzArchive::open(&path).await.unwrap_err();
        assert!(matches!(err, HzError::InvalidFormat));
    }

    #[tokio::test]
    async fn fresh_archive_reports_zero_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = HzArchive::open(tmp.path().join("empty.hz")).await.unwrap();
        assert_eq!(archive.mode(), ArchiveMode::Writable);
        assert_eq!(archive.entry_count(), 0);
        assert!(archive.bom().await.unwrap().is_empty());

        // Reopened, the never-merged file still reads as zero entries even
        // though the entry-count field is physically absent.
        let reopened = HzArchive::open(archive.path()).await.unwrap();
        assert_eq!(reopened.mode(), ArchiveMode::ReadOnly);
        assert_eq!(reopened.entry_count(), 0);
        assert!(reopened.bom().await.unwrap().is_empty());
        assert_eq!(reopened.format_version(), [0, 0, 1, 0]);
        assert_eq!(reopened.type_widths(), [1, 2, 4, 8]);
    }

    #[tokio::test]
    async fn round_trip_preserves_names_and_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "alpha.txt", b"first payload");
        write_file(&src, "beta.bin", &[0u8, 1, 2, 255, 254]);
        write_file(&src, "empty", b"");

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();
        assert_eq!(archive.mode(), ArchiveMode::Sealed);
        assert_eq!(archive.entry_count(), 3);

        let reopened = HzArchive::open(archive.path()).await.unwrap();
        let bom = reopened.bom().await.unwrap();
        let names: Vec<&str> = bom.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["alpha.txt", "beta.bin", "empty"]);

        let out = tmp.path().join("out");
        reopened.extract_all(Some(&out), false).await.unwrap();
        assert_eq!(std::fs::read(out.join("alpha.txt")).unwrap(), b"first payload");
        assert_eq!(std::fs::read(out.join("beta.bin")).unwrap(), [0u8, 1, 2, 255, 254]);
        assert_eq!(std::fs::read(out.join("empty")).unwrap(), b"");
    }

    #[tokio::test]
    async fn merge_is_allowed_exactly_once() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "a.txt", b"a");

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();
        let err = archive.merge(&src, false, false).await.unwrap_err();
        assert!(matches!(err, HzError::ReadOnly));

        // A handle from an existing file never merges.
        let mut reopened = HzArchive::open(archive.path()).await.unwrap();
        let err = reopened.merge(&src, false, false).await.unwrap_err();
        assert!(matches!(err, HzError::ReadOnly));
    }

    #[tokio::test]
    async fn failed_merge_still_consumes_writability() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        let err = archive
            .merge(tmp.path().join("no-such-dir"), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, HzError::NotADirectory(_)));

        let err = archive.merge(&src, false, false).await.unwrap_err();
        assert!(matches!(err, HzError::ReadOnly));
    }

    #[tokio::test]
    async fn merge_skips_the_archive_itself() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "a.txt", b"a");

        // Archive lives inside the directory being merged.
        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(tmp.path(), false, false).await.unwrap();

        let names: Vec<String> = archive
            .bom()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["a.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn merge_drops_candidates_that_cannot_be_statted() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "a.txt", b"kept");
        // A dangling symlink enumerates but cannot be statted.
        std::os::unix::fs::symlink(src.join("gone.txt"), src.join("broken.txt")).unwrap();

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();

        let names: Vec<String> = archive
            .bom()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["a.txt"]);
    }

    #[tokio::test]
    async fn recursive_merge_descends_and_flat_does_not() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        write_file(&src, "top.txt", b"top");
        write_file(&src.join("nested"), "deep.txt", b"deep");

        let mut flat = HzArchive::open(tmp.path().join("flat.hz")).await.unwrap();
        flat.merge(&src, false, false).await.unwrap();
        assert_eq!(flat.entry_count(), 1);

        let mut deep = HzArchive::open(tmp.path().join("deep.hz")).await.unwrap();
        deep.merge(&src, true, false).await.unwrap();
        let names: Vec<String> = deep
            .bom()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["top.txt", "deep.txt"]);
    }

    #[tokio::test]
    async fn partial_extraction_skips_earlier_payloads_correctly() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "a.bin", &[b'a'; 10]);
        write_file(&src, "b.bin", &[b'b'; 20]);
        write_file(&src, "c.bin", &[b'c'; 30]);

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();

        let out = tmp.path().join("out");
        archive.extract(["c.bin"], Some(&out), false).await.unwrap();

        assert!(!out.join("a.bin").exists());
        assert!(!out.join("b.bin").exists());
        assert_eq!(std::fs::read(out.join("c.bin")).unwrap(), [b'c'; 30]);
    }

    #[tokio::test]
    async fn duplicate_names_are_suffixed() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("d1")).unwrap();
        std::fs::create_dir_all(src.join("d2")).unwrap();
        write_file(&src.join("d1"), "a.txt", b"from d1");
        write_file(&src.join("d2"), "a.txt", b"from d2");

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, true, false).await.unwrap();
        assert_eq!(archive.entry_count(), 2);

        let out = tmp.path().join("out");
        archive.extract(["a.txt"], Some(&out), true).await.unwrap();
        assert_eq!(std::fs::read(out.join("a.txt")).unwrap(), b"from d1");
        assert_eq!(std::fs::read(out.join("a(1).txt")).unwrap(), b"from d2");
    }

    #[tokio::test]
    async fn existing_targets_are_skipped_unless_overwriting() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "a.txt", b"new content");

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();

        let out = tmp.path().join("out");
        std::fs::create_dir(&out).unwrap();
        write_file(&out, "a.txt", b"old content");

        archive.extract(["a.txt"], Some(&out), false).await.unwrap();
        assert_eq!(std::fs::read(out.join("a.txt")).unwrap(), b"old content");

        archive.extract(["a.txt"], Some(&out), true).await.unwrap();
        assert_eq!(std::fs::read(out.join("a.txt")).unwrap(), b"new content");
    }

    #[tokio::test]
    async fn overwrite_displaces_an_empty_directory_target() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "a.txt", b"payload");

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();

        let out = tmp.path().join("out");
        std::fs::create_dir_all(out.join("a.txt")).unwrap();

        archive.extract(["a.txt"], Some(&out), true).await.unwrap();
        assert!(out.join("a.txt").is_file());
        assert_eq!(std::fs::read(out.join("a.txt")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn destination_must_be_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();
        write_file(&src, "a.txt", b"a");

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();

        let bad_dest = write_file(tmp.path(), "a-file", b"");
        let err = archive
            .extract(["a.txt"], Some(&bad_dest), false)
            .await
            .unwrap_err();
        assert!(matches!(err, HzError::BadDestination(_)));
    }

    #[tokio::test]
    async fn merging_zero_files_writes_an_explicit_zero_count() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir(&src).unwrap();

        let mut archive = HzArchive::open(tmp.path().join("pack.hz")).await.unwrap();
        archive.merge(&src, false, false).await.unwrap();
        assert_eq!(archive.entry_count(), 0);

        let reopened = HzArchive::open(archive.path()).await.unwrap();
        assert_eq!(reopened.header.entry_count, Some(0));
        assert!(reopened.bom().await.unwrap().is_empty());
    }
}
