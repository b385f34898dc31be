//! # hzpack
//!
//! A Rust archiver for the `.hz` single-file container format.
//!
//! An `.hz` archive bundles arbitrary files into one binary blob: a
//! fixed-layout little-endian header, a table of per-entry metadata (the
//! BOM), and every file's raw bytes concatenated behind the table. The
//! format stores payloads verbatim - no compression, no checksums - which
//! keeps both the writer and the reader a handful of seeks and copies.
//!
//! ## Lifecycle
//!
//! - Opening a path that does not exist creates a fresh, empty archive whose
//!   handle may merge a directory's files exactly once.
//! - Opening an existing archive validates the signature and yields a
//!   read-only handle for listing and extraction.
//!
//! ## Example
//!
//! ```no_run
//! use hzpack::HzArchive;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Create a new archive and bundle a directory into it
//!     let mut archive = HzArchive::open("bundle.hz").await?;
//!     archive.merge("./docs", true, false).await?;
//!
//!     // List what went in
//!     for entry in archive.bom().await? {
//!         println!("{} ({} bytes)", entry.name, entry.payload_size);
//!     }
//!
//!     // Pull everything back out
//!     archive.extract_all(Some("out".as_ref()), false).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod hz;
pub mod io;

pub use cli::Cli;
pub use hz::{ArchiveMode, BomEntry, HzArchive, HzError, HzHeader, HzParser};
pub use io::{LocalFileReader, ReadAt};
