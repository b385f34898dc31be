//! `.hz` archive parsing, creation and extraction.
//!
//! This module implements the `.hz` container format: a fixed-layout header,
//! a table of per-entry metadata (the BOM, "bill of materials"), and the raw
//! payload bytes of every bundled file concatenated behind the table.
//!
//! ## Architecture
//!
//! The module is organized into four components:
//!
//! - [`structures`]: the on-disk layout: constants, [`HzHeader`],
//!   [`BomEntry`]
//! - [`parser`]: low-level parsing of headers and entry tables
//! - [`writer`]: the creation and one-time append write paths
//! - [`archive`]: the high-level [`HzArchive`] handle for end users
//!
//! ## Lifecycle
//!
//! An archive is created once, appended to at most once (the "merge"), and
//! read any number of times. There is no update-in-place, deletion, or
//! compression; extraction writes every requested entry flat into one
//! destination directory, renaming duplicates instead of failing.

mod archive;
mod error;
mod parser;
mod structures;
mod writer;

pub use archive::{ArchiveMode, HzArchive};
pub use error::HzError;
pub use parser::HzParser;
pub use structures::*;
