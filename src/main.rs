//! Main entry point for the hzpack CLI application.
//!
//! This binary wraps the `.hz` archive codec: it creates archives, merges a
//! directory's files into them, lists their entry tables, and extracts
//! entries back to disk.

use anyhow::Result;
use clap::Parser;
use std::path::Path;

use hzpack::{Cli, HzArchive};

/// Application entry point.
///
/// Opens (or creates) the archive, then dispatches on the CLI flags:
/// merge, list, or extract.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut archive = HzArchive::open(&cli.archive).await?;

    // Merge mode: append the directory's files and exit
    if let Some(ref dir) = cli.merge_dir {
        archive
            .merge(dir, cli.recursive, cli.tolerate_oversized)
            .await?;
        if !cli.is_quiet() {
            println!("merged {} files into {}", archive.entry_count(), cli.archive);
        }
        return Ok(());
    }

    // List mode: display the entry table and exit
    if cli.list || cli.verbose {
        return list_entries(&archive, cli.verbose).await;
    }

    // Extract mode: everything, or only the requested names
    let dest = cli.dest_dir.as_deref().map(Path::new);
    if cli.names.is_empty() {
        archive.extract_all(dest, cli.overwrite).await?;
    } else {
        archive
            .extract(cli.names.clone(), dest, cli.overwrite)
            .await?;
    }
    if !cli.is_quiet() {
        println!(
            "extracted into {}",
            dest.unwrap_or_else(|| Path::new(".")).display()
        );
    }

    Ok(())
}

/// List the entries of the archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): just entry names, one per line
/// - Verbose format (`-v`): header info plus a table with sizes and a summary
///
/// # Arguments
///
/// * `archive` - The open archive handle
/// * `verbose` - If true, display detailed information in table format
async fn list_entries(archive: &HzArchive, verbose: bool) -> Result<()> {
    let entries = archive.bom().await?;

    if verbose {
        let [v0, v1, v2, v3] = archive.format_version();
        println!(
            "format version {v0}.{v1}.{v2}.{v3}, {} entries",
            archive.entry_count()
        );
        println!("{:>10}  {:>8}  Name", "Length", "NameLen");
        println!("{}", "-".repeat(50));
    }

    let mut total_bytes = 0u64;
    for entry in &entries {
        if verbose {
            println!(
                "{:>10}  {:>8}  {}",
                entry.payload_size, entry.name_length, entry.name
            );
            total_bytes += entry.payload_size as u64;
        } else {
            println!("{}", entry.name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(50));
        println!(
            "{:>10}  {:>8}  {} files ({})",
            total_bytes,
            "",
            entries.len(),
            format_size(total_bytes)
        );
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
