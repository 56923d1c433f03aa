//! Main entry point for the partialzip CLI application.
//!
//! Lists or downloads entries of a ZIP archive given as an HTTP(S) URL or
//! a local path.

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use partialzip::{Cli, HttpRangeSource, LocalFileSource, PartialZipSession, RangeSource};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if cli.is_http_url() {
        let source = Arc::new(HttpRangeSource::new(cli.archive.clone(), &cli.http_config())?);
        process_zip(source.clone(), &cli).await?;

        // Display network transfer statistics for HTTP sources
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
    } else {
        let source = Arc::new(LocalFileSource::new(Path::new(&cli.archive))?);
        process_zip(source, &cli).await?;
    }

    Ok(())
}

async fn process_zip<S: RangeSource>(source: Arc<S>, cli: &Cli) -> Result<()> {
    let mut session = PartialZipSession::new(source);
    session
        .open()
        .await
        .with_context(|| format!("Couldn't open {}", cli.archive))?;

    if cli.list || cli.verbose {
        list_files(&session, cli.verbose)
    } else {
        let names: Vec<String> = if cli.files.is_empty() {
            session
                .entries()?
                .iter()
                .filter(|e| !e.is_directory)
                .map(|e| e.file_name.clone())
                .collect()
        } else {
            cli.files.clone()
        };

        for name in &names {
            download(&session, name, cli).await?;
        }
        Ok(())
    }
}

fn list_files<S: RangeSource>(session: &PartialZipSession<S>, verbose: bool) -> Result<()> {
    if !verbose {
        for name in session.file_list()? {
            println!("{}", name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in session.entries()? {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files ({})",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count,
        format_size(total_uncompressed)
    );
    Ok(())
}

/// Download one entry to stdout or to disk, per the CLI options.
async fn download<S: RangeSource>(
    session: &PartialZipSession<S>,
    name: &str,
    cli: &Cli,
) -> Result<()> {
    if cli.pipe {
        let data = session.download_file(name).await?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&data).await?;
        stdout.flush().await?;
        return Ok(());
    }

    let output_path = match output_target(name, cli) {
        OutputTarget::Write(path) => path,
        OutputTarget::Exists(path) => {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", path.display());
            }
            return Ok(());
        }
        OutputTarget::Unsafe => {
            warn!("Skipping {}: path escapes the output directory", name);
            return Ok(());
        }
    };

    if !cli.is_quiet() {
        println!("  downloading: {}", name);
    }
    let data = session
        .download_file(name)
        .await
        .with_context(|| format!("Couldn't download {}", name))?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&output_path, &data)
        .await
        .with_context(|| format!("Couldn't write {}", output_path.display()))?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum OutputTarget {
    Write(PathBuf),
    /// The file exists and `-o` was not given
    Exists(PathBuf),
    /// The entry name is absolute or climbs out with `..`
    Unsafe,
}

fn output_target(name: &str, cli: &Cli) -> OutputTarget {
    let Some(relative) = sanitize_entry_name(name) else {
        return OutputTarget::Unsafe;
    };
    let relative = match relative.file_name() {
        Some(file_name) if cli.junk_paths => PathBuf::from(file_name),
        _ => relative,
    };

    let path = match &cli.extract_dir {
        Some(dir) => Path::new(dir).join(relative),
        None => relative,
    };
    if path.exists() && !cli.overwrite {
        OutputTarget::Exists(path)
    } else {
        OutputTarget::Write(path)
    }
}

/// Relative path made of the name's normal components only.
///
/// Entry names come from the archive, so root, prefix and `..` components
/// reject the whole name.
fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Percentage saved by compression, formatted for the listing table.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size with the largest fitting unit and up to two decimals.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// ```
fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
