//! shoebox - one-shot media importer
//!
//! Walks a source folder, derives a capture date for every photo and video,
//! and materializes them into a date-partitioned library with an auditable
//! per-run session manifest.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/shoebox/config.toml (~/.config/shoebox/config.toml)
//! - Logs: $XDG_STATE_HOME/shoebox/shoebox.log (~/.local/state/shoebox/shoebox.log)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use shoebox_core::ingest::ProgressEvent;
use shoebox_core::{Config, Error, Importer};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "shoebox")]
#[command(about = "Organize photos and videos into a date-partitioned library")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import media files from a folder
    Import {
        /// Source folder to scan
        folder: PathBuf,

        /// User folder under the library roots
        #[arg(long)]
        user: Option<String>,

        /// Image library root
        #[arg(long)]
        library: Option<PathBuf>,

        /// Video library root
        #[arg(long)]
        videolibrary: Option<PathBuf>,

        /// Show destinations without copying
        #[arg(long)]
        dry_run: bool,

        /// Force the external exiftool process for every format
        #[arg(long)]
        exiftool: bool,

        /// Use hardlinks instead of copying (instant, no extra space)
        #[arg(long)]
        link: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            folder,
            user,
            library,
            videolibrary,
            dry_run,
            exiftool,
            link,
        } => match run_import(folder, user, library, videolibrary, dry_run, exiftool, link) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn run_import(
    folder: PathBuf,
    user: Option<String>,
    library: Option<PathBuf>,
    videolibrary: Option<PathBuf>,
    dry_run: bool,
    exiftool: bool,
    link: bool,
) -> Result<ExitCode> {
    let metadata = std::fs::metadata(&folder)
        .with_context(|| format!("folder does not exist: {}", folder.display()))?;
    if !metadata.is_dir() {
        bail!("not a directory: {}", folder.display());
    }

    // Ensure XDG environment variables are set before using the core library
    Config::ensure_xdg_env();

    let mut config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        shoebox_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(folder = %folder.display(), dry_run, "shoebox import starting");

    // Command line flags override the config file
    if let Some(user) = user {
        config.user = user;
    }
    if let Some(library) = library {
        config.library = library;
    }
    if let Some(videolibrary) = videolibrary {
        config.videolibrary = videolibrary;
    }
    if exiftool {
        config.use_exiftool = true;
    }
    if link {
        config.use_hardlinks = true;
    }
    config.validate()?;

    println!("Configuration:");
    println!("  User: {}", config.user);
    println!("  Library: {}", config.library.display());
    println!("  Video Library: {}", config.videolibrary.display());
    println!("  ExifTool: {}", config.use_exiftool);
    println!("  Hardlinks: {}", config.use_hardlinks);
    println!();

    if dry_run {
        println!("Dry run mode: no files will be copied");
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let started = Instant::now();
    let importer = Importer::new(&config).dry_run(dry_run);

    let result = importer.run(&folder, |event| match event {
        ProgressEvent::Started { index, total, path } => {
            if index == 0 {
                println!("Found {} media files", total);
                pb.set_length(total as u64);
            }
            pb.set_position(index as u64);
            pb.set_message(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("...")
                    .to_string(),
            );
        }
        ProgressEvent::Planned {
            src,
            dest,
            confidence,
        } => {
            println!(
                "[dry-run] {} -> {} (confidence: {})",
                src.display(),
                dest.display(),
                confidence
            );
        }
        ProgressEvent::FileFailed { message, .. } => {
            println!("Warning: {}", message);
        }
        ProgressEvent::Tick(update) => {
            pb.set_position(update.processed as u64);
            let line = if update.errors > 0 {
                format!(
                    "Progress: {}/{} files ({:.1}/s, ETA: {}s) | Errors: {}",
                    update.processed,
                    update.total,
                    update.rate,
                    update.eta.as_secs(),
                    update.errors
                )
            } else {
                format!(
                    "Progress: {}/{} files ({:.1}/s, ETA: {}s)",
                    update.processed,
                    update.total,
                    update.rate,
                    update.eta.as_secs()
                )
            };
            println!("{}", line);
        }
    });

    pb.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(Error::HardlinkUnsupported {
            src_dir,
            dest_dir,
            reason,
        }) => {
            eprintln!("\nERROR: Cannot create hardlinks");
            eprintln!("  Source:      {}", src_dir.display());
            eprintln!("  Destination: {}", dest_dir.display());
            eprintln!("  Reason:      {}", reason);
            eprintln!("\nThis usually means different filesystems or NAS limitations.");
            eprintln!("Remove --link to use regular copy with SHA256 verification.");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e).context("import failed"),
    };

    if let Some(reason) = &outcome.aborted {
        println!("\nABORTING IMPORT: {}", reason);
        println!(
            "Processed: {} files before abort",
            outcome.stats.total_scanned
        );
        print!("{}", outcome.error_stats.report());
        tracing::error!(reason = %reason, "Import aborted");
        return Ok(ExitCode::from(2));
    }

    let elapsed = started.elapsed();
    let rate = if elapsed.as_secs_f64() > 0.0 {
        outcome.stats.total_scanned as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    println!(
        "\nCompleted: {} files in {}s ({:.1} files/sec)",
        outcome.stats.total_scanned,
        elapsed.as_secs(),
        rate
    );

    if !dry_run {
        println!("\nImport Summary:");
        println!("  Copied:               {} files", outcome.stats.copied);
        if outcome.stats.copied_timestamped > 0 {
            println!(
                "  Timestamped:          {} files",
                outcome.stats.copied_timestamped
            );
        }
        if outcome.stats.skipped_duplicate > 0 {
            println!(
                "  Skipped (duplicates): {} files",
                outcome.stats.skipped_duplicate
            );
        }
        if outcome.stats.errors > 0 {
            println!("  Errors:               {} files", outcome.stats.errors);
        }
        if let Some(session_dir) = &outcome.session_dir {
            println!("\nBrowse session: {}", session_dir.display());
        }
    }

    tracing::info!(
        copied = outcome.stats.copied,
        copied_timestamped = outcome.stats.copied_timestamped,
        skipped_duplicate = outcome.stats.skipped_duplicate,
        errors = outcome.stats.errors,
        "shoebox import complete"
    );

    if outcome.stats.errors > 0 {
        print!("{}", outcome.error_stats.report());
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
