//! CLI binary for upload-transfer.
//!
//! A thin shim over the library crate that maps CLI flags onto a
//! `PipelineConfig`, runs every input file through the resulting pipeline and
//! prints one result line per file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use upload_transfer::metadata::keys;
use upload_transfer::{ExecuteOptions, FileHandle, Metadata, Pipeline, PipelineConfig};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Store images, sanitising names and never overwriting
  upload-transfer --dest uploads --allow jpg,png --avoid-collisions photo.jpg

  # Report every failed check instead of the first one
  upload-transfer --dest uploads --deny exe,bat --max-size 1048576 --catch-all *

  # Keep uploads under 10 MB in total
  upload-transfer --dest uploads --quota 10485760 report.pdf

  # Load settings from a JSON file, override the destination
  upload-transfer --config upload.json --dest /srv/incoming notes.txt

CONFIG FILE (JSON, every field optional):
  {
    "destination": "uploads",
    "allowed_extensions": ["jpg", "png"],
    "denied_extensions": [],
    "max_file_size": 1048576,
    "disk_quota": null,
    "secure_filenames": true,
    "avoid_name_collisions": false,
    "success_message": true,
    "buffer_size": 16384
  }

EXIT STATUS:
  0 when every file was stored, 1 when any file failed.
"#;

/// Validate and store files through an upload pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "upload-transfer",
    version,
    about = "Validate and store files through an upload pipeline",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to upload.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory to store uploads in.
    #[arg(short, long, env = "UPLOAD_TRANSFER_DEST")]
    dest: Option<PathBuf>,

    /// JSON pipeline configuration; flags override its fields.
    #[arg(short, long, env = "UPLOAD_TRANSFER_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated extensions to accept.
    #[arg(long, env = "UPLOAD_TRANSFER_ALLOW", value_delimiter = ',')]
    allow: Vec<String>,

    /// Comma-separated extensions to reject.
    #[arg(long, env = "UPLOAD_TRANSFER_DENY", value_delimiter = ',')]
    deny: Vec<String>,

    /// Largest accepted file, in bytes.
    #[arg(long, env = "UPLOAD_TRANSFER_MAX_SIZE")]
    max_size: Option<u64>,

    /// Total bytes the destination directory may hold.
    #[arg(long, env = "UPLOAD_TRANSFER_QUOTA")]
    quota: Option<u64>,

    /// Store files under their given names without sanitising them.
    /// Names with path separators or `..` are still rejected.
    #[arg(long, env = "UPLOAD_TRANSFER_KEEP_NAMES")]
    keep_names: bool,

    /// Rename files that would overwrite an existing one.
    #[arg(long, env = "UPLOAD_TRANSFER_AVOID_COLLISIONS")]
    avoid_collisions: bool,

    /// Report every failed check, not just the first.
    #[arg(long, env = "UPLOAD_TRANSFER_CATCH_ALL")]
    catch_all: bool,

    /// Skip validation entirely.
    #[arg(long)]
    no_validate: bool,

    /// Print one JSON object per file instead of plain lines.
    #[arg(long, env = "UPLOAD_TRANSFER_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "UPLOAD_TRANSFER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "UPLOAD_TRANSFER_QUIET")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || cli.json {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let pipeline = build_config(&cli)?
        .into_pipeline()
        .context("Invalid pipeline configuration")?;
    if pipeline.default_destination().is_none() {
        bail!("No destination: pass --dest DIR or set \"destination\" in the config file");
    }

    let options = ExecuteOptions::builder()
        .validate(!cli.no_validate)
        .catch_all_errors(cli.catch_all)
        .build();

    let mut failed = 0usize;
    for path in &cli.files {
        if !upload_one(&pipeline, path, &options, &cli) {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} of {} uploads failed", cli.files.len());
    }
    Ok(())
}

/// Run one file through the pipeline and report it. Returns whether it was stored.
fn upload_one(pipeline: &Pipeline, path: &Path, options: &ExecuteOptions, cli: &Cli) -> bool {
    let mut metadata = Metadata::new();
    let result = FileHandle::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))
        .and_then(|file| {
            metadata.insert(keys::FILENAME, file.name());
            pipeline
                .execute(file, &mut metadata, options)
                .map_err(anyhow::Error::from)
        });

    match result {
        Ok(file) => {
            if cli.json {
                let line = json!({
                    "file": path.display().to_string(),
                    "ok": true,
                    "stored_as": file.name(),
                    "metadata": metadata,
                });
                println!("{line}");
            } else if !cli.quiet {
                let saved = metadata.get_str(keys::SAVED_TO).unwrap_or(file.name());
                let message = metadata.get_str(keys::MESSAGE).unwrap_or_default();
                println!("{} {}  {}", green("✓"), saved, dim(message));
            }
            true
        }
        Err(e) => {
            if cli.json {
                let line = json!({
                    "file": path.display().to_string(),
                    "ok": false,
                    "error": format!("{e:#}"),
                });
                println!("{line}");
            } else {
                eprintln!("{} {}  {e:#}", red("✗"), path.display());
            }
            false
        }
    }
}

/// Map CLI args onto a `PipelineConfig`, starting from `--config` if given.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dest) = &cli.dest {
        config.destination = Some(dest.clone());
    }
    config.allowed_extensions.extend(cli.allow.iter().cloned());
    config.denied_extensions.extend(cli.deny.iter().cloned());
    if cli.max_size.is_some() {
        config.max_file_size = cli.max_size;
    }
    if cli.quota.is_some() {
        config.disk_quota = cli.quota;
    }
    if cli.keep_names {
        config.secure_filenames = false;
    }
    if cli.avoid_collisions {
        config.avoid_name_collisions = true;
    }

    config.check().context("Invalid pipeline configuration")?;
    Ok(config)
}
