//! # upload-transfer
//!
//! Validate, transform and save uploaded files through a reusable pipeline.
//!
//! ## Why this crate?
//!
//! Every upload endpoint ends up doing the same handful of things: reject the
//! wrong kind of file, clean up the name, maybe convert the content, write it
//! somewhere, then do a bit of bookkeeping. This crate turns each of those
//! into a small composable step and runs them in a fixed order, so an
//! application declares *what* should happen to an upload once and reuses it
//! for every request.
//!
//! ## Pipeline Overview
//!
//! ```text
//! FileHandle + Metadata
//!  │
//!  ├─ 1. Validate    AllowedExts / DeniedExts / MaxFileSize / … combined with and/or/not
//!  ├─ 2. Preprocess  rename, sanitise, convert (each step feeds the next)
//!  ├─ 3. Deliver     callable, writer or filesystem path, exactly once
//!  └─ 4. Postprocess thumbnails, messages, bookkeeping
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use upload_transfer::validators::{AllowedExts, MaxFileSize, ValidatorExt};
//! use upload_transfer::{ExecuteOptions, FileHandle, Metadata, Pipeline};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut avatars = Pipeline::with_destination("uploads/avatar.png")?;
//!     avatars.add_validator(AllowedExts::new(["png", "jpg"]).and(MaxFileSize(2 << 20)));
//!
//!     let upload = FileHandle::open("incoming.png")?;
//!     let options = ExecuteOptions::builder().catch_all_errors(true).build();
//!     avatars.execute(upload, &mut Metadata::new(), &options)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `upload-transfer` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! upload-transfer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod destination;
pub mod error;
pub mod file;
pub mod metadata;
pub mod pipeline;
pub mod processors;
pub mod validators;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExecuteOptions, ExecuteOptionsBuilder, PipelineConfig, PipelineConfigBuilder};
pub use destination::{Destination, ResolvedDestination};
pub use error::{ConfigError, TransferError, UploadError};
pub use file::FileHandle;
pub use metadata::Metadata;
pub use pipeline::{Pipeline, PipelineBuilder, Processor, Rejected, SharedProcessor};
pub use validators::{SharedValidator, Validator, ValidatorExt};
