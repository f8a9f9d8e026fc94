//! # slides-export
//!
//! Turn a hosted slide-show page into a downloadable PDF, slide deck
//! (`.pptx`) or zip of slide images, and publish it to a remote file store.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page URL
//!  │
//!  ├─ 1. Validate  accept only the configured host, derive the document name
//!  ├─ 2. Resolve   GET the page, extract title + per-slide srcset
//!  ├─ 3. Select    one URL per slide at the quality tier's width
//!  ├─ 4. Fetch     bounded concurrent GETs → normalised JPEG temp files
//!  ├─ 5. Export    PDF (A4, top-left fit) | PPTX (full-bleed) | ZIP (stored)
//!  ├─ 6. Publish   <root>/<DDMMYYYY>/<doc>.<ext> on the remote store
//!  └─ 7. Respond   download link, size, title, thumbnail
//! ```
//!
//! Every stage fails fast, and no temporary file outlives the request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slides_export::{ConversionType, Converter, LocalDirPublisher, QualityTier, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(ServiceConfig::builder().base_url("https://files.example.com").build()?);
//!     let converter = Converter::new(config, Arc::new(LocalDirPublisher::new("./published")))?;
//!     let response = converter
//!         .convert(
//!             "https://www.slideshare.net/someone/my-deck/123456",
//!             ConversionType::Pdf,
//!             QualityTier::Hd,
//!         )
//!         .await?;
//!     println!("{}", response.data.slides_download_link);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slides-export` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! slides-export = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FtpConfig, ServiceConfig, ServiceConfigBuilder};
pub use convert::Converter;
pub use error::{FetchError, PipelineError, PublishError, StatusClass};
pub use output::{
    ConversionData, ConversionResponse, ConversionType, ErrorResponse, ExportResult,
    FetchedImage, QualityTier, SlideManifest, SlideManifestEntry,
};
pub use progress::{FetchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use publish::{FtpPublisher, LocalDirPublisher, Publisher};
pub use server::{create_router, serve};
