//! Error types for the slides-export library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`PipelineError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad source URL, no slides, an image could not be fetched, the exporter
//!   or the remote store failed). It is the only error shape that crosses
//!   the pipeline boundary, and every variant maps to one [`StatusClass`].
//!
//! * [`FetchError`] — a single image failed inside the bounded fetcher.
//!   It never escapes on its own: the fetcher folds the first failure into
//!   [`PipelineError::FetchFailed`] after cleaning up every sibling file.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure classification carried by every [`PipelineError`].
///
/// The HTTP layer takes its status code from here and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// Malformed or non-matching source URL, missing required parameter.
    InputError,
    /// No slides on the page, or none at the requested width.
    NotFound,
    /// Source page or image fetch/decode failure.
    UpstreamError,
    /// Building the PDF, deck or archive failed.
    ExportError,
    /// Connecting to, creating directories on, or storing to the remote store failed.
    PublishError,
}

impl StatusClass {
    /// HTTP status code for this class: 400, 404 or 500.
    pub fn status_code(self) -> u16 {
        match self {
            StatusClass::InputError => 400,
            StatusClass::NotFound => 404,
            StatusClass::UpstreamError | StatusClass::ExportError | StatusClass::PublishError => {
                500
            }
        }
    }
}

/// All fatal errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The `url` parameter was empty or whitespace.
    #[error("Url can't be empty")]
    EmptyUrl,

    /// The source string could not be parsed as a URL.
    #[error("Invalid URL")]
    InvalidUrl { input: String },

    /// The URL parsed but points at a host we do not scrape.
    #[error("Invalid SlideShare URL")]
    UnsupportedHost { host: String },

    /// The URL path does not carry a document short name.
    #[error("Invalid SlideShare URL format")]
    InvalidUrlFormat { path: String },

    /// A query parameter was missing or had an unknown value.
    #[error("{0}")]
    InvalidParameter(String),

    // ── Not found ─────────────────────────────────────────────────────────
    /// The page contained zero slide image elements.
    #[error("No slide images found")]
    NoSlides,

    /// No slide offers the width that the quality tier maps to.
    #[error("No {width}px resolution slides found")]
    NoSlidesAtWidth { width: u32 },

    // ── Upstream errors ───────────────────────────────────────────────────
    /// Fetching the presentation page failed (transport error or non-2xx).
    #[error("Failed to fetch the presentation page")]
    PageFetchFailed { url: String, reason: String },

    /// The presentation page body could not be read as HTML.
    #[error("Failed to parse HTML")]
    PageParseFailed { url: String, reason: String },

    /// At least one slide image failed; every fetched file was removed.
    #[error("Failed to fetch images: {first_error}")]
    FetchFailed {
        total: usize,
        failed: usize,
        first_error: FetchError,
    },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The exporter could not build the output artifact.
    #[error("{format} export failed: {detail}")]
    ExportFailed { format: &'static str, detail: String },

    // ── Publish errors ────────────────────────────────────────────────────
    /// Uploading the artifact to the remote store failed.
    #[error("FTP upload failed: {0}")]
    PublishFailed(#[from] PublishError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (temp file creation, panicked blocking task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Classification of this error; decides the HTTP status.
    pub fn status_class(&self) -> StatusClass {
        match self {
            PipelineError::EmptyUrl
            | PipelineError::InvalidUrl { .. }
            | PipelineError::UnsupportedHost { .. }
            | PipelineError::InvalidUrlFormat { .. }
            | PipelineError::InvalidParameter(_) => StatusClass::InputError,
            PipelineError::NoSlides | PipelineError::NoSlidesAtWidth { .. } => {
                StatusClass::NotFound
            }
            PipelineError::PageFetchFailed { .. }
            | PipelineError::PageParseFailed { .. }
            | PipelineError::FetchFailed { .. } => StatusClass::UpstreamError,
            PipelineError::ExportFailed { .. }
            | PipelineError::InvalidConfig(_)
            | PipelineError::Internal(_) => StatusClass::ExportError,
            PipelineError::PublishFailed(_) => StatusClass::PublishError,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.status_class().status_code()
    }

    /// Human-readable detail string sent back to the caller.
    pub fn detail(&self) -> String {
        self.to_string()
    }

    pub(crate) fn export(format: &'static str, detail: impl std::fmt::Display) -> Self {
        PipelineError::ExportFailed {
            format,
            detail: detail.to_string(),
        }
    }
}

/// A single slide image failed inside the bounded fetcher.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection reset, TLS).
    #[error("error fetching image {url}: {reason}")]
    Request { url: String, reason: String },

    /// The request exceeded the per-image timeout.
    #[error("timed out after {secs}s fetching image {url}")]
    Timeout { url: String, secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("failed to fetch image: {url} (status {status})")]
    Status { url: String, status: u16 },

    /// The body was not a GIF/PNG/JPEG/WebP image.
    #[error("failed to decode image {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Re-encoding or writing the temporary JPEG failed.
    #[error("failed to store image {url}: {reason}")]
    Store { url: String, reason: String },

    /// The fetch task panicked or was cancelled.
    #[error("fetch task aborted: {reason}")]
    Aborted { reason: String },
}

/// Failure inside a [`crate::publish::Publisher`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// Could not open a connection to the store.
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    /// The store rejected our credentials.
    #[error("login as '{user}' failed: {reason}")]
    Login { user: String, reason: String },

    /// A directory segment could neither be entered nor created.
    #[error("cannot create remote directory '{dir}': {reason}")]
    CreateDir { dir: String, reason: String },

    /// Storing the file failed.
    #[error("store of '{remote_path}' failed: {reason}")]
    Store { remote_path: String, reason: String },

    /// The whole publish operation exceeded the configured bound.
    #[error("publish timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Reading the local artifact failed.
    #[error("cannot read local artifact '{path}': {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store settings are incomplete (missing host, bad port).
    #[error("remote store is not configured: {0}")]
    NotConfigured(String),
}
