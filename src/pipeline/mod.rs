//! Pipeline stages for slide-show export.
//!
//! Each submodule implements exactly one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ manifest ──▶ select ──▶ fetch ──▶ pdf | deck | archive
//! (URL)     (HTML page)  (width)    (bounded)  (artifact on disk)
//! ```
//!
//! 1. [`input`]    — validate the source URL, extract the document short name
//! 2. [`manifest`] — GET the page, extract title and per-slide srcsets
//! 3. [`select`]   — pick the URL at the tier's width for every slide
//! 4. [`fetch`]    — download all images under a concurrency ceiling; all
//!    or nothing, order preserved
//! 5. [`encode`]   — normalise each download to an RGB JPEG (used by `fetch`)
//! 6. [`pdf`], [`deck`], [`archive`] — write the artifact; synchronous, run
//!    on the blocking pool by the caller

pub mod archive;
pub mod deck;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod manifest;
pub mod pdf;
pub mod select;
