//! Resolution selection: one image URL per slide at the tier's exact width.
//!
//! Slides that do not offer the width are dropped silently. Only an empty
//! result is an error, so decks where a few slides lack the HD rendition
//! still convert.

use crate::error::PipelineError;
use crate::output::{QualityTier, SlideManifestEntry};
use tracing::{debug, warn};

/// URLs picked for one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Image URLs in manifest order.
    pub urls: Vec<String>,
    /// The first selected URL.
    pub thumbnail: String,
}

/// Project every slide to its URL at `tier`'s width, preserving order.
pub fn select(
    manifest: &[SlideManifestEntry],
    tier: QualityTier,
) -> Result<Selection, PipelineError> {
    let width = tier.width();
    let urls: Vec<String> = manifest
        .iter()
        .filter_map(|slide| slide.url_for(width).map(str::to_string))
        .collect();

    let Some(thumbnail) = urls.first().cloned() else {
        return Err(PipelineError::NoSlidesAtWidth { width });
    };

    let dropped = manifest.len() - urls.len();
    if dropped > 0 {
        warn!(
            "{} of {} slides have no {}px rendition; skipping them",
            dropped,
            manifest.len(),
            width
        );
    }
    debug!("Selected {} slides at {}px", urls.len(), width);

    Ok(Selection { urls, thumbnail })
}
