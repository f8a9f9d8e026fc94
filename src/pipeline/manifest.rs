//! Manifest resolution: presentation page → title + per-slide srcset map.
//!
//! The hosting site renders every slide as
//! `<img data-testid="vertical-slide-image" srcset="URL 320w, URL 638w, …">`.
//! The page is parsed into a DOM with `scraper`, so attribute values and the
//! title come back with quoting and character references already resolved.

use crate::error::PipelineError;
use crate::output::{SlideManifest, SlideManifestEntry};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

static SEL_SLIDE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"img[data-testid="vertical-slide-image"]"#).unwrap());

/// Fetch `page_url` and extract its slide manifest.
pub async fn resolve(
    client: &reqwest::Client,
    page_url: &str,
    timeout_secs: u64,
) -> Result<SlideManifest, PipelineError> {
    info!("Resolving slide manifest: {}", page_url);

    let response = client
        .get(page_url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(|e| PipelineError::PageFetchFailed {
            url: page_url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(PipelineError::PageFetchFailed {
            url: page_url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let html = response
        .text()
        .await
        .map_err(|e| PipelineError::PageParseFailed {
            url: page_url.to_string(),
            reason: e.to_string(),
        })?;

    let manifest = parse_manifest(&html)?;
    info!(
        "Found {} slides in '{}'",
        manifest.slides.len(),
        manifest.title
    );
    Ok(manifest)
}

/// Extract the manifest from page HTML.
///
/// Fails with [`PipelineError::NoSlides`] when no slide image carries a
/// usable srcset.
pub fn parse_manifest(html: &str) -> Result<SlideManifest, PipelineError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&SEL_TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let slides: Vec<SlideManifestEntry> = document
        .select(&SEL_SLIDE)
        .filter_map(|img| {
            let resolutions = parse_srcset(img.value().attr("srcset")?);
            if resolutions.is_empty() {
                debug!("Skipping slide image without usable srcset");
                None
            } else {
                Some(SlideManifestEntry { resolutions })
            }
        })
        .collect();

    if slides.is_empty() {
        return Err(PipelineError::NoSlides);
    }

    Ok(SlideManifest { title, slides })
}

/// Parse `"URL 320w, URL 638w"` into a width → URL map.
///
/// Candidates that are not exactly `URL <N>w` are ignored.
pub fn parse_srcset(srcset: &str) -> BTreeMap<u32, String> {
    let mut out = BTreeMap::new();
    for candidate in srcset.split(',') {
        let parts: Vec<&str> = candidate.split_whitespace().collect();
        let [url, descriptor] = parts.as_slice() else {
            continue;
        };
        let Some(width) = descriptor.strip_suffix('w') else {
            continue;
        };
        if let Ok(width) = width.parse::<u32>() {
            out.insert(width, (*url).to_string());
        }
    }
    out
}
