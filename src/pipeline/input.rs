//! Input validation: normalise the user-supplied presentation URL.
//!
//! Only pages on the configured source host are accepted. The document
//! short name (used as the artifact's file stem) is the second-to-last path
//! segment, e.g. `deck-name` in `/someone/deck-name/123456`, percent-decoded.

use crate::error::PipelineError;
use percent_encoding::percent_decode_str;
use tracing::debug;
use url::Url;

/// A presentation URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    pub url: Url,
    pub doc_short_name: String,
}

/// Validate `input` against `allowed_host` and derive the document short name.
pub fn validate_url(input: &str, allowed_host: &str) -> Result<SourceUrl, PipelineError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PipelineError::EmptyUrl);
    }

    let url = Url::parse(input).map_err(|_| PipelineError::InvalidUrl {
        input: input.to_string(),
    })?;

    let host = url.host_str().unwrap_or_default();
    if !host.eq_ignore_ascii_case(allowed_host) {
        return Err(PipelineError::UnsupportedHost {
            host: host.to_string(),
        });
    }

    let doc_short_name = doc_short_name(&url)?;
    debug!("Validated {} → document '{}'", url, doc_short_name);

    Ok(SourceUrl {
        url,
        doc_short_name,
    })
}

/// Second-to-last non-empty path segment of `url`, percent-decoded.
///
/// A segment that is not valid UTF-8 once decoded, or that decodes to a
/// name containing a path separator, is rejected as a malformed URL.
fn doc_short_name(url: &Url) -> Result<String, PipelineError> {
    let bad_format = || PipelineError::InvalidUrlFormat {
        path: url.path().to_string(),
    };

    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(bad_format)?
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() < 2 {
        return Err(bad_format());
    }

    let name = percent_decode_str(segments[segments.len() - 2])
        .decode_utf8()
        .map_err(|_| bad_format())?;
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(bad_format());
    }
    Ok(name.into_owned())
}
