//! Data model shared by every pipeline stage.
//!
//! Shape validation happens once, at the resolver/selector boundary. After
//! that the stages pass these types around and never re-inspect raw strings.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tempfile::TempPath;

/// One slide as found on the page: available widths → image URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideManifestEntry {
    pub resolutions: BTreeMap<u32, String>,
}

impl SlideManifestEntry {
    /// URL for exactly `width`, if this slide offers it.
    pub fn url_for(&self, width: u32) -> Option<&str> {
        self.resolutions.get(&width).map(String::as_str)
    }
}

/// Everything the resolver extracts from one presentation page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideManifest {
    /// Contents of the page `<title>`.
    pub title: String,
    /// Slides in on-page order.
    pub slides: Vec<SlideManifestEntry>,
}

/// Requested output quality. Each tier maps to exactly one pixel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityTier {
    /// 2048 px wide slides. (default)
    #[default]
    #[serde(rename = "HD")]
    Hd,
    /// 638 px wide slides.
    #[serde(rename = "SD")]
    Sd,
}

impl QualityTier {
    /// Target image width in pixels.
    pub fn width(self) -> u32 {
        match self {
            QualityTier::Hd => 2048,
            QualityTier::Sd => 638,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Hd => "HD",
            QualityTier::Sd => "SD",
        }
    }
}

impl FromStr for QualityTier {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hd" => Ok(QualityTier::Hd),
            "sd" => Ok(QualityTier::Sd),
            other => Err(PipelineError::InvalidParameter(format!(
                "Invalid quality '{other}': expected one of hd, sd"
            ))),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which exporter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionType {
    #[serde(rename = "PDF")]
    Pdf,
    #[serde(rename = "PPTX")]
    SlideDeck,
    #[serde(rename = "IMAGES_ZIP")]
    Archive,
}

impl ConversionType {
    /// File extension of the produced artifact (no dot).
    pub fn extension(self) -> &'static str {
        match self {
            ConversionType::Pdf => "pdf",
            ConversionType::SlideDeck => "pptx",
            ConversionType::Archive => "zip",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversionType::Pdf => "PDF",
            ConversionType::SlideDeck => "PPTX",
            ConversionType::Archive => "IMAGES_ZIP",
        }
    }

    /// Success message placed in the response envelope.
    pub fn success_message(self) -> &'static str {
        match self {
            ConversionType::Pdf => "PDF generated successfully.",
            ConversionType::SlideDeck => "PPTX generated successfully.",
            ConversionType::Archive => "IMAGES ZIP generated successfully.",
        }
    }
}

impl FromStr for ConversionType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ConversionType::Pdf),
            "pptx" => Ok(ConversionType::SlideDeck),
            "images_zip" => Ok(ConversionType::Archive),
            other => Err(PipelineError::InvalidParameter(format!(
                "Invalid conversion_type '{other}': expected one of pdf, pptx, images_zip"
            ))),
        }
    }
}

impl fmt::Display for ConversionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slide image on local storage, normalised to JPEG.
///
/// The file is owned by this value: dropping it deletes the file. Exporters
/// only borrow [`FetchedImage::path`].
#[derive(Debug)]
pub struct FetchedImage {
    pub source_url: String,
    local: TempPath,
}

impl FetchedImage {
    pub(crate) fn new(source_url: String, local: TempPath) -> Self {
        Self { source_url, local }
    }

    pub fn path(&self) -> &Path {
        &self.local
    }

    /// Delete the local file now, reporting any I/O failure.
    pub fn close(self) -> std::io::Result<()> {
        self.local.close()
    }
}

/// Where the artifact landed on the remote store and how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub remote_path: String,
    pub size_bytes: u64,
}

/// `data` object of a successful `/convert` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionData {
    pub thumbnail: String,
    pub quality: QualityTier,
    pub conversion_type: ConversionType,
    pub slides_download_link: String,
    pub file_name: String,
    pub size: u64,
    pub title: String,
}

/// Successful `/convert` response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub success: bool,
    pub message: String,
    pub data: ConversionData,
}

/// Failure response envelope; status code comes from the error's class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: bool,
    pub detail: String,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(e: &PipelineError) -> Self {
        Self {
            success: false,
            error: true,
            detail: e.detail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_widths() {
        assert_eq!(QualityTier::Hd.width(), 2048);
        assert_eq!(QualityTier::Sd.width(), 638);
        assert_eq!(QualityTier::default(), QualityTier::Hd);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("sd".parse::<QualityTier>().unwrap(), QualityTier::Sd);
        assert_eq!("HD".parse::<QualityTier>().unwrap(), QualityTier::Hd);
        assert_eq!(
            "images_zip".parse::<ConversionType>().unwrap(),
            ConversionType::Archive
        );
        assert_eq!(
            "PPTX".parse::<ConversionType>().unwrap(),
            ConversionType::SlideDeck
        );
        assert!("docx".parse::<ConversionType>().is_err());
        assert!("4k".parse::<QualityTier>().is_err());
    }

    #[test]
    fn data_serialises_uppercase_enums() {
        let data = ConversionData {
            thumbnail: "https://img/1.jpg".into(),
            quality: QualityTier::Hd,
            conversion_type: ConversionType::Archive,
            slides_download_link: "https://dl.example/SS_DL/01012025/deck.zip".into(),
            file_name: "deck.zip".into(),
            size: 42,
            title: "Deck".into(),
        };
        let v = serde_json::to_value(&data).unwrap();
        assert_eq!(v["quality"], "HD");
        assert_eq!(v["conversion_type"], "IMAGES_ZIP");
        assert_eq!(v["size"], 42);
    }

    #[test]
    fn manifest_entry_exact_width_lookup() {
        let mut entry = SlideManifestEntry::default();
        entry.resolutions.insert(320, "a".into());
        entry.resolutions.insert(2048, "b".into());
        assert_eq!(entry.url_for(2048), Some("b"));
        assert_eq!(entry.url_for(2000), None);
    }
}
